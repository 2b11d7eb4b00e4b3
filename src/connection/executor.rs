//! Unary call executor.
//!
//! Every call dials a fresh connection, performs one HTTP/1.1 exchange and
//! lets the connection close once the response body has been consumed.

use std::io;

use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncRead;
use tokio_util::io::{ReaderStream, StreamReader};

use crate::codec::JsonCodec;
use crate::error::{GardenError, Result};
use crate::transport::{Address, Params, RequestGenerator};

/// Request body accepted by the executor.
pub(crate) type RequestBody = UnsyncBoxBody<Bytes, io::Error>;

/// Response body handed back by [`Executor::stream`].
pub type ResponseReader = Box<dyn AsyncRead + Send + Unpin>;

pub(crate) fn empty_body() -> RequestBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub(crate) fn full_body(bytes: Bytes) -> RequestBody {
    Full::new(bytes)
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub(crate) fn reader_body<R>(reader: R) -> RequestBody
where
    R: AsyncRead + Send + 'static,
{
    StreamBody::new(ReaderStream::new(reader).map_ok(Frame::data)).boxed_unsync()
}

#[derive(Debug, Clone)]
pub(crate) struct Executor {
    address: Address,
    generator: RequestGenerator,
}

impl Executor {
    pub(crate) fn new(address: Address, generator: RequestGenerator) -> Self {
        Self { address, generator }
    }

    pub(crate) fn address(&self) -> &Address {
        &self.address
    }

    /// Issue a call with an optional JSON body and decode the JSON response.
    pub(crate) async fn call<B, T>(
        &self,
        route: &'static str,
        body: Option<&B>,
        params: Params<'_>,
        query: Params<'_>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let bytes = self.call_raw(route, body, params, query).await?;
        JsonCodec::decode(&bytes)
    }

    /// Issue a call and discard the response body after reading it.
    pub(crate) async fn call_unit<B>(
        &self,
        route: &'static str,
        body: Option<&B>,
        params: Params<'_>,
        query: Params<'_>,
    ) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        self.call_raw(route, body, params, query).await.map(drop)
    }

    async fn call_raw<B>(
        &self,
        route: &'static str,
        body: Option<&B>,
        params: Params<'_>,
        query: Params<'_>,
    ) -> Result<Bytes>
    where
        B: Serialize + ?Sized,
    {
        let body = match body {
            Some(value) => Some((
                full_body(Bytes::from(JsonCodec::encode(value)?)),
                JsonCodec::CONTENT_TYPE,
            )),
            None => None,
        };

        let response = self.send(route, body, params, query).await?;
        Ok(response.into_body().collect().await?.to_bytes())
    }

    /// Issue a call whose response body is a raw byte stream.
    pub(crate) async fn stream(
        &self,
        route: &'static str,
        body: Option<(RequestBody, &'static str)>,
        params: Params<'_>,
        query: Params<'_>,
    ) -> Result<ResponseReader> {
        let response = self.send(route, body, params, query).await?;
        let data = response.into_body().into_data_stream().map_err(io::Error::other);
        Ok(Box::new(StreamReader::new(Box::pin(data))))
    }

    /// Send one request and check its status.
    ///
    /// A non-success response is read to the end and mapped to an error.
    async fn send(
        &self,
        route: &'static str,
        body: Option<(RequestBody, &'static str)>,
        params: Params<'_>,
        query: Params<'_>,
    ) -> Result<Response<Incoming>> {
        let (method, target) = self.generator.request_target(route, params, query)?;

        let mut builder = Request::builder()
            .method(method)
            .uri(target)
            .header(HOST, RequestGenerator::HOST);
        let body = match body {
            Some((body, content_type)) => {
                builder = builder.header(CONTENT_TYPE, content_type);
                body
            }
            None => empty_body(),
        };
        let request = builder
            .body(body)
            .map_err(|e| GardenError::InvalidRequest(e.to_string()))?;

        let stream = self.address.connect().await?;
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("connection closed: {}", e);
            }
        });

        let response = sender.send_request(request).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.into_body().collect().await?.to_bytes();
            tracing::debug!("{} returned status {}", route, status);
            return Err(GardenError::from_status(status.as_u16(), &body));
        }

        Ok(response)
    }
}
