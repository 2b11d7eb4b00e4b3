//! Integration tests for garden-client against a fake HTTP server.

mod common;

use std::time::Duration;

use garden_client::{
    Capacity, Client, ContainerSpec, GardenError, MemoryLimits, ProcessIo, ProcessSpec, Properties,
};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};

use common::{FakeServer, Reply, SharedBuffer};

fn client(server: &FakeServer) -> Client {
    Client::builder()
        .address(server.address.clone())
        .max_idle_connections(2)
        .build()
        .unwrap()
}

#[tokio::test]
async fn ping_sends_bodyless_request() {
    let server = FakeServer::start(|_| Reply::json("{}")).await;
    let client = client(&server);

    client.ping().await.unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].target, "/ping");
    assert_eq!(requests[0].header("host"), Some("api"));
    assert!(requests[0].header("content-type").is_none());
    assert_eq!(client.pool().idle(), 1);
}

#[tokio::test]
async fn success_response_decodes() {
    let server = FakeServer::start(|_| {
        Reply::json(r#"{"memory_in_bytes":1024,"disk_in_bytes":2048,"max_containers":5}"#)
    })
    .await;

    let capacity = client(&server).capacity().await.unwrap();
    assert_eq!(
        capacity,
        Capacity {
            memory_in_bytes: 1024,
            disk_in_bytes: 2048,
            max_containers: 5,
        }
    );
}

#[tokio::test]
async fn service_unavailable_message_is_body() {
    let server = FakeServer::start(|_| Reply::status(503, "container busy")).await;
    let client = client(&server);

    let err = client.capacity().await.unwrap_err();
    assert!(err.is_service_unavailable());
    assert_eq!(err.to_string(), "container busy");

    // Not a transport failure, so the connection goes back to the pool.
    assert_eq!(client.pool().idle(), 1);
}

#[tokio::test]
async fn other_status_is_operation_error() {
    let server = FakeServer::start(|_| Reply::status(500, "boom")).await;

    let err = client(&server).ping().await.unwrap_err();
    match err {
        GardenError::Operation { status, ref message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        ref other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.status_code(), Some(500));
}

#[tokio::test]
async fn success_status_with_wrong_shape_is_not_decoded() {
    let server = FakeServer::start(|_| Reply::json(r#"{"memory_in_bytes":"lots"}"#)).await;

    let err = client(&server).capacity().await.unwrap_err();
    assert!(matches!(err, GardenError::Json(_)));
}

#[tokio::test]
async fn create_posts_json_spec() {
    let server = FakeServer::start(|_| Reply::json(r#"{"handle":"web-1"}"#)).await;

    let spec = ContainerSpec {
        handle: "web-1".into(),
        ..ContainerSpec::default()
    };
    let container = client(&server).create(&spec).await.unwrap();
    assert_eq!(container.handle(), "web-1");

    let request = &server.requests()[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.target, "/containers");
    assert_eq!(request.header("content-type"), Some("application/json"));
    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body["handle"], "web-1");
}

#[tokio::test]
async fn list_filters_by_properties() {
    let server = FakeServer::start(|_| Reply::json(r#"{"handles":["a","b"]}"#)).await;

    let mut filter = Properties::new();
    filter.insert("env".into(), "prod".into());
    let containers = client(&server).containers(&filter).await.unwrap();

    let handles: Vec<_> = containers.iter().map(|c| c.handle()).collect();
    assert_eq!(handles, ["a", "b"]);
    assert_eq!(server.requests()[0].target, "/containers?env=prod");
}

#[tokio::test]
async fn lookup_missing_container() {
    let server = FakeServer::start(|_| Reply::json(r#"{"handles":["a","b"]}"#)).await;
    let client = client(&server);

    assert_eq!(client.lookup("b").await.unwrap().handle(), "b");

    let err = client.lookup("c").await.unwrap_err();
    assert!(matches!(err, GardenError::ContainerNotFound(ref h) if h == "c"));
}

#[tokio::test]
async fn bulk_info_decodes_handle_map() {
    let server = FakeServer::start(|_| {
        Reply::json(
            r#"{"a":{"info":{"state":"active","process_ids":[1,2]}},"b":{"err":{"message":"gone"}}}"#,
        )
    })
    .await;

    let entries = client(&server).bulk_info(&["a", "b"]).await.unwrap();
    assert_eq!(entries["a"].info.state, "active");
    assert_eq!(entries["a"].info.process_ids, vec![1, 2]);
    assert!(entries["a"].err.is_none());
    assert_eq!(entries["b"].err.as_ref().unwrap().message, "gone");

    let request = &server.requests()[0];
    assert_eq!(request.path(), "/containers/bulk_info");
    assert_eq!(request.query(), Some("handles=a%2Cb"));
}

#[tokio::test]
async fn container_operations_address_the_handle() {
    let server = FakeServer::start(|req| match (req.method.as_str(), req.path()) {
        ("GET", "/containers/web%201/properties/some%2Fkey") => Reply::json(r#"{"value":"v1"}"#),
        ("PUT", "/containers/web%201/limits/memory") => {
            Reply::json(r#"{"limit_in_bytes":4096}"#)
        }
        ("POST", "/containers/web%201/net/in") => {
            Reply::json(r#"{"host_port":61001,"container_port":8080}"#)
        }
        _ => Reply::json("{}"),
    })
    .await;
    let client = client(&server);
    let container = client.container("web 1");

    assert_eq!(container.property("some/key").await.unwrap(), "v1");
    container.set_property("k", "v2").await.unwrap();
    container.stop(true).await.unwrap();

    let limits = container
        .limit_memory(&MemoryLimits {
            limit_in_bytes: 4096,
        })
        .await
        .unwrap();
    assert_eq!(limits.limit_in_bytes, 4096);

    assert_eq!(container.net_in(0, 8080).await.unwrap(), (61001, 8080));

    let requests = server.requests();
    let set = &requests[1];
    assert_eq!(set.method, "PUT");
    assert_eq!(set.path(), "/containers/web%201/properties/k");
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(&set.body).unwrap(),
        serde_json::json!({"value": "v2"})
    );

    let stop = &requests[2];
    assert_eq!(stop.path(), "/containers/web%201/stop");
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(&stop.body).unwrap(),
        serde_json::json!({"kill": true})
    );

    let net_in: serde_json::Value = serde_json::from_slice(&requests[4].body).unwrap();
    assert_eq!(net_in["container_port"], 8080);
    assert_eq!(net_in["handle"], "web 1");
}

#[tokio::test]
async fn stream_in_and_out_move_raw_bytes() {
    let server = FakeServer::start(|req| match req.method.as_str() {
        "GET" => Reply::Status(200, b"tar-out-bytes".to_vec()),
        _ => Reply::json(""),
    })
    .await;
    let client = client(&server);
    let container = client.container("web-1");

    container
        .stream_in("/tmp/in", &b"tar-in-bytes"[..])
        .await
        .unwrap();

    let mut out = container.stream_out("/etc").await.unwrap();
    let mut bytes = Vec::new();
    out.read_to_end(&mut bytes).await.unwrap();
    assert_eq!(bytes, b"tar-out-bytes");

    let requests = server.requests();
    assert_eq!(requests[0].method, "PUT");
    assert_eq!(requests[0].path(), "/containers/web-1/files");
    assert_eq!(requests[0].query(), Some("destination=%2Ftmp%2Fin"));
    assert_eq!(requests[0].header("content-type"), Some("application/x-tar"));
    assert_eq!(requests[0].body, b"tar-in-bytes");
    assert_eq!(requests[1].query(), Some("source=%2Fetc"));
}

#[tokio::test]
async fn run_over_hijacked_tcp_connections() {
    let server = FakeServer::start(|req| match req.path() {
        "/containers/web-1/processes" => Reply::hijack(|mut conn| async move {
            conn.get_mut()
                .write_all(b"{\"process_id\":5,\"stream_id\":9}\n")
                .await
                .unwrap();

            let mut line = String::new();
            conn.read_line(&mut line).await.unwrap();
            let stdin: serde_json::Value = serde_json::from_str(&line).unwrap();
            assert_eq!(stdin["data"], "hi");

            line.clear();
            conn.read_line(&mut line).await.unwrap();
            let eof: serde_json::Value = serde_json::from_str(&line).unwrap();
            assert!(eof.get("data").is_none());

            conn.get_mut()
                .write_all(b"{\"process_id\":5,\"exit_status\":0}\n")
                .await
                .unwrap();

            // Hold the channel until the client closes it.
            let mut rest = Vec::new();
            let _ = conn.read_to_end(&mut rest).await;
        }),
        "/containers/web-1/processes/5/attaches/9/stdout" => {
            Reply::hijack(|mut conn| async move {
                conn.get_mut().write_all(b"hello ").await.unwrap();
                tokio::time::sleep(Duration::from_millis(10)).await;
                conn.get_mut().write_all(b"world").await.unwrap();
                let _ = conn.get_mut().shutdown().await;
            })
        }
        _ => Reply::status(404, "no route"),
    })
    .await;
    let client = client(&server);
    let container = client.container("web-1");

    let stdout = SharedBuffer::new();
    let process = container
        .run(
            &ProcessSpec::new("echo", ["hello", "world"]),
            ProcessIo::new()
                .stdin(&b"hi"[..])
                .stdout(stdout.clone()),
        )
        .await
        .unwrap();
    assert_eq!(process.id(), 5);

    let code = tokio::time::timeout(Duration::from_secs(5), process.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(code, 0);
    assert_eq!(stdout.contents(), b"hello world");

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].header("content-type"), Some("application/json"));
    let spec: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(spec["path"], "echo");
    assert_eq!(spec["args"], serde_json::json!(["hello", "world"]));
    assert_eq!(requests[1].method, "GET");
}

#[tokio::test]
async fn refused_run_is_synchronous_error() {
    let server = FakeServer::start(|_| Reply::status(500, "no such container")).await;
    let container = client(&server).container("web-1");

    let err = container
        .run(&ProcessSpec::new("true", Vec::<String>::new()), ProcessIo::new())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(500));
    assert_eq!(err.to_string(), "no such container");
}
