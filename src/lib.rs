//! # garden-client
//!
//! Async Rust client for the Garden container API.
//!
//! Simple operations (capacity, limits, properties, metrics, ...) are plain
//! HTTP/1.1 request/response calls with JSON bodies. Running or attaching to
//! a process hijacks the request instead:
//!
//! - **Control channel**: newline-delimited JSON frames. The server sends
//!   the process id first and the exit status last; the client sends stdin,
//!   signals and TTY updates in between.
//! - **Side channels**: one extra hijacked connection each for stdout and
//!   stderr, carrying raw bytes. Only opened when the caller asks for them.
//!
//! ## Example
//!
//! ```ignore
//! use garden_client::{Address, Client, ProcessIo, ProcessSpec};
//!
//! #[tokio::main]
//! async fn main() -> garden_client::Result<()> {
//!     let client = Client::new(Address::parse("unix", "/tmp/garden.sock")?)?;
//!     let container = client.lookup("web-1").await?;
//!
//!     let process = container
//!         .run(
//!             &ProcessSpec::new("sh", ["-c", "echo hello"]),
//!             ProcessIo::new().stdout(tokio::io::stdout()),
//!         )
//!         .await?;
//!
//!     let code = process.wait().await?;
//!     println!("exited with {}", code);
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod connection;
pub mod error;
pub mod pool;
pub mod process;
pub mod protocol;
pub mod transport;
pub mod types;
pub mod writer;

mod client;
mod container;

pub use client::{Client, ClientBuilder, NetworkProvider};
pub use connection::{Connection, ConnectionConfig, ResponseReader};
pub use container::Container;
pub use error::{GardenError, Result};
pub use pool::{ConnectionPool, ConnectionProvider};
pub use process::{Process, ProcessIo};
pub use transport::{Address, HijackRequest, HijackedConnection, Hijacker, HttpHijacker};
pub use types::*;
