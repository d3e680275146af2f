//! # rodgate - A Hot Rod Compatible Binary Cache Endpoint
//!
//! rodgate serves the Hot Rod binary protocol over TCP in front of an
//! in-memory, named-cache store. Every decoded request is answered with
//! exactly one response frame, and every failure is translated into a
//! well-formed error frame with a protocol status code.
//!
//! ## Features
//!
//! - **Hot Rod wire protocol**: Versions 2.0 through 3.1 (wire versions 20..=31)
//! - **Named caches**: Optionally restricted to a configured set of names
//! - **Multimaps**: Per-cache multimaps created lazily on first use
//! - **Async I/O**: Built on Tokio, with in-order responses per connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              rodgate                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Processor  │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                            ▼                  ▼                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────────────────┐ │
//! │  │  Request    │    │  Response   │    │ StorageEngine (64 shards)    │ │
//! │  │  Decoder    │    │  Encoder    │    │ MultimapStore                │ │
//! │  └─────────────┘    └─────────────┘    └──────────────────────────────┘ │
//! │                            ▲                                            │
//! │                            │                                            │
//! │                     ┌──────┴──────┐                                     │
//! │                     │   Error     │                                     │
//! │                     │ Classifier  │                                     │
//! │                     └─────────────┘                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use rodgate::commands::CommandProcessor;
//! use rodgate::connection::{handle_connection, ConnectionStats};
//! use rodgate::protocol::RequestDecoder;
//! use rodgate::storage::{MultimapStore, StorageEngine};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let processor = CommandProcessor::new(
//!         Arc::new(StorageEngine::new()),
//!         Arc::new(MultimapStore::new()),
//!     );
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:11222").await.unwrap();
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         tokio::spawn(handle_connection(
//!             stream,
//!             addr,
//!             processor.clone(),
//!             RequestDecoder::default(),
//!             Arc::clone(&stats),
//!         ));
//!     }
//! }
//! ```
//!
//! ## Supported Operations
//!
//! - `PUT`, `GET`, `REMOVE`, `PUT_ALL`
//! - `PING`, `EXEC`
//! - `GET_MULTIMAP`, `PUT_MULTIMAP`
//!
//! `STATS`, `QUERY`, `ITERATION_START`, `ITERATION_NEXT` and `ITERATION_END`
//! decode normally and are answered with an error response.
//!
//! ## Module Overview
//!
//! - [`protocol`]: Hot Rod frame decoding, response encoding and wire types
//! - [`storage`]: Thread-safe cache store and multimap store
//! - [`commands`]: Request dispatch, error classification and response writing
//! - [`connection`]: Client connection management
//! - [`config`]: Command-line configuration
//! - [`error`]: The error type shared by every layer

pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandProcessor, ResponseWriter};
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats};
pub use error::HotRodError;
pub use protocol::{Request, RequestDecoder, RequestHeader};
pub use storage::{Caches, MultimapStore, StorageEngine};

/// The default port rodgate listens on (the Hot Rod port)
pub const DEFAULT_PORT: u16 = 11222;

/// The default host rodgate binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of rodgate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
