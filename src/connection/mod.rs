//! Connection Handler Module
//!
//! This module manages individual client connections to rodgate.
//! Each client connection is handled by its own async task, with a second
//! task writing responses back in request order.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (main.rs)                                │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │   For each client...   │
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read bytes  │───>│Decode frame │───>│  Dispatch   │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                            │                  │             │
//! │                       queue slot         write slot         │
//! │                            ▼                  ▼             │
//! │                      ┌──────────────────────────┐           │
//! │                      │ Writer task (in order)   │           │
//! │                      └──────────────────────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Async I/O**: Uses Tokio for non-blocking network operations
//! - **Pipelining**: Several frames in one TCP packet are decoded back to back
//! - **Ordered responses**: Asynchronous gets never overtake earlier requests
//! - **Statistics**: Tracks connection and request metrics
//!
//! ## Example
//!
//! ```ignore
//! use rodgate::commands::CommandProcessor;
//! use rodgate::connection::{handle_connection, ConnectionStats};
//! use rodgate::protocol::RequestDecoder;
//! use rodgate::storage::{MultimapStore, StorageEngine};
//! use std::sync::Arc;
//!
//! let processor = CommandProcessor::new(
//!     Arc::new(StorageEngine::new()),
//!     Arc::new(MultimapStore::new()),
//! );
//! let stats = Arc::new(ConnectionStats::new());
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(
//!     stream,
//!     addr,
//!     processor.clone(),
//!     RequestDecoder::default(),
//!     Arc::clone(&stats),
//! ));
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
