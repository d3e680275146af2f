//! Command Processing Module
//!
//! This module implements the command processing layer of rodgate.
//! It receives decoded Hot Rod requests, executes them against the stores,
//! and produces exactly one response per request.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ RequestDecoder  │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │CommandProcessor │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Execute      │
//! │  - Classify     │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ ResponseWriter  │──> connection
//! └─────────────────┘
//! ```
//!
//! ## Supported Operations
//!
//! - `PUT`, `GET`, `REMOVE`, `PUT_ALL`
//! - `PING`, `EXEC`
//! - `GET_MULTIMAP`, `PUT_MULTIMAP`
//!
//! `STATS`, `QUERY` and the `ITERATION_*` operations are answered with an
//! unsupported-operation error.

pub mod classifier;
pub mod processor;
pub mod writer;

// Re-export the main command processor
pub use classifier::{cause_chain_message, classify, Classification};
pub use processor::{write_exception, CommandProcessor};
pub use writer::{ResponseSlot, ResponseWriter};
