//! # dictwire
//!
//! A line-oriented command protocol core for small key/value servers:
//! an incremental, allocation-free tokenizer that turns individually
//! delivered bytes (a serial link, a socket) into a command and argument
//! vector, an ordered command registry with a sentinel fallback, and a
//! compact prefix-marked reply encoder.
//!
//! ```text
//! byte source -> Session (tokenizer) -> CommandTable lookup
//!                                          |
//!                                          v
//!                                   handler(Request)
//!                                          |
//!                           Encoder -> byte sink
//! ```
//!
//! The core is single-threaded and non-blocking: one byte in, control
//! returns immediately. One [`protocol::session::Session`] exists per
//! stream; independent streams take independent sessions. The crate also
//! ships built-in dictionary and pub/sub handlers plus a demonstration TCP
//! server that embeds the core.

pub mod commands;
pub mod config;
pub mod protocol;
pub mod pubsub;
pub mod server;
pub mod storage;

pub use commands::default_table;
pub use config::Config;
pub use protocol::encoder::Encoder;
pub use protocol::registry::{CommandEntry, CommandTable, Env, Request};
pub use protocol::session::Session;
pub use protocol::Sink;
pub use pubsub::{Bus, Fanout, StreamId};
pub use server::Server;
pub use storage::{Store, StoreError};
