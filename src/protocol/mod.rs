//! Line-oriented command protocol core.
//!
//! The protocol is a single-stream, byte-at-a-time command format for small
//! key/value servers: a command line is a name and space-separated arguments
//! terminated by CR or LF, and replies use a compact prefix-marked wire
//! format (`+` simple status, `-ERROR` errors, `:` integers, `$` length
//! prefixed bulk strings).
//!
//! ## Modules
//! - `encoder`: stateless reply encoder over a byte [`Sink`]
//! - `session`: incremental tokenizer state machine and stream lifecycle
//! - `registry`: ordered command table, dispatcher, and handler context

pub mod encoder;
pub mod registry;
pub mod session;

use bytes::{BufMut, BytesMut};

/// Fixed capacity of the per-stream command buffer.
pub const COMMAND_BUF_SIZE: usize = 128;

/// Maximum number of arguments per command, the command name included.
pub const MAX_ARGS: usize = 8;

/// Canonical success text, reused verbatim on the wire.
pub const OK: &str = "OK";

/// Error text for an unresolved command name.
pub const UNKNOWN_COMMAND: &str = "unknown command";

/// Error text for a desynchronized input stream.
pub const SYNTAX_ERROR: &str = "syntax error";

/// Error text for a command line exceeding the buffer capacity.
pub const BUFFER_OVERFLOW: &str = "buffer overflow";

/// Error text for a command exceeding the argument limit.
pub const ARGS_ERROR: &str = "bad argument count";

/// Error text for a dictionary that cannot fit another entry.
pub const STORAGE_OVERFLOW: &str = "storage overflow";

/// Single-byte output primitive at the system boundary.
///
/// Every emitted byte goes through `put`, in strict order. Implementations
/// may buffer internally as long as emission order is preserved.
pub trait Sink {
    fn put(&mut self, byte: u8);
}

impl Sink for Vec<u8> {
    fn put(&mut self, byte: u8) {
        self.push(byte);
    }
}

impl Sink for BytesMut {
    fn put(&mut self, byte: u8) {
        self.put_u8(byte);
    }
}
