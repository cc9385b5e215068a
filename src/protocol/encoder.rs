//! Reply encoder for the wire format.
//!
//! Stateless and infallible: replies are emitted byte by byte, in order,
//! directly to the output [`Sink`]. A slow reader may observe a reply
//! incrementally, so nothing is reordered or held back.

use super::{Sink, OK};

/// Encodes replies onto a byte sink.
pub struct Encoder<'a> {
    out: &'a mut dyn Sink,
}

impl<'a> Encoder<'a> {
    pub fn new(out: &'a mut dyn Sink) -> Self {
        Encoder { out }
    }

    /// Emit a simple status reply: `+<text>\r\n`.
    pub fn simple(&mut self, text: &str) {
        self.out.put(b'+');
        self.raw(text.as_bytes());
        self.newline();
    }

    /// Emit an error reply: `-ERROR[ <text>]\r\n`.
    ///
    /// Passing the canonical success text redirects to the simple-status
    /// form, so handlers that funnel every outcome through their error path
    /// still produce `+OK` on success.
    pub fn error(&mut self, text: &str) {
        if text == OK {
            self.simple(text);
            return;
        }
        self.raw(b"-ERROR");
        if !text.is_empty() {
            self.out.put(b' ');
            self.raw(text.as_bytes());
        }
        self.newline();
    }

    /// Emit an integer reply: `:<value>\r\n`.
    pub fn integer(&mut self, value: i64) {
        self.size(b':', value);
    }

    /// Emit a bulk string reply: `$<len>\r\n<payload>\r\n`.
    pub fn bulk(&mut self, payload: &[u8]) {
        self.size(b'$', payload.len() as i64);
        self.raw(payload);
        self.newline();
    }

    /// Emit the null bulk string reply: `$-1\r\n`.
    pub fn null(&mut self) {
        self.raw(b"$-1");
        self.newline();
    }

    /// Sized-prefix framing shared by integer replies and bulk lengths.
    fn size(&mut self, marker: u8, value: i64) {
        self.out.put(marker);
        self.decimal(value);
        self.newline();
    }

    /// Render a decimal without leading zeros; zero is a single digit.
    fn decimal(&mut self, value: i64) {
        if value < 0 {
            self.out.put(b'-');
        }
        let mut magnitude = value.unsigned_abs();
        let mut divisor = 1u64;
        while magnitude / (divisor * 10) != 0 {
            divisor *= 10;
        }
        while divisor > 0 {
            self.out.put(b'0' + (magnitude / divisor) as u8);
            magnitude %= divisor;
            divisor /= 10;
        }
    }

    fn raw(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.out.put(byte);
        }
    }

    fn newline(&mut self) {
        self.out.put(b'\r');
        self.out.put(b'\n');
    }
}
