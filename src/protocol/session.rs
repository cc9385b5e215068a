//! Incremental tokenizer and per-stream lifecycle.
//!
//! A [`Session`] consumes exactly one byte per [`Session::feed`] call,
//! never blocks, and is resumable across calls. All transient state lives
//! in one fixed-capacity buffer plus a handful of cursors; the feed path
//! performs no heap allocation. Every parse failure emits exactly one error
//! reply and unconditionally resets, so no state leaks into the next
//! command and the session accepts the very next byte.

use super::encoder::Encoder;
use super::registry::{Args, Env, Request};
use super::{ARGS_ERROR, BUFFER_OVERFLOW, COMMAND_BUF_SIZE, MAX_ARGS, SYNTAX_ERROR};

/// Tokenizer mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Waiting for the first byte of a new command.
    Idle,
    /// Accumulating the argument vector.
    Reading,
}

/// Parser state for one independent input stream.
///
/// Exactly one `Session` exists per logical stream; it must not be driven
/// from more than one concurrent caller. Independent streams take
/// independent sessions.
pub struct Session {
    mode: Mode,
    /// Write cursor into `buf`.
    pos: usize,
    /// Argument count for the line in progress.
    argc: usize,
    /// Start offset of the token in progress.
    tok: usize,
    /// Argument start offsets into `buf`, non-decreasing; `argv[argc]`
    /// always points at the next free slot.
    argv: [usize; MAX_ARGS + 1],
    buf: [u8; COMMAND_BUF_SIZE],
    /// Index of the active dictionary. Bound once at creation, rebound only
    /// by handlers (SELECT), never cleared by a reset.
    dictionary: usize,
}

impl Session {
    /// Create a stream's session, bound to the default dictionary.
    pub fn new() -> Self {
        let mut session = Session {
            mode: Mode::Idle,
            pos: 0,
            argc: 0,
            tok: 0,
            argv: [0; MAX_ARGS + 1],
            buf: [0; COMMAND_BUF_SIZE],
            dictionary: 0,
        };
        session.reset();
        session
    }

    /// Clear the transient parse state only: mode, cursor, argument count,
    /// and argument slot 0. Safe and idempotent at any time, e.g. on a
    /// transport break condition. The dictionary binding is untouched.
    pub fn reset(&mut self) {
        self.mode = Mode::Idle;
        self.pos = 0;
        self.argc = 0;
        self.tok = 0;
        self.argv[0] = 0;
    }

    /// The active dictionary index.
    pub fn dictionary(&self) -> usize {
        self.dictionary
    }

    /// Process one input byte. Control returns immediately; the caller
    /// supplies the next byte whenever ready.
    pub fn feed(&mut self, byte: u8, env: &mut Env<'_>) {
        if self.mode == Mode::Idle {
            match byte {
                // Reserved framing markers: inert by contract, never a
                // mode change. Do not repurpose.
                b'+' | b'-' | b':' | b'$' | b'*' => return,
                // Blank lines between commands are absorbed.
                b'\r' | b'\n' => return,
                _ => {
                    if self.pos != 0 {
                        // Desynchronized: idle with a partial command
                        // buffered. Recover and report.
                        self.reset();
                        Encoder::new(&mut *env.out).error(SYNTAX_ERROR);
                        return;
                    }
                    // Reprocess this same byte as the first character of
                    // argument 0.
                    self.mode = Mode::Reading;
                }
            }
        }

        if byte == b'\r' || byte == b'\n' {
            if self.pos == 0 {
                // Empty command: reset silently, emit nothing.
                self.reset();
                return;
            }
            // Trailing separators: the final separator already terminated
            // the last token, so retract its zero byte instead of counting
            // an empty trailing argument.
            if self.tok != self.pos {
                self.argc += 1;
            } else {
                self.pos -= 1;
            }
            if self.argc > MAX_ARGS {
                Encoder::new(&mut *env.out).error(ARGS_ERROR);
                self.reset();
                return;
            }
            if self.pos >= COMMAND_BUF_SIZE {
                Encoder::new(&mut *env.out).error(BUFFER_OVERFLOW);
                self.reset();
                return;
            }
            self.buf[self.pos] = 0;
            self.pos += 1;
            self.argv[self.argc] = self.pos;
            self.dispatch(env);
            // No handler outcome may leak into the next command.
            self.reset();
            return;
        }

        if byte == b' ' {
            if self.tok == self.pos {
                // Leading or consecutive separators collapse.
                return;
            }
            if self.pos < COMMAND_BUF_SIZE {
                self.buf[self.pos] = 0;
                self.pos += 1;
            }
            self.argc += 1;
            if self.argc <= MAX_ARGS {
                self.argv[self.argc] = self.pos;
            }
            self.tok = self.pos;
            return;
        }

        if self.pos < COMMAND_BUF_SIZE {
            self.buf[self.pos] = byte;
            self.pos += 1;
        }
        // Past capacity the byte is dropped; a token longer than the buffer
        // is truncated and only surfaces as an overflow at line end.
    }

    /// Resolve argument 0 against the registry and invoke the handler.
    fn dispatch(&mut self, env: &mut Env<'_>) {
        let args = Args::new(&self.buf, &self.argv, self.argc);
        let handler = env.registry.lookup(args.arg(0));
        let mut request = Request {
            args,
            dictionary: &mut self.dictionary,
            env,
        };
        handler(&mut request);
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}
