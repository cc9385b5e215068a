//! Command registry and dispatch context.
//!
//! The registry is an ordered list of `(name, handler)` pairs built once
//! before any input is processed and never mutated afterward. Lookup is a
//! linear, ASCII case-insensitive scan in table order; the first match wins,
//! so composing handler sets must preserve ordering for overlapping names.
//! A sentinel entry with an empty name terminates the table and fires for
//! every unresolved command.

use super::encoder::Encoder;
use super::Sink;
use crate::pubsub::{Bus, Fanout, StreamId};
use crate::storage::Store;

/// A command handler.
///
/// Handlers receive the full parsed state and are solely responsible for
/// producing their reply through the encoder: a single wire form, or a
/// composed sequence for multi-value replies. Argument-semantics validation
/// is entirely theirs; the dispatcher performs none.
pub type Handler = fn(&mut Request<'_, '_>);

/// One `name -> handler` binding.
pub struct CommandEntry {
    pub name: &'static str,
    pub handler: Handler,
}

/// Immutable, ordered command table with a sentinel fallback.
pub struct CommandTable {
    entries: Vec<CommandEntry>,
}

impl CommandTable {
    /// Build a table from ordered entries plus the fallback handler that
    /// fires when no name matches.
    pub fn new(mut entries: Vec<CommandEntry>, fallback: Handler) -> Self {
        entries.push(CommandEntry {
            name: "",
            handler: fallback,
        });
        CommandTable { entries }
    }

    /// Resolve a command name. Case folding applies to ASCII letters only;
    /// any other byte compares verbatim.
    pub fn lookup(&self, name: &[u8]) -> Handler {
        for entry in &self.entries {
            if entry.name.is_empty() || entry.name.as_bytes().eq_ignore_ascii_case(name) {
                return entry.handler;
            }
        }
        // The sentinel always matches; the loop cannot fall through.
        unreachable!("command table missing sentinel entry")
    }

    /// Registered command names in table order, sentinel excluded.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries
            .iter()
            .map(|entry| entry.name)
            .filter(|name| !name.is_empty())
    }
}

/// The parsed argument vector: byte-string views into the session buffer,
/// valid only until the session's next reset. Index 0 is the command name.
#[derive(Clone, Copy)]
pub struct Args<'a> {
    buf: &'a [u8],
    argv: &'a [usize],
    argc: usize,
}

impl<'a> Args<'a> {
    pub(crate) fn new(buf: &'a [u8], argv: &'a [usize], argc: usize) -> Self {
        Args { buf, argv, argc }
    }

    /// Number of arguments, command name included.
    pub fn argc(&self) -> usize {
        self.argc
    }

    /// Argument `i` as a byte-string view. Each argument is stored with a
    /// trailing zero byte; the slot after the last argument is the
    /// next-free-slot sentinel, so `argv[i + 1] - 1` ends the view.
    pub fn arg(&self, i: usize) -> &'a [u8] {
        &self.buf[self.argv[i]..self.argv[i + 1] - 1]
    }
}

/// Per-dispatch collaborators handed to handlers alongside the arguments.
pub struct Env<'e> {
    pub registry: &'e CommandTable,
    pub store: &'e mut Store,
    pub bus: &'e mut Bus,
    pub fanout: &'e mut dyn Fanout,
    pub stream: StreamId,
    pub out: &'e mut dyn Sink,
}

/// Everything a handler sees for one command.
pub struct Request<'a, 'e> {
    pub args: Args<'a>,
    /// Index of the session's active dictionary; mutable so a handler can
    /// rebind it (SELECT). Survives resets.
    pub dictionary: &'a mut usize,
    pub env: &'a mut Env<'e>,
}

impl Request<'_, '_> {
    pub fn simple(&mut self, text: &str) {
        Encoder::new(&mut *self.env.out).simple(text);
    }

    pub fn error(&mut self, text: &str) {
        Encoder::new(&mut *self.env.out).error(text);
    }

    pub fn integer(&mut self, value: i64) {
        Encoder::new(&mut *self.env.out).integer(value);
    }

    pub fn bulk(&mut self, payload: &[u8]) {
        Encoder::new(&mut *self.env.out).bulk(payload);
    }

    pub fn null(&mut self) {
        Encoder::new(&mut *self.env.out).null();
    }
}
