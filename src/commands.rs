//! Built-in command handlers and the default command table.
//!
//! Handlers validate their own argument counts (the dispatcher does not)
//! and report violations with the canonical `bad argument count` text.
//! Multi-value replies are composed from the base wire forms; there is no
//! array framing.

use crate::protocol::encoder::Encoder;
use crate::protocol::registry::{CommandEntry, CommandTable, Env, Request};
use crate::protocol::{ARGS_ERROR, OK, STORAGE_OVERFLOW, UNKNOWN_COMMAND};
use crate::storage::StoreError;
use tracing::debug;

/// The default binding set, in lookup order.
pub fn default_table() -> CommandTable {
    CommandTable::new(
        vec![
            CommandEntry {
                name: "GET",
                handler: get,
            },
            CommandEntry {
                name: "SET",
                handler: set,
            },
            CommandEntry {
                name: "DEL",
                handler: del,
            },
            CommandEntry {
                name: "KEYS",
                handler: keys,
            },
            CommandEntry {
                name: "SELECT",
                handler: select,
            },
            CommandEntry {
                name: "SUBSCRIBE",
                handler: subscribe,
            },
            CommandEntry {
                name: "UNSUBSCRIBE",
                handler: unsubscribe,
            },
            CommandEntry {
                name: "PUBLISH",
                handler: publish,
            },
            CommandEntry {
                name: "COMMANDS",
                handler: commands,
            },
        ],
        unknown,
    )
}

/// Sentinel handler: fires for every unresolved name.
fn unknown(req: &mut Request) {
    req.error(UNKNOWN_COMMAND);
}

/// `GET key` — bulk value, or null when unset.
fn get(req: &mut Request) {
    if req.args.argc() != 2 {
        req.error(ARGS_ERROR);
        return;
    }
    let key = req.args.arg(1);
    let dict = *req.dictionary;
    let Env { store, out, .. } = &mut *req.env;
    let mut enc = Encoder::new(&mut **out);
    match store.get(dict, key) {
        Some(value) => enc.bulk(value),
        None => enc.null(),
    }
}

/// `SET key value` — `+OK`, or a storage overflow error when the active
/// dictionary cannot fit the pair.
fn set(req: &mut Request) {
    if req.args.argc() != 3 {
        req.error(ARGS_ERROR);
        return;
    }
    let key = req.args.arg(1);
    let value = req.args.arg(2);
    let dict = *req.dictionary;
    let Env { store, out, .. } = &mut *req.env;
    let mut enc = Encoder::new(&mut **out);
    match store.set(dict, key, value) {
        Ok(()) => enc.simple(OK),
        Err(StoreError::Full) => enc.error(STORAGE_OVERFLOW),
    }
}

/// `DEL key` — `+OK` whether or not the key existed.
fn del(req: &mut Request) {
    if req.args.argc() != 2 {
        req.error(ARGS_ERROR);
        return;
    }
    let key = req.args.arg(1);
    let dict = *req.dictionary;
    req.env.store.del(dict, key);
    req.simple(OK);
}

/// `KEYS` — one bulk string per key in the active dictionary.
fn keys(req: &mut Request) {
    if req.args.argc() != 1 {
        req.error(ARGS_ERROR);
        return;
    }
    let dict = *req.dictionary;
    let Env { store, out, .. } = &mut *req.env;
    let mut enc = Encoder::new(&mut **out);
    for key in store.keys(dict) {
        enc.bulk(key);
    }
}

/// `SELECT name` — rebind the session's active dictionary. The binding
/// survives resets; only another SELECT moves it.
fn select(req: &mut Request) {
    if req.args.argc() != 2 {
        req.error(ARGS_ERROR);
        return;
    }
    let name = req.args.arg(1);
    match req.env.store.find(name) {
        Some(index) => {
            debug!(dictionary = %req.env.store.name(index), "Dictionary selected");
            *req.dictionary = index;
            req.simple(OK);
        }
        None => req.error(""),
    }
}

/// `SUBSCRIBE topic` — composed reply: `subscribe`, the topic, and the
/// stream's subscription count. A topic some stream already holds is
/// refused with a bare error.
fn subscribe(req: &mut Request) {
    if req.args.argc() != 2 {
        req.error(ARGS_ERROR);
        return;
    }
    let topic = req.args.arg(1);
    let stream = req.env.stream;
    let Env { bus, out, .. } = &mut *req.env;
    let mut enc = Encoder::new(&mut **out);
    match bus.subscribe(stream, topic) {
        Ok(count) => {
            enc.bulk(b"subscribe");
            enc.bulk(topic);
            enc.integer(count as i64);
        }
        Err(_) => enc.error(""),
    }
}

/// `UNSUBSCRIBE [topic]` — drop one subscription, or all of the stream's
/// when no topic is given.
fn unsubscribe(req: &mut Request) {
    let stream = req.env.stream;
    match req.args.argc() {
        1 => {
            let Env { bus, out, .. } = &mut *req.env;
            bus.unsubscribe_all(stream);
            let mut enc = Encoder::new(&mut **out);
            enc.bulk(b"unsubscribe");
            enc.bulk(b"unsubscribe");
            enc.integer(0);
        }
        2 => {
            let topic = req.args.arg(1);
            let Env { bus, out, .. } = &mut *req.env;
            bus.unsubscribe(stream, topic);
            let remaining = bus.count_for(stream) as i64;
            let mut enc = Encoder::new(&mut **out);
            enc.bulk(b"unsubscribe");
            enc.bulk(topic);
            enc.integer(remaining);
        }
        _ => req.error(ARGS_ERROR),
    }
}

/// `PUBLISH topic payload` — push to the holding subscriber's own output,
/// then reply with the number reached (0 or 1).
fn publish(req: &mut Request) {
    if req.args.argc() != 3 {
        req.error(ARGS_ERROR);
        return;
    }
    let topic = req.args.arg(1);
    let payload = req.args.arg(2);
    let Env { bus, fanout, out, .. } = &mut *req.env;

    let mut frame = Vec::new();
    {
        let mut enc = Encoder::new(&mut frame);
        enc.bulk(b"publish");
        enc.bulk(topic);
        enc.bulk(payload);
    }

    let mut reached = 0i64;
    for stream in bus.subscribers(topic) {
        fanout.deliver(stream, &frame);
        reached += 1;
    }
    Encoder::new(&mut **out).integer(reached);
}

/// `COMMANDS` — one bulk string per registered name, in table order.
fn commands(req: &mut Request) {
    if req.args.argc() != 1 {
        req.error(ARGS_ERROR);
        return;
    }
    let Env { registry, out, .. } = &mut *req.env;
    let mut enc = Encoder::new(&mut **out);
    for name in registry.names() {
        enc.bulk(name.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::session::Session;
    use crate::pubsub::{Bus, Fanout, StreamId};
    use crate::storage::Store;

    struct NoFanout;

    impl Fanout for NoFanout {
        fn deliver(&mut self, _stream: StreamId, _frame: &[u8]) {}
    }

    struct Harness {
        table: CommandTable,
        store: Store,
        bus: Bus,
        session: Session,
    }

    impl Harness {
        fn new(store: Store) -> Self {
            Harness {
                table: default_table(),
                store,
                bus: Bus::new(),
                session: Session::new(),
            }
        }

        fn run(&mut self, input: &[u8]) -> Vec<u8> {
            let mut fanout = NoFanout;
            let mut out = Vec::new();
            let mut env = Env {
                registry: &self.table,
                store: &mut self.store,
                bus: &mut self.bus,
                fanout: &mut fanout,
                stream: 0,
                out: &mut out,
            };
            for &byte in input {
                self.session.feed(byte, &mut env);
            }
            out
        }
    }

    fn harness() -> Harness {
        Harness::new(Store::new(1024))
    }

    #[test]
    fn test_get_set_scenario() {
        let mut h = harness();
        assert_eq!(h.run(b"GET foo\r\n"), b"$-1\r\n");
        assert_eq!(h.run(b"SET foo bar\r\n"), b"+OK\r\n");
        assert_eq!(h.run(b"GET foo\r\n"), b"$3\r\nbar\r\n");
    }

    #[test]
    fn test_set_storage_overflow() {
        let mut h = Harness::new(Store::new(8));
        assert_eq!(
            h.run(b"SET key somewhatlongvalue\r\n"),
            b"-ERROR storage overflow\r\n"
        );
        assert_eq!(h.run(b"GET key\r\n"), b"$-1\r\n");
    }

    #[test]
    fn test_del_replies_ok_either_way() {
        let mut h = harness();
        h.run(b"SET foo bar\r\n");
        assert_eq!(h.run(b"DEL foo\r\n"), b"+OK\r\n");
        assert_eq!(h.run(b"DEL foo\r\n"), b"+OK\r\n");
        assert_eq!(h.run(b"GET foo\r\n"), b"$-1\r\n");
    }

    #[test]
    fn test_keys_lists_bulks() {
        let mut h = harness();
        h.run(b"SET a 1\r\n");
        h.run(b"SET b 2\r\n");
        let out = h.run(b"KEYS\r\n");
        // Iteration order is unspecified; accept either.
        assert!(
            out == b"$1\r\na\r\n$1\r\nb\r\n".to_vec() || out == b"$1\r\nb\r\n$1\r\na\r\n".to_vec()
        );
    }

    #[test]
    fn test_select_rebinds_and_survives_commands() {
        let mut h = Harness::new(Store::with_dictionaries(vec![
            ("main".to_string(), 1024),
            ("scratch".to_string(), 1024),
        ]));
        h.run(b"SET foo main-value\r\n");
        assert_eq!(h.run(b"SELECT scratch\r\n"), b"+OK\r\n");
        assert_eq!(h.run(b"GET foo\r\n"), b"$-1\r\n");
        h.run(b"SET foo other\r\n");
        assert_eq!(h.run(b"SELECT MAIN\r\n"), b"+OK\r\n");
        assert_eq!(h.run(b"GET foo\r\n"), b"$10\r\nmain-value\r\n");
    }

    #[test]
    fn test_select_unknown_dictionary() {
        let mut h = harness();
        assert_eq!(h.run(b"SELECT nope\r\n"), b"-ERROR\r\n");
        // The binding is unchanged after a failed SELECT.
        h.run(b"SET foo bar\r\n");
        assert_eq!(h.run(b"GET foo\r\n"), b"$3\r\nbar\r\n");
    }

    #[test]
    fn test_subscribe_reply_composition() {
        let mut h = harness();
        assert_eq!(
            h.run(b"SUBSCRIBE temperature\r\n"),
            b"$9\r\nsubscribe\r\n$11\r\ntemperature\r\n:1\r\n"
        );
        assert_eq!(
            h.run(b"SUBSCRIBE humidity\r\n"),
            b"$9\r\nsubscribe\r\n$8\r\nhumidity\r\n:2\r\n"
        );
    }

    #[test]
    fn test_subscribe_held_topic_errors() {
        let mut h = harness();
        h.run(b"SUBSCRIBE temperature\r\n");
        assert_eq!(h.run(b"SUBSCRIBE temperature\r\n"), b"-ERROR\r\n");
    }

    #[test]
    fn test_unsubscribe_reply() {
        let mut h = harness();
        h.run(b"SUBSCRIBE temperature\r\n");
        h.run(b"SUBSCRIBE humidity\r\n");
        assert_eq!(
            h.run(b"UNSUBSCRIBE temperature\r\n"),
            b"$11\r\nunsubscribe\r\n$11\r\ntemperature\r\n:1\r\n"
        );
        assert_eq!(
            h.run(b"UNSUBSCRIBE\r\n"),
            b"$11\r\nunsubscribe\r\n$11\r\nunsubscribe\r\n:0\r\n"
        );
    }

    #[test]
    fn test_publish_without_subscribers() {
        let mut h = harness();
        assert_eq!(h.run(b"PUBLISH temperature 98.6\r\n"), b":0\r\n");
    }

    #[test]
    fn test_commands_lists_table_order() {
        let mut h = harness();
        let out = h.run(b"COMMANDS\r\n");
        let expected: Vec<u8> = [
            "GET",
            "SET",
            "DEL",
            "KEYS",
            "SELECT",
            "SUBSCRIBE",
            "UNSUBSCRIBE",
            "PUBLISH",
            "COMMANDS",
        ]
        .iter()
        .flat_map(|name| format!("${}\r\n{}\r\n", name.len(), name).into_bytes())
        .collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_argument_count_validation() {
        let mut h = harness();
        assert_eq!(h.run(b"GET\r\n"), b"-ERROR bad argument count\r\n");
        assert_eq!(h.run(b"SET foo\r\n"), b"-ERROR bad argument count\r\n");
        assert_eq!(h.run(b"DEL\r\n"), b"-ERROR bad argument count\r\n");
        assert_eq!(h.run(b"KEYS extra\r\n"), b"-ERROR bad argument count\r\n");
        assert_eq!(h.run(b"PUBLISH topic\r\n"), b"-ERROR bad argument count\r\n");
    }

    #[test]
    fn test_unknown_command() {
        let mut h = harness();
        assert_eq!(h.run(b"FROB\r\n"), b"-ERROR unknown command\r\n");
    }
}
