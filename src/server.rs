//! TCP server embedding the protocol core.
//!
//! Each connection gets its own [`Session`] and feeds received bytes
//! through it one at a time; replies accumulate in a per-connection buffer
//! and are flushed after each read chunk. Store, subscription table, and
//! the peer map live behind one shared lock, taken only for the synchronous
//! feed pass (never across I/O). Out-of-band pub/sub pushes travel over a
//! per-connection channel so they land on the subscriber's own socket.

use crate::commands::default_table;
use crate::config::Config;
use crate::protocol::registry::{CommandTable, Env};
use crate::protocol::session::Session;
use crate::pubsub::{Bus, Fanout, StreamId};
use crate::storage::Store;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

/// Read buffer size per connection
const BUFFER_SIZE: usize = 4 * 1024;

/// State shared by every connection.
struct Shared {
    store: Store,
    bus: Bus,
    peers: HashMap<StreamId, mpsc::UnboundedSender<Bytes>>,
    next_stream: StreamId,
}

/// Routes push frames into peer connections' push channels.
struct PeerFanout<'a> {
    peers: &'a HashMap<StreamId, mpsc::UnboundedSender<Bytes>>,
}

impl Fanout for PeerFanout<'_> {
    fn deliver(&mut self, stream: StreamId, frame: &[u8]) {
        if let Some(tx) = self.peers.get(&stream) {
            // A closed receiver means the peer is mid-teardown; the frame
            // is simply dropped with it.
            let _ = tx.send(Bytes::copy_from_slice(frame));
        }
    }
}

/// Server instance
pub struct Server {
    listen: String,
    registry: Arc<CommandTable>,
    shared: Arc<Mutex<Shared>>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        Server {
            listen: config.listen,
            registry: Arc::new(default_table()),
            shared: Arc::new(Mutex::new(Shared {
                store: Store::with_dictionaries(config.dictionaries),
                bus: Bus::new(),
                peers: HashMap::new(),
                next_stream: 1,
            })),
        }
    }

    /// Bind the configured address and begin accepting connections.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&self.listen).await?;
        info!(address = %self.listen, "Server listening");
        self.serve(listener).await
    }

    /// Accept loop over an already-bound listener. Split out so tests can
    /// bind an ephemeral port and learn the address first.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), Box<dyn std::error::Error>> {
        loop {
            match listener.accept().await {
                Ok((socket, addr)) => {
                    debug!(peer = %addr, "New connection");
                    let registry = Arc::clone(&self.registry);
                    let shared = Arc::clone(&self.shared);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(socket, registry, shared).await {
                            debug!(error = %e, "Connection error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Handle a single client connection from registration to teardown.
async fn handle_connection(
    socket: TcpStream,
    registry: Arc<CommandTable>,
    shared: Arc<Mutex<Shared>>,
) -> std::io::Result<()> {
    let (push_tx, push_rx) = mpsc::unbounded_channel();
    let stream_id = {
        let mut guard = shared.lock().unwrap();
        let id = guard.next_stream;
        guard.next_stream += 1;
        guard.peers.insert(id, push_tx);
        id
    };

    let result = connection_loop(socket, stream_id, &registry, &shared, push_rx).await;

    // Teardown: the stream's subscriptions must not outlive its socket.
    let mut guard = shared.lock().unwrap();
    guard.peers.remove(&stream_id);
    guard.bus.unsubscribe_all(stream_id);
    trace!(stream = stream_id, "Connection closed");
    result
}

async fn connection_loop(
    socket: TcpStream,
    stream_id: StreamId,
    registry: &CommandTable,
    shared: &Mutex<Shared>,
    mut push_rx: mpsc::UnboundedReceiver<Bytes>,
) -> std::io::Result<()> {
    let (mut reader, mut writer) = socket.into_split();
    let mut session = Session::new();
    let mut read_buf = BytesMut::with_capacity(BUFFER_SIZE);
    let mut replies = BytesMut::new();

    loop {
        tokio::select! {
            result = reader.read_buf(&mut read_buf) => {
                let n = result?;
                if n == 0 {
                    trace!(
                        stream = stream_id,
                        dictionary = session.dictionary(),
                        "Connection closed by client"
                    );
                    return Ok(());
                }
                {
                    let mut guard = shared.lock().unwrap();
                    let Shared { store, bus, peers, .. } = &mut *guard;
                    let mut fanout = PeerFanout { peers: &*peers };
                    let mut env = Env {
                        registry,
                        store,
                        bus,
                        fanout: &mut fanout,
                        stream: stream_id,
                        out: &mut replies,
                    };
                    for &byte in read_buf.iter() {
                        session.feed(byte, &mut env);
                    }
                }
                read_buf.clear();
                if !replies.is_empty() {
                    writer.write_all(&replies).await?;
                    replies.clear();
                }
            }
            frame = push_rx.recv() => {
                match frame {
                    Some(frame) => writer.write_all(&frame).await?,
                    // Sender only drops at teardown; nothing more arrives.
                    None => return Ok(()),
                }
            }
        }
    }
}
