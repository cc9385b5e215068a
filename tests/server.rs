//! TCP round-trips against a live listener.

use dictwire::{Config, Server};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};

async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(Server::new(Config {
        listen: addr.to_string(),
        dictionaries: vec![("main".to_string(), 4096)],
        log_level: "info".to_string(),
    }));
    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });
    addr
}

async fn read_exactly(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    timeout(Duration::from_secs(5), stream.read_exact(&mut buf))
        .await
        .expect("timed out waiting for reply")
        .unwrap();
    buf
}

async fn round_trip(stream: &mut TcpStream, line: &[u8], reply_len: usize) -> Vec<u8> {
    stream.write_all(line).await.unwrap();
    read_exactly(stream, reply_len).await
}

#[tokio::test]
async fn set_get_round_trip() {
    let addr = start_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    assert_eq!(
        round_trip(&mut client, b"GET foo\r\n", 5).await,
        b"$-1\r\n"
    );
    assert_eq!(
        round_trip(&mut client, b"SET foo bar\r\n", 5).await,
        b"+OK\r\n"
    );
    assert_eq!(
        round_trip(&mut client, b"GET foo\r\n", 9).await,
        b"$3\r\nbar\r\n"
    );
}

#[tokio::test]
async fn unknown_command_over_tcp() {
    let addr = start_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    let reply = round_trip(&mut client, b"FROB\r\n", 24).await;
    assert_eq!(reply, b"-ERROR unknown command\r\n");
}

#[tokio::test]
async fn connections_share_the_store() {
    let addr = start_server().await;
    let mut writer = TcpStream::connect(addr).await.unwrap();
    let mut reader = TcpStream::connect(addr).await.unwrap();

    assert_eq!(
        round_trip(&mut writer, b"SET shared yes\r\n", 5).await,
        b"+OK\r\n"
    );
    assert_eq!(
        round_trip(&mut reader, b"GET shared\r\n", 9).await,
        b"$3\r\nyes\r\n"
    );
}

#[tokio::test]
async fn publish_pushes_out_of_band() {
    let addr = start_server().await;
    let mut subscriber = TcpStream::connect(addr).await.unwrap();
    let mut publisher = TcpStream::connect(addr).await.unwrap();

    // subscribe reply: bulk "subscribe", bulk topic, integer 1
    let expected = b"$9\r\nsubscribe\r\n$11\r\ntemperature\r\n:1\r\n";
    assert_eq!(
        round_trip(&mut subscriber, b"SUBSCRIBE temperature\r\n", expected.len()).await,
        expected
    );

    assert_eq!(
        round_trip(&mut publisher, b"PUBLISH temperature 98.6\r\n", 4).await,
        b":1\r\n"
    );

    // The push lands on the subscriber's own connection.
    let push = b"$7\r\npublish\r\n$11\r\ntemperature\r\n$4\r\n98.6\r\n";
    assert_eq!(read_exactly(&mut subscriber, push.len()).await, push);
}

#[tokio::test]
async fn parse_errors_do_not_drop_the_connection() {
    let addr = start_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    let reply = round_trip(&mut client, b"SET a b c d e f g h i\r\n", 27).await;
    assert_eq!(reply, b"-ERROR bad argument count\r\n");
    assert_eq!(
        round_trip(&mut client, b"SET foo bar\r\n", 5).await,
        b"+OK\r\n"
    );
}
