//! Packet protocol integration tests
//!
//! Framing over in-memory duplex pipes and loopback TCP.

use proptest::prelude::*;
use tokio::io::{duplex, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use travel_monitor::protocol::{receive_packets, send_packets, PacketChannel, ProtocolError};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn exchange(payload: &[u8], chunk_size: usize) -> Vec<u8> {
    let (mut writer, mut reader) = duplex(payload.len() + 4 * chunk_size + 64);
    send_packets(&mut writer, payload, chunk_size).await.unwrap();
    receive_packets(&mut reader, chunk_size).await.unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_payload_survives_framing(
        payload in proptest::collection::vec(any::<u8>(), 0..600),
        chunk_size in 1usize..70,
    ) {
        let received = runtime().block_on(exchange(&payload, chunk_size));
        prop_assert_eq!(received, payload);
    }

    #[test]
    fn prop_exact_multiples_need_no_padding(chunks in 1usize..10, chunk_size in 1usize..40) {
        let payload = vec![0xAB; chunks * chunk_size];
        let received = runtime().block_on(exchange(&payload, chunk_size));
        prop_assert_eq!(received, payload);
    }
}

#[tokio::test]
async fn test_zero_length_payload() {
    assert!(exchange(&[], 8).await.is_empty());
}

#[tokio::test]
async fn test_channel_over_tcp_preserves_message_order() {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut channel = PacketChannel::new(stream, 5);
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(channel.receive_text().await.unwrap());
        }
        channel.send_text("done").await.unwrap();
        seen
    });

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut channel = PacketChannel::new(stream, 5);
    channel.send_text("REQUEST 12 COVID-19").await.unwrap();
    channel.send_text("").await.unwrap();
    channel.send_text("EXIT").await.unwrap();
    assert_eq!(channel.receive_text().await.unwrap(), "done");

    assert_eq!(
        server.await.unwrap(),
        vec!["REQUEST 12 COVID-19".to_string(), String::new(), "EXIT".to_string()]
    );
}

#[tokio::test]
async fn test_truncated_frame_is_disconnect() {
    let (mut writer, reader) = duplex(64);
    // Header announcing two chunks of 8 bytes, followed by only 3 bytes
    writer.write_all(&[0, 0, 0, 2, 0, 0, 0, 0]).await.unwrap();
    writer.write_all(b"abc").await.unwrap();
    drop(writer);

    let mut channel = PacketChannel::new(reader, 8);
    let err = channel.receive().await.unwrap_err();
    assert!(matches!(err, ProtocolError::ConnectionClosed));
    assert!(err.is_disconnect());
}

#[tokio::test]
async fn test_wire_layout() {
    // 5 bytes with chunk size 4: two chunks, three bytes of padding
    let mut expected = vec![0, 0, 0, 2, 0, 0, 0, 3];
    expected.extend_from_slice(b"ABCDE\0\0\0");

    let mut writer = tokio_test::io::Builder::new().write(&expected).build();
    send_packets(&mut writer, b"ABCDE", 4).await.unwrap();

    let mut reader = tokio_test::io::Builder::new().read(&expected).build();
    assert_eq!(receive_packets(&mut reader, 4).await.unwrap(), b"ABCDE");
}
