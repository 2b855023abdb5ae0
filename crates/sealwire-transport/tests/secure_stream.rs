//! Secure streams over in-memory pipes, tokio duplex streams and TCP.

use std::sync::Arc;

use sealwire_common::logging::try_init_test_logging;
use sealwire_core::{
    config::{ConnectionConfig, EngineConfig},
    crypto::Ed25519Signer,
    protocol::{CipherSuite, NamedGroup},
    CoreError,
};
use sealwire_transport::{Acceptor, ByteStream, IoStream, MemoryPipe, SecureStream, TransportError};
use tokio::net::{TcpListener, TcpStream};

fn config(engine: EngineConfig) -> ConnectionConfig {
    ConnectionConfig::new(Arc::new(engine)).unwrap()
}

async fn echo_round_trip<S: ByteStream + 'static>(
    client_io: S,
    server_io: S,
    client: ConnectionConfig,
    server: ConnectionConfig,
) {
    let server = tokio::spawn(async move {
        let mut stream = SecureStream::accept(server_io, server).await.unwrap();
        while let Some(chunk) = stream.recv().await.unwrap() {
            stream.send(&chunk).await.unwrap();
        }
    });

    let mut stream = SecureStream::connect(client_io, client).await.unwrap();
    for message in [&b"ping"[..], &b"a longer message"[..], &[0u8; 3000][..]] {
        stream.send(message).await.unwrap();
        let mut echoed = Vec::new();
        while echoed.len() < message.len() {
            echoed.extend_from_slice(&stream.recv().await.unwrap().unwrap());
        }
        assert_eq!(echoed, message);
    }
    stream.close().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn test_echo_over_memory_pipe() {
    try_init_test_logging();
    let (client_io, server_io) = MemoryPipe::pair();
    echo_round_trip(client_io, server_io, ConnectionConfig::default(), ConnectionConfig::default()).await;
}

#[tokio::test]
async fn test_echo_over_tokio_duplex() {
    // A small duplex buffer forces records to be split across reads.
    let (left, right) = tokio::io::duplex(97);
    echo_round_trip(
        IoStream::new(left),
        IoStream::new(right),
        ConnectionConfig::default(),
        ConnectionConfig::default(),
    )
    .await;
}

#[tokio::test]
async fn test_echo_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
    let client_tcp = TcpStream::connect(addr).await.unwrap();
    let server_tcp = accept.await.unwrap();

    echo_round_trip(
        IoStream::new(client_tcp),
        IoStream::new(server_tcp),
        ConnectionConfig::default(),
        ConnectionConfig::default(),
    )
    .await;
}

#[tokio::test]
async fn test_modp3072_with_aes_and_signature() {
    let signer = Arc::new(Ed25519Signer::generate());
    let mut engine = EngineConfig::default();
    engine.protocol.groups = vec![NamedGroup::MODP3072];
    engine.protocol.cipher_suites = vec![CipherSuite::TLS_AES_128_GCM_SHA256];
    engine.extensions.alpn = vec!["sealwire/1".into()];

    let mut client_engine = engine.clone();
    client_engine.auth.pinned_server_key = Some(signer.public_key_base64());

    let (client_io, server_io) = MemoryPipe::pair();
    echo_round_trip(
        client_io,
        server_io,
        config(client_engine),
        config(engine).with_signer(signer),
    )
    .await;
}

#[tokio::test]
async fn test_pin_mismatch_reaches_both_sides() {
    let mut client_engine = EngineConfig::default();
    client_engine.auth.pinned_server_key = Some(Ed25519Signer::generate().public_key_base64());
    let server_config = ConnectionConfig::default().with_signer(Arc::new(Ed25519Signer::generate()));

    let (client_io, server_io) = MemoryPipe::pair();
    let server = tokio::spawn(SecureStream::accept(server_io, server_config));
    let client_err = SecureStream::connect(client_io, config(client_engine))
        .await
        .unwrap_err();

    assert!(matches!(
        client_err,
        TransportError::Protocol(CoreError::HandshakeVerificationFailed { .. })
    ));
    let server_err = server.await.unwrap().unwrap_err();
    assert!(matches!(
        server_err,
        TransportError::Protocol(CoreError::PeerAlert { .. } | CoreError::UnexpectedEndOfStream { .. })
    ));
}

#[tokio::test]
async fn test_acceptor_tracks_concurrent_connections() {
    let acceptor = Acceptor::new(ConnectionConfig::default());

    let mut clients = Vec::new();
    let mut servers = Vec::new();
    for _ in 0..3 {
        let (client_io, server_io) = MemoryPipe::pair();
        clients.push(tokio::spawn(SecureStream::connect(client_io, ConnectionConfig::default())));
        servers.push(acceptor.accept(server_io).await.unwrap());
    }
    for client in clients {
        client.await.unwrap().unwrap();
    }

    assert_eq!(acceptor.registry().count(), 3);
    servers.pop();
    assert_eq!(acceptor.registry().count(), 2);
    servers.clear();
    assert!(acceptor.registry().is_empty());
}
