//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and connect a
//! `tokio-tungstenite` client to it.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::HeaderValue;
    use std::time::Duration;

    use wicket_transport::{Connection, Incoming, Transport, TransportError, WebSocketTransport};

    async fn bind() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();
        (transport, addr)
    }

    async fn accept(transport: &mut WebSocketTransport) -> wicket_transport::WebSocketConnection {
        let incoming = transport.accept().await.expect("should accept");
        incoming.upgrade().await.expect("should upgrade")
    }

    #[tokio::test]
    async fn test_accept_captures_path_and_cookies() {
        let (mut transport, addr) = bind().await;
        let server = tokio::spawn(async move { accept(&mut transport).await });

        let mut request = format!("ws://{addr}/live?room=1")
            .into_client_request()
            .expect("valid request");
        request
            .headers_mut()
            .insert("cookie", HeaderValue::from_static("Session-ID=abc; theme=dark"));
        let (_client, _) = tokio_tungstenite::connect_async(request)
            .await
            .expect("client should connect");

        let conn = server.await.expect("task should complete");
        assert_eq!(conn.request().path, "/live");
        assert_eq!(
            conn.request().cookies,
            vec!["Session-ID=abc; theme=dark".to_string()]
        );
    }

    #[tokio::test]
    async fn test_send_receive_round_trip() {
        let (mut transport, addr) = bind().await;
        let server = tokio::spawn(async move { accept(&mut transport).await });

        let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        let conn = server.await.expect("task should complete");

        client
            .send(Message::Binary(b"hello".to_vec().into()))
            .await
            .expect("client send");
        let received = conn.recv().await.expect("recv ok").expect("some data");
        assert_eq!(received, b"hello");

        conn.send(b"world").await.expect("server send");
        let reply = client.next().await.expect("message").expect("ok");
        assert_eq!(reply.into_data().as_ref(), b"world");
    }

    #[tokio::test]
    async fn test_recv_returns_none_after_client_close() {
        let (mut transport, addr) = bind().await;
        let server = tokio::spawn(async move { accept(&mut transport).await });

        let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        let conn = server.await.expect("task should complete");

        client.close(None).await.expect("close");

        assert!(conn.recv().await.expect("recv ok").is_none());
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique() {
        let (mut transport, addr) = bind().await;
        let server = tokio::spawn(async move {
            let a = accept(&mut transport).await;
            let b = accept(&mut transport).await;
            (a, b)
        });

        let _c1 = tokio_tungstenite::connect_async(format!("ws://{addr}")).await.unwrap();
        let _c2 = tokio_tungstenite::connect_async(format!("ws://{addr}")).await.unwrap();

        let (a, b) = server.await.unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_upgrade_times_out_on_silent_peer() {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let mut transport = transport.with_handshake_timeout(Duration::from_millis(100));
        let addr = transport.local_addr().expect("local addr");

        let _idle = tokio::net::TcpStream::connect(addr).await.expect("tcp connect");
        let incoming = transport.accept().await.expect("should accept");
        assert_eq!(incoming.peer_addr().ip(), addr.ip());

        let result = incoming.upgrade().await;
        assert!(matches!(result, Err(TransportError::HandshakeTimeout(_))));
    }

    #[tokio::test]
    async fn test_accept_does_not_wait_for_handshake() {
        let (mut transport, addr) = bind().await;

        let _idle = tokio::net::TcpStream::connect(&addr).await.expect("tcp connect");
        let first = tokio::time::timeout(Duration::from_secs(1), transport.accept())
            .await
            .expect("accept returns before any handshake bytes arrive");

        assert!(first.is_ok());
    }
}
