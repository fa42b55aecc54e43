//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener and a `tokio-tungstenite` client so that
//! bytes actually cross a socket.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use relaygate_transport::{Channel, Transport, WebSocketTransport};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn connect_client(addr: &str) -> ClientWs {
        let url = format!("ws://{addr}");
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("client should connect");
        ws
    }

    /// Binds on an OS-assigned port and returns the transport with its address.
    async fn bind_any() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport
            .local_addr()
            .expect("should have local addr")
            .to_string();
        (transport, addr)
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (mut transport, addr) = bind_any().await;

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let mut client_ws = connect_client(&addr).await;
        let server_chan = server_handle.await.expect("task should complete");

        assert!(server_chan.id().into_inner() > 0);
        assert!(server_chan.is_connected());

        // Server sends, client receives.
        server_chan
            .send(b"hello from server")
            .await
            .expect("send should succeed");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"hello from server");

        // Client sends, server receives.
        client_ws
            .send(Message::Binary(b"hello from client".to_vec().into()))
            .await
            .expect("client send should succeed");
        let data = server_chan
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should not be closed");
        assert_eq!(data, b"hello from client");
    }

    #[tokio::test]
    async fn test_websocket_client_close_marks_disconnected() {
        let (mut transport, addr) = bind_any().await;

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let mut client_ws = connect_client(&addr).await;
        let server_chan = server_handle.await.expect("task should complete");

        client_ws.close(None).await.expect("client close");

        let result = server_chan.recv().await.expect("recv should succeed");
        assert!(result.is_none(), "clean close yields None");
        assert!(!server_chan.is_connected());
    }

    #[tokio::test]
    async fn test_websocket_accept_after_shutdown_returns_error() {
        let (mut transport, _addr) = bind_any().await;

        transport.shutdown().await.expect("shutdown");
        let result = transport.accept().await;

        assert!(matches!(
            result,
            Err(relaygate_transport::TransportError::Shutdown)
        ));
    }
}
