//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener and a tokio-tungstenite client to verify
//! that frames actually flow over the network, that text and binary frames
//! both reach `recv`, and that close is observed as `Ok(None)`.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use pointforge_transport::{Connection, Listener, WebSocketListener};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn connect_client(addr: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        ws
    }

    /// Binds on port 0, spawns one accept, connects a client, and returns
    /// both ends.
    async fn accepted_pair() -> (
        pointforge_transport::WebSocketConnection,
        ClientWs,
    ) {
        let mut listener = WebSocketListener::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = listener
            .local_addr()
            .expect("should have local addr")
            .to_string();

        let accept = tokio::spawn(async move {
            listener.accept().await.expect("should accept")
        });
        let client = connect_client(&addr).await;
        let server = accept.await.expect("accept task should complete");
        (server, client)
    }

    #[tokio::test]
    async fn test_text_frame_reaches_recv() {
        let (server, mut client) = accepted_pair().await;

        client
            .send(Message::Text("{\"seq\":1}".into()))
            .await
            .expect("client send should succeed");

        let data = server
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should be a frame, not close");
        assert_eq!(data, b"{\"seq\":1}");
    }

    #[tokio::test]
    async fn test_binary_frame_reaches_recv() {
        let (server, mut client) = accepted_pair().await;

        client
            .send(Message::Binary(vec![1, 2, 3].into()))
            .await
            .expect("client send should succeed");

        let data = server.recv().await.unwrap().unwrap();
        assert_eq!(data, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_send_arrives_as_text_frame() {
        let (server, mut client) = accepted_pair().await;

        server
            .send(b"{\"seq\":7}")
            .await
            .expect("server send should succeed");

        match client.next().await {
            Some(Ok(Message::Text(text))) => {
                assert_eq!(text.as_str(), "{\"seq\":7}");
            }
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_client_close_yields_none() {
        let (server, mut client) = accepted_pair().await;

        client.close(None).await.expect("close should succeed");

        let result = server.recv().await.expect("recv should not error");
        assert!(result.is_none(), "close should surface as Ok(None)");
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique() {
        let (a, _ca) = accepted_pair().await;
        let (b, _cb) = accepted_pair().await;
        assert_ne!(a.id(), b.id());
    }
}
