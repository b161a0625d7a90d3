//! End-to-end checks for the WebSocket transport against a real client.

#[cfg(feature = "websocket")]
mod websocket {
    use buzzline_transport::{Connection, Transport, WebSocketTransport};
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs =
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

    async fn accept_one(path: &str) -> (buzzline_transport::WebSocketConnection, ClientWs) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0").await.expect("should bind");
        let addr = transport.local_addr().expect("bound address");

        let server = tokio::spawn(async move { transport.accept().await.expect("should accept") });

        let url = format!("ws://{addr}{path}");
        let (client, _) = tokio_tungstenite::connect_async(&url).await.expect("client should connect");
        let conn = server.await.expect("accept task should complete");
        (conn, client)
    }

    #[tokio::test]
    async fn test_records_request_path() {
        let (conn, _client) = accept_one("/room/K7WQ2").await;
        assert_eq!(conn.path(), "/room/K7WQ2");
        assert!(conn.id().into_inner() > 0);
    }

    #[tokio::test]
    async fn test_json_goes_out_as_text_frame() {
        let (conn, mut client) = accept_one("/").await;

        conn.send(br#"{"event":"welcome"}"#).await.expect("send should succeed");

        let msg = client.next().await.expect("frame").expect("no ws error");
        assert!(msg.is_text(), "utf-8 payloads should be text frames");
        assert_eq!(msg.into_data().as_ref(), br#"{"event":"welcome"}"#);
    }

    #[tokio::test]
    async fn test_receives_text_and_binary_frames() {
        let (conn, mut client) = accept_one("/").await;

        client.send(Message::text(r#"{"event":"heartbeat"}"#.to_string())).await.unwrap();
        client.send(Message::binary(vec![0xff, 0x00])).await.unwrap();

        let first = conn.recv().await.expect("recv").expect("data");
        assert_eq!(first, br#"{"event":"heartbeat"}"#);
        let second = conn.recv().await.expect("recv").expect("data");
        assert_eq!(second, vec![0xff, 0x00]);
    }

    #[tokio::test]
    async fn test_send_while_recv_is_pending() {
        let (conn, mut client) = accept_one("/").await;
        let conn = std::sync::Arc::new(conn);

        let reader = {
            let conn = std::sync::Arc::clone(&conn);
            tokio::spawn(async move { conn.recv().await })
        };
        // the pending reader must not starve the writer
        tokio::time::timeout(std::time::Duration::from_secs(2), conn.send(b"tick"))
            .await
            .expect("send should not wait on recv")
            .expect("send should succeed");

        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"tick");

        client.send(Message::Close(None)).await.unwrap();
        let closed = reader.await.unwrap().expect("recv should not error");
        assert!(closed.is_none());
    }

    #[tokio::test]
    async fn test_recv_returns_none_on_client_close() {
        let (conn, mut client) = accept_one("/").await;
        client.send(Message::Close(None)).await.unwrap();

        let result = conn.recv().await.expect("recv should not error");
        assert!(result.is_none());
    }
}
