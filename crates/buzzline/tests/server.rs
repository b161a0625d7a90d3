//! End-to-end tests: real WebSocket clients against a running server.

use std::sync::Arc;
use std::time::Duration;

use buzzline::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

const PIN: &str = "2468";

const QUESTIONS: &str = r#"[
    {"id":"q1","type":"single","prompt":"Capital of France?","points":100,"timeLimitSeconds":20,
     "options":[{"id":"a","text":"Paris","isCorrect":true},{"id":"b","text":"Lyon"}]},
    {"id":"b1","type":"buzzer","prompt":"Who painted the Mona Lisa?"}
]"#;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn start_server() -> String {
    start_server_with(SessionConfig::default()).await
}

/// Starts a server on a random port and returns the address.
async fn start_server_with(session: SessionConfig) -> String {
    let catalog = MemoryCatalog::from_json(QUESTIONS).expect("catalog");
    let server = BuzzlineServer::builder()
        .bind("127.0.0.1:0")
        .session_config(session)
        .build(PinAuthenticator::new(PIN), Arc::new(catalog), Arc::new(MemoryStore::new()))
        .await
        .expect("server should build");

    let addr = server.local_addr().expect("should have local addr").to_string();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    addr
}

struct TestClient {
    ws: ClientWs,
}

impl TestClient {
    async fn connect(addr: &str, path: &str) -> Self {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}{path}")).await.expect("should connect");
        Self { ws }
    }

    async fn send(&mut self, event: Value) {
        self.ws.send(Message::text(event.to_string())).await.expect("send");
    }

    /// Next envelope, or `None` once the server closed the socket.
    async fn next_envelope(&mut self) -> Option<Value> {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(3), self.ws.next()).await.expect("timed out waiting");
            match msg {
                Some(Ok(Message::Text(text))) => return Some(serde_json::from_str(&text).expect("envelope json")),
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
                Some(Ok(_)) => continue,
            }
        }
    }

    async fn recv(&mut self) -> Value {
        self.next_envelope().await.expect("connection closed")
    }

    /// Skips envelopes until one carries `event`; returns its `data`.
    async fn expect_event(&mut self, event: &str) -> Value {
        loop {
            let envelope = self.recv().await;
            if envelope["payload"]["event"] == event {
                return envelope["payload"]["data"].clone();
            }
        }
    }

    async fn expect_error(&mut self, code: &str) {
        let data = self.expect_event("error").await;
        assert_eq!(data["code"], code, "unexpected error {data}");
    }

    async fn hello(&mut self, token: Option<&str>) -> Value {
        let data = match token {
            Some(token) => json!({"version": PROTOCOL_VERSION, "token": token}),
            None => json!({"version": PROTOCOL_VERSION}),
        };
        self.send(json!({"event": "hello", "data": data})).await;
        self.expect_event("welcome").await
    }

    async fn heartbeat(&mut self, client_time: u64) -> Value {
        self.send(json!({"event": "heartbeat", "data": {"clientTime": client_time}})).await;
        self.expect_event("heartbeatAck").await
    }
}

/// Connects a host, creates a room and returns the client and room code.
async fn host_with_room(addr: &str) -> (TestClient, String) {
    let mut host = TestClient::connect(addr, "/").await;
    host.hello(Some(PIN)).await;
    host.send(json!({"event": "createRoom", "data": {}})).await;
    let state = host.expect_event("roomState").await;
    let code = state["code"].as_str().expect("room code").to_string();
    (host, code)
}

async fn player(addr: &str, code: &str, nickname: &str) -> TestClient {
    let mut client = TestClient::connect(addr, &format!("/room/{code}")).await;
    client.hello(None).await;
    client.send(json!({"event": "join", "data": {"nickname": nickname}})).await;
    client.expect_event("roomState").await;
    client
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_participant_welcome() {
    let addr = start_server().await;
    let mut client = TestClient::connect(&addr, "/").await;
    client.send(json!({"event": "hello", "data": {"version": 1}})).await;

    let envelope = client.recv().await;
    assert_eq!(envelope["seq"], 1);
    assert_eq!(envelope["payload"]["event"], "welcome");
    assert_eq!(envelope["payload"]["data"]["isHost"], false);
    assert!(envelope["payload"]["data"]["connectionId"].as_u64().unwrap() > 0);
    assert!(envelope["payload"]["data"].get("room").is_none());
}

#[tokio::test]
async fn test_host_welcome_with_pin() {
    let addr = start_server().await;
    let mut host = TestClient::connect(&addr, "/").await;
    let welcome = host.hello(Some(PIN)).await;
    assert_eq!(welcome["isHost"], true);
}

#[tokio::test]
async fn test_wrong_pin_is_unauthorized_and_closed() {
    let addr = start_server().await;
    let mut host = TestClient::connect(&addr, "/").await;
    host.send(json!({"event": "hello", "data": {"version": 1, "token": "0000"}})).await;

    host.expect_error("UNAUTHORIZED").await;
    assert!(host.next_envelope().await.is_none());
}

#[tokio::test]
async fn test_version_mismatch_closes() {
    let addr = start_server().await;
    let mut client = TestClient::connect(&addr, "/").await;
    client.send(json!({"event": "hello", "data": {"version": 99}})).await;

    client.expect_error("VALIDATION_ERROR").await;
    assert!(client.next_envelope().await.is_none());
}

#[tokio::test]
async fn test_first_event_must_be_hello() {
    let addr = start_server().await;
    let mut client = TestClient::connect(&addr, "/").await;
    client.send(json!({"event": "heartbeat", "data": {"clientTime": 1}})).await;

    client.expect_error("VALIDATION_ERROR").await;
    assert!(client.next_envelope().await.is_none());
}

#[tokio::test]
async fn test_unknown_channel_rejected() {
    let addr = start_server().await;
    let mut client = TestClient::connect(&addr, "/arcade").await;
    client.expect_error("VALIDATION_ERROR").await;
    assert!(client.next_envelope().await.is_none());
}

// =========================================================================
// Connection behaviour
// =========================================================================

#[tokio::test]
async fn test_heartbeat_ack_echoes_client_time() {
    let addr = start_server().await;
    let mut client = TestClient::connect(&addr, "/").await;
    client.hello(None).await;

    let ack = client.heartbeat(4242).await;
    assert_eq!(ack["clientTime"], 4242);
    assert!(ack["serverTime"].is_u64());
}

#[tokio::test]
async fn test_sequence_numbers_increase() {
    let addr = start_server().await;
    let mut client = TestClient::connect(&addr, "/").await;
    client.hello(None).await;

    client.send(json!({"event": "heartbeat", "data": {"clientTime": 1}})).await;
    client.send(json!({"event": "heartbeat", "data": {"clientTime": 2}})).await;
    let first = client.recv().await;
    let second = client.recv().await;
    assert_eq!(first["seq"], 2);
    assert_eq!(second["seq"], 3);
}

#[tokio::test]
async fn test_malformed_event_keeps_connection_open() {
    let addr = start_server().await;
    let mut client = TestClient::connect(&addr, "/").await;
    client.hello(None).await;

    client.ws.send(Message::text("{not json")).await.unwrap();
    client.expect_error("VALIDATION_ERROR").await;

    client.send(json!({"event": "join", "data": {"code": "ABCDE", "nickname": "   "}})).await;
    client.expect_error("VALIDATION_ERROR").await;

    client.heartbeat(7).await;
}

#[tokio::test]
async fn test_rate_limited_events_rejected() {
    let addr = start_server_with(SessionConfig { rate_limit_per_sec: 2, rate_limit_burst: 2, ..SessionConfig::default() })
        .await;
    let mut client = TestClient::connect(&addr, "/").await;
    client.hello(None).await;

    for t in 0..5 {
        client.send(json!({"event": "heartbeat", "data": {"clientTime": t}})).await;
    }
    client.expect_error("RATE_LIMITED").await;
}

#[tokio::test]
async fn test_idle_connection_closed() {
    let addr = start_server_with(SessionConfig { idle_timeout_secs: 1, ..SessionConfig::default() }).await;
    let mut client = TestClient::connect(&addr, "/").await;
    client.hello(None).await;

    assert!(client.next_envelope().await.is_none());
}

// =========================================================================
// Rooms
// =========================================================================

#[tokio::test]
async fn test_host_creates_room() {
    let addr = start_server().await;
    let mut host = TestClient::connect(&addr, "/").await;
    host.hello(Some(PIN)).await;
    host.send(json!({
        "event": "createRoom",
        "data": {"settings": {"speedBonus": true}, "teams": [{"name": "Red"}, {"name": "Blue"}]}
    }))
    .await;

    let state = host.expect_event("roomState").await;
    assert_eq!(state["status"], "lobby");
    assert_eq!(state["code"].as_str().unwrap().len(), 5);
    assert_eq!(state["settings"]["speedBonus"], true);
    assert_eq!(state["teams"][0]["id"], "T1");
    assert_eq!(state["teams"][1]["name"], "Blue");
}

#[tokio::test]
async fn test_participant_cannot_create_room() {
    let addr = start_server().await;
    let mut client = TestClient::connect(&addr, "/").await;
    client.hello(None).await;
    client.send(json!({"event": "createRoom", "data": {}})).await;
    client.expect_error("NOT_HOST").await;
}

#[tokio::test]
async fn test_join_by_path_and_host_sees_player() {
    let addr = start_server().await;
    let (mut host, code) = host_with_room(&addr).await;

    let mut client = TestClient::connect(&addr, &format!("/room/{code}")).await;
    let welcome = client.hello(None).await;
    assert_eq!(welcome["room"], code.as_str());

    client.send(json!({"event": "join", "data": {"nickname": "ada", "avatar": "🦊"}})).await;
    let state = client.expect_event("roomState").await;
    assert_eq!(state["players"][0]["nickname"], "ada");

    let joined = host.expect_event("playerJoined").await;
    assert_eq!(joined["player"]["nickname"], "ada");
    assert_eq!(joined["player"]["avatar"], "🦊");
}

#[tokio::test]
async fn test_join_by_explicit_code() {
    let addr = start_server().await;
    let (_host, code) = host_with_room(&addr).await;

    let mut client = TestClient::connect(&addr, "/").await;
    client.hello(None).await;
    client.send(json!({"event": "join", "data": {"code": code, "nickname": "bob"}})).await;
    let state = client.expect_event("roomState").await;
    assert_eq!(state["code"], code.as_str());
}

#[tokio::test]
async fn test_join_unknown_room() {
    let addr = start_server().await;
    let mut client = TestClient::connect(&addr, "/").await;
    client.hello(None).await;
    client.send(json!({"event": "join", "data": {"code": "ZZZZZ", "nickname": "ada"}})).await;
    client.expect_error("ROOM_NOT_FOUND").await;
    client.heartbeat(1).await;
}

#[tokio::test]
async fn test_nickname_taken() {
    let addr = start_server().await;
    let (_host, code) = host_with_room(&addr).await;
    let _ada = player(&addr, &code, "ada").await;

    let mut other = TestClient::connect(&addr, &format!("/room/{code}")).await;
    other.hello(None).await;
    other.send(json!({"event": "join", "data": {"nickname": "ada"}})).await;
    other.expect_error("NICKNAME_TAKEN").await;
}

#[tokio::test]
async fn test_answer_before_join() {
    let addr = start_server().await;
    let mut client = TestClient::connect(&addr, "/").await;
    client.hello(None).await;
    client.send(json!({"event": "answer", "data": {"questionId": "q1", "optionIds": ["a"]}})).await;
    client.expect_error("NOT_JOINED").await;
}

#[tokio::test]
async fn test_participant_host_event_rejected() {
    let addr = start_server().await;
    let (_host, code) = host_with_room(&addr).await;
    let mut ada = player(&addr, &code, "ada").await;
    ada.send(json!({"event": "startQuestion", "data": {"questionId": "q1"}})).await;
    ada.expect_error("NOT_HOST").await;
}

#[tokio::test]
async fn test_question_answer_reveal_leaderboard() {
    let addr = start_server().await;
    let (mut host, code) = host_with_room(&addr).await;
    let mut ada = player(&addr, &code, "ada").await;

    host.send(json!({"event": "startQuestion", "data": {"questionId": "q1"}})).await;
    let question = ada.expect_event("question").await;
    assert_eq!(question["id"], "q1");
    assert!(question["options"][0].get("isCorrect").is_none());

    ada.send(json!({"event": "answer", "data": {"questionId": "q1", "optionIds": ["a"]}})).await;
    let accepted = ada.expect_event("answerAccepted").await;
    assert_eq!(accepted["questionId"], "q1");

    host.send(json!({"event": "reveal", "data": {"questionId": "q1"}})).await;
    let reveal = ada.expect_event("reveal").await;
    assert_eq!(reveal["correctOptionIds"], json!(["a"]));
    assert_eq!(reveal["distribution"]["a"], 1);

    host.send(json!({"event": "showLeaderboard"})).await;
    let board = ada.expect_event("leaderboard").await;
    assert_eq!(board["players"][0]["nickname"], "ada");
    assert_eq!(board["players"][0]["score"], 100);
    assert_eq!(board["players"][0]["rank"], 1);
}

#[tokio::test]
async fn test_buzzer_round() {
    let addr = start_server().await;
    let (mut host, code) = host_with_room(&addr).await;
    let mut ada = player(&addr, &code, "ada").await;

    host.send(json!({"event": "startBuzzer", "data": {"questionId": "b1"}})).await;
    let question = ada.expect_event("question").await;
    assert_eq!(question["type"], "buzzer");

    ada.send(json!({"event": "buzz", "data": {"questionId": "b1"}})).await;
    let rankings = host.expect_event("buzzRankings").await;
    assert_eq!(rankings["questionId"], "b1");
    assert_eq!(rankings["ranks"][0]["rank"], 1);

    ada.send(json!({"event": "buzz", "data": {"questionId": "b1"}})).await;
    ada.expect_error("ALREADY_BUZZED").await;
}

#[tokio::test]
async fn test_second_host_attaches_by_path() {
    let addr = start_server().await;
    let (_host, code) = host_with_room(&addr).await;

    let mut screen = TestClient::connect(&addr, &format!("/room/{code}")).await;
    let welcome = screen.hello(Some(PIN)).await;
    assert_eq!(welcome["isHost"], true);
    assert_eq!(welcome["room"], code.as_str());
    let state = screen.expect_event("roomState").await;
    assert_eq!(state["code"], code.as_str());

    screen.send(json!({"event": "pauseTimer"})).await;
    screen.heartbeat(1).await;
}

#[tokio::test]
async fn test_host_attach_to_missing_room() {
    let addr = start_server().await;
    let mut host = TestClient::connect(&addr, "/room/ZZZZZ").await;
    let welcome = host.hello(Some(PIN)).await;
    assert!(welcome.get("room").is_none());
    host.expect_error("ROOM_NOT_FOUND").await;
}

#[tokio::test]
async fn test_disconnect_notifies_room() {
    let addr = start_server().await;
    let (mut host, code) = host_with_room(&addr).await;
    let ada = player(&addr, &code, "ada").await;
    let joined = host.expect_event("playerJoined").await;
    let player_id = joined["player"]["id"].clone();

    drop(ada);
    let left = host.expect_event("playerLeft").await;
    assert_eq!(left["playerId"], player_id);
}

#[tokio::test]
async fn test_end_game_rejects_further_actions() {
    let addr = start_server().await;
    let (mut host, code) = host_with_room(&addr).await;
    let mut ada = player(&addr, &code, "ada").await;

    host.send(json!({"event": "endGame"})).await;
    let state = ada.expect_event("roomState").await;
    assert_eq!(state["status"], "ended");
    ada.expect_event("leaderboard").await;

    host.send(json!({"event": "startQuestion", "data": {"questionId": "q1"}})).await;
    host.expect_error("VALIDATION_ERROR").await;
}
