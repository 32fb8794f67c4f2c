use std::sync::Arc;

use warp::Filter;

use crate::registry::ConnectionRegistry;
use crate::room_manager::RoomManager;

pub mod config;
pub mod reconnect;
pub mod registry;
pub mod room_manager;
pub mod stats;
pub mod websocket;

pub fn create_routes(
    registry: Arc<ConnectionRegistry>,
    manager: Arc<RoomManager>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let registry_filter = warp::any().map({
        let registry = registry.clone();
        move || registry.clone()
    });

    let manager_filter = warp::any().map({
        let manager = manager.clone();
        move || manager.clone()
    });

    // WebSocket endpoint
    let ws_route = warp::path("ws")
        .and(warp::ws())
        .and(registry_filter)
        .and(manager_filter)
        .map(
            |ws: warp::ws::Ws, registry: Arc<ConnectionRegistry>, manager: Arc<RoomManager>| {
                ws.on_upgrade(move |socket| {
                    websocket::handle_connection(socket, registry, manager)
                })
            },
        );

    // Health check endpoint
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", warp::http::StatusCode::OK));

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET"]);

    ws_route
        .or(health)
        .with(cors)
        .with(warp::log("word_rally"))
}

#[cfg(test)]
mod route_tests {
    use super::*;
    use crate::config::Config;
    use crate::stats::NullStatsSink;
    use game_core::WordList;
    use game_types::{ClientMessage, ServerMessage};

    fn test_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            word_list_path: String::new(),
            word_length: 5,
            max_guesses: 6,
            max_players_per_room: 8,
            countdown_seconds: 0,
            grace_waiting_secs: 120,
            grace_playing_secs: 60,
            grace_countdown_secs: 10,
            competitive_time_limit_secs: 300,
            room_idle_timeout_minutes: 30,
            timer_tick_millis: 1000,
            cleanup_interval_secs: 30,
        }
    }

    fn create_test_app() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone
    {
        let registry = Arc::new(ConnectionRegistry::new());
        let words = Arc::new(WordList::from_list("crate\ncrane\nslate\n", 5));
        let manager = Arc::new(RoomManager::new(
            registry.clone(),
            words,
            Arc::new(NullStatsSink),
            test_config(),
        ));
        create_routes(registry, manager)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app();

        let response = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&app)
            .await;

        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), "OK");
    }

    #[tokio::test]
    async fn test_invalid_routes() {
        let app = create_test_app();

        let response = warp::test::request()
            .method("GET")
            .path("/invalid")
            .reply(&app)
            .await;

        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_websocket_invalid_json_gets_error_reply() {
        let app = create_test_app();

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("websocket handshake should succeed");

        ws.send_text("not json").await;

        let msg = ws.recv().await.expect("connection should stay open");
        let server_msg: ServerMessage =
            serde_json::from_str(msg.to_str().unwrap()).expect("valid ServerMessage");
        match server_msg {
            ServerMessage::Error { message } => {
                assert!(message.contains("Invalid JSON message"));
            }
            other => panic!("expected error message, got: {:?}", other),
        }

        // The bad frame must not cost the client its connection.
        let create = ClientMessage::CreateRoom {
            player_name: "alice".to_string(),
            player_email: None,
            game_mode: game_types::GameMode::Casual,
            word_mode: game_types::WordMode::Random,
            is_public: false,
        };
        ws.send_text(serde_json::to_string(&create).unwrap()).await;

        let msg = ws.recv().await.expect("connection should still be usable");
        let server_msg: ServerMessage =
            serde_json::from_str(msg.to_str().unwrap()).expect("valid ServerMessage");
        assert!(matches!(server_msg, ServerMessage::RoomCreated { .. }));
    }

    #[tokio::test]
    async fn test_websocket_create_room_round_trip() {
        let app = create_test_app();

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("websocket handshake should succeed");

        let create = ClientMessage::CreateRoom {
            player_name: "alice".to_string(),
            player_email: None,
            game_mode: game_types::GameMode::Casual,
            word_mode: game_types::WordMode::Random,
            is_public: false,
        };
        ws.send_text(serde_json::to_string(&create).unwrap()).await;

        let msg = ws.recv().await.expect("should receive a reply");
        let server_msg: ServerMessage =
            serde_json::from_str(msg.to_str().unwrap()).expect("valid ServerMessage");
        match server_msg {
            ServerMessage::RoomCreated { room_code, snapshot, .. } => {
                assert_eq!(room_code.len(), 6);
                assert_eq!(snapshot.players.len(), 1);
            }
            other => panic!("expected RoomCreated, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_websocket_guess_outside_room_errors() {
        let app = create_test_app();

        let mut ws = warp::test::ws()
            .path("/ws")
            .handshake(app)
            .await
            .expect("websocket handshake should succeed");

        let guess = ClientMessage::Guess {
            word: "crate".to_string(),
            forced: false,
        };
        ws.send_text(serde_json::to_string(&guess).unwrap()).await;

        let msg = ws.recv().await.expect("should receive a reply");
        let server_msg: ServerMessage =
            serde_json::from_str(msg.to_str().unwrap()).expect("valid ServerMessage");
        match server_msg {
            ServerMessage::Error { message } => assert!(message.contains("Not in a room")),
            other => panic!("expected error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_endpoints_cors() {
        let app = create_test_app();

        let response = warp::test::request()
            .method("OPTIONS")
            .path("/health")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "GET")
            .reply(&app)
            .await;

        assert_eq!(response.status(), 200);
        assert!(response.headers().contains_key("access-control-allow-origin"));
    }
}
