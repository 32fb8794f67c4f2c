use std::sync::Arc;

use tokio::signal;
use tracing::info;

use game_core::WordList;
use game_server::config::Config;
use game_server::registry::ConnectionRegistry;
use game_server::room_manager::RoomManager;
use game_server::stats::NullStatsSink;
use game_server::create_routes;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    info!("Starting Word Rally server...");

    let config = Config::new();

    let raw_words = match std::fs::read_to_string(&config.word_list_path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!(
                "Failed to read word list '{}': {}",
                config.word_list_path,
                e
            );
            tracing::error!("Set WORD_LIST_PATH to a newline-delimited word file.");
            std::process::exit(1);
        }
    };
    let words = Arc::new(WordList::from_list(&raw_words, config.word_length));
    if words.is_empty() {
        tracing::error!(
            "Word list '{}' contains no {}-letter words",
            config.word_list_path,
            config.word_length
        );
        std::process::exit(1);
    }
    info!(
        "Loaded {} words of length {}",
        words.len(),
        config.word_length
    );

    let registry = Arc::new(ConnectionRegistry::new());
    let manager = Arc::new(RoomManager::new(
        registry.clone(),
        words,
        Arc::new(NullStatsSink),
        config.clone(),
    ));

    let routes = create_routes(registry.clone(), manager.clone());

    tokio::spawn(Arc::clone(&manager).run_cleanup_task());

    info!("Server starting on {}:{}", config.host, config.port);

    let addr = (
        config
            .host
            .parse::<std::net::IpAddr>()
            .expect("Invalid HOST"),
        config.port,
    );

    let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, async {
        #[cfg(unix)]
        {
            let mut sigint =
                signal::unix::signal(signal::unix::SignalKind::interrupt()).expect("sigint handler");
            let mut sigterm =
                signal::unix::signal(signal::unix::SignalKind::terminate()).expect("sigterm handler");

            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    });

    info!(
        "Server started successfully on {}. Press Ctrl+C to stop.",
        addr
    );
    server.await;
    info!("Server shutdown complete.");
}
