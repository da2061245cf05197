use klopjacht::api::{router, AppState};
use klopjacht::game_manager::{GameManager, SweeperConfig};
use std::net::SocketAddr;

#[tokio::main]
async fn main() {
    env_logger::init();

    let game_manager = match std::env::var("KLOPJACHT_DB") {
        Ok(path) => GameManager::with_db(&path).expect("failed to open game database"),
        Err(_) => GameManager::new(),
    };

    let sweep_interval = std::env::var("KLOPJACHT_SWEEP_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(60);
    game_manager.start_sweeper(SweeperConfig { interval_secs: sweep_interval });

    let port = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);

    let app = router(AppState { game_manager: game_manager.clone() });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("Klopjacht server listening on {}", addr);
    println!("\nAvailable endpoints:");
    println!("  GET    /                                            - API info");
    println!("  POST   /games                                       - Create a new game");
    println!("  GET    /games                                       - List all games");
    println!("  GET    /games/{{game_id}}                             - Get game state");
    println!("  GET    /games/code/{{code}}                           - Look up a game by join code");
    println!("  POST   /games/{{game_id}}/tasks                       - Attach the six tasks");
    println!("  POST   /games/{{game_id}}/players                     - Join a game");
    println!("  POST   /games/{{game_id}}/slots                       - Add a predefined slot");
    println!("  POST   /games/{{game_id}}/slots/claim                 - Claim a predefined slot");
    println!("  POST   /games/{{game_id}}/transition                  - Lifecycle command");
    println!("  POST   /games/{{game_id}}/players/{{player_id}}/answer   - Submit a task answer");
    println!("  POST   /games/{{game_id}}/players/{{player_id}}/location - Location update");
    println!("  POST   /games/{{game_id}}/players/{{player_id}}/caught   - Mark a fugitive caught");
    println!("  GET    /games/{{game_id}}/ws                          - Subscribe to game events");
    println!("  DELETE /games/{{game_id}}                             - Delete a game");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();

    game_manager.shutdown();
}
