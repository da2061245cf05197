use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State as AxumState, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::codes::uuid_to_short_id;
use crate::game_manager::{
    CreateGameResponse, GameManager, GameManagerError, GameStateResponse,
};
use crate::geo::Point;
use crate::validation::{validate_game_name, validate_player_name};
use crate::{
    AnswerOutcome, ExtractionPoint, GameError, GameSettings, LifecycleTransition,
    LocationOutcome, Role, TaskSpec, DEFAULT_EXTRACTION_RADIUS_M,
};

#[derive(Clone)]
pub struct AppState {
    pub game_manager: GameManager,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractionPointBody {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub radius_m: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateGameRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub extraction_point: ExtractionPointBody,
    pub duration_mins: u32,
    #[serde(default)]
    pub settings: Option<GameSettings>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttachTasksRequest {
    pub tasks: Vec<TaskSpec>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinRequest {
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddSlotRequest {
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub team: Option<String>,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimSlotRequest {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinResponse {
    pub player_id: Uuid,
    pub short_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub ordinal: u8,
    pub answer: String,
    #[serde(default)]
    pub location: Option<Point>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LocationRequest {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub accuracy_m: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CaughtRequest {
    #[serde(default)]
    pub location: Option<Point>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: String) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message }))
}

fn map_error(e: GameManagerError) -> ApiError {
    let status = match &e {
        GameManagerError::GameNotFound => StatusCode::NOT_FOUND,
        GameManagerError::Game(err) => match err {
            GameError::NotFound => StatusCode::NOT_FOUND,
            GameError::InvalidSlotPassword => StatusCode::FORBIDDEN,
            GameError::GameAlreadyActive
            | GameError::InvalidGameStatus
            | GameError::DuplicateName
            | GameError::SlotAlreadyJoined
            | GameError::GameFull => StatusCode::CONFLICT,
            _ => StatusCode::BAD_REQUEST,
        },
        GameManagerError::LockError => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let error = match e {
        GameManagerError::Game(err) => err.to_string(),
        other => format!("{:?}", other),
    };
    (status, Json(ErrorResponse { error }))
}

/// Build the full REST + WebSocket router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/games", post(create_game))
        .route("/games", get(list_games))
        .route("/games/{game_id}", get(get_game_state))
        .route("/games/{game_id}", delete(delete_game))
        .route("/games/code/{code}", get(find_by_code))
        .route("/games/{game_id}/tasks", post(attach_tasks))
        .route("/games/{game_id}/players", post(join_game))
        .route("/games/{game_id}/slots", post(add_slot))
        .route("/games/{game_id}/slots/claim", post(claim_slot))
        .route("/games/{game_id}/transition", post(make_transition))
        .route("/games/{game_id}/players/{player_id}/answer", post(submit_answer))
        .route("/games/{game_id}/players/{player_id}/location", post(update_location))
        .route("/games/{game_id}/players/{player_id}/caught", post(mark_caught))
        .route("/games/{game_id}/ws", get(subscribe_ws))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "Klopjacht Game Server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "create_game": "POST /games",
            "list_games": "GET /games",
            "get_game_state": "GET /games/{game_id}",
            "find_by_code": "GET /games/code/{code}",
            "attach_tasks": "POST /games/{game_id}/tasks",
            "join_game": "POST /games/{game_id}/players",
            "add_slot": "POST /games/{game_id}/slots",
            "claim_slot": "POST /games/{game_id}/slots/claim",
            "make_transition": "POST /games/{game_id}/transition",
            "submit_answer": "POST /games/{game_id}/players/{player_id}/answer",
            "update_location": "POST /games/{game_id}/players/{player_id}/location",
            "mark_caught": "POST /games/{game_id}/players/{player_id}/caught",
            "subscribe": "GET /games/{game_id}/ws",
            "delete_game": "DELETE /games/{game_id}"
        }
    }))
}

async fn create_game(
    AxumState(state): AxumState<AppState>,
    Json(request): Json<CreateGameRequest>,
) -> Result<Json<CreateGameResponse>, ApiError> {
    let name = validate_game_name(&request.name).map_err(bad_request)?;
    let extraction_point = ExtractionPoint {
        point: Point::new(request.extraction_point.lat, request.extraction_point.lon),
        address: request.extraction_point.address,
        radius_m: request
            .extraction_point
            .radius_m
            .unwrap_or(DEFAULT_EXTRACTION_RADIUS_M),
    };
    state
        .game_manager
        .create_game(
            name,
            extraction_point,
            request.duration_mins,
            request.settings.unwrap_or_default(),
        )
        .map(Json)
        .map_err(map_error)
}

async fn list_games(
    AxumState(state): AxumState<AppState>,
) -> Result<Json<Vec<Uuid>>, ApiError> {
    state.game_manager.list_games().map(Json).map_err(map_error)
}

async fn get_game_state(
    AxumState(state): AxumState<AppState>,
    Path(game_id): Path<Uuid>,
) -> Result<Json<GameStateResponse>, ApiError> {
    state.game_manager.get_game_state(game_id).map(Json).map_err(map_error)
}

async fn find_by_code(
    AxumState(state): AxumState<AppState>,
    Path(code): Path<String>,
) -> Result<Json<GameStateResponse>, ApiError> {
    let game_id = state
        .game_manager
        .find_by_code(&code.to_uppercase())
        .map_err(map_error)?;
    state.game_manager.get_game_state(game_id).map(Json).map_err(map_error)
}

async fn delete_game(
    AxumState(state): AxumState<AppState>,
    Path(game_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .game_manager
        .remove_game(game_id)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(map_error)
}

async fn attach_tasks(
    AxumState(state): AxumState<AppState>,
    Path(game_id): Path<Uuid>,
    Json(request): Json<AttachTasksRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .game_manager
        .attach_tasks(game_id, request.tasks)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(map_error)
}

async fn join_game(
    AxumState(state): AxumState<AppState>,
    Path(game_id): Path<Uuid>,
    Json(request): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, ApiError> {
    let name = validate_player_name(&request.name).map_err(bad_request)?;
    let player_id = state
        .game_manager
        .join_game(game_id, name, request.role)
        .map_err(map_error)?;
    Ok(Json(JoinResponse {
        player_id,
        short_id: uuid_to_short_id(player_id),
    }))
}

async fn add_slot(
    AxumState(state): AxumState<AppState>,
    Path(game_id): Path<Uuid>,
    Json(request): Json<AddSlotRequest>,
) -> Result<StatusCode, ApiError> {
    let name = validate_player_name(&request.name).map_err(bad_request)?;
    state
        .game_manager
        .add_slot(game_id, name, request.role, request.team, request.password)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(map_error)
}

async fn claim_slot(
    AxumState(state): AxumState<AppState>,
    Path(game_id): Path<Uuid>,
    Json(request): Json<ClaimSlotRequest>,
) -> Result<Json<JoinResponse>, ApiError> {
    let player_id = state
        .game_manager
        .claim_slot(game_id, &request.name, &request.password)
        .map_err(map_error)?;
    Ok(Json(JoinResponse {
        player_id,
        short_id: uuid_to_short_id(player_id),
    }))
}

async fn make_transition(
    AxumState(state): AxumState<AppState>,
    Path(game_id): Path<Uuid>,
    Json(transition): Json<LifecycleTransition>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .game_manager
        .transition(game_id, transition)
        .map(|result| {
            Json(serde_json::json!({
                "success": true,
                "result": format!("{:?}", result)
            }))
        })
        .map_err(map_error)
}

async fn submit_answer(
    AxumState(state): AxumState<AppState>,
    Path((game_id, player_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerOutcome>, ApiError> {
    state
        .game_manager
        .submit_answer(game_id, player_id, request.ordinal, &request.answer, request.location)
        .map(Json)
        .map_err(map_error)
}

async fn update_location(
    AxumState(state): AxumState<AppState>,
    Path((game_id, player_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<LocationRequest>,
) -> Result<Json<LocationOutcome>, ApiError> {
    state
        .game_manager
        .update_location(game_id, player_id, request.lat, request.lon, request.accuracy_m)
        .map(Json)
        .map_err(map_error)
}

async fn mark_caught(
    AxumState(state): AxumState<AppState>,
    Path((game_id, player_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<CaughtRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .game_manager
        .mark_caught(game_id, player_id, request.location)
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(map_error)
}

async fn subscribe_ws(
    AxumState(state): AxumState<AppState>,
    Path(game_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let rx = state.game_manager.subscribe(game_id).map_err(map_error)?;
    Ok(ws.on_upgrade(move |socket| forward_events(socket, rx)))
}

/// Forward broadcast events to one WebSocket client until either side
/// closes. A lagged subscriber skips ahead to the live stream.
async fn forward_events(
    socket: WebSocket,
    mut rx: tokio::sync::broadcast::Receiver<crate::game_manager::GameEvent>,
) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        let payload = match serde_json::to_string(&event) {
                            Ok(p) => p,
                            Err(_) => continue,
                        };
                        if sink.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }
}
