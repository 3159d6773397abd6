use axum::{extract::State, routing::get, Json, Router};

use super::Ack;
use crate::error::ApiError;
use crate::models::Settings;
use crate::tracker::Tracker;

pub fn routes(tracker: Tracker) -> Router {
    Router::new()
        .route("/api/settings", get(get_settings).put(update_settings))
        .with_state(tracker)
}

async fn get_settings(State(tracker): State<Tracker>) -> Json<Settings> {
    Json(tracker.settings().await)
}

async fn update_settings(
    State(tracker): State<Tracker>,
    Json(body): Json<Settings>,
) -> Result<Json<Ack<Settings>>, ApiError> {
    let settings = tracker.update_settings(body).await?;
    Ok(Json(Ack::new("Settings updated", settings)))
}
