use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Ack;
use crate::error::ApiError;
use crate::models::{DailyRecord, RecordPatch, Recorded, SyncReport, TemperatureEntry};
use crate::tracker::Tracker;

#[derive(Deserialize)]
pub struct UpdateRequest {
    pub date: NaiveDate,
    pub temperature: Option<f64>,
    pub mucus_type: Option<String>,
    pub mood: Option<String>,
    pub comment: Option<String>,
}

#[derive(Deserialize)]
pub struct DeleteRequest {
    pub date: NaiveDate,
}

#[derive(Serialize)]
pub struct Updated {
    pub record: DailyRecord,
}

pub fn routes(tracker: Tracker) -> Router {
    Router::new()
        .route(
            "/api/temperatures",
            post(add_temperature).put(update_temperature).delete(delete_temperature),
        )
        .route("/api/temperature_history", get(temperature_history))
        .with_state(tracker)
}

async fn add_temperature(
    State(tracker): State<Tracker>,
    Json(body): Json<TemperatureEntry>,
) -> Result<(StatusCode, Json<Ack<Recorded>>), ApiError> {
    let recorded = tracker.add_temperature(body).await?;

    let (status, message) = if recorded.created {
        (StatusCode::CREATED, "Temperature recorded")
    } else {
        (StatusCode::OK, "Temperature updated")
    };
    Ok((status, Json(Ack::new(message, recorded))))
}

async fn update_temperature(
    State(tracker): State<Tracker>,
    Json(body): Json<UpdateRequest>,
) -> Result<Json<Ack<Updated>>, ApiError> {
    let patch = RecordPatch {
        temperature: body.temperature,
        is_period: None,
        mucus_type: body.mucus_type,
        mood: body.mood,
        comment: body.comment,
    };
    let record = tracker.update_record(body.date, patch).await?;
    Ok(Json(Ack::new("Record updated", Updated { record })))
}

async fn delete_temperature(
    State(tracker): State<Tracker>,
    Json(body): Json<DeleteRequest>,
) -> Result<Json<Ack<SyncReport>>, ApiError> {
    let report = tracker.delete_record(body.date).await?;
    Ok(Json(Ack::new(format!("Record for {} deleted", body.date), report)))
}

async fn temperature_history(State(tracker): State<Tracker>) -> Result<Json<Vec<DailyRecord>>, ApiError> {
    Ok(Json(tracker.history().await?))
}
