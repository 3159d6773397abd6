use axum::{extract::{Path, State}, routing::{get, post}, Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Ack;
use crate::error::ApiError;
use crate::models::{CurrentCycleData, CycleOverview, RepairReport, SyncReport};
use crate::tracker::Tracker;

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
pub struct MarkPeriod {
    #[serde(default = "default_true")]
    pub is_period: bool,
}

#[derive(Serialize)]
pub struct PeriodMarked {
    pub date: NaiveDate,
    pub is_period: bool,
    #[serde(flatten)]
    pub sync: SyncReport,
}

#[derive(Serialize)]
pub struct CounterReset {
    pub current_day: i32,
}

pub fn routes(tracker: Tracker) -> Router {
    Router::new()
        .route("/api/mark_period/:day", post(mark_period))
        .route("/api/reset_cycle", post(reset_cycle))
        .route("/api/sync_cycle", post(sync_cycle))
        .route("/api/fix_cycle_days", post(fix_cycle_days))
        .route("/api/cycles", get(cycles))
        .route("/api/current_cycle_data", get(current_cycle_data))
        .with_state(tracker)
}

async fn mark_period(
    State(tracker): State<Tracker>,
    Path(day): Path<i32>,
    body: Option<Json<MarkPeriod>>,
) -> Result<Json<Ack<PeriodMarked>>, ApiError> {
    let is_period = body.map(|Json(b)| b.is_period).unwrap_or(true);
    let (date, sync) = tracker.mark_period(day, is_period).await?;

    let message = if is_period {
        format!("Period start marked on {}", date)
    } else {
        format!("Period start removed from {}", date)
    };
    Ok(Json(Ack::new(message, PeriodMarked { date, is_period, sync })))
}

async fn reset_cycle(State(tracker): State<Tracker>) -> Result<Json<Ack<CounterReset>>, ApiError> {
    let current_day = tracker.reset_cycle().await?;
    Ok(Json(Ack::new("Cycle counter reset", CounterReset { current_day })))
}

async fn sync_cycle(State(tracker): State<Tracker>) -> Result<Json<Ack<SyncReport>>, ApiError> {
    let report = tracker.synchronize().await?;
    Ok(Json(Ack::new("Cycle days synchronized", report)))
}

async fn fix_cycle_days(State(tracker): State<Tracker>) -> Result<Json<Ack<RepairReport>>, ApiError> {
    let report = tracker.repair().await?;
    let message = format!(
        "Removed {} duplicates, updated {} records across {} cycles",
        report.duplicates_removed, report.records_updated, report.cycles_processed
    );
    Ok(Json(Ack::new(message, report)))
}

async fn cycles(State(tracker): State<Tracker>) -> Result<Json<CycleOverview>, ApiError> {
    Ok(Json(tracker.cycles_overview().await?))
}

async fn current_cycle_data(State(tracker): State<Tracker>) -> Result<Json<CurrentCycleData>, ApiError> {
    Ok(Json(tracker.current_cycle().await?))
}
