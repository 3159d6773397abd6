use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::models::{Analysis, AnalyticsReport, ChartData};
use crate::tracker::{ChartSelection, Tracker};

#[derive(Deserialize)]
pub struct AnalysisQuery {
    limit: Option<usize>,
}

fn parse_selection(raw: &str) -> Result<ChartSelection, ApiError> {
    if raw.eq_ignore_ascii_case("all") {
        return Ok(ChartSelection::All);
    }
    raw.parse::<i64>()
        .map(ChartSelection::Cycle)
        .map_err(|_| ApiError::BadRequest(format!("Invalid cycle id: {}", raw)))
}

pub fn routes(tracker: Tracker) -> Router {
    Router::new()
        .route("/api/analysis", get(analysis))
        .route("/api/chart_data", get(chart_data_all))
        .route("/api/chart_data/:cycle_id", get(chart_data))
        .route("/api/cycle_analytics", get(cycle_analytics))
        .with_state(tracker)
}

pub async fn analysis(
    State(tracker): State<Tracker>,
    Query(query): Query<AnalysisQuery>,
) -> Result<Json<Analysis>, ApiError> {
    Ok(Json(tracker.analysis(query.limit).await?))
}

pub async fn chart_data_all(State(tracker): State<Tracker>) -> Result<Json<ChartData>, ApiError> {
    Ok(Json(tracker.chart_data(ChartSelection::All).await?))
}

pub async fn chart_data(
    State(tracker): State<Tracker>,
    Path(cycle_id): Path<String>,
) -> Result<Json<ChartData>, ApiError> {
    let selection = parse_selection(&cycle_id)?;
    Ok(Json(tracker.chart_data(selection).await?))
}

pub async fn cycle_analytics(State(tracker): State<Tracker>) -> Result<Json<AnalyticsReport>, ApiError> {
    Ok(Json(tracker.cycle_analytics().await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_selection_from_path() {
        assert_eq!(parse_selection("all").unwrap(), ChartSelection::All);
        assert_eq!(parse_selection("ALL").unwrap(), ChartSelection::All);
        assert_eq!(parse_selection("7").unwrap(), ChartSelection::Cycle(7));
        assert!(matches!(parse_selection("seven"), Err(ApiError::BadRequest(_))));
    }
}
