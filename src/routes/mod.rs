pub mod cycle;
pub mod cycle_stats;
pub mod settings;
pub mod temperatures;

use axum::{routing::get, Router};
use serde::Serialize;

use crate::tracker::Tracker;

/// Body of every successful mutation: `success`, `message` and the
/// operation's own fields alongside.
#[derive(Debug, Serialize)]
pub struct Ack<T> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Ack<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self { success: true, message: message.into(), data }
    }
}

pub fn app(tracker: Tracker) -> Router {
    Router::new()
        .merge(temperatures::routes(tracker.clone()))
        .merge(cycle::routes(tracker.clone()))
        .merge(cycle_stats::routes(tracker.clone()))
        .merge(settings::routes(tracker))
        .route("/health", get(|| async { "✅ Backend up" }))
}
