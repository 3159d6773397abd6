use chrono::{Duration, NaiveDate};

use super::renumber::days_between;
use super::EngineError;
use crate::models::CycleSpan;

/// Average length assumed when no cycle has been recorded yet.
pub const DEFAULT_CYCLE_LENGTH: i64 = 28;

/// Builds one span per period date. Every span but the last ends the day before
/// the next period; the last one runs through `today`.
///
/// Output depends only on the distinct period dates, so re-running it over the
/// same periods yields the same spans.
pub fn rebuild_cycle_records(periods: &[NaiveDate], today: NaiveDate) -> Result<Vec<CycleSpan>, EngineError> {
    let mut sorted = periods.to_vec();
    sorted.sort();
    if let Some(w) = sorted.windows(2).find(|w| w[0] == w[1]) {
        return Err(EngineError::DuplicateDate(w[0]));
    }

    let mut spans = Vec::with_capacity(sorted.len());
    for (i, &start_date) in sorted.iter().enumerate() {
        let end_date = match sorted.get(i + 1) {
            Some(next) => *next - Duration::days(1),
            None => today,
        };
        if end_date < start_date {
            return Err(EngineError::InvalidRange { start: start_date, end: end_date });
        }
        spans.push(CycleSpan {
            start_date,
            end_date,
            duration: days_between(start_date, end_date) + 1,
        });
    }
    Ok(spans)
}

pub fn average_cycle_length(durations: &[i32]) -> Option<f64> {
    if durations.is_empty() {
        return None;
    }
    Some(durations.iter().map(|d| *d as f64).sum::<f64>() / durations.len() as f64)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Follicular and luteal lengths of a cycle. Without an ovulation day the cycle
/// is halved, the follicular half rounded down.
pub fn phase_split(duration: i32, ovulation_day: Option<i32>) -> (i32, i32) {
    match ovulation_day {
        Some(day) if day > 0 && day <= duration => (day, duration - day),
        _ => (duration / 2, duration - duration / 2),
    }
}

/// Mean of the second half of a cycle's readings minus the mean of the first.
/// Cycles with six or fewer readings report no shift.
pub fn temperature_shift(temperatures: &[f64]) -> f64 {
    if temperatures.len() <= 6 {
        return 0.0;
    }
    let (first, second) = temperatures.split_at(temperatures.len() / 2);
    let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
    round_to(mean(second) - mean(first), 2)
}
