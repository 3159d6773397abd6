use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use super::EngineError;

/// Minimum number of readings before a temperature shift is looked for.
pub const MIN_SHIFT_SAMPLES: usize = 6;
/// Rise (in the recorded unit) between the before/after averages that counts as a shift.
pub const SHIFT_THRESHOLD: f64 = 0.2;
/// Cycle days on which a shift is accepted as ovulation.
pub const OVULATION_DAYS: RangeInclusive<i32> = 8..=20;
/// Shortest cycle (highest cycle day seen) the positional estimate applies to.
pub const MIN_POSITIONAL_LENGTH: i32 = 10;

const AVERAGE_SPAN: usize = 3;
const REFERENCE_LENGTH: i32 = 28;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FertileWindow {
    /// Only set when a temperature shift was detected.
    pub ovulation_day: Option<i32>,
    /// Ascending, distinct cycle days.
    pub fertile_days: Vec<i32>,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Looks for the first sustained rise in temperature and returns its cycle day.
///
/// Each interior position (skipping two readings at either end) compares the
/// mean of up to three readings before it with the mean of up to three readings
/// from it onward. The earliest position whose rise exceeds [`SHIFT_THRESHOLD`]
/// and whose cycle day lies in [`OVULATION_DAYS`] wins.
pub fn detect_temperature_shift(cycle_days: &[i32], temperatures: &[f64]) -> Result<Option<i32>, EngineError> {
    let n = cycle_days.len().min(temperatures.len());
    if n < MIN_SHIFT_SAMPLES {
        return Err(EngineError::InsufficientData { needed: MIN_SHIFT_SAMPLES, got: n });
    }
    let temps = &temperatures[..n];

    for i in 2..n - 2 {
        let before = mean(&temps[i.saturating_sub(AVERAGE_SPAN)..i]);
        let after = mean(&temps[i..(i + AVERAGE_SPAN).min(n)]);
        if after - before > SHIFT_THRESHOLD && OVULATION_DAYS.contains(&cycle_days[i]) {
            return Ok(Some(cycle_days[i]));
        }
    }
    Ok(None)
}

/// Population-average window for a cycle whose highest day is `cycle_length`.
/// Short cycles pull the window earlier by half their shortfall from 28 days.
pub fn positional_window(cycle_length: i32) -> Result<RangeInclusive<i32>, EngineError> {
    if cycle_length < MIN_POSITIONAL_LENGTH {
        return Err(EngineError::InsufficientData {
            needed: MIN_POSITIONAL_LENGTH as usize,
            got: cycle_length.max(0) as usize,
        });
    }
    if cycle_length < REFERENCE_LENGTH {
        let adjustment = (REFERENCE_LENGTH - cycle_length) / 2;
        Ok((10 - adjustment).max(1)..=cycle_length.min(17 - adjustment))
    } else {
        Ok(10..=cycle_length.min(17))
    }
}

fn days_within(cycle_days: &[i32], window: &RangeInclusive<i32>) -> BTreeSet<i32> {
    cycle_days.iter().copied().filter(|d| window.contains(d)).collect()
}

/// Estimates the fertile window for one run of aligned cycle days and temperatures.
///
/// Temperature shift first, then the positional estimate, and when neither
/// yields any present day, every day at or above `fertile_temp`.
pub fn estimate_fertile_window(cycle_days: &[i32], temperatures: &[f64], fertile_temp: f64) -> FertileWindow {
    let n = cycle_days.len().min(temperatures.len());
    let (cycle_days, temperatures) = (&cycle_days[..n], &temperatures[..n]);
    let Some(&highest) = cycle_days.iter().max() else {
        return FertileWindow::default();
    };

    let ovulation_day = match detect_temperature_shift(cycle_days, temperatures) {
        Ok(day) => day,
        Err(e) => {
            tracing::debug!("temperature shift skipped: {}", e);
            None
        }
    };

    let window = match ovulation_day {
        Some(day) => Some((day - 5).max(1)..=(day + 1).min(highest)),
        None => positional_window(highest)
            .map_err(|e| tracing::debug!("positional window skipped: {}", e))
            .ok(),
    };

    let mut fertile = window
        .map(|w| days_within(cycle_days, &w))
        .unwrap_or_default();

    if fertile.is_empty() {
        fertile = cycle_days
            .iter()
            .zip(temperatures)
            .filter(|(_, t)| **t >= fertile_temp)
            .map(|(d, _)| *d)
            .collect();
    }

    FertileWindow {
        ovulation_day,
        fertile_days: fertile.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_on_day_eight() {
        let days = [5, 6, 7, 8, 9, 10, 11];
        let temps = [97.8, 97.9, 97.7, 98.0, 98.4, 98.5, 98.6];
        let out = estimate_fertile_window(&days, &temps, 99.0);
        assert_eq!(out.ovulation_day, Some(8));
        assert_eq!(out.fertile_days, vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn shift_window_is_exact() {
        let days: Vec<i32> = (1..=16).collect();
        let mut temps = vec![97.5; 16];
        for t in temps.iter_mut().skip(9) {
            *t = 98.0;
        }
        let out = estimate_fertile_window(&days, &temps, 99.0);
        assert_eq!(out.ovulation_day, Some(9));
        assert_eq!(out.fertile_days, (4..=10).collect::<Vec<_>>());

        // Window days missing from the input are not reported.
        let days: Vec<i32> = (3..=10).collect();
        let temps = [97.4, 97.4, 97.4, 97.4, 97.4, 97.4, 98.2, 98.3];
        let out = detect_temperature_shift(&days, &temps).unwrap();
        assert_eq!(out, Some(8));
        let w = estimate_fertile_window(&days, &temps, 99.0);
        assert_eq!(w.fertile_days, (3..=9).collect::<Vec<_>>());
    }

    #[test]
    fn earliest_shift_wins_over_larger_one() {
        let days: Vec<i32> = (6..=18).collect();
        let temps = [
            97.0, 97.0, 97.0, 97.0, 97.4, 97.4, 97.4, 97.4, 98.5, 98.5, 98.5, 98.5, 98.5,
        ];
        assert_eq!(detect_temperature_shift(&days, &temps).unwrap(), Some(9));
    }

    #[test]
    fn shift_outside_search_days_is_ignored() {
        let days: Vec<i32> = (1..=7).collect();
        let temps = [97.0, 97.0, 97.0, 98.0, 98.0, 98.0, 98.0];
        assert_eq!(detect_temperature_shift(&days, &temps).unwrap(), None);
    }

    #[test]
    fn too_few_samples_for_shift() {
        assert_eq!(
            detect_temperature_shift(&[8, 9, 10], &[97.0, 98.0, 98.0]),
            Err(EngineError::InsufficientData { needed: 6, got: 3 })
        );
    }

    #[test]
    fn positional_window_for_short_cycle() {
        assert_eq!(positional_window(24).unwrap(), 8..=15);
        assert_eq!(positional_window(11).unwrap(), 2..=9);
        assert_eq!(positional_window(28).unwrap(), 10..=17);
        assert_eq!(positional_window(40).unwrap(), 10..=17);
        assert!(positional_window(9).is_err());
    }

    #[test]
    fn positional_fallback_without_shift() {
        let days: Vec<i32> = (1..=24).collect();
        let temps = vec![97.6; 24];
        let out = estimate_fertile_window(&days, &temps, 97.0);
        assert_eq!(out.ovulation_day, None);
        assert_eq!(out.fertile_days, (8..=15).collect::<Vec<_>>());
    }

    #[test]
    fn threshold_fallback_when_cycle_too_short() {
        let days = [1, 2, 3, 4, 5];
        let temps = [97.0, 98.1, 97.2, 98.0, 97.9];
        let out = estimate_fertile_window(&days, &temps, 98.0);
        assert_eq!(out.ovulation_day, None);
        assert_eq!(out.fertile_days, vec![2, 4]);
    }

    #[test]
    fn threshold_fallback_when_window_has_no_days() {
        // Highest day 20 gives a window of 6..=13 with no readings inside it.
        let days = [1, 2, 3, 18, 19, 20];
        let temps = [97.0, 97.0, 97.0, 97.0, 97.2, 97.0];
        let out = estimate_fertile_window(&days, &temps, 97.1);
        assert_eq!(out.ovulation_day, None);
        assert_eq!(out.fertile_days, vec![19]);
    }

    #[test]
    fn empty_input() {
        assert_eq!(estimate_fertile_window(&[], &[], 98.0), FertileWindow::default());
    }
}
