use super::cycles::round_to;
use crate::models::{Analysis, DailyRecord};

/// The `limit` most recent records, oldest first.
pub fn recent_window(records: &[DailyRecord], limit: usize) -> Vec<DailyRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|r| (r.date, r.id));
    let skip = sorted.len().saturating_sub(limit);
    sorted.split_off(skip)
}

/// Threshold classification of a window of records: a day is fertile when
/// its temperature reaches `fertile_temp`.
pub fn analyze(recent: &[DailyRecord], fertile_temp: f64) -> Analysis {
    if recent.is_empty() {
        return Analysis::default();
    }

    let (fertile, infertile): (Vec<&DailyRecord>, Vec<&DailyRecord>) =
        recent.iter().partition(|r| r.temperature >= fertile_temp);
    let total: f64 = recent.iter().map(|r| r.temperature).sum();

    Analysis {
        average_temp: round_to(total / recent.len() as f64, 2),
        fertile_days: fertile.iter().map(|r| r.cycle_day).collect(),
        infertile_days: infertile.iter().map(|r| r.cycle_day).collect(),
        day_count: recent.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::renumber::tests::rec;

    #[test]
    fn empty_window_gives_zeroed_summary() {
        let out = analyze(&[], 98.0);
        assert_eq!(out, Analysis::default());

        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["average_temp"], 0.0);
        assert_eq!(json["fertile_days"], serde_json::json!([]));
        assert_eq!(json["infertile_days"], serde_json::json!([]));
        assert_eq!(json["day_count"], 0);
    }

    #[test]
    fn classifies_by_threshold() {
        let records = vec![
            rec(1, "2024-01-01", 98.0, true, 1),
            rec(2, "2024-01-02", 98.3, false, 2),
            rec(3, "2024-01-03", 97.4, false, 3),
        ];
        let out = analyze(&records, 98.0);
        assert_eq!(out.fertile_days, vec![1, 2]);
        assert_eq!(out.infertile_days, vec![3]);
        assert_eq!(out.average_temp, 97.9);
        assert_eq!(out.day_count, 3);
    }

    #[test]
    fn window_takes_latest_dates() {
        let records = vec![
            rec(3, "2024-01-03", 97.4, false, 3),
            rec(1, "2024-01-01", 98.0, true, 1),
            rec(2, "2024-01-02", 98.3, false, 2),
        ];
        let window = recent_window(&records, 2);
        assert_eq!(window.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(recent_window(&records, 10).len(), 3);
    }
}
