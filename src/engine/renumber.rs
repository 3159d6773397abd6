use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use super::EngineError;
use crate::models::DailyRecord;

/// Cycle day assignments produced by one renumbering pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Renumbered {
    pub cycle_days: BTreeMap<NaiveDate, i32>,
    /// Cycle day of `today` in the latest cycle.
    pub day_counter: i32,
}

/// Split of a snapshot into the rows to keep and the duplicates to drop.
#[derive(Debug, Clone, PartialEq)]
pub struct Dedup {
    pub kept: Vec<DailyRecord>,
    pub discarded: Vec<DailyRecord>,
}

pub fn days_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to - from).num_days() as i32
}

/// Sorted, distinct dates of all period-flagged records.
pub fn period_dates(records: &[DailyRecord]) -> Vec<NaiveDate> {
    records
        .iter()
        .filter(|r| r.is_period)
        .map(|r| r.date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Cycle day of `date` counted from the latest period on or before it.
/// `periods` must be sorted ascending.
pub fn cycle_day_on(date: NaiveDate, periods: &[NaiveDate]) -> Option<i32> {
    let idx = periods.partition_point(|p| *p <= date);
    idx.checked_sub(1)
        .map(|i| days_between(periods[i], date) + 1)
}

pub fn ensure_unique_dates(records: &[DailyRecord]) -> Result<(), EngineError> {
    let mut seen = BTreeSet::new();
    for r in records {
        if !seen.insert(r.date) {
            return Err(EngineError::DuplicateDate(r.date));
        }
    }
    Ok(())
}

/// Keeps the earliest-inserted (lowest id) record for every date.
pub fn dedupe(records: &[DailyRecord]) -> Dedup {
    let mut by_date: BTreeMap<NaiveDate, Vec<&DailyRecord>> = BTreeMap::new();
    for r in records {
        by_date.entry(r.date).or_default().push(r);
    }

    let mut kept = Vec::with_capacity(by_date.len());
    let mut discarded = Vec::new();
    for (_, mut group) in by_date {
        group.sort_by_key(|r| r.id);
        let mut rows = group.into_iter();
        if let Some(first) = rows.next() {
            kept.push(first.clone());
        }
        discarded.extend(rows.cloned());
    }

    Dedup { kept, discarded }
}

/// Recomputes `cycle_day` for every record dated from the first period up to
/// and including `today`. Earlier and later records are left out of the result.
pub fn renumber(records: &[DailyRecord], today: NaiveDate) -> Result<Renumbered, EngineError> {
    ensure_unique_dates(records)?;

    let periods = period_dates(records);
    let (Some(&first), Some(&last)) = (periods.first(), periods.last()) else {
        return Err(EngineError::NoPeriodData);
    };
    if last > today {
        return Err(EngineError::InvalidRange { start: last, end: today });
    }

    let cycle_days = records
        .iter()
        .filter(|r| r.date >= first && r.date <= today)
        .filter_map(|r| cycle_day_on(r.date, &periods).map(|day| (r.date, day)))
        .collect();

    Ok(Renumbered {
        cycle_days,
        day_counter: days_between(last, today) + 1,
    })
}

/// The `(date, cycle_day)` pairs that differ from what the snapshot holds.
pub fn changed_days(records: &[DailyRecord], renumbered: &Renumbered) -> Vec<(NaiveDate, i32)> {
    records
        .iter()
        .filter_map(|r| match renumbered.cycle_days.get(&r.date) {
            Some(&day) if day != r.cycle_day => Some((r.date, day)),
            _ => None,
        })
        .collect()
}

/// Calendar dates in `[from, to]` with no record.
pub fn missing_dates(records: &[DailyRecord], from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let present: BTreeSet<_> = records.iter().map(|r| r.date).collect();
    from.iter_days()
        .take_while(|d| *d <= to)
        .filter(|d| !present.contains(d))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    pub fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    pub fn rec(id: i64, date: &str, temperature: f64, is_period: bool, cycle_day: i32) -> DailyRecord {
        DailyRecord {
            id,
            date: d(date),
            temperature,
            is_period,
            cycle_day,
            mucus_type: None,
            mood: None,
            comment: None,
        }
    }

    #[test]
    fn day_fifteen_between_two_periods() {
        let records = vec![
            rec(1, "2024-01-01", 97.6, true, 1),
            rec(2, "2024-01-15", 97.9, false, 99),
            rec(3, "2024-01-29", 97.5, true, 1),
        ];
        let out = renumber(&records, d("2024-02-02")).unwrap();
        assert_eq!(out.cycle_days[&d("2024-01-15")], 15);
        assert_eq!(out.cycle_days[&d("2024-01-29")], 1);
        assert_eq!(out.day_counter, 5);
    }

    #[test]
    fn records_before_first_period_are_left_alone() {
        let records = vec![
            rec(1, "2024-01-01", 97.6, false, 7),
            rec(2, "2024-01-05", 97.6, true, 8),
            rec(3, "2024-01-06", 97.6, false, 9),
        ];
        let out = renumber(&records, d("2024-01-06")).unwrap();
        assert!(!out.cycle_days.contains_key(&d("2024-01-01")));
        assert_eq!(out.cycle_days[&d("2024-01-06")], 2);

        let changed = changed_days(&records, &out);
        assert_eq!(changed, vec![(d("2024-01-05"), 1), (d("2024-01-06"), 2)]);
    }

    #[test]
    fn records_after_today_are_not_renumbered() {
        let records = vec![
            rec(1, "2024-01-01", 97.6, true, 1),
            rec(2, "2024-01-10", 97.6, false, 4),
        ];
        let out = renumber(&records, d("2024-01-05")).unwrap();
        assert_eq!(out.cycle_days.len(), 1);
        assert_eq!(out.day_counter, 5);
    }

    #[test]
    fn unordered_input_is_handled() {
        let records = vec![
            rec(3, "2024-02-03", 97.6, false, 0),
            rec(1, "2024-01-01", 97.6, true, 1),
            rec(2, "2024-02-01", 97.6, true, 1),
        ];
        let out = renumber(&records, d("2024-02-03")).unwrap();
        assert_eq!(out.cycle_days[&d("2024-02-03")], 3);
    }

    #[test]
    fn no_period_is_an_error() {
        let records = vec![rec(1, "2024-01-01", 97.6, false, 1)];
        assert_eq!(renumber(&records, d("2024-01-02")), Err(EngineError::NoPeriodData));
    }

    #[test]
    fn period_after_today_is_an_invalid_range() {
        let records = vec![rec(1, "2024-01-10", 97.6, true, 1)];
        assert_eq!(
            renumber(&records, d("2024-01-02")),
            Err(EngineError::InvalidRange { start: d("2024-01-10"), end: d("2024-01-02") })
        );
    }

    #[test]
    fn duplicates_block_renumbering_until_repaired() {
        let records = vec![
            rec(1, "2024-03-01", 97.6, true, 1),
            rec(2, "2024-03-01", 98.1, false, 1),
            rec(3, "2024-03-02", 97.7, false, 2),
        ];
        assert_eq!(
            renumber(&records, d("2024-03-02")),
            Err(EngineError::DuplicateDate(d("2024-03-01")))
        );

        let Dedup { kept, discarded } = dedupe(&records);
        assert_eq!(kept.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(discarded.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2]);
        assert!(renumber(&kept, d("2024-03-02")).is_ok());
    }

    #[test]
    fn dedupe_keeps_lowest_id_regardless_of_order() {
        let records = vec![
            rec(9, "2024-03-01", 98.1, false, 1),
            rec(4, "2024-03-01", 97.6, true, 1),
        ];
        let out = dedupe(&records);
        assert_eq!(out.kept[0].id, 4);
        assert_eq!(out.discarded[0].id, 9);
    }

    #[test]
    fn finds_gaps() {
        let records = vec![
            rec(1, "2024-01-01", 97.6, true, 1),
            rec(2, "2024-01-03", 97.6, false, 3),
        ];
        assert_eq!(
            missing_dates(&records, d("2024-01-01"), d("2024-01-04")),
            vec![d("2024-01-02"), d("2024-01-04")]
        );
    }

    proptest! {
        #[test]
        fn cycle_day_counts_from_latest_period(
            offsets in proptest::collection::btree_set(0i64..120, 1..60),
            period_mask in proptest::collection::vec(any::<bool>(), 60),
        ) {
            let base = d("2024-01-01");
            let records: Vec<DailyRecord> = offsets
                .iter()
                .enumerate()
                .map(|(i, off)| DailyRecord {
                    id: i as i64,
                    date: base + chrono::Duration::days(*off),
                    temperature: 97.5,
                    is_period: period_mask[i],
                    cycle_day: 1,
                    mucus_type: None,
                    mood: None,
                    comment: None,
                })
                .collect();
            let today = base + chrono::Duration::days(130);
            let periods: Vec<NaiveDate> =
                records.iter().filter(|r| r.is_period).map(|r| r.date).collect();

            match renumber(&records, today) {
                Err(EngineError::NoPeriodData) => prop_assert!(periods.is_empty()),
                Err(e) => prop_assert!(false, "unexpected error {e}"),
                Ok(out) => {
                    let first = periods[0];
                    for r in records.iter().filter(|r| r.date >= first) {
                        let latest = periods.iter().filter(|p| **p <= r.date).max().unwrap();
                        let expected = (r.date - *latest).num_days() as i32 + 1;
                        prop_assert_eq!(out.cycle_days[&r.date], expected);
                    }
                    let last = *periods.last().unwrap();
                    prop_assert_eq!(out.day_counter, (today - last).num_days() as i32 + 1);
                }
            }
        }
    }
}
