//! Ties the cycle engine to a [`RecordStore`].
//!
//! Every operation reads a fresh snapshot. Writes that touch more than one row
//! (anything that moves a period) run inside a single store transaction: the
//! snapshot is read, the engine computes the new cycle days, cycle records and
//! counter, and all of it is written back before the commit. An error anywhere
//! drops the transaction and nothing is applied.

use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::Clock;
use crate::engine::{self, cycles::DEFAULT_CYCLE_LENGTH, Dedup, EngineError};
use crate::models::{
    Analysis, AnalyticsReport, ChartData, CurrentCycleData, CycleAnalytics, CycleOverview, DailyRecord,
    NewDailyRecord, RecordPatch, Recorded, RepairReport, Settings, SyncReport, TemperatureEntry,
};
use crate::store::{RecordStore, StoreError, StoreTx};

/// Cycle records listed by the overview.
const OVERVIEW_LIMIT: usize = 12;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChartSelection {
    All,
    Cycle(i64),
}

#[derive(Clone)]
pub struct Tracker {
    store: Arc<dyn RecordStore>,
    settings: Arc<RwLock<Settings>>,
    clock: Clock,
}

fn validate_temperature(value: f64) -> Result<(), TrackerError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TrackerError::Invalid("Invalid temperature value".into()))
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Renumbers every record, rebuilds the cycle records and resets the counter.
async fn resync(tx: &mut dyn StoreTx, records: &[DailyRecord], today: NaiveDate) -> Result<SyncReport, TrackerError> {
    let renumbered = engine::renumber(records, today)?;
    let spans = engine::rebuild_cycle_records(&engine::period_dates(records), today)?;
    let changed = engine::changed_days(records, &renumbered);

    tx.set_cycle_days(&changed).await?;
    tx.replace_cycle_records(&spans).await?;
    tx.set_day_counter(renumbered.day_counter).await?;

    tracing::info!(
        "🔁 Renumbered {} records across {} cycles, current day {}",
        changed.len(),
        spans.len(),
        renumbered.day_counter
    );

    Ok(SyncReport {
        records_updated: changed.len(),
        cycles_processed: spans.len(),
        current_day: renumbered.day_counter,
    })
}

/// Like [`resync`], but with no period left the cycle records are cleared and
/// the counter is left alone.
async fn resync_or_clear(
    tx: &mut dyn StoreTx,
    records: &[DailyRecord],
    today: NaiveDate,
    day_counter: i32,
) -> Result<SyncReport, TrackerError> {
    match resync(tx, records, today).await {
        Err(TrackerError::Engine(EngineError::NoPeriodData)) => {
            tracing::debug!("no period day left, clearing cycle records");
            tx.replace_cycle_records(&[]).await?;
            Ok(SyncReport { records_updated: 0, cycles_processed: 0, current_day: day_counter })
        }
        other => other,
    }
}

fn build_chart(records: &[&DailyRecord], fertile_temp: f64) -> ChartData {
    let days: Vec<i32> = records.iter().map(|r| r.cycle_day).collect();
    let temperatures: Vec<f64> = records.iter().map(|r| r.temperature).collect();
    let is_period: Vec<bool> = records.iter().map(|r| r.is_period).collect();
    let window = engine::estimate_fertile_window(&days, &temperatures, fertile_temp);

    ChartData {
        period_days: records.iter().filter(|r| r.is_period).map(|r| r.cycle_day).collect(),
        dates: records.iter().map(|r| r.date).collect(),
        fertile_threshold: fertile_temp,
        x_axis: days.clone(),
        temp_data: temperatures.clone(),
        days,
        temperatures,
        is_period,
        fertile_days: window.fertile_days,
        ovulation_day: window.ovulation_day,
    }
}

impl Tracker {
    /// Loads the settings row, seeding the defaults when there is none.
    pub async fn load(store: Arc<dyn RecordStore>, clock: Clock) -> Result<Self, StoreError> {
        let settings = match store.load_settings().await? {
            Some(settings) => settings,
            None => {
                let settings = Settings::default();
                store.save_settings(&settings).await?;
                tracing::info!("⚙️ Seeded default settings");
                settings
            }
        };

        Ok(Self {
            store,
            settings: Arc::new(RwLock::new(settings)),
            clock,
        })
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub async fn settings(&self) -> Settings {
        self.settings.read().await.clone()
    }

    pub async fn update_settings(&self, settings: Settings) -> Result<Settings, TrackerError> {
        settings.validate().map_err(TrackerError::Invalid)?;

        let mut current = self.settings.write().await;
        self.store.save_settings(&settings).await?;
        *current = settings.clone();

        tracing::info!("⚙️ Settings updated: {:?}", settings);
        Ok(settings)
    }

    pub async fn add_temperature(&self, entry: TemperatureEntry) -> Result<Recorded, TrackerError> {
        let today = self.today();
        let date = entry.date.unwrap_or(today);
        if date > today {
            return Err(TrackerError::Invalid("Cannot record a temperature for a future date".into()));
        }
        validate_temperature(entry.temperature)?;

        let mut tx = self.store.begin().await?;
        let before = tx.snapshot().await?;
        let existing = before.records_on(date);
        if existing.len() > 1 {
            return Err(EngineError::DuplicateDate(date).into());
        }

        let (id, created) = match existing.first() {
            Some(row) => {
                let patch = RecordPatch {
                    temperature: Some(entry.temperature),
                    is_period: Some(entry.is_period),
                    mucus_type: entry.mucus_type,
                    mood: entry.mood,
                    comment: entry.comment,
                };
                (tx.update_record(row.id, &patch).await?.id, false)
            }
            None => {
                let mut periods = engine::period_dates(&before.records);
                if entry.is_period {
                    periods.push(date);
                    periods.sort();
                }
                let cycle_day = engine::cycle_day_on(date, &periods).unwrap_or(before.day_counter.max(1));
                let row = tx
                    .insert_record(NewDailyRecord {
                        date,
                        temperature: entry.temperature,
                        is_period: entry.is_period,
                        cycle_day,
                        mucus_type: entry.mucus_type,
                        mood: entry.mood,
                        comment: entry.comment,
                    })
                    .await?;
                (row.id, true)
            }
        };

        let after = tx.snapshot().await?;
        let current_day = if engine::period_dates(&after.records).is_empty() {
            tx.replace_cycle_records(&[]).await?;
            if created {
                let next = before.day_counter.max(1) + 1;
                tx.set_day_counter(next).await?;
                next
            } else {
                before.day_counter
            }
        } else {
            resync(tx.as_mut(), &after.records, today).await?.current_day
        };

        let record = tx
            .snapshot()
            .await?
            .records
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound)?;
        tx.commit().await?;

        tracing::info!(
            "🌡️ Recorded {:.2} for {} (cycle day {}, period: {})",
            record.temperature,
            record.date,
            record.cycle_day,
            record.is_period
        );
        Ok(Recorded { record, created, current_day })
    }

    pub async fn update_record(&self, date: NaiveDate, patch: RecordPatch) -> Result<DailyRecord, TrackerError> {
        if patch.is_empty() {
            return Err(TrackerError::Invalid("No fields to update".into()));
        }
        if let Some(t) = patch.temperature {
            validate_temperature(t)?;
        }

        let mut tx = self.store.begin().await?;
        let snapshot = tx.snapshot().await?;
        let id = match snapshot.records_on(date).as_slice() {
            [] => return Err(TrackerError::NotFound(format!("No record found for {}", date))),
            [row] => row.id,
            _ => return Err(EngineError::DuplicateDate(date).into()),
        };

        let record = tx.update_record(id, &patch).await?;
        tx.commit().await?;
        Ok(record)
    }

    pub async fn delete_record(&self, date: NaiveDate) -> Result<SyncReport, TrackerError> {
        let mut tx = self.store.begin().await?;
        let before = tx.snapshot().await?;
        let ids: Vec<i64> = before.records_on(date).iter().map(|r| r.id).collect();
        if ids.is_empty() {
            return Err(TrackerError::NotFound(format!("No record found for {}", date)));
        }

        tx.delete_records(&ids).await?;
        let after = tx.snapshot().await?;
        let report = resync_or_clear(tx.as_mut(), &after.records, self.today(), before.day_counter).await?;
        tx.commit().await?;

        tracing::info!("🗑️ Deleted {} record(s) for {}", ids.len(), date);
        Ok(report)
    }

    /// Newest first.
    pub async fn history(&self) -> Result<Vec<DailyRecord>, TrackerError> {
        let mut records = self.store.snapshot().await?.records;
        records.reverse();
        Ok(records)
    }

    /// Flags or unflags the most recent record on the given cycle day as a
    /// period start, then renumbers everything it affects.
    pub async fn mark_period(&self, cycle_day: i32, is_period: bool) -> Result<(NaiveDate, SyncReport), TrackerError> {
        let mut tx = self.store.begin().await?;
        let before = tx.snapshot().await?;
        let target = before
            .records
            .iter()
            .filter(|r| r.cycle_day == cycle_day)
            .max_by_key(|r| (r.date, r.id))
            .ok_or_else(|| TrackerError::NotFound(format!("No record found for cycle day {}", cycle_day)))?;
        let date = target.date;

        let patch = RecordPatch { is_period: Some(is_period), ..RecordPatch::default() };
        tx.update_record(target.id, &patch).await?;

        let after = tx.snapshot().await?;
        let report = resync_or_clear(tx.as_mut(), &after.records, self.today(), before.day_counter).await?;
        tx.commit().await?;
        Ok((date, report))
    }

    pub async fn reset_cycle(&self) -> Result<i32, TrackerError> {
        let mut tx = self.store.begin().await?;
        tx.set_day_counter(1).await?;
        tx.commit().await?;
        tracing::info!("↩️ Cycle counter reset");
        Ok(1)
    }

    pub async fn synchronize(&self) -> Result<SyncReport, TrackerError> {
        let mut tx = self.store.begin().await?;
        let snapshot = tx.snapshot().await?;
        let report = resync(tx.as_mut(), &snapshot.records, self.today()).await?;
        tx.commit().await?;
        Ok(report)
    }

    /// Removes duplicate dates (keeping the earliest insert), then renumbers
    /// and rebuilds the cycle records from what is left.
    pub async fn repair(&self) -> Result<RepairReport, TrackerError> {
        let today = self.today();
        let mut tx = self.store.begin().await?;
        let snapshot = tx.snapshot().await?;

        let Dedup { kept, discarded } = engine::dedupe(&snapshot.records);
        let ids: Vec<i64> = discarded.iter().map(|r| r.id).collect();
        if !ids.is_empty() {
            tx.delete_records(&ids).await?;
            tracing::warn!("🧹 Removed {} duplicate records", ids.len());
        }

        let report = match engine::period_dates(&kept).first() {
            Some(&first) => {
                let sync = resync(tx.as_mut(), &kept, today).await?;
                RepairReport {
                    duplicates_removed: ids.len(),
                    records_updated: sync.records_updated,
                    cycles_processed: sync.cycles_processed,
                    missing_dates: engine::missing_dates(&kept, first, today),
                    current_day: sync.current_day,
                }
            }
            None => {
                tracing::debug!("no period day recorded, repair limited to duplicates");
                tx.replace_cycle_records(&[]).await?;
                RepairReport {
                    duplicates_removed: ids.len(),
                    records_updated: 0,
                    cycles_processed: 0,
                    missing_dates: vec![],
                    current_day: snapshot.day_counter,
                }
            }
        };

        tx.commit().await?;
        Ok(report)
    }

    /// Threshold summary of the `limit` most recent records (defaults to the
    /// configured cycle length).
    pub async fn analysis(&self, limit: Option<usize>) -> Result<Analysis, TrackerError> {
        let settings = self.settings().await;
        let snapshot = self.store.snapshot().await?;
        let limit = limit.unwrap_or(settings.cycle_length.max(1) as usize);
        let recent = engine::recent_window(&snapshot.records, limit);
        Ok(engine::analyze(&recent, settings.fertile_temp))
    }

    pub async fn chart_data(&self, selection: ChartSelection) -> Result<ChartData, TrackerError> {
        let settings = self.settings().await;
        let snapshot = self.store.snapshot().await?;

        let records: Vec<&DailyRecord> = match selection {
            ChartSelection::All => snapshot.records.iter().collect(),
            ChartSelection::Cycle(id) => {
                let cycle = snapshot
                    .cycles
                    .iter()
                    .find(|c| c.id == id)
                    .ok_or_else(|| TrackerError::NotFound(format!("Cycle {} not found", id)))?;
                let rows: Vec<&DailyRecord> = snapshot
                    .records
                    .iter()
                    .filter(|r| r.date >= cycle.start_date && r.date <= cycle.end_date)
                    .collect();
                if rows.is_empty() {
                    return Err(TrackerError::NotFound("No data available for this cycle".into()));
                }
                rows
            }
        };

        Ok(build_chart(&records, settings.fertile_temp))
    }

    pub async fn current_cycle(&self) -> Result<CurrentCycleData, TrackerError> {
        let settings = self.settings().await;
        let snapshot = self.store.snapshot().await?;
        let start = engine::period_dates(&snapshot.records)
            .last()
            .copied()
            .ok_or_else(|| TrackerError::NotFound("No period recorded yet".into()))?;

        let records: Vec<&DailyRecord> = snapshot.records.iter().filter(|r| r.date >= start).collect();
        let chart = build_chart(&records, settings.fertile_temp);
        let min_temp = chart.temperatures.iter().copied().fold(f64::INFINITY, f64::min);
        let max_temp = chart.temperatures.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Ok(CurrentCycleData {
            mucus_types: records.iter().map(|r| r.mucus_type.clone()).collect(),
            moods: records.iter().map(|r| r.mood.clone()).collect(),
            comments: records.iter().map(|r| r.comment.clone()).collect(),
            current_day: snapshot.day_counter,
            min_temp,
            max_temp,
            cycle_start_date: start,
            days: chart.days,
            temperatures: chart.temperatures,
            dates: chart.dates,
            is_period: chart.is_period,
            fertile_days: chart.fertile_days,
            fertile_threshold: chart.fertile_threshold,
            ovulation_day: chart.ovulation_day,
        })
    }

    pub async fn cycles_overview(&self) -> Result<CycleOverview, TrackerError> {
        let snapshot = self.store.snapshot().await?;
        let durations: Vec<i32> = snapshot.cycles.iter().map(|c| c.duration).collect();
        let avg_cycle_length = engine::average_cycle_length(&durations)
            .map(|avg| avg.round() as i64)
            .unwrap_or(DEFAULT_CYCLE_LENGTH);

        let mut cycle_records = snapshot.cycles;
        cycle_records.reverse();
        cycle_records.truncate(OVERVIEW_LIMIT);

        Ok(CycleOverview {
            cycle_records,
            avg_cycle_length,
            day_counter: snapshot.day_counter,
        })
    }

    pub async fn cycle_analytics(&self) -> Result<AnalyticsReport, TrackerError> {
        let settings = self.settings().await;
        let snapshot = self.store.snapshot().await?;

        if snapshot.cycles.is_empty() {
            let half = DEFAULT_CYCLE_LENGTH as f64 / 2.0;
            return Ok(AnalyticsReport {
                message: Some("No cycle data available".into()),
                cycles: vec![],
                average_cycle_length: DEFAULT_CYCLE_LENGTH as f64,
                average_fertile_temp: settings.fertile_temp,
                average_follicular_length: half,
                average_luteal_length: half,
            });
        }

        let mut cycles = Vec::new();
        let (mut follicular_total, mut luteal_total) = (0i64, 0i64);
        for cycle in &snapshot.cycles {
            let rows: Vec<&DailyRecord> = snapshot
                .records
                .iter()
                .filter(|r| r.date >= cycle.start_date && r.date <= cycle.end_date)
                .collect();
            let days: Vec<i32> = rows.iter().map(|r| r.cycle_day).collect();
            let temperatures: Vec<f64> = rows.iter().map(|r| r.temperature).collect();

            let ovulation_day = engine::fertile::detect_temperature_shift(&days, &temperatures)
                .ok()
                .flatten();
            let (follicular, luteal) = engine::phase_split(cycle.duration, ovulation_day);
            follicular_total += follicular as i64;
            luteal_total += luteal as i64;

            if rows.is_empty() {
                continue;
            }
            cycles.push(CycleAnalytics {
                id: cycle.id,
                start_date: cycle.start_date,
                end_date: cycle.end_date,
                duration: cycle.duration,
                follicular_phase_length: follicular,
                luteal_phase_length: luteal,
                ovulation_day,
                temperature_shift: engine::temperature_shift(&temperatures),
                dates: rows.iter().map(|r| r.date).collect(),
                average_temp: engine::round_to(mean(&temperatures), 2),
                temperatures,
            });
        }

        let count = snapshot.cycles.len() as f64;
        let durations: Vec<i32> = snapshot.cycles.iter().map(|c| c.duration).collect();
        let average = engine::average_cycle_length(&durations).unwrap_or(DEFAULT_CYCLE_LENGTH as f64);

        Ok(AnalyticsReport {
            message: None,
            cycles,
            average_cycle_length: engine::round_to(average, 1),
            average_fertile_temp: settings.fertile_temp,
            average_follicular_length: engine::round_to(follicular_total as f64 / count, 1),
            average_luteal_length: engine::round_to(luteal_total as f64 / count, 1),
        })
    }
}
