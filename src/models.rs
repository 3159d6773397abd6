use serde::{Deserialize, Serialize};
use chrono::NaiveDate;

/// One daily entry. `date` is the logical key; `id` records insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct DailyRecord {
    pub id: i64,
    pub date: NaiveDate,
    pub temperature: f64,
    pub is_period: bool,
    pub cycle_day: i32,
    pub mucus_type: Option<String>,
    pub mood: Option<String>,
    pub comment: Option<String>,
}

/// A reading as entered by the user. `date` defaults to today.
#[derive(Debug, Clone, Deserialize)]
pub struct TemperatureEntry {
    pub temperature: f64,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub is_period: bool,
    pub mucus_type: Option<String>,
    pub mood: Option<String>,
    pub comment: Option<String>,
}

/// Fields of a record before the store has assigned it an id.
#[derive(Debug, Clone)]
pub struct NewDailyRecord {
    pub date: NaiveDate,
    pub temperature: f64,
    pub is_period: bool,
    pub cycle_day: i32,
    pub mucus_type: Option<String>,
    pub mood: Option<String>,
    pub comment: Option<String>,
}

/// Partial update of a record's user-editable fields.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub temperature: Option<f64>,
    pub is_period: Option<bool>,
    pub mucus_type: Option<String>,
    pub mood: Option<String>,
    pub comment: Option<String>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.is_period.is_none()
            && self.mucus_type.is_none()
            && self.mood.is_none()
            && self.comment.is_none()
    }

    pub fn apply_to(&self, record: &mut DailyRecord) {
        if let Some(t) = self.temperature {
            record.temperature = t;
        }
        if let Some(p) = self.is_period {
            record.is_period = p;
        }
        if let Some(m) = &self.mucus_type {
            record.mucus_type = Some(m.clone());
        }
        if let Some(m) = &self.mood {
            record.mood = Some(m.clone());
        }
        if let Some(c) = &self.comment {
            record.comment = Some(c.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CycleRecord {
    pub id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration: i32,
}

/// A cycle as derived from the period dates, before it is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSpan {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Settings {
    pub fertile_temp: f64,
    pub cycle_length: i32,
    pub temperature_unit: String,
    pub shortest_cycle: i32,
    pub longest_cycle: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fertile_temp: 98.0,
            cycle_length: 28,
            temperature_unit: "F".into(),
            shortest_cycle: 28,
            longest_cycle: 32,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), String> {
        if !self.fertile_temp.is_finite() || self.fertile_temp <= 0.0 {
            return Err("Fertile temperature must be a positive number".into());
        }
        if self.cycle_length < 1 || self.shortest_cycle < 1 || self.longest_cycle < 1 {
            return Err("Cycle lengths must be at least 1 day".into());
        }
        if self.shortest_cycle > self.longest_cycle {
            return Err("Shortest cycle cannot be longer than the longest cycle".into());
        }
        if self.temperature_unit != "F" && self.temperature_unit != "C" {
            return Err("Temperature unit must be F or C".into());
        }
        Ok(())
    }
}

/// Recent-window threshold summary. Always fully populated, even when empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub average_temp: f64,
    pub fertile_days: Vec<i32>,
    pub infertile_days: Vec<i32>,
    pub day_count: usize,
}

impl Default for Analysis {
    fn default() -> Self {
        Self {
            average_temp: 0.0,
            fertile_days: vec![],
            infertile_days: vec![],
            day_count: 0,
        }
    }
}

/// Chart payload. Carries both the legacy and the newer field names the
/// charting code reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub days: Vec<i32>,
    pub temperatures: Vec<f64>,
    pub dates: Vec<NaiveDate>,
    pub period_days: Vec<i32>,
    pub fertile_threshold: f64,
    pub x_axis: Vec<i32>,
    pub temp_data: Vec<f64>,
    pub is_period: Vec<bool>,
    pub fertile_days: Vec<i32>,
    pub ovulation_day: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentCycleData {
    pub days: Vec<i32>,
    pub temperatures: Vec<f64>,
    pub dates: Vec<NaiveDate>,
    pub is_period: Vec<bool>,
    pub mucus_types: Vec<Option<String>>,
    pub moods: Vec<Option<String>>,
    pub comments: Vec<Option<String>>,
    pub current_day: i32,
    pub fertile_days: Vec<i32>,
    pub fertile_threshold: f64,
    pub ovulation_day: Option<i32>,
    pub min_temp: f64,
    pub max_temp: f64,
    pub cycle_start_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleOverview {
    pub cycle_records: Vec<CycleRecord>,
    pub avg_cycle_length: i64,
    pub day_counter: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleAnalytics {
    pub id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration: i32,
    pub follicular_phase_length: i32,
    pub luteal_phase_length: i32,
    pub ovulation_day: Option<i32>,
    pub temperature_shift: f64,
    pub dates: Vec<NaiveDate>,
    pub temperatures: Vec<f64>,
    pub average_temp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub cycles: Vec<CycleAnalytics>,
    pub average_cycle_length: f64,
    pub average_fertile_temp: f64,
    pub average_follicular_length: f64,
    pub average_luteal_length: f64,
}

/// Outcome of the repair operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepairReport {
    pub duplicates_removed: usize,
    pub records_updated: usize,
    pub cycles_processed: usize,
    pub missing_dates: Vec<NaiveDate>,
    pub current_day: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub records_updated: usize,
    pub cycles_processed: usize,
    pub current_day: i32,
}

/// Result of recording a reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recorded {
    pub record: DailyRecord,
    pub created: bool,
    pub current_day: i32,
}
