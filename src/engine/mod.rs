//! Cycle engine: pure computations over read snapshots of daily records.
//!
//! Nothing in here touches storage. Callers hand in records (in any order)
//! and get back the values to persist or display.

pub mod analysis;
pub mod cycles;
mod error;
pub mod fertile;
pub mod renumber;

pub use analysis::{analyze, recent_window};
pub use cycles::{average_cycle_length, phase_split, rebuild_cycle_records, round_to, temperature_shift};
pub use error::EngineError;
pub use fertile::estimate_fertile_window;
pub use renumber::{changed_days, cycle_day_on, dedupe, missing_dates, period_dates, renumber, Dedup};
