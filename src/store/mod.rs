//! Persistence capability for daily records, cycle records, the cycle day
//! counter and the settings row.
//!
//! Reads go through [`RecordStore::snapshot`] on every operation; nothing is
//! cached between calls. Anything that writes more than one row goes through a
//! [`StoreTx`], which is rolled back when dropped without [`StoreTx::commit`].

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{CycleRecord, CycleSpan, DailyRecord, NewDailyRecord, RecordPatch, Settings};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("record not found")]
    NotFound,
}

/// Point-in-time copy of everything the engine reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Sorted by date, then insertion order.
    pub records: Vec<DailyRecord>,
    /// Sorted by start date.
    pub cycles: Vec<CycleRecord>,
    pub day_counter: i32,
}

impl Snapshot {
    pub fn records_on(&self, date: NaiveDate) -> Vec<&DailyRecord> {
        self.records.iter().filter(|r| r.date == date).collect()
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn snapshot(&self) -> Result<Snapshot, StoreError>;

    /// Opens a write transaction. Only one is open at a time.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;

    async fn load_settings(&self) -> Result<Option<Settings>, StoreError>;

    async fn save_settings(&self, settings: &Settings) -> Result<(), StoreError>;
}

#[async_trait]
pub trait StoreTx: Send {
    /// Reads the transaction's view, including its own uncommitted writes.
    async fn snapshot(&mut self) -> Result<Snapshot, StoreError>;

    async fn insert_record(&mut self, record: NewDailyRecord) -> Result<DailyRecord, StoreError>;

    async fn update_record(&mut self, id: i64, patch: &RecordPatch) -> Result<DailyRecord, StoreError>;

    /// Returns the number of rows removed.
    async fn delete_records(&mut self, ids: &[i64]) -> Result<u64, StoreError>;

    /// Sets `cycle_day` on every record with the given date.
    async fn set_cycle_days(&mut self, days: &[(NaiveDate, i32)]) -> Result<(), StoreError>;

    /// Upserts by start date and removes cycle records whose start date is not
    /// among `spans`.
    async fn replace_cycle_records(&mut self, spans: &[CycleSpan]) -> Result<(), StoreError>;

    async fn set_day_counter(&mut self, value: i32) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
