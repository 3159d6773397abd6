use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{RecordStore, Snapshot, StoreError, StoreTx};
use crate::models::{CycleRecord, CycleSpan, DailyRecord, NewDailyRecord, RecordPatch, Settings};

#[derive(Debug, Clone)]
struct Tables {
    records: Vec<DailyRecord>,
    cycles: Vec<CycleRecord>,
    day_counter: i32,
    settings: Option<Settings>,
    next_record_id: i64,
    next_cycle_id: i64,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            cycles: Vec::new(),
            day_counter: 1,
            settings: None,
            next_record_id: 1,
            next_cycle_id: 1,
        }
    }
}

impl Tables {
    fn snapshot(&self) -> Snapshot {
        let mut records = self.records.clone();
        records.sort_by_key(|r| (r.date, r.id));
        let mut cycles = self.cycles.clone();
        cycles.sort_by_key(|c| c.start_date);
        Snapshot { records, cycles, day_counter: self.day_counter }
    }
}

/// Process-local store. Transactions work on a copy of the tables and swap it
/// in on commit; the table lock is held until then.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with existing rows, duplicates included. Ids are kept
    /// as given so insertion order can be set up explicitly.
    #[cfg(test)]
    pub fn with_records(records: Vec<DailyRecord>) -> Self {
        let next_record_id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        Self {
            tables: Arc::new(Mutex::new(Tables {
                records,
                next_record_id,
                ..Tables::default()
            })),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(self.tables.lock().await.snapshot())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn load_settings(&self) -> Result<Option<Settings>, StoreError> {
        Ok(self.tables.lock().await.settings.clone())
    }

    async fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        self.tables.lock().await.settings = Some(settings.clone());
        Ok(())
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn snapshot(&mut self) -> Result<Snapshot, StoreError> {
        Ok(self.working.snapshot())
    }

    async fn insert_record(&mut self, record: NewDailyRecord) -> Result<DailyRecord, StoreError> {
        let row = DailyRecord {
            id: self.working.next_record_id,
            date: record.date,
            temperature: record.temperature,
            is_period: record.is_period,
            cycle_day: record.cycle_day,
            mucus_type: record.mucus_type,
            mood: record.mood,
            comment: record.comment,
        };
        self.working.next_record_id += 1;
        self.working.records.push(row.clone());
        Ok(row)
    }

    async fn update_record(&mut self, id: i64, patch: &RecordPatch) -> Result<DailyRecord, StoreError> {
        let row = self
            .working
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound)?;
        patch.apply_to(row);
        Ok(row.clone())
    }

    async fn delete_records(&mut self, ids: &[i64]) -> Result<u64, StoreError> {
        let before = self.working.records.len();
        self.working.records.retain(|r| !ids.contains(&r.id));
        Ok((before - self.working.records.len()) as u64)
    }

    async fn set_cycle_days(&mut self, days: &[(NaiveDate, i32)]) -> Result<(), StoreError> {
        for (date, day) in days {
            for row in self.working.records.iter_mut().filter(|r| r.date == *date) {
                row.cycle_day = *day;
            }
        }
        Ok(())
    }

    async fn replace_cycle_records(&mut self, spans: &[CycleSpan]) -> Result<(), StoreError> {
        let cycles = &mut self.working.cycles;
        cycles.retain(|c| spans.iter().any(|s| s.start_date == c.start_date));
        for span in spans {
            match cycles.iter_mut().find(|c| c.start_date == span.start_date) {
                Some(existing) => {
                    existing.end_date = span.end_date;
                    existing.duration = span.duration;
                }
                None => {
                    cycles.push(CycleRecord {
                        id: self.working.next_cycle_id,
                        start_date: span.start_date,
                        end_date: span.end_date,
                        duration: span.duration,
                    });
                    self.working.next_cycle_id += 1;
                }
            }
        }
        Ok(())
    }

    async fn set_day_counter(&mut self, value: i32) -> Result<(), StoreError> {
        self.working.day_counter = value;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::renumber::tests::{d, rec};

    fn new_record(date: &str) -> NewDailyRecord {
        NewDailyRecord {
            date: d(date),
            temperature: 97.7,
            is_period: false,
            cycle_day: 1,
            mucus_type: None,
            mood: None,
            comment: None,
        }
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_nothing_behind() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_record(new_record("2024-01-01")).await.unwrap();
            tx.set_day_counter(9).await.unwrap();
        }
        let snap = store.snapshot().await.unwrap();
        assert!(snap.records.is_empty());
        assert_eq!(snap.day_counter, 1);
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let first = tx.insert_record(new_record("2024-01-02")).await.unwrap();
        let second = tx.insert_record(new_record("2024-01-01")).await.unwrap();
        assert!(first.id < second.id);
        assert_eq!(tx.snapshot().await.unwrap().records.len(), 2);
        tx.commit().await.unwrap();

        let snap = store.snapshot().await.unwrap();
        assert_eq!(snap.records[0].date, d("2024-01-01"));
    }

    #[tokio::test]
    async fn cycle_records_upsert_by_start_date() {
        let store = MemoryStore::new();
        let span = |s: &str, e: &str, duration| CycleSpan { start_date: d(s), end_date: d(e), duration };

        let mut tx = store.begin().await.unwrap();
        tx.replace_cycle_records(&[span("2024-01-01", "2024-01-05", 5)]).await.unwrap();
        tx.commit().await.unwrap();
        let id = store.snapshot().await.unwrap().cycles[0].id;

        let mut tx = store.begin().await.unwrap();
        tx.replace_cycle_records(&[span("2024-01-01", "2024-01-28", 28), span("2024-01-29", "2024-02-01", 4)])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let cycles = store.snapshot().await.unwrap().cycles;
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].id, id);
        assert_eq!(cycles[0].duration, 28);

        let mut tx = store.begin().await.unwrap();
        tx.replace_cycle_records(&[span("2024-01-29", "2024-02-01", 4)]).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.snapshot().await.unwrap().cycles.len(), 1);
    }

    #[tokio::test]
    async fn seeded_duplicates_are_kept() {
        let store = MemoryStore::with_records(vec![
            rec(1, "2024-03-01", 97.6, true, 1),
            rec(2, "2024-03-01", 98.0, false, 1),
        ]);
        let snap = store.snapshot().await.unwrap();
        assert_eq!(snap.records_on(d("2024-03-01")).len(), 2);

        let mut tx = store.begin().await.unwrap();
        let row = tx.insert_record(new_record("2024-03-02")).await.unwrap();
        assert_eq!(row.id, 3);
    }
}
