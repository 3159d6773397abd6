use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{PgConnection, Postgres, Transaction};

use super::{RecordStore, Snapshot, StoreError, StoreTx};
use crate::models::{CycleRecord, CycleSpan, DailyRecord, NewDailyRecord, RecordPatch, Settings};

/// Advisory lock key held for the lifetime of every write transaction.
const RENUMBER_LOCK: i64 = 0x6262_745f_6379;

const RECORD_COLUMNS: &str = "id, date, temperature, is_period, cycle_day, mucus_type, mood, comment";

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        if let Some(db_err) = e.as_database_error() {
            tracing::error!("❌ {} failed: {}", context, db_err.message());

            if let Some(code) = db_err.code() {
                tracing::info!("ℹ️ SQLSTATE code: {}", code);
            }

            if let Some(constraint) = db_err.constraint() {
                tracing::info!("🔒 Constraint violated: {}", constraint);
            }
        } else {
            tracing::error!("❌ {} failed: {}", context, e);
        }
        StoreError::Database(e)
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(db_error("connect"))?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

async fn load_snapshot(conn: &mut PgConnection) -> Result<Snapshot, StoreError> {
    let records = sqlx::query_as::<_, DailyRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM temperatures ORDER BY date ASC, id ASC"
    ))
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("load records"))?;

    let cycles = sqlx::query_as::<_, CycleRecord>(
        "SELECT id, start_date, end_date, duration FROM cycle_records ORDER BY start_date ASC",
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("load cycle records"))?;

    let day_counter = sqlx::query_scalar::<_, i32>("SELECT day_counter FROM cycle_counter WHERE id = 1")
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("load cycle counter"))?
        .unwrap_or(1);

    Ok(Snapshot { records, cycles, day_counter })
}

#[async_trait]
impl RecordStore for PgStore {
    async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_error("acquire"))?;
        load_snapshot(&mut conn).await
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin"))?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(RENUMBER_LOCK)
            .execute(&mut *tx)
            .await
            .map_err(db_error("advisory lock"))?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn load_settings(&self) -> Result<Option<Settings>, StoreError> {
        sqlx::query_as::<_, Settings>(
            "SELECT fertile_temp, cycle_length, temperature_unit, shortest_cycle, longest_cycle
             FROM settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("load settings"))
    }

    async fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO settings (id, fertile_temp, cycle_length, temperature_unit, shortest_cycle, longest_cycle)
             VALUES (1, $1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET
                fertile_temp = EXCLUDED.fertile_temp,
                cycle_length = EXCLUDED.cycle_length,
                temperature_unit = EXCLUDED.temperature_unit,
                shortest_cycle = EXCLUDED.shortest_cycle,
                longest_cycle = EXCLUDED.longest_cycle",
        )
        .bind(settings.fertile_temp)
        .bind(settings.cycle_length)
        .bind(&settings.temperature_unit)
        .bind(settings.shortest_cycle)
        .bind(settings.longest_cycle)
        .execute(&self.pool)
        .await
        .map_err(db_error("save settings"))?;
        Ok(())
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn snapshot(&mut self) -> Result<Snapshot, StoreError> {
        load_snapshot(&mut self.tx).await
    }

    async fn insert_record(&mut self, record: NewDailyRecord) -> Result<DailyRecord, StoreError> {
        sqlx::query_as::<_, DailyRecord>(&format!(
            "INSERT INTO temperatures (date, temperature, is_period, cycle_day, mucus_type, mood, comment)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(record.date)
        .bind(record.temperature)
        .bind(record.is_period)
        .bind(record.cycle_day)
        .bind(record.mucus_type)
        .bind(record.mood)
        .bind(record.comment)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error("insert record"))
    }

    async fn update_record(&mut self, id: i64, patch: &RecordPatch) -> Result<DailyRecord, StoreError> {
        sqlx::query_as::<_, DailyRecord>(&format!(
            "UPDATE temperatures SET
                temperature = COALESCE($2, temperature),
                is_period = COALESCE($3, is_period),
                mucus_type = COALESCE($4, mucus_type),
                mood = COALESCE($5, mood),
                comment = COALESCE($6, comment)
             WHERE id = $1
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.temperature)
        .bind(patch.is_period)
        .bind(patch.mucus_type.as_deref())
        .bind(patch.mood.as_deref())
        .bind(patch.comment.as_deref())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error("update record"))?
        .ok_or(StoreError::NotFound)
    }

    async fn delete_records(&mut self, ids: &[i64]) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM temperatures WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error("delete records"))?;
        Ok(result.rows_affected())
    }

    async fn set_cycle_days(&mut self, days: &[(NaiveDate, i32)]) -> Result<(), StoreError> {
        if days.is_empty() {
            return Ok(());
        }
        let (dates, values): (Vec<NaiveDate>, Vec<i32>) = days.iter().copied().unzip();
        sqlx::query(
            "UPDATE temperatures AS t SET cycle_day = v.cycle_day
             FROM UNNEST($1::date[], $2::int[]) AS v(date, cycle_day)
             WHERE t.date = v.date",
        )
        .bind(dates)
        .bind(values)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("renumber cycle days"))?;
        Ok(())
    }

    async fn replace_cycle_records(&mut self, spans: &[CycleSpan]) -> Result<(), StoreError> {
        let starts: Vec<NaiveDate> = spans.iter().map(|s| s.start_date).collect();
        let ends: Vec<NaiveDate> = spans.iter().map(|s| s.end_date).collect();
        let durations: Vec<i32> = spans.iter().map(|s| s.duration).collect();

        sqlx::query("DELETE FROM cycle_records WHERE NOT (start_date = ANY($1))")
            .bind(&starts)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error("prune cycle records"))?;

        sqlx::query(
            "INSERT INTO cycle_records (start_date, end_date, duration)
             SELECT * FROM UNNEST($1::date[], $2::date[], $3::int[])
             ON CONFLICT (start_date) DO UPDATE SET
                end_date = EXCLUDED.end_date,
                duration = EXCLUDED.duration",
        )
        .bind(&starts)
        .bind(&ends)
        .bind(&durations)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("upsert cycle records"))?;
        Ok(())
    }

    async fn set_day_counter(&mut self, value: i32) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO cycle_counter (id, day_counter) VALUES (1, $1)
             ON CONFLICT (id) DO UPDATE SET day_counter = EXCLUDED.day_counter, last_updated = now()",
        )
        .bind(value)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("update cycle counter"))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(db_error("commit"))
    }
}
