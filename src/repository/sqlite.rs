//! Diesel-backed SQLite run store.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl, SimpleAsyncConnection};
use tracing::debug;

use super::models::{
    NewContractRow, NewHonorariumRow, NewRunRecord, NewStaffRow, RunLifecycle, RunRecord,
};
use super::pool::SqlitePool;
use super::{parse_datetime, parse_datetime_opt, RunStore};
use crate::error::StoreError;
use crate::models::{
    CanonicalRecord, EngineKind, HonorariumRecord, NewRun, RecordKind, Run, RunStatus,
};
use crate::schema::{contract_records, honorarium_records, scrape_runs, staff_records};

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS scrape_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    municipality_code TEXT NOT NULL,
    area TEXT NOT NULL,
    year INTEGER NOT NULL,
    months TEXT NOT NULL DEFAULT '[]',
    kinds TEXT NOT NULL DEFAULT '[]',
    status TEXT NOT NULL DEFAULT 'pending',
    engine_used TEXT,
    records_loaded INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    created_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS honorarium_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES scrape_runs(id),
    month INTEGER NOT NULL,
    name TEXT,
    identifier TEXT,
    role TEXT,
    qualification TEXT,
    start_date TEXT,
    end_date TEXT,
    gross_amount REAL,
    net_amount REAL,
    total_amount REAL,
    per_diem REAL,
    currency_unit TEXT,
    notes TEXT,
    affiliation TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS contract_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES scrape_runs(id),
    month INTEGER NOT NULL,
    name TEXT,
    identifier TEXT,
    grade TEXT,
    role TEXT,
    qualification TEXT,
    region TEXT,
    start_date TEXT,
    end_date TEXT,
    allowances REAL,
    gross_amount REAL,
    net_amount REAL,
    hours TEXT,
    notes TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS staff_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES scrape_runs(id),
    month INTEGER NOT NULL,
    name TEXT,
    identifier TEXT,
    grade TEXT,
    role TEXT,
    qualification TEXT,
    region TEXT,
    start_date TEXT,
    end_date TEXT,
    allowances REAL,
    gross_amount REAL,
    net_amount REAL,
    hours TEXT,
    notes TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_honorarium_run ON honorarium_records(run_id, month);
CREATE INDEX IF NOT EXISTS idx_contract_run ON contract_records(run_id, month);
CREATE INDEX IF NOT EXISTS idx_staff_run ON staff_records(run_id, month);
"#;

#[derive(diesel::QueryableByName)]
struct LastInsertRowId {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    id: i64,
}

impl TryFrom<RunRecord> for Run {
    type Error = StoreError;

    fn try_from(record: RunRecord) -> Result<Self, Self::Error> {
        let status = RunStatus::from_str(&record.status).ok_or_else(|| {
            StoreError::Invalid(format!("run {} has unknown status '{}'", record.id, record.status))
        })?;
        Ok(Run {
            id: record.id,
            municipality_code: record.municipality_code,
            area: record.area,
            year: record.year,
            months: serde_json::from_str(&record.months)?,
            kinds: serde_json::from_str(&record.kinds)?,
            status,
            engine_used: record.engine_used.as_deref().and_then(EngineKind::from_str),
            records_loaded: record.records_loaded.max(0) as u64,
            error_message: record.error_message,
            created_at: parse_datetime(&record.created_at),
            started_at: parse_datetime_opt(record.started_at),
            completed_at: parse_datetime_opt(record.completed_at),
        })
    }
}

fn honorarium_row<'a>(run_id: i64, month: i32, r: &'a HonorariumRecord, now: &'a str) -> NewHonorariumRow<'a> {
    NewHonorariumRow {
        run_id,
        month,
        name: r.name.as_deref(),
        identifier: r.identifier.as_deref(),
        role: r.role.as_deref(),
        qualification: r.qualification.as_deref(),
        start_date: r.start_date.as_deref(),
        end_date: r.end_date.as_deref(),
        gross_amount: r.gross_amount,
        net_amount: r.net_amount,
        total_amount: r.total_amount,
        per_diem: r.per_diem,
        currency_unit: r.currency_unit.as_deref(),
        notes: r.notes.as_deref(),
        affiliation: r.affiliation.as_deref(),
        created_at: now,
    }
}

macro_rules! staff_row {
    ($row:ident, $run_id:expr, $month:expr, $r:expr, $now:expr) => {
        $row {
            run_id: $run_id,
            month: $month,
            name: $r.name.as_deref(),
            identifier: $r.identifier.as_deref(),
            grade: $r.grade.as_deref(),
            role: $r.role.as_deref(),
            qualification: $r.qualification.as_deref(),
            region: $r.region.as_deref(),
            start_date: $r.start_date.as_deref(),
            end_date: $r.end_date.as_deref(),
            allowances: $r.allowances,
            gross_amount: $r.gross_amount,
            net_amount: $r.net_amount,
            hours: $r.hours.as_deref(),
            notes: $r.notes.as_deref(),
            created_at: $now,
        }
    };
}

/// Run store over a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteRunStore {
    pool: SqlitePool,
}

impl SqliteRunStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn from_url(database_url: &str) -> Self {
        Self::new(SqlitePool::new(database_url))
    }

    /// Create tables and indexes if they do not exist.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        conn.batch_execute(SCHEMA_SQL).await?;
        debug!("Schema ready at {}", self.pool.database_url());
        Ok(())
    }

    /// Number of stored records of one kind for a run.
    pub async fn count_records(&self, run_id: i64, kind: RecordKind) -> Result<i64, StoreError> {
        let mut conn = self.pool.get().await?;
        let count = match kind {
            RecordKind::Honorarium => {
                honorarium_records::table
                    .filter(honorarium_records::run_id.eq(run_id))
                    .count()
                    .get_result(&mut conn)
                    .await?
            }
            RecordKind::Contract => {
                contract_records::table
                    .filter(contract_records::run_id.eq(run_id))
                    .count()
                    .get_result(&mut conn)
                    .await?
            }
            RecordKind::Staff => {
                staff_records::table
                    .filter(staff_records::run_id.eq(run_id))
                    .count()
                    .get_result(&mut conn)
                    .await?
            }
        };
        Ok(count)
    }
}

#[async_trait]
impl RunStore for SqliteRunStore {
    async fn create_run(&self, new: NewRun) -> Result<Run, StoreError> {
        let new = new.normalized();
        let months = serde_json::to_string(&new.months)?;
        let kinds = serde_json::to_string(&new.kinds)?;
        let now = Utc::now().to_rfc3339();

        let mut conn = self.pool.get().await?;
        diesel::insert_into(scrape_runs::table)
            .values(NewRunRecord {
                municipality_code: &new.municipality_code,
                area: &new.area,
                year: new.year,
                months: &months,
                kinds: &kinds,
                status: RunStatus::Pending.as_str(),
                records_loaded: 0,
                created_at: &now,
            })
            .execute(&mut conn)
            .await?;
        let row: LastInsertRowId = diesel::sql_query("SELECT last_insert_rowid() AS id")
            .get_result(&mut conn)
            .await?;

        drop(conn);
        self.load_run(row.id).await
    }

    async fn load_run(&self, id: i64) -> Result<Run, StoreError> {
        let mut conn = self.pool.get().await?;
        let record = scrape_runs::table
            .find(id)
            .select(RunRecord::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .ok_or(StoreError::NotFound(id))?;
        Run::try_from(record)
    }

    async fn update_run(&self, run: &Run) -> Result<(), StoreError> {
        let started_at = run.started_at.map(|t| t.to_rfc3339());
        let completed_at = run.completed_at.map(|t| t.to_rfc3339());
        let mut conn = self.pool.get().await?;
        let updated = diesel::update(scrape_runs::table.find(run.id))
            .set(RunLifecycle {
                status: run.status.as_str(),
                engine_used: run.engine_used.map(|e| e.as_str()),
                records_loaded: run.records_loaded as i64,
                error_message: run.error_message.as_deref(),
                started_at: started_at.as_deref(),
                completed_at: completed_at.as_deref(),
            })
            .execute(&mut conn)
            .await?;
        if updated == 0 {
            return Err(StoreError::NotFound(run.id));
        }
        Ok(())
    }

    async fn save_records(
        &self,
        run: &Run,
        kind: RecordKind,
        month: u32,
        records: &[CanonicalRecord],
    ) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let now = Utc::now().to_rfc3339();
        let month = month as i32;

        let mut honorarium = Vec::new();
        let mut contract = Vec::new();
        let mut staff = Vec::new();
        for record in records {
            match record {
                CanonicalRecord::Honorarium(r) => honorarium.push(honorarium_row(run.id, month, r, &now)),
                CanonicalRecord::Contract(r) => {
                    contract.push(staff_row!(NewContractRow, run.id, month, r, &now))
                }
                CanonicalRecord::Staff(r) => staff.push(staff_row!(NewStaffRow, run.id, month, r, &now)),
            }
        }

        let mut conn = self.pool.get().await?;
        let saved = conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                Box::pin(async move {
                    let mut saved = 0;
                    for row in &honorarium {
                        saved += diesel::insert_into(honorarium_records::table)
                            .values(row)
                            .execute(conn)
                            .await?;
                    }
                    for row in &contract {
                        saved += diesel::insert_into(contract_records::table)
                            .values(row)
                            .execute(conn)
                            .await?;
                    }
                    for row in &staff {
                        saved += diesel::insert_into(staff_records::table)
                            .values(row)
                            .execute(conn)
                            .await?;
                    }
                    Ok(saved)
                })
            })
            .await?;
        debug!("Run {}: saved {} {} records for month {}", run.id, saved, kind, month);
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StaffRecord;
    use tempfile::tempdir;

    async fn setup_store() -> (SqliteRunStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = SqliteRunStore::new(SqlitePool::from_path(&dir.path().join("test.db")));
        store.init_schema().await.unwrap();
        (store, dir)
    }

    fn honorarium(name: &str) -> CanonicalRecord {
        CanonicalRecord::Honorarium(HonorariumRecord {
            name: Some(name.to_string()),
            identifier: Some("12.345.678-9".to_string()),
            gross_amount: Some(500000.0),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_run_round_trip() {
        let (store, _dir) = setup_store().await;
        let run = store
            .create_run(
                NewRun::new("280", "Salud", 2024)
                    .months([2, 1, 2])
                    .kinds([RecordKind::Contract, RecordKind::Honorarium]),
            )
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::Pending);
        assert_eq!(run.months, vec![1, 2]);
        assert_eq!(run.kinds, vec![RecordKind::Contract, RecordKind::Honorarium]);

        let mut run = store.load_run(run.id).await.unwrap();
        run.set_running().unwrap();
        run.engine_used = Some(EngineKind::Http);
        run.records_loaded = 4;
        run.finish(RunStatus::Completed, &[]).unwrap();
        store.update_run(&run).await.unwrap();

        let loaded = store.load_run(run.id).await.unwrap();
        assert_eq!(loaded.status, RunStatus::Completed);
        assert_eq!(loaded.engine_used, Some(EngineKind::Http));
        assert_eq!(loaded.records_loaded, 4);
        assert!(loaded.completed_at.is_some());
        assert!(loaded.error_message.is_none());
    }

    #[tokio::test]
    async fn test_missing_run_is_not_found() {
        let (store, _dir) = setup_store().await;
        assert!(matches!(store.load_run(99).await, Err(StoreError::NotFound(99))));
    }

    #[tokio::test]
    async fn test_save_records_counts_rows() {
        let (store, _dir) = setup_store().await;
        let run = store.create_run(NewRun::new("280", "Salud", 2024).months([1])).await.unwrap();

        let saved = store
            .save_records(&run, RecordKind::Honorarium, 1, &[honorarium("ANA"), honorarium("LUIS")])
            .await
            .unwrap();
        assert_eq!(saved, 2);
        assert_eq!(store.save_records(&run, RecordKind::Honorarium, 1, &[]).await.unwrap(), 0);
        assert_eq!(store.count_records(run.id, RecordKind::Honorarium).await.unwrap(), 2);
        assert_eq!(store.count_records(run.id, RecordKind::Staff).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_records_writes_every_row_of_each_kind() {
        let (store, _dir) = setup_store().await;
        let run = store.create_run(NewRun::new("280", "Salud", 2024).months([3])).await.unwrap();

        let staff: Vec<_> = (0..3)
            .map(|i| {
                CanonicalRecord::Staff(StaffRecord {
                    name: Some(format!("FUNCIONARIO {}", i)),
                    grade: Some("12".into()),
                    gross_amount: Some(900000.0),
                    ..Default::default()
                })
            })
            .collect();
        assert_eq!(store.save_records(&run, RecordKind::Staff, 3, &staff).await.unwrap(), 3);

        let contract = vec![CanonicalRecord::Contract(StaffRecord {
            name: Some("ROSA DIAZ".into()),
            ..Default::default()
        })];
        assert_eq!(store.save_records(&run, RecordKind::Contract, 3, &contract).await.unwrap(), 1);

        assert_eq!(store.count_records(run.id, RecordKind::Staff).await.unwrap(), 3);
        assert_eq!(store.count_records(run.id, RecordKind::Contract).await.unwrap(), 1);
        assert_eq!(store.count_records(run.id, RecordKind::Honorarium).await.unwrap(), 0);
    }
}
