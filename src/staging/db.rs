//! DuckDB-backed ingestion database

use chrono::{DateTime, Utc};
use duckdb::types::Value;

use super::error::StagingError;
use super::quality::QualityMetrics;
use super::record::{CanonicalRecord, Field, FieldKind, FieldValue};
use super::run::{RunRecord, RunStatus};
use super::schema::{SCHEMA_VERSION, StagingSchema};
use super::store::IngestStore;

const RUN_COLUMNS: &str = "id, file_name, batch_id, total_rows, processed_rows, status,
     started_at, completed_at, error_message, processing_time_seconds";

const METRICS_COLUMNS: &str = "batch_id, total_records, valid_records, invalid_records,
     null_records, duplicate_records, processing_date";

/// Ingestion database holding cleaned records, run log and quality metrics
pub struct StagingDb {
    conn: duckdb::Connection,
    path: Option<String>,
}

impl StagingDb {
    /// Open or create a database at the given path
    pub fn open(path: &str) -> Result<Self, StagingError> {
        let conn = duckdb::Connection::open(path)?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn memory() -> Result<Self, StagingError> {
        let conn = duckdb::Connection::open_in_memory()?;
        Ok(Self { conn, path: None })
    }

    /// Get the database path (if not in-memory)
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Create any missing tables, sequences and indexes
    pub fn init(&self) -> Result<(), StagingError> {
        self.conn.execute_batch(StagingSchema::create_tables_duckdb())?;
        self.conn.execute(
            StagingSchema::insert_schema_version(),
            [SCHEMA_VERSION.to_string()],
        )?;
        Ok(())
    }

    /// Check if the database is initialized
    pub fn is_initialized(&self) -> Result<bool, StagingError> {
        let result: Result<i32, _> = self.conn.query_row(
            "SELECT 1 FROM information_schema.tables WHERE table_name = 'processed_data'",
            [],
            |row| row.get(0),
        );
        Ok(result.is_ok())
    }

    /// Get the schema version
    pub fn schema_version(&self) -> Result<i32, StagingError> {
        let version: String =
            self.conn
                .query_row(StagingSchema::select_schema_version(), [], |row| row.get(0))?;
        version
            .parse()
            .map_err(|_| StagingError::Database("Invalid schema version".to_string()))
    }

    /// Make sure the schema exists and matches this build.
    ///
    /// With `create_missing` the tables are bootstrapped on first use; otherwise an
    /// empty database is an error.
    pub fn ensure_schema(&self, create_missing: bool) -> Result<(), StagingError> {
        if !self.is_initialized()? {
            if !create_missing {
                return Err(StagingError::NotInitialized);
            }
            tracing::info!(path = ?self.path, "Creating ingestion schema");
            self.init()?;
        }

        let found = self.schema_version()?;
        if found != SCHEMA_VERSION {
            return Err(StagingError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                found,
            });
        }
        Ok(())
    }

    /// Count stored records, optionally for one processing batch
    pub fn record_count(&self, batch_id: Option<&str>) -> Result<i64, StagingError> {
        let count: i64 = if let Some(batch_id) = batch_id {
            self.conn.query_row(
                "SELECT COUNT(*) FROM processed_data WHERE processing_batch = ?1",
                [batch_id],
                |row| row.get(0),
            )?
        } else {
            self.conn
                .query_row("SELECT COUNT(*) FROM processed_data", [], |row| row.get(0))?
        };
        Ok(count)
    }

    /// Read back the records of one processing batch in insertion order
    pub fn records_for_batch(
        &self,
        batch_id: &str,
        limit: usize,
    ) -> Result<Vec<CanonicalRecord>, StagingError> {
        let sql = format!(
            "SELECT {}, source_file, processing_batch FROM processed_data
             WHERE processing_batch = ?1 ORDER BY id LIMIT ?2",
            field_columns()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(duckdb::params![batch_id, limit as i64], |row| {
            let mut record = CanonicalRecord::new(
                row.get::<_, String>(Field::ALL.len())?,
                row.get::<_, String>(Field::ALL.len() + 1)?,
            );
            for (i, field) in Field::ALL.iter().enumerate() {
                match field.kind() {
                    FieldKind::Integer => record.set_integer(*field, row.get(i)?),
                    FieldKind::Decimal => record.set_decimal(*field, row.get(i)?),
                    FieldKind::Text => record.set_text(*field, row.get(i)?),
                    FieldKind::Flag => {
                        record.is_free_shipping = row.get::<_, Option<i32>>(i)?.map(|v| v != 0)
                    }
                }
            }
            Ok(record)
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Get a run by id
    pub fn get_run(&self, id: i64) -> Result<Option<RunRecord>, StagingError> {
        let result = self.conn.query_row(
            &format!("SELECT {RUN_COLUMNS} FROM processing_log WHERE id = ?1"),
            [id],
            run_from_row,
        );

        match result {
            Ok(run) => Ok(Some(run)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List recent runs, newest first
    pub fn list_runs(&self, limit: usize) -> Result<Vec<RunRecord>, StagingError> {
        let mut runs = Vec::new();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM processing_log ORDER BY started_at DESC, id DESC LIMIT ?1"
        ))?;

        let rows = stmt.query_map([limit as i64], run_from_row)?;
        for row in rows {
            runs.push(row?);
        }

        Ok(runs)
    }

    /// Quality summaries recorded for a processing batch
    pub fn quality_for_batch(&self, batch_id: &str) -> Result<Vec<QualityMetrics>, StagingError> {
        let mut metrics = Vec::new();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {METRICS_COLUMNS} FROM data_quality_metrics WHERE batch_id = ?1 ORDER BY id"
        ))?;

        let rows = stmt.query_map([batch_id], |row| {
            Ok(QualityMetrics {
                batch_id: row.get(0)?,
                total_records: row.get(1)?,
                valid_records: row.get(2)?,
                invalid_records: row.get(3)?,
                null_records: row.get(4)?,
                duplicate_records: row.get(5)?,
                processing_date: parse_timestamp(row.get::<_, Option<String>>(6)?)
                    .unwrap_or_else(Utc::now),
            })
        })?;

        for row in rows {
            metrics.push(row?);
        }

        Ok(metrics)
    }
}

impl IngestStore for StagingDb {
    fn prepare_schema(&mut self, create_missing: bool) -> Result<(), StagingError> {
        self.ensure_schema(create_missing)
    }

    fn insert_records(&mut self, records: &[CanonicalRecord]) -> Result<usize, StagingError> {
        if records.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; Field::ALL.len() + 2].join(", ");
        let sql = format!(
            "INSERT INTO processed_data ({}, source_file, processing_batch) VALUES ({placeholders})",
            field_columns()
        );

        // Dropping the transaction without commit rolls the whole sub-batch back
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for record in records {
                stmt.execute(duckdb::params_from_iter(record_values(record)))?;
            }
        }
        tx.commit()?;

        Ok(records.len())
    }

    fn create_run(&mut self, run: &RunRecord) -> Result<i64, StagingError> {
        let id: i64 = self.conn.query_row(
            "INSERT INTO processing_log
             (file_name, batch_id, total_rows, processed_rows, status,
              started_at, completed_at, error_message, processing_time_seconds)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             RETURNING id",
            duckdb::params![
                run.file_name,
                run.batch_id,
                run.total_rows,
                run.processed_rows,
                run.status.to_string(),
                run.started_at.to_rfc3339(),
                run.completed_at.map(|t| t.to_rfc3339()),
                run.error_message.as_deref(),
                run.processing_time_seconds,
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn update_run(&mut self, run: &RunRecord) -> Result<(), StagingError> {
        let id = run
            .id
            .ok_or_else(|| StagingError::Database("Cannot update a run without an id".to_string()))?;

        let updated = self.conn.execute(
            "UPDATE processing_log SET
             total_rows = ?2, processed_rows = ?3, status = ?4,
             completed_at = ?5, error_message = ?6, processing_time_seconds = ?7
             WHERE id = ?1",
            duckdb::params![
                id,
                run.total_rows,
                run.processed_rows,
                run.status.to_string(),
                run.completed_at.map(|t| t.to_rfc3339()),
                run.error_message.as_deref(),
                run.processing_time_seconds,
            ],
        )?;

        if updated == 0 {
            return Err(StagingError::Database(format!("Run {id} not found")));
        }
        Ok(())
    }

    fn insert_quality_metrics(&mut self, metrics: &QualityMetrics) -> Result<i64, StagingError> {
        let id: i64 = self.conn.query_row(
            &format!(
                "INSERT INTO data_quality_metrics ({METRICS_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) RETURNING id"
            ),
            duckdb::params![
                metrics.batch_id,
                metrics.total_records,
                metrics.valid_records,
                metrics.invalid_records,
                metrics.null_records,
                metrics.duplicate_records,
                metrics.processing_date.to_rfc3339(),
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }
}

fn field_columns() -> String {
    Field::ALL
        .iter()
        .map(|f| f.name())
        .collect::<Vec<_>>()
        .join(", ")
}

fn record_values(record: &CanonicalRecord) -> Vec<Value> {
    let mut values: Vec<Value> = Field::ALL
        .iter()
        .map(|field| match record.get(*field) {
            FieldValue::Integer(v) => v.map_or(Value::Null, Value::BigInt),
            FieldValue::Decimal(v) => v.map_or(Value::Null, Value::Double),
            FieldValue::Text(v) => v.map_or(Value::Null, |s| Value::Text(s.to_string())),
            FieldValue::Flag(v) => v.map_or(Value::Null, |b| Value::Int(i32::from(b))),
        })
        .collect();
    values.push(Value::Text(record.source_file.clone()));
    values.push(Value::Text(record.processing_batch.clone()));
    values
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn run_from_row(row: &duckdb::Row<'_>) -> duckdb::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        file_name: row.get(1)?,
        batch_id: row.get(2)?,
        total_rows: row.get(3)?,
        processed_rows: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
        status: row
            .get::<_, String>(5)?
            .parse()
            .unwrap_or(RunStatus::Running),
        started_at: parse_timestamp(row.get(6)?).unwrap_or_else(Utc::now),
        completed_at: parse_timestamp(row.get(7)?),
        error_message: row.get(8)?,
        processing_time_seconds: row.get(9)?,
    })
}
