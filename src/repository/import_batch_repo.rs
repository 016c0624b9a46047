// ==========================================
// 销售台账 - 导入批次仓储
// ==========================================
// 职责: 管理 import_batch 表（销售/成本/目标三类上传的台账）
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::transaction::ImportBatch;
use crate::domain::types::{BatchKind, ImportStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row, Transaction};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct ImportBatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ImportBatchRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn.lock()?;
            init_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 在调用方事务中写入批次记录
    pub(crate) fn insert_batch_tx(tx: &Transaction, batch: &ImportBatch) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO import_batch (
                batch_id, kind, file_name, status, message,
                total_rows, imported_rows, duplicate_rows, skipped_rows, missing_count,
                report_path, config_snapshot, elapsed_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                batch.batch_id,
                batch.kind.to_string(),
                batch.file_name,
                batch.status.to_string(),
                batch.message,
                batch.total_rows,
                batch.imported_rows,
                batch.duplicate_rows,
                batch.skipped_rows,
                batch.missing_count,
                batch.report_path,
                batch.config_snapshot,
                batch.elapsed_ms,
            ],
        )?;
        Ok(())
    }

    /// 写入独立批次记录（无明细，如被阻断的批次、成本/目标上传）
    pub fn insert(&self, batch: &ImportBatch) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        Self::insert_batch_tx(&tx, batch)?;
        tx.commit()?;
        Ok(())
    }

    pub fn find_by_id(&self, batch_id: &str) -> RepositoryResult<Option<ImportBatch>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT batch_id, kind, file_name, status, message, total_rows, imported_rows,
                    duplicate_rows, skipped_rows, missing_count, report_path,
                    config_snapshot, elapsed_ms, created_at
             FROM import_batch WHERE batch_id = ?1",
        )?;
        let mut rows = stmt.query_map(params![batch_id], map_batch_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// 最近的批次记录（按写入时间倒序）
    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ImportBatch>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT batch_id, kind, file_name, status, message, total_rows, imported_rows,
                    duplicate_rows, skipped_rows, missing_count, report_path,
                    config_snapshot, elapsed_ms, created_at
             FROM import_batch
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], map_batch_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn map_batch_row(row: &Row) -> rusqlite::Result<ImportBatch> {
    let kind_raw: String = row.get(1)?;
    let status_raw: String = row.get(3)?;
    let status = match status_raw.as_str() {
        "success" => ImportStatus::Success,
        "info" => ImportStatus::Info,
        _ => ImportStatus::Error,
    };

    Ok(ImportBatch {
        batch_id: row.get(0)?,
        kind: kind_raw.parse::<BatchKind>().unwrap_or(BatchKind::Sales),
        file_name: row.get(2)?,
        status,
        message: row.get(4)?,
        total_rows: row.get(5)?,
        imported_rows: row.get(6)?,
        duplicate_rows: row.get(7)?,
        skipped_rows: row.get(8)?,
        missing_count: row.get(9)?,
        report_path: row.get(10)?,
        config_snapshot: row.get(11)?,
        elapsed_ms: row.get(12)?,
        created_at: row.get(13)?,
    })
}
