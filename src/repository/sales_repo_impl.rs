// ==========================================
// 销售台账 - 销售明细 Repository 实现
// ==========================================
// 职责: 实现销售明细数据访问（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::transaction::{ImportBatch, SalesTransaction};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::import_batch_repo::ImportBatchRepository;
use crate::repository::sales_repo::{ExistingKeys, SalesTransactionRepository};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const SELECT_COLUMNS: &str = r#"
    transaction_id, document_id, line_id, row_hash, year, month, month_label,
    transaction_date, channel, branch, salesperson, product_code, description,
    product_group, customer, quantity, revenue, profit, marketing_spend,
    batch_id, created_at
"#;

// ==========================================
// SalesTransactionRepositoryImpl
// ==========================================
pub struct SalesTransactionRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl SalesTransactionRepositoryImpl {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
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

    /// 在事务中批量插入明细
    fn insert_rows_tx(tx: &Transaction, rows: &[SalesTransaction]) -> RepositoryResult<usize> {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO sales_transaction (
                document_id, line_id, row_hash, year, month, month_label,
                transaction_date, channel, branch, salesperson, product_code,
                description, product_group, customer, quantity, revenue,
                profit, marketing_spend, batch_id
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19
            )
            "#,
        )?;

        let mut count = 0;
        for row in rows {
            stmt.execute(params![
                row.document_id,
                row.line_id,
                row.row_hash,
                row.year,
                row.month,
                row.month_label,
                row.transaction_date.map(|d| d.format("%Y-%m-%d").to_string()),
                row.channel,
                row.branch,
                row.salesperson,
                row.product_code,
                row.description,
                row.product_group,
                row.customer,
                row.quantity,
                row.revenue,
                row.profit,
                row.marketing_spend,
                row.batch_id,
            ])?;
            count += 1;
        }

        Ok(count)
    }
}

/// 行映射
pub(crate) fn map_transaction_row(row: &Row) -> rusqlite::Result<SalesTransaction> {
    let date_raw: Option<String> = row.get(7)?;
    Ok(SalesTransaction {
        transaction_id: row.get(0)?,
        document_id: row.get(1)?,
        line_id: row.get(2)?,
        row_hash: row.get(3)?,
        year: row.get(4)?,
        month: row.get(5)?,
        month_label: row.get(6)?,
        transaction_date: date_raw
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        channel: row.get(8)?,
        branch: row.get(9)?,
        salesperson: row.get(10)?,
        product_code: row.get(11)?,
        description: row.get(12)?,
        product_group: row.get(13)?,
        customer: row.get(14)?,
        quantity: row.get(15)?,
        revenue: row.get(16)?,
        profit: row.get(17)?,
        marketing_spend: row.get(18)?,
        batch_id: row.get(19)?,
        created_at: row.get(20)?,
    })
}

#[async_trait]
impl SalesTransactionRepository for SalesTransactionRepositoryImpl {
    async fn fetch_existing_keys(&self) -> RepositoryResult<ExistingKeys> {
        let conn = self.get_conn()?;
        let mut keys = ExistingKeys::default();

        let mut stmt = conn.prepare(
            "SELECT document_id, line_id FROM sales_transaction
             WHERE document_id IS NOT NULL AND line_id IS NOT NULL",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            keys.natural.insert(row?);
        }

        let mut stmt =
            conn.prepare("SELECT row_hash FROM sales_transaction WHERE row_hash IS NOT NULL")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for row in rows {
            keys.hashes.insert(row?);
        }

        debug!(
            natural = keys.natural.len(),
            hashes = keys.hashes.len(),
            "已加载现有去重键"
        );
        Ok(keys)
    }

    async fn insert_batch_atomic(
        &self,
        batch: &ImportBatch,
        rows: Vec<SalesTransaction>,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        ImportBatchRepository::insert_batch_tx(&tx, batch)?;
        let count = Self::insert_rows_tx(&tx, &rows)?;

        tx.commit()?;
        Ok(count)
    }

    async fn count_transactions(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM sales_transaction", [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    async fn list_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<SalesTransaction>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM sales_transaction WHERE batch_id = ?1 ORDER BY transaction_id",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![batch_id], map_transaction_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn delete_by_documents(&self, document_ids: &[String]) -> RepositoryResult<usize> {
        if document_ids.is_empty() {
            return Ok(0);
        }

        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let placeholders = vec!["?"; document_ids.len()].join(", ");
        let sql = format!(
            "DELETE FROM sales_transaction WHERE document_id IN ({})",
            placeholders
        );
        let affected = tx.execute(&sql, params_from_iter(document_ids.iter()))?;
        tx.commit()?;
        Ok(affected)
    }

    async fn delete_by_period(&self, year: i32, month: Option<u32>) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = match month {
            Some(m) => conn.execute(
                "DELETE FROM sales_transaction WHERE year = ?1 AND month = ?2",
                params![year, m],
            )?,
            None => conn.execute(
                "DELETE FROM sales_transaction WHERE year = ?1",
                params![year],
            )?,
        };
        Ok(affected)
    }
}
