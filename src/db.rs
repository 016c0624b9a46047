// ==========================================
// 销售台账 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - WAL 模式: 读取方只看到已提交批次
// - 建表幂等，记录 schema_version
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;
use tracing::{debug, warn};

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys / busy_timeout 需要“每个连接”单独配置
/// - journal_mode=WAL 对内存库无效，失败时忽略
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;

    let mode: Result<String, _> = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0));
    match mode {
        Ok(m) => debug!(journal_mode = %m, "SQLite journal_mode 已设置"),
        Err(e) => warn!(error = %e, "设置 WAL 失败，沿用默认 journal_mode"),
    }
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开连接并确保 schema 就绪
pub fn open_and_init(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// 初始化数据库 schema（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS import_batch (
            batch_id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            file_name TEXT,
            status TEXT NOT NULL,
            message TEXT,
            total_rows INTEGER NOT NULL DEFAULT 0,
            imported_rows INTEGER NOT NULL DEFAULT 0,
            duplicate_rows INTEGER NOT NULL DEFAULT 0,
            skipped_rows INTEGER NOT NULL DEFAULT 0,
            missing_count INTEGER NOT NULL DEFAULT 0,
            report_path TEXT,
            config_snapshot TEXT,
            elapsed_ms INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS sales_transaction (
            transaction_id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id TEXT,
            line_id TEXT,
            row_hash TEXT,
            year INTEGER,
            month INTEGER,
            month_label TEXT,
            transaction_date TEXT,
            channel TEXT,
            branch TEXT,
            salesperson TEXT,
            product_code TEXT,
            description TEXT,
            product_group TEXT,
            customer TEXT,
            quantity REAL NOT NULL DEFAULT 0,
            revenue REAL,
            profit REAL NOT NULL DEFAULT 0,
            marketing_spend REAL NOT NULL DEFAULT 0,
            batch_id TEXT NOT NULL REFERENCES import_batch(batch_id),
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (document_id, line_id),
            UNIQUE (row_hash)
        );

        CREATE INDEX IF NOT EXISTS idx_sales_year_month
            ON sales_transaction(year, month);
        CREATE INDEX IF NOT EXISTS idx_sales_salesperson
            ON sales_transaction(salesperson, year, month);

        CREATE TABLE IF NOT EXISTS product_cost (
            description TEXT PRIMARY KEY,
            unit_cost REAL NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS monthly_target (
            salesperson TEXT NOT NULL,
            year INTEGER NOT NULL,
            month INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
            target_amount REAL NOT NULL,
            semester INTEGER NOT NULL CHECK (semester IN (1, 2)),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (salesperson, year, month)
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_schema_version_absent() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);
    }
}
