// ==========================================
// 销售台账 - 月度目标仓储
// ==========================================
// 职责: 管理 monthly_target 表
// 主键: (salesperson, year, month)，重复分解时覆盖
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::target::MonthlyTarget;
use crate::domain::types::Semester;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct MonthlyTargetRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MonthlyTargetRepository {
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

    /// 批量 upsert 月度目标（单事务）
    pub fn upsert_many(&self, targets: &[MonthlyTarget]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO monthly_target (salesperson, year, month, target_amount, semester, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
                ON CONFLICT(salesperson, year, month) DO UPDATE SET
                    target_amount = excluded.target_amount,
                    semester = excluded.semester,
                    updated_at = excluded.updated_at
                "#,
            )?;
            for target in targets {
                stmt.execute(params![
                    target.salesperson,
                    target.year,
                    target.month,
                    target.target_amount,
                    target.semester.number(),
                ])?;
                count += 1;
            }
        }

        tx.commit()?;
        Ok(count)
    }

    /// 查询月度目标（year 为空时返回全部年份）
    pub fn list(&self, year: Option<i32>) -> RepositoryResult<Vec<MonthlyTarget>> {
        let conn = self.get_conn()?;
        query_monthly_targets(&conn, year)
    }

    /// 有目标数据的年份
    pub fn distinct_years(&self) -> RepositoryResult<Vec<i32>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT DISTINCT year FROM monthly_target")?;
        let rows = stmt.query_map([], |row| row.get::<_, i32>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

/// 在给定连接上查询月度目标
pub(crate) fn query_monthly_targets(
    conn: &Connection,
    year: Option<i32>,
) -> RepositoryResult<Vec<MonthlyTarget>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT salesperson, year, month, target_amount, semester
        FROM monthly_target
        WHERE (?1 IS NULL OR year = ?1)
        ORDER BY salesperson, year, month
        "#,
    )?;
    let rows = stmt.query_map(params![year], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i32>(1)?,
            row.get::<_, u32>(2)?,
            row.get::<_, f64>(3)?,
            row.get::<_, i64>(4)?,
        ))
    })?;

    let mut targets = Vec::new();
    for row in rows {
        let (salesperson, year, month, target_amount, semester_raw) = row?;
        let semester = Semester::from_number(semester_raw).ok_or_else(|| {
            RepositoryError::FieldValueError {
                field: "semester".to_string(),
                message: format!("非法学期值: {}", semester_raw),
            }
        })?;
        targets.push(MonthlyTarget {
            salesperson,
            year,
            month,
            target_amount,
            semester,
        });
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(month: u32, amount: f64) -> MonthlyTarget {
        MonthlyTarget {
            salesperson: "Alice".to_string(),
            year: 2025,
            month,
            target_amount: amount,
            semester: Semester::First,
        }
    }

    #[test]
    fn test_upsert_overwrites() {
        let conn = Connection::open_in_memory().unwrap();
        let repo = MonthlyTargetRepository::from_connection(Arc::new(Mutex::new(conn))).unwrap();

        repo.upsert_many(&[target(1, 10.0), target(2, 10.0)]).unwrap();
        repo.upsert_many(&[target(1, 25.0)]).unwrap();

        let targets = repo.list(Some(2025)).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].target_amount, 25.0);
        assert_eq!(targets[1].target_amount, 10.0);
        assert!(repo.list(Some(2024)).unwrap().is_empty());
    }
}
