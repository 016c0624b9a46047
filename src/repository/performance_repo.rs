// ==========================================
// 销售台账 - 业绩读取仓储
// ==========================================
// 职责: 从 sales_transaction 做只读聚合（月度实绩、年度合计、分组、热力格）
// 红线: 只读，不写任何派生结果
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::performance::{
    margin_pct, BreakdownDimension, BreakdownEntry, MonthlyActual, SeasonalityCell,
};
use crate::domain::target::MonthlyTarget;
use crate::domain::types::Semester;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::target_repo::query_monthly_targets;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

/// 分组标签为空时的占位
pub const UNKNOWN_LABEL: &str = "Unknown";

/// 年度合计
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PeriodTotals {
    pub revenue: f64,
    pub profit: f64,
    pub marketing_spend: f64,
}

fn month_bounds(semester: Option<Semester>) -> (u32, u32) {
    match semester {
        Some(s) => {
            let months = s.months();
            (*months.start(), *months.end())
        }
        None => (1, 12),
    }
}

pub struct PerformanceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PerformanceRepository {
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

    /// 月度实绩: (salesperson, year, month) 粒度
    ///
    /// 业务员或年月为空的明细不参与
    pub fn monthly_actuals(&self, year: Option<i32>) -> RepositoryResult<Vec<MonthlyActual>> {
        let conn = self.get_conn()?;
        query_monthly_actuals(&conn, year)
    }

    /// 月度实绩 + 月度目标
    ///
    /// 同一把连接锁、同一读事务内读取，两者对应同一提交状态
    pub fn actuals_with_targets(
        &self,
        year: Option<i32>,
    ) -> RepositoryResult<(Vec<MonthlyActual>, Vec<MonthlyTarget>)> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let actuals = query_monthly_actuals(&tx, year)?;
        let targets = query_monthly_targets(&tx, year)?;
        tx.commit()?;
        Ok((actuals, targets))
    }

    /// 年度合计（可按学期过滤）
    pub fn period_totals(
        &self,
        year: i32,
        semester: Option<Semester>,
    ) -> RepositoryResult<PeriodTotals> {
        let (start, end) = month_bounds(semester);
        let conn = self.get_conn()?;
        let totals = conn.query_row(
            r#"
            SELECT COALESCE(SUM(revenue), 0),
                   COALESCE(SUM(profit), 0),
                   COALESCE(SUM(marketing_spend), 0)
            FROM sales_transaction
            WHERE year = ?1 AND month BETWEEN ?2 AND ?3
            "#,
            params![year, start, end],
            |row| {
                Ok(PeriodTotals {
                    revenue: row.get(0)?,
                    profit: row.get(1)?,
                    marketing_spend: row.get(2)?,
                })
            },
        )?;
        Ok(totals)
    }

    /// 月度趋势: (month, revenue, profit)
    pub fn monthly_totals(&self, year: i32) -> RepositoryResult<Vec<(u32, f64, f64)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT month, COALESCE(SUM(revenue), 0), COALESCE(SUM(profit), 0)
            FROM sales_transaction
            WHERE year = ?1 AND month IS NOT NULL
            GROUP BY month
            ORDER BY month
            "#,
        )?;
        let rows = stmt.query_map(params![year], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, f64>(1)?, row.get::<_, f64>(2)?))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// 按维度分组（按收入倒序，可限制前 N）
    pub fn breakdown(
        &self,
        dimension: BreakdownDimension,
        year: Option<i32>,
        semester: Option<Semester>,
        limit: Option<usize>,
    ) -> RepositoryResult<Vec<BreakdownEntry>> {
        let (start, end) = month_bounds(semester);
        let column = dimension.column();
        let sql = format!(
            r#"
            SELECT COALESCE({col}, '{unknown}') AS label,
                   COALESCE(SUM(revenue), 0),
                   COALESCE(SUM(profit), 0),
                   COALESCE(SUM(marketing_spend), 0),
                   COALESCE(SUM(quantity), 0),
                   COUNT(*)
            FROM sales_transaction
            WHERE (?1 IS NULL OR year = ?1)
              AND ((?2 = 1 AND ?3 = 12) OR month BETWEEN ?2 AND ?3)
            GROUP BY label
            ORDER BY 2 DESC, label
            LIMIT ?4
            "#,
            col = column,
            unknown = UNKNOWN_LABEL,
        );

        let limit = limit.map(|n| n as i64).unwrap_or(-1);
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![year, start, end, limit], |row| {
            let revenue: f64 = row.get(1)?;
            let profit: f64 = row.get(2)?;
            Ok(BreakdownEntry {
                label: row.get(0)?,
                revenue,
                profit,
                marketing_spend: row.get(3)?,
                quantity: row.get(4)?,
                deals: row.get(5)?,
                margin_pct: margin_pct(profit, revenue),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// 季节性热力格: 年 × 月 收入
    pub fn seasonality(
        &self,
        year: Option<i32>,
        semester: Option<Semester>,
    ) -> RepositoryResult<Vec<SeasonalityCell>> {
        let (start, end) = month_bounds(semester);
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT year, month, COALESCE(SUM(revenue), 0)
            FROM sales_transaction
            WHERE year IS NOT NULL AND month IS NOT NULL
              AND (?1 IS NULL OR year = ?1)
              AND month BETWEEN ?2 AND ?3
            GROUP BY year, month
            ORDER BY year, month
            "#,
        )?;
        let rows = stmt.query_map(params![year, start, end], |row| {
            Ok(SeasonalityCell {
                year: row.get(0)?,
                month: row.get(1)?,
                revenue: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// 有明细数据的年份（倒序）
    pub fn available_years(&self) -> RepositoryResult<Vec<i32>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT year FROM sales_transaction WHERE year IS NOT NULL ORDER BY year DESC",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, i32>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

/// 月度实绩查询（业务员或年月为空的明细不参与）
fn query_monthly_actuals(
    conn: &Connection,
    year: Option<i32>,
) -> RepositoryResult<Vec<MonthlyActual>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT salesperson, year, month,
               COALESCE(SUM(revenue), 0), COALESCE(SUM(profit), 0)
        FROM sales_transaction
        WHERE salesperson IS NOT NULL
          AND year IS NOT NULL
          AND month IS NOT NULL
          AND (?1 IS NULL OR year = ?1)
        GROUP BY salesperson, year, month
        ORDER BY salesperson, year, month
        "#,
    )?;
    let rows = stmt.query_map(params![year], |row| {
        Ok(MonthlyActual {
            salesperson: row.get(0)?,
            year: row.get(1)?,
            month: row.get(2)?,
            revenue: row.get(3)?,
            profit: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_repo() -> PerformanceRepository {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO import_batch (batch_id, kind, status) VALUES ('b1', 'SALES', 'success');
            INSERT INTO sales_transaction
                (document_id, line_id, year, month, channel, salesperson, description,
                 quantity, revenue, profit, marketing_spend, batch_id)
            VALUES
                ('1', '10', 2025, 1, 'Retail', 'Alice', 'Widget-X', 2, 500, 300, 50, 'b1'),
                ('1', '20', 2025, 8, 'Retail', 'Alice', 'Widget-Y', 1, 200, 50, 20, 'b1'),
                ('2', '10', 2025, 2, NULL, 'Bob', 'Widget-X', 4, 1000, 600, 100, 'b1'),
                ('3', '10', 2024, 3, 'Project', NULL, 'Widget-X', 1, 100, 60, 10, 'b1');
            "#,
        )
        .unwrap();
        PerformanceRepository::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_monthly_actuals_excludes_null_salesperson() {
        let repo = seeded_repo();
        let rows = repo.monthly_actuals(None).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.year == 2025));
    }

    #[test]
    fn test_breakdown_channel_with_semester() {
        let repo = seeded_repo();
        let all = repo
            .breakdown(BreakdownDimension::Channel, Some(2025), None, None)
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].label, UNKNOWN_LABEL);
        assert_eq!(all[0].revenue, 1000.0);

        let first = repo
            .breakdown(BreakdownDimension::Channel, Some(2025), Some(Semester::First), Some(1))
            .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].revenue, 1000.0);
    }

    #[test]
    fn test_actuals_with_targets_same_read() {
        let repo = seeded_repo();
        {
            let conn = repo.get_conn().unwrap();
            conn.execute(
                "INSERT INTO monthly_target (salesperson, year, month, target_amount, semester)
                 VALUES ('Alice', 2025, 1, 1000, 1)",
                [],
            )
            .unwrap();
        }
        let (actuals, targets) = repo.actuals_with_targets(Some(2025)).unwrap();
        assert_eq!(actuals.len(), 3);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].semester, Semester::First);
    }

    #[test]
    fn test_available_years_desc() {
        let repo = seeded_repo();
        assert_eq!(repo.available_years().unwrap(), vec![2025, 2024]);
    }
}
