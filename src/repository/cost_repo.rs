// ==========================================
// 销售台账 - 产品成本仓储
// ==========================================
// 职责: 管理 product_cost 表 (按产品描述 upsert)
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::cost::ProductCost;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

pub struct ProductCostRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductCostRepository {
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

    /// 批量 upsert（单事务，冲突时覆盖单位成本）
    pub fn upsert_many(&self, costs: &[ProductCost]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO product_cost (description, unit_cost, updated_at)
                VALUES (?1, ?2, datetime('now'))
                ON CONFLICT(description) DO UPDATE SET
                    unit_cost = excluded.unit_cost,
                    updated_at = excluded.updated_at
                "#,
            )?;
            for cost in costs {
                stmt.execute(params![cost.description, cost.unit_cost])?;
                count += 1;
            }
        }

        tx.commit()?;
        Ok(count)
    }

    /// 全量成本映射: 描述 → 单位成本
    pub fn load_cost_map(&self) -> RepositoryResult<HashMap<String, f64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT description, unit_cost FROM product_cost")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;

        let mut map = HashMap::new();
        for row in rows {
            let (description, unit_cost) = row?;
            map.insert(description, unit_cost);
        }
        Ok(map)
    }

    pub fn find(&self, description: &str) -> RepositoryResult<Option<ProductCost>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT description, unit_cost, updated_at FROM product_cost WHERE description = ?1",
        )?;
        let mut rows = stmt.query_map(params![description], |row| {
            Ok(ProductCost {
                description: row.get(0)?,
                unit_cost: row.get(1)?,
                updated_at: row.get(2)?,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM product_cost", [], |row| row.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_repo() -> ProductCostRepository {
        let conn = Connection::open_in_memory().unwrap();
        ProductCostRepository::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_upsert_last_write_wins() {
        let repo = memory_repo();
        repo.upsert_many(&[ProductCost::new("Widget-X", 100.0)]).unwrap();
        repo.upsert_many(&[ProductCost::new("Widget-X", 120.0)]).unwrap();

        let cost = repo.find("Widget-X").unwrap().unwrap();
        assert_eq!(cost.unit_cost, 120.0);
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn test_load_cost_map() {
        let repo = memory_repo();
        repo.upsert_many(&[ProductCost::new("A", 1.0), ProductCost::new("B", 2.5)])
            .unwrap();
        let map = repo.load_cost_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("B"), Some(&2.5));
    }
}
