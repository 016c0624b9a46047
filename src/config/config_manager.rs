// ==========================================
// 销售台账 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::pipeline_config_trait::{ConfigResult, PipelineConfigReader};
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::performance::StatusThresholds;
use crate::domain::types::UnkeyedRowPolicy;
use async_trait::async_trait;
use chrono::Datelike;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

/// 兜底成本比例（成本未知时 cost = revenue × 0.7）
pub const DEFAULT_FALLBACK_COST_RATIO: f64 = 0.7;

/// 营销费用比例（marketing = revenue × 0.1）
pub const DEFAULT_MARKETING_RATE: f64 = 0.1;

pub const DEFAULT_ON_TARGET_PCT: f64 = 100.0;
pub const DEFAULT_AT_RISK_PCT: f64 = 80.0;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            init_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> ConfigResult<MutexGuard<'_, Connection>> {
        Ok(self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?)
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.get_conn()?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 配置（upsert）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取并解析配置；缺失时用默认值，非法时告警后用默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr,
    {
        match self.get_config_value(key)? {
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    warn!(key = key, value = %raw, "配置值非法，使用默认值");
                    Ok(default)
                }
            },
            None => Ok(default),
        }
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 每个导入批次记录一份，便于追溯派生值的口径
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key",
        )?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }
}

/// 默认报告目录: <data dir>/sales-ledger/reports，取不到系统目录时使用 ./reports
pub fn default_report_dir() -> PathBuf {
    match dirs::data_dir() {
        Some(dir) => dir.join("sales-ledger").join("reports"),
        None => PathBuf::from("reports"),
    }
}

#[async_trait]
impl PipelineConfigReader for ConfigManager {
    async fn get_fallback_cost_ratio(&self) -> ConfigResult<f64> {
        let v = self.get_parsed_or_default(
            config_keys::FALLBACK_COST_RATIO,
            DEFAULT_FALLBACK_COST_RATIO,
        )?;
        if (0.0..=1.0).contains(&v) {
            Ok(v)
        } else {
            warn!(value = v, "fallback_cost_ratio 超出 [0, 1]，使用默认值");
            Ok(DEFAULT_FALLBACK_COST_RATIO)
        }
    }

    async fn get_marketing_rate(&self) -> ConfigResult<f64> {
        let v = self.get_parsed_or_default(config_keys::MARKETING_RATE, DEFAULT_MARKETING_RATE)?;
        if (0.0..=1.0).contains(&v) {
            Ok(v)
        } else {
            warn!(value = v, "marketing_rate 超出 [0, 1]，使用默认值");
            Ok(DEFAULT_MARKETING_RATE)
        }
    }

    async fn get_skip_cost_validation(&self) -> ConfigResult<bool> {
        self.get_parsed_or_default(config_keys::SKIP_COST_VALIDATION, false)
    }

    async fn get_unkeyed_row_policy(&self) -> ConfigResult<UnkeyedRowPolicy> {
        self.get_parsed_or_default(config_keys::UNKEYED_ROW_POLICY, UnkeyedRowPolicy::Reject)
    }

    async fn get_default_target_year(&self) -> ConfigResult<i32> {
        let current = chrono::Local::now().year();
        self.get_parsed_or_default(config_keys::DEFAULT_TARGET_YEAR, current)
    }

    async fn get_report_dir(&self) -> ConfigResult<PathBuf> {
        match self.get_config_value(config_keys::REPORT_DIR)? {
            Some(v) if !v.trim().is_empty() => Ok(PathBuf::from(v.trim())),
            _ => Ok(default_report_dir()),
        }
    }

    async fn get_status_thresholds(&self) -> ConfigResult<StatusThresholds> {
        let on_target =
            self.get_parsed_or_default(config_keys::ON_TARGET_THRESHOLD_PCT, DEFAULT_ON_TARGET_PCT)?;
        let at_risk =
            self.get_parsed_or_default(config_keys::AT_RISK_THRESHOLD_PCT, DEFAULT_AT_RISK_PCT)?;

        if at_risk > on_target {
            warn!(on_target, at_risk, "达成阈值配置倒挂，使用默认阈值");
            return Ok(StatusThresholds::default());
        }
        Ok(StatusThresholds {
            on_target_pct: on_target,
            at_risk_pct: at_risk,
        })
    }

    async fn config_snapshot(&self) -> ConfigResult<String> {
        self.get_config_snapshot()
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 毛利派生
    pub const FALLBACK_COST_RATIO: &str = "fallback_cost_ratio";
    pub const MARKETING_RATE: &str = "marketing_rate";
    pub const SKIP_COST_VALIDATION: &str = "skip_cost_validation";

    // 去重
    pub const UNKEYED_ROW_POLICY: &str = "unkeyed_row_policy";

    // 目标
    pub const DEFAULT_TARGET_YEAR: &str = "default_target_year";

    // 报告
    pub const REPORT_DIR: &str = "report_dir";

    // 达成阈值
    pub const ON_TARGET_THRESHOLD_PCT: &str = "on_target_threshold_pct";
    pub const AT_RISK_THRESHOLD_PCT: &str = "at_risk_threshold_pct";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults() {
        let manager = memory_manager();
        assert_eq!(manager.get_fallback_cost_ratio().await.unwrap(), 0.7);
        assert_eq!(manager.get_marketing_rate().await.unwrap(), 0.1);
        assert!(!manager.get_skip_cost_validation().await.unwrap());
        assert_eq!(
            manager.get_unkeyed_row_policy().await.unwrap(),
            UnkeyedRowPolicy::Reject
        );
        assert_eq!(
            manager.get_status_thresholds().await.unwrap(),
            StatusThresholds::default()
        );
    }

    #[tokio::test]
    async fn test_override_and_invalid_fallback() {
        let manager = memory_manager();
        manager
            .set_global_config_value(config_keys::UNKEYED_ROW_POLICY, "CONTENT_HASH")
            .unwrap();
        manager
            .set_global_config_value(config_keys::MARKETING_RATE, "not-a-number")
            .unwrap();
        manager
            .set_global_config_value(config_keys::DEFAULT_TARGET_YEAR, "2030")
            .unwrap();

        assert_eq!(
            manager.get_unkeyed_row_policy().await.unwrap(),
            UnkeyedRowPolicy::ContentHash
        );
        assert_eq!(manager.get_marketing_rate().await.unwrap(), 0.1);
        assert_eq!(manager.get_default_target_year().await.unwrap(), 2030);
    }

    #[test]
    fn test_snapshot_contains_keys() {
        let manager = memory_manager();
        manager
            .set_global_config_value(config_keys::FALLBACK_COST_RATIO, "0.65")
            .unwrap();
        let snapshot = manager.get_config_snapshot().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
        assert_eq!(parsed["fallback_cost_ratio"], "0.65");
    }
}
