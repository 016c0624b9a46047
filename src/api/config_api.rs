// ==========================================
// 销售台账 - 配置管理 API
// ==========================================
// 职责: 配置查询、更新（仅限已知键，写入前按类型校验）
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::performance_api::{PerformanceApi, RefreshTrigger};
use crate::config::config_manager::{config_keys, ConfigManager};
use crate::domain::types::UnkeyedRowPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// 配置项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigItem {
    pub key: String,
    pub value: String,
}

// ==========================================
// ConfigApi - 配置管理 API
// ==========================================
pub struct ConfigApi {
    config_manager: Arc<ConfigManager>,
    performance_api: Arc<PerformanceApi>,
}

impl ConfigApi {
    pub fn new(config_manager: Arc<ConfigManager>, performance_api: Arc<PerformanceApi>) -> Self {
        Self {
            config_manager,
            performance_api,
        }
    }

    /// 查询全部 global 配置（仅包含已写入的键）
    pub fn list_configs(&self) -> ApiResult<Vec<ConfigItem>> {
        let snapshot = self
            .config_manager
            .get_config_snapshot()
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        let map: BTreeMap<String, String> = serde_json::from_str(&snapshot)
            .map_err(|e| ApiError::InternalError(format!("配置快照解析失败: {}", e)))?;
        Ok(map
            .into_iter()
            .map(|(key, value)| ConfigItem { key, value })
            .collect())
    }

    pub fn get_config(&self, key: &str) -> ApiResult<Option<String>> {
        self.config_manager
            .get_global_config_value(key)
            .map_err(|e| ApiError::ConfigError(e.to_string()))
    }

    /// 更新配置
    ///
    /// 阈值类配置影响状态分级，写入后刷新业绩读模型
    pub fn update_config(&self, key: &str, value: &str) -> ApiResult<()> {
        validate_config_value(key, value)?;
        self.config_manager
            .set_global_config_value(key, value.trim())
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        info!(key = key, value = value, "配置已更新");

        if key == config_keys::ON_TARGET_THRESHOLD_PCT || key == config_keys::AT_RISK_THRESHOLD_PCT
        {
            self.performance_api.refresh(RefreshTrigger::ManualRefresh)?;
        }
        Ok(())
    }
}

/// 按键校验配置值
pub fn validate_config_value(key: &str, value: &str) -> ApiResult<()> {
    let value = value.trim();
    let invalid = |reason: &str| {
        Err(ApiError::InvalidInput(format!(
            "配置 {} 的值 '{}' 非法: {}",
            key, value, reason
        )))
    };

    match key {
        config_keys::FALLBACK_COST_RATIO | config_keys::MARKETING_RATE => {
            match value.parse::<f64>() {
                Ok(v) if (0.0..=1.0).contains(&v) => Ok(()),
                _ => invalid("必须是 [0, 1] 内的小数"),
            }
        }
        config_keys::ON_TARGET_THRESHOLD_PCT | config_keys::AT_RISK_THRESHOLD_PCT => {
            match value.parse::<f64>() {
                Ok(v) if v >= 0.0 => Ok(()),
                _ => invalid("必须是非负百分比"),
            }
        }
        config_keys::SKIP_COST_VALIDATION => match value.parse::<bool>() {
            Ok(_) => Ok(()),
            Err(_) => invalid("必须是 true 或 false"),
        },
        config_keys::UNKEYED_ROW_POLICY => match value.parse::<UnkeyedRowPolicy>() {
            Ok(_) => Ok(()),
            Err(e) => invalid(&e),
        },
        config_keys::DEFAULT_TARGET_YEAR => match value.parse::<i32>() {
            Ok(y) if (1900..=9999).contains(&y) => Ok(()),
            _ => invalid("必须是四位年份"),
        },
        config_keys::REPORT_DIR => {
            if value.is_empty() {
                invalid("不能为空")
            } else {
                Ok(())
            }
        }
        _ => Err(ApiError::InvalidInput(format!("未知配置键: {}", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_config_value() {
        assert!(validate_config_value(config_keys::MARKETING_RATE, "0.15").is_ok());
        assert!(validate_config_value(config_keys::MARKETING_RATE, "1.5").is_err());
        assert!(validate_config_value(config_keys::UNKEYED_ROW_POLICY, "content_hash").is_ok());
        assert!(validate_config_value(config_keys::UNKEYED_ROW_POLICY, "MAYBE").is_err());
        assert!(validate_config_value(config_keys::SKIP_COST_VALIDATION, "yes").is_err());
        assert!(validate_config_value("unknown_key", "1").is_err());
    }
}
