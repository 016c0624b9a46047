// ==========================================
// 销售台账 - 管道配置读取 Trait
// ==========================================
// 职责: 定义导入/汇总所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::performance::StatusThresholds;
use crate::domain::types::UnkeyedRowPolicy;
use async_trait::async_trait;
use std::error::Error;
use std::path::PathBuf;

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// PipelineConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait PipelineConfigReader: Send + Sync {
    // ===== 毛利派生 =====

    /// 成本未知时的兜底成本比例
    ///
    /// # 默认值
    /// - 0.7
    async fn get_fallback_cost_ratio(&self) -> ConfigResult<f64>;

    /// 营销费用比例
    ///
    /// # 默认值
    /// - 0.1
    async fn get_marketing_rate(&self) -> ConfigResult<f64>;

    /// 是否跳过成本校验（仅用于受控补录）
    ///
    /// # 默认值
    /// - false
    async fn get_skip_cost_validation(&self) -> ConfigResult<bool>;

    // ===== 去重 =====

    /// 无键行策略
    ///
    /// # 默认值
    /// - REJECT
    async fn get_unkeyed_row_policy(&self) -> ConfigResult<UnkeyedRowPolicy>;

    // ===== 目标 =====

    /// 目标文件缺少年份列时使用的年份
    ///
    /// # 默认值
    /// - 当前日历年
    async fn get_default_target_year(&self) -> ConfigResult<i32>;

    // ===== 报告与阈值 =====

    /// 缺失成本报告输出目录
    async fn get_report_dir(&self) -> ConfigResult<PathBuf>;

    /// 达成状态阈值
    ///
    /// # 默认值
    /// - on-target 100, at-risk 80
    async fn get_status_thresholds(&self) -> ConfigResult<StatusThresholds>;

    // ===== 追溯 =====

    /// 全部 global 配置的 JSON 快照（随批次记录保存）
    async fn config_snapshot(&self) -> ConfigResult<String>;
}
