// ==========================================
// 销售台账 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod pipeline_config_trait;

// 重导出核心配置管理器
pub use config_manager::{
    config_keys, default_report_dir, ConfigManager, DEFAULT_FALLBACK_COST_RATIO,
    DEFAULT_MARKETING_RATE,
};
pub use pipeline_config_trait::{ConfigResult, PipelineConfigReader};
