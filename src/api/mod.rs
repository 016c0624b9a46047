// ==========================================
// 销售台账 - API 层
// ==========================================
// 职责: 面向调用方（CLI / HTTP 层）的业务接口
// ==========================================

pub mod config_api;
pub mod error;
pub mod import_api;
pub mod performance_api;

// 重导出核心类型
pub use config_api::{ConfigApi, ConfigItem};
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, SalesImportResponse};
pub use performance_api::{PerformanceApi, PerformanceSnapshot, RefreshTrigger, YearOverview};
