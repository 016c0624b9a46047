// ==========================================
// 销售台账 - 核心库
// ==========================================
// 职责: 销售明细幂等导入、毛利派生、目标分解、业绩汇总
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组件装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AchievementStatus, BatchKind, ImportStatus, PerformanceGrain, Semester, UnkeyedRowPolicy,
};

// 领域实体
pub use domain::{
    MonthlyTarget, PerformanceQuery, PerformanceRecord, PerformanceRollup, ProductCost,
    SalesImportOutcome, SalesTransaction, SemesterTarget,
};

// 引擎
pub use engine::{PerformanceAggregator, TargetAllocator};

// API
pub use api::{ConfigApi, ImportApi, PerformanceApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "销售台账";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
