// ==========================================
// 销售台账 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、通用比率
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod cost;
pub mod performance;
pub mod target;
pub mod transaction;
pub mod types;

// 重导出核心类型
pub use cost::{CostUploadSummary, MissingCostReport, ProductCost};
pub use performance::{
    achievement_pct, growth_pct, margin_pct, BreakdownDimension, BreakdownEntry, KpiSummary,
    LeaderboardEntry, MonthlyActual, MonthlyTrendPoint, PerformanceQuery, PerformanceRecord,
    PerformanceRollup, SeasonalityCell, StatusThresholds,
};
pub use target::{MonthlyTarget, SemesterTarget, TargetUploadSummary};
pub use transaction::{
    DedupKey, ImportBatch, RawSalesRecord, RowIssue, SalesImportOutcome, SalesImportSummary,
    SalesTransaction,
};
pub use types::{
    month_label, AchievementStatus, BatchKind, ImportStatus, PerformanceGrain, RowIssueLevel,
    Semester, UnkeyedRowPolicy,
};
