// ==========================================
// 销售台账 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod cost_repo;
pub mod error;
pub mod import_batch_repo;
pub mod performance_repo;
pub mod sales_repo;
pub mod sales_repo_impl;
pub mod target_repo;

// 重导出核心仓储
pub use cost_repo::ProductCostRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use import_batch_repo::ImportBatchRepository;
pub use performance_repo::{PerformanceRepository, PeriodTotals};
pub use sales_repo::{ExistingKeys, SalesTransactionRepository};
pub use sales_repo_impl::SalesTransactionRepositoryImpl;
pub use target_repo::MonthlyTargetRepository;
