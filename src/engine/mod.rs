// ==========================================
// 销售台账 - 引擎层
// ==========================================
// 职责: 实现业务规则（目标分解、业绩汇总），不拼 SQL
// ==========================================

pub mod performance_aggregator;
pub mod target_allocator;

// 重导出核心引擎
pub use performance_aggregator::PerformanceAggregator;
pub use target_allocator::{TargetAllocator, MONTHS_PER_SEMESTER};
