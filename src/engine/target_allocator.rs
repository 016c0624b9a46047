// ==========================================
// 销售台账 - 目标分解引擎
// ==========================================
// 职责: 学期目标 → 6 个月度目标（平均分解）
// 规则: monthly = target / 6；学期 1 → 1..6 月，学期 2 → 7..12 月
// 红线: Engine 不拼 SQL，写入由 MonthlyTargetRepository 负责
// ==========================================

use crate::domain::target::{MonthlyTarget, SemesterTarget};
use tracing::instrument;

/// 每学期月数
pub const MONTHS_PER_SEMESTER: u32 = 6;

// ==========================================
// TargetAllocator - 目标分解引擎
// ==========================================
#[derive(Debug, Default, Clone, Copy)]
pub struct TargetAllocator;

impl TargetAllocator {
    pub fn new() -> Self {
        Self
    }

    /// 分解单条学期目标
    pub fn allocate(&self, target: &SemesterTarget) -> Vec<MonthlyTarget> {
        let monthly_amount = target.target_amount / MONTHS_PER_SEMESTER as f64;
        target
            .semester
            .months()
            .map(|month| MonthlyTarget {
                salesperson: target.salesperson.clone(),
                year: target.year,
                month,
                target_amount: monthly_amount,
                semester: target.semester,
            })
            .collect()
    }

    /// 批量分解
    ///
    /// 同一 (salesperson, year, month) 出现多次时后者覆盖前者，与 upsert 语义一致
    #[instrument(skip(self, targets), fields(count = targets.len()))]
    pub fn allocate_all(&self, targets: &[SemesterTarget]) -> Vec<MonthlyTarget> {
        targets.iter().flat_map(|t| self.allocate(t)).collect()
    }
}
