// ==========================================
// 销售台账 - 销售目标领域模型
// ==========================================
// 学期目标（上传粒度） → 月度目标（存储粒度）
// ==========================================

use crate::domain::transaction::RowIssue;
use crate::domain::types::Semester;
use serde::{Deserialize, Serialize};

// ==========================================
// SemesterTarget - 学期目标（上传行）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemesterTarget {
    pub salesperson: String,
    pub year: i32,
    pub semester: Semester,
    pub target_amount: f64,
    pub row_number: usize,
}

// ==========================================
// MonthlyTarget - 月度目标
// ==========================================
// 对齐: monthly_target 表，主键 (salesperson, year, month)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTarget {
    pub salesperson: String,
    pub year: i32,
    pub month: u32,
    pub target_amount: f64,
    pub semester: Semester,
}

/// 目标上传统计
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetUploadSummary {
    pub batch_id: String,
    pub rows_read: usize,
    pub rows_allocated: usize,  // 成功分解的学期目标行
    pub monthly_upserts: usize, // 写入的月度目标条数
    pub rows_rejected: usize,
    pub issues: Vec<RowIssue>,
    pub elapsed_ms: u64,
}
