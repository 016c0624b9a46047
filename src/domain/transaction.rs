// ==========================================
// 销售台账 - 销售明细领域模型
// ==========================================
// 职责: 导入中间结构、落库明细、导入批次、导入结果
// 红线: 明细落库后不可原地修改，只能整行删除后重新导入
// ==========================================

use crate::domain::cost::MissingCostReport;
use crate::domain::types::{BatchKind, ImportStatus, RowIssueLevel};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// RawSalesRecord - 导入中间结构体
// ==========================================
// 用途: 文件解析 → 字段映射 → 此结构
// 生命周期: 仅在导入流程内
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSalesRecord {
    // ===== 自然键 =====
    pub document_id: Option<String>, // 单据号 (Billing Document)
    pub line_id: Option<String>,     // 行号 (Billing Item)

    // ===== 产品 =====
    pub product_code: Option<String>,  // 物料号
    pub description: Option<String>,   // 产品描述（成本主数据的键）
    pub product_group: Option<String>, // 产品组 (PH3)

    // ===== 维度 =====
    pub customer: Option<String>,
    pub salesperson: Option<String>,
    pub channel: Option<String>,
    pub branch: Option<String>,

    // ===== 数值 =====
    pub quantity: f64,           // 缺失时为 0
    pub revenue: Option<f64>,    // 无法解析时为 None

    // ===== 日期 =====
    pub transaction_date: Option<NaiveDate>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub month_label: Option<String>,

    // 元信息
    pub row_number: usize, // 原始文件行号（表头为第 1 行）
}

impl RawSalesRecord {
    /// 单据号与行号均存在
    pub fn has_natural_key(&self) -> bool {
        self.document_id.is_some() && self.line_id.is_some()
    }

    /// 自然键: 单据号 + "_" + 行号
    pub fn natural_key(&self) -> Option<String> {
        match (&self.document_id, &self.line_id) {
            (Some(doc), Some(line)) => Some(format!("{}_{}", doc, line)),
            _ => None,
        }
    }
}

// ==========================================
// DedupKey - 去重键
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DedupKey {
    /// 单据号 + 行号
    Natural { document_id: String, line_id: String },
    /// 整行内容 SHA-256（无键行，CONTENT_HASH 策略）
    Content(String),
    /// 无法去重（无键行，ALWAYS_NEW 策略）
    Unkeyed,
}

// ==========================================
// SalesTransaction - 销售明细（落库）
// ==========================================
// 对齐: sales_transaction 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesTransaction {
    pub transaction_id: Option<i64>, // 自增主键，写入前为 None

    pub document_id: Option<String>,
    pub line_id: Option<String>,
    pub row_hash: Option<String>,

    pub year: Option<i32>,
    pub month: Option<u32>,
    pub month_label: Option<String>,
    pub transaction_date: Option<NaiveDate>,

    pub channel: Option<String>,
    pub branch: Option<String>,
    pub salesperson: Option<String>,
    pub product_code: Option<String>,
    pub description: Option<String>,
    pub product_group: Option<String>,
    pub customer: Option<String>,

    pub quantity: f64,
    pub revenue: Option<f64>,

    // ===== 派生值（写入时计算，读取时不重算）=====
    pub profit: f64,
    pub marketing_spend: f64,

    // ===== 审计字段 =====
    pub batch_id: String,
    pub created_at: Option<String>,
}

impl SalesTransaction {
    /// 由中间结构与派生值组装
    pub fn from_raw(
        raw: &RawSalesRecord,
        row_hash: Option<String>,
        profit: f64,
        marketing_spend: f64,
        batch_id: &str,
    ) -> Self {
        Self {
            transaction_id: None,
            document_id: raw.document_id.clone(),
            line_id: raw.line_id.clone(),
            row_hash,
            year: raw.year,
            month: raw.month,
            month_label: raw.month_label.clone(),
            transaction_date: raw.transaction_date,
            channel: raw.channel.clone(),
            branch: raw.branch.clone(),
            salesperson: raw.salesperson.clone(),
            product_code: raw.product_code.clone(),
            description: raw.description.clone(),
            product_group: raw.product_group.clone(),
            customer: raw.customer.clone(),
            quantity: raw.quantity,
            revenue: raw.revenue,
            profit,
            marketing_spend,
            batch_id: batch_id.to_string(),
            created_at: None,
        }
    }
}

// ==========================================
// RowIssue - 行级问题记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowIssue {
    pub row_number: usize,
    pub field: String,
    pub level: RowIssueLevel,
    pub message: String,
}

impl RowIssue {
    pub fn error(row_number: usize, field: &str, message: impl Into<String>) -> Self {
        Self {
            row_number,
            field: field.to_string(),
            level: RowIssueLevel::Error,
            message: message.into(),
        }
    }

    pub fn warning(row_number: usize, field: &str, message: impl Into<String>) -> Self {
        Self {
            row_number,
            field: field.to_string(),
            level: RowIssueLevel::Warning,
            message: message.into(),
        }
    }
}

// ==========================================
// ImportBatch - 导入批次
// ==========================================
// 对齐: import_batch 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    pub batch_id: String,
    pub kind: BatchKind,
    pub file_name: Option<String>,
    pub status: ImportStatus,
    pub message: Option<String>,
    pub total_rows: i64,
    pub imported_rows: i64,
    pub duplicate_rows: i64,
    pub skipped_rows: i64,
    pub missing_count: i64,
    pub report_path: Option<String>,
    pub config_snapshot: Option<String>,
    pub elapsed_ms: i64,
    pub created_at: Option<String>,
}

// ==========================================
// SalesImportSummary - 销售导入统计
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalesImportSummary {
    pub batch_id: String,
    pub total_rows: usize,         // 解析后的非空行
    pub rows_imported: usize,      // 新写入
    pub duplicates_skipped: usize, // 已存在或批内重复
    pub rows_skipped: usize,       // 校验未通过（如无键行）
    pub issues: Vec<RowIssue>,
    pub elapsed_ms: u64,
}

// ==========================================
// SalesImportOutcome - 销售导入结果
// ==========================================
// 非故障的批次级结果以值返回，不走错误通道
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SalesImportOutcome {
    /// 至少一行新数据已提交
    Imported(SalesImportSummary),
    /// 没有新数据（全部重复或被跳过）
    NothingNew(SalesImportSummary),
    /// 存在缺失成本的产品，整批未提交
    Blocked {
        summary: SalesImportSummary,
        missing: MissingCostReport,
    },
}

impl SalesImportOutcome {
    pub fn status(&self) -> ImportStatus {
        match self {
            SalesImportOutcome::Imported(_) => ImportStatus::Success,
            SalesImportOutcome::NothingNew(_) => ImportStatus::Info,
            SalesImportOutcome::Blocked { .. } => ImportStatus::Error,
        }
    }

    pub fn summary(&self) -> &SalesImportSummary {
        match self {
            SalesImportOutcome::Imported(s) => s,
            SalesImportOutcome::NothingNew(s) => s,
            SalesImportOutcome::Blocked { summary, .. } => summary,
        }
    }

    pub fn rows_imported(&self) -> usize {
        self.summary().rows_imported
    }

    pub fn duplicates_skipped(&self) -> usize {
        self.summary().duplicates_skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_key() {
        let mut raw = RawSalesRecord {
            document_id: Some("9001".to_string()),
            line_id: Some("10".to_string()),
            ..Default::default()
        };
        assert!(raw.has_natural_key());
        assert_eq!(raw.natural_key().as_deref(), Some("9001_10"));

        raw.line_id = None;
        assert!(!raw.has_natural_key());
        assert_eq!(raw.natural_key(), None);
    }

    #[test]
    fn test_outcome_status() {
        let outcome = SalesImportOutcome::NothingNew(SalesImportSummary {
            duplicates_skipped: 3,
            ..Default::default()
        });
        assert_eq!(outcome.status(), ImportStatus::Info);
        assert_eq!(outcome.rows_imported(), 0);
        assert_eq!(outcome.duplicates_skipped(), 3);
    }
}
