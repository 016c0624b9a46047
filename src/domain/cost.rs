// ==========================================
// 销售台账 - 成本主数据领域模型
// ==========================================
// 职责: 产品单位成本、缺失成本诊断、成本上传统计
// 主键: 产品描述（后写覆盖）
// ==========================================

use crate::domain::transaction::RowIssue;
use serde::{Deserialize, Serialize};

// ==========================================
// ProductCost - 产品单位成本
// ==========================================
// 对齐: product_cost 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCost {
    pub description: String,
    pub unit_cost: f64,
    pub updated_at: Option<String>,
}

impl ProductCost {
    pub fn new(description: impl Into<String>, unit_cost: f64) -> Self {
        Self {
            description: description.into(),
            unit_cost,
            updated_at: None,
        }
    }
}

// ==========================================
// MissingCostReport - 缺失成本诊断
// ==========================================
// 用途: 销售导入被阻断时返回给调用方，附可下载报告路径
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissingCostReport {
    pub products: Vec<String>,       // 缺失成本的产品描述（去重、排序）
    pub report_path: Option<String>, // 报告文件（单列 Description）
}

impl MissingCostReport {
    pub fn missing_count(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// 成本主数据上传统计
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostUploadSummary {
    pub batch_id: String,
    pub rows_read: usize,
    pub rows_upserted: usize,
    pub rows_skipped: usize,
    pub issues: Vec<RowIssue>,
    pub elapsed_ms: u64,
}
