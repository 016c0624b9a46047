// ==========================================
// 销售台账 - 成本主数据导入器
// ==========================================
// 输入: 两列表格（产品描述, 单位成本）
// 语义: upsert；同一文件内重复描述后写覆盖
// 行级: 描述为空 / 成本无法解析 → 跳过并计数
// ==========================================

use crate::domain::cost::{CostUploadSummary, ProductCost};
use crate::domain::transaction::{ImportBatch, RowIssue};
use crate::domain::types::{BatchKind, ImportStatus};
use crate::importer::data_cleaner::{coerce_number, normalize_text};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::find_header;
use crate::importer::file_parser::{ParsedSheet, UniversalFileParser};
use crate::repository::cost_repo::ProductCostRepository;
use crate::repository::import_batch_repo::ImportBatchRepository;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 产品描述列候选名
pub const DESCRIPTION_HEADERS: &[&str] = &["Description", "Product Description", "Product"];

/// 单位成本列候选名
pub const UNIT_COST_HEADERS: &[&str] = &["COGS", "Unit Cost", "Unit COGS", "Cost"];

// ==========================================
// CostImporter - 成本主数据导入器
// ==========================================
pub struct CostImporter {
    cost_repo: Arc<ProductCostRepository>,
    batch_repo: Arc<ImportBatchRepository>,
    file_parser: UniversalFileParser,
}

impl CostImporter {
    pub fn new(
        cost_repo: Arc<ProductCostRepository>,
        batch_repo: Arc<ImportBatchRepository>,
    ) -> Self {
        Self {
            cost_repo,
            batch_repo,
            file_parser: UniversalFileParser,
        }
    }

    /// 导入成本主数据
    ///
    /// # 错误
    /// - 文件无法解析 / 缺少描述或成本列（结构性错误，不写入任何数据）
    #[instrument(skip(self, bytes), fields(batch_id))]
    pub fn import_costs(
        &self,
        bytes: &[u8],
        file_name: Option<&str>,
    ) -> ImportResult<CostUploadSummary> {
        let start_time = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());
        info!(batch_id = %batch_id, file_name = ?file_name, "开始导入成本主数据");

        // === 步骤 1: 解析文件 ===
        debug!("步骤 1: 解析文件");
        let sheet = self.file_parser.parse(bytes, file_name)?;

        // === 步骤 2: 表头校验 + 行提取 ===
        debug!("步骤 2: 表头校验");
        let (costs, issues) = extract_costs(&sheet)?;
        let rows_read = sheet.rows.len();
        let rows_skipped = issues.len();

        // === 步骤 3: upsert ===
        debug!("步骤 3: upsert");
        let rows_upserted = self.cost_repo.upsert_many(&costs)?;

        let summary = CostUploadSummary {
            batch_id: batch_id.clone(),
            rows_read,
            rows_upserted,
            rows_skipped,
            issues,
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        };

        self.batch_repo.insert(&ImportBatch {
            batch_id: batch_id.clone(),
            kind: BatchKind::Cost,
            file_name: file_name.map(|s| s.to_string()),
            status: ImportStatus::Success,
            message: None,
            total_rows: rows_read as i64,
            imported_rows: rows_upserted as i64,
            duplicate_rows: 0,
            skipped_rows: rows_skipped as i64,
            missing_count: 0,
            report_path: None,
            config_snapshot: None,
            elapsed_ms: summary.elapsed_ms as i64,
            created_at: None,
        })?;

        info!(
            batch_id = %batch_id,
            rows_read = rows_read,
            rows_upserted = rows_upserted,
            rows_skipped = rows_skipped,
            "成本主数据导入完成"
        );
        Ok(summary)
    }
}

/// 表头 → 成本行（后写覆盖，按描述排序输出）
pub fn extract_costs(sheet: &ParsedSheet) -> ImportResult<(Vec<ProductCost>, Vec<RowIssue>)> {
    let description_header = find_header(&sheet.headers, DESCRIPTION_HEADERS);
    let cost_header = find_header(&sheet.headers, UNIT_COST_HEADERS);

    let (description_header, cost_header) = match (description_header, cost_header) {
        (Some(d), Some(c)) => (d, c),
        (d, c) => {
            let mut missing = Vec::new();
            if d.is_none() {
                missing.push(DESCRIPTION_HEADERS[0].to_string());
            }
            if c.is_none() {
                missing.push(UNIT_COST_HEADERS[0].to_string());
            }
            return Err(ImportError::MissingRequiredColumns { missing });
        }
    };

    let mut latest: BTreeMap<String, f64> = BTreeMap::new();
    let mut issues = Vec::new();

    for row in &sheet.rows {
        let Some(description) =
            normalize_text(row.cells.get(&description_header).map(|s| s.as_str()))
        else {
            issues.push(RowIssue::error(row.row_number, "description", "产品描述为空"));
            continue;
        };

        let raw_cost = row.cells.get(&cost_header).map(|s| s.as_str()).unwrap_or("");
        match coerce_number(raw_cost) {
            Some(cost) if cost >= 0.0 => {
                if latest.insert(description.clone(), cost).is_some() {
                    debug!(description = %description, row = row.row_number, "重复描述，后写覆盖");
                }
            }
            _ => {
                warn!(row = row.row_number, value = %raw_cost, "单位成本无法解析");
                issues.push(RowIssue::error(
                    row.row_number,
                    "unit_cost",
                    format!("单位成本无法解析: '{}'", raw_cost),
                ));
            }
        }
    }

    let costs = latest
        .into_iter()
        .map(|(description, unit_cost)| ProductCost::new(description, unit_cost))
        .collect();
    Ok((costs, issues))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_csv(text: &str) -> ParsedSheet {
        UniversalFileParser
            .parse(text.as_bytes(), Some("costs.csv"))
            .unwrap()
    }

    #[test]
    fn test_last_write_wins() {
        let sheet = parse_csv("Description,COGS\nWidget-X,100\nWidget-Y,50\nWidget-X,120\n");
        let (costs, issues) = extract_costs(&sheet).unwrap();
        assert!(issues.is_empty());
        assert_eq!(costs.len(), 2);
        assert_eq!(costs[0], ProductCost::new("Widget-X", 120.0));
    }

    #[test]
    fn test_bad_rows_skipped() {
        let sheet = parse_csv("description,unit cost\n,10\nWidget-Z,n/a\nWidget-A,\"1,250.50\"\n");
        let (costs, issues) = extract_costs(&sheet).unwrap();
        assert_eq!(costs, vec![ProductCost::new("Widget-A", 1250.5)]);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].field, "description");
        assert_eq!(issues[1].field, "unit_cost");
    }

    #[test]
    fn test_missing_cost_column() {
        let sheet = parse_csv("Description,Price\nWidget-X,100\n");
        match extract_costs(&sheet) {
            Err(ImportError::MissingRequiredColumns { missing }) => {
                assert_eq!(missing, vec!["COGS".to_string()]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
