// ==========================================
// 销售台账 - 销售目标导入器
// ==========================================
// 输入: Salesman Name / Year(可选) / Semester / Target
// 流程: 解析 → 表头校验 → 行校验 → 目标分解 → 月度 upsert
// 行级: 学期非法 / 金额非法 / 销售员为空 → 拒绝该行，其余行继续
// ==========================================

use crate::config::config_keys;
use crate::config::pipeline_config_trait::PipelineConfigReader;
use crate::domain::target::{SemesterTarget, TargetUploadSummary};
use crate::domain::transaction::{ImportBatch, RowIssue};
use crate::domain::types::{BatchKind, ImportStatus, Semester};
use crate::engine::target_allocator::TargetAllocator;
use crate::importer::data_cleaner::{coerce_number, normalize_text};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::find_header;
use crate::importer::file_parser::{ParsedRow, ParsedSheet, UniversalFileParser};
use crate::repository::import_batch_repo::ImportBatchRepository;
use crate::repository::target_repo::MonthlyTargetRepository;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub const SALESPERSON_HEADERS: &[&str] = &["Salesman Name", "Salesperson", "Sales Name"];
pub const YEAR_HEADERS: &[&str] = &["Year"];
pub const SEMESTER_HEADERS: &[&str] = &["Semester"];
pub const TARGET_HEADERS: &[&str] = &["Target", "Target Amount"];

/// 已定位的目标文件列
#[derive(Debug, Clone)]
struct TargetColumns {
    salesperson: String,
    year: Option<String>,
    semester: String,
    target: String,
}

impl TargetColumns {
    fn locate(headers: &[String]) -> ImportResult<Self> {
        let salesperson = find_header(headers, SALESPERSON_HEADERS);
        let semester = find_header(headers, SEMESTER_HEADERS);
        let target = find_header(headers, TARGET_HEADERS);

        match (salesperson, semester, target) {
            (Some(salesperson), Some(semester), Some(target)) => Ok(Self {
                salesperson,
                year: find_header(headers, YEAR_HEADERS),
                semester,
                target,
            }),
            (salesperson, semester, target) => {
                let missing = [
                    (salesperson.is_none(), SALESPERSON_HEADERS[0]),
                    (semester.is_none(), SEMESTER_HEADERS[0]),
                    (target.is_none(), TARGET_HEADERS[0]),
                ]
                .iter()
                .filter(|(absent, _)| *absent)
                .map(|(_, name)| name.to_string())
                .collect();
                Err(ImportError::MissingRequiredColumns { missing })
            }
        }
    }
}

fn cell<'a>(row: &'a ParsedRow, header: &str) -> Option<&'a str> {
    row.cells.get(header).map(|s| s.as_str())
}

/// 单行 → 学期目标；失败返回行级问题
fn parse_target_row(
    row: &ParsedRow,
    columns: &TargetColumns,
    default_year: i32,
) -> Result<SemesterTarget, RowIssue> {
    let salesperson = normalize_text(cell(row, &columns.salesperson))
        .ok_or_else(|| RowIssue::error(row.row_number, "salesperson", "销售员为空"))?;

    let semester_raw = cell(row, &columns.semester).unwrap_or("");
    let semester = coerce_number(semester_raw)
        .filter(|v| v.fract() == 0.0)
        .and_then(|v| Semester::from_number(v as i64))
        .ok_or_else(|| {
            RowIssue::error(
                row.row_number,
                "semester",
                format!("学期必须为 1 或 2: '{}'", semester_raw),
            )
        })?;

    let target_raw = cell(row, &columns.target).unwrap_or("");
    let target_amount = coerce_number(target_raw)
        .filter(|v| *v >= 0.0)
        .ok_or_else(|| {
            RowIssue::error(
                row.row_number,
                "target",
                format!("目标金额无法解析: '{}'", target_raw),
            )
        })?;

    let year = match columns.year.as_deref().and_then(|h| normalize_text(cell(row, h))) {
        None => default_year,
        Some(raw) => coerce_number(&raw)
            .filter(|v| v.fract() == 0.0 && (1900.0..=9999.0).contains(v))
            .map(|v| v as i32)
            .ok_or_else(|| {
                RowIssue::error(row.row_number, "year", format!("年份无法解析: '{}'", raw))
            })?,
    };

    Ok(SemesterTarget {
        salesperson,
        year,
        semester,
        target_amount,
        row_number: row.row_number,
    })
}

/// 表头校验 + 逐行解析
pub fn extract_targets(
    sheet: &ParsedSheet,
    default_year: i32,
) -> ImportResult<(Vec<SemesterTarget>, Vec<RowIssue>)> {
    let columns = TargetColumns::locate(&sheet.headers)?;
    if columns.year.is_none() {
        debug!(default_year, "目标文件无年份列，使用默认年份");
    }

    let mut targets = Vec::new();
    let mut issues = Vec::new();
    for row in &sheet.rows {
        match parse_target_row(row, &columns, default_year) {
            Ok(target) => targets.push(target),
            Err(issue) => {
                warn!(row = issue.row_number, field = %issue.field, "目标行被拒绝: {}", issue.message);
                issues.push(issue);
            }
        }
    }
    Ok((targets, issues))
}

// ==========================================
// TargetImporter - 销售目标导入器
// ==========================================
pub struct TargetImporter<C>
where
    C: PipelineConfigReader,
{
    target_repo: Arc<MonthlyTargetRepository>,
    batch_repo: Arc<ImportBatchRepository>,
    config: Arc<C>,
    file_parser: UniversalFileParser,
    allocator: TargetAllocator,
}

impl<C> TargetImporter<C>
where
    C: PipelineConfigReader,
{
    pub fn new(
        target_repo: Arc<MonthlyTargetRepository>,
        batch_repo: Arc<ImportBatchRepository>,
        config: Arc<C>,
    ) -> Self {
        Self {
            target_repo,
            batch_repo,
            config,
            file_parser: UniversalFileParser,
            allocator: TargetAllocator::new(),
        }
    }

    /// 导入学期目标并分解为月度目标
    #[instrument(skip(self, bytes), fields(batch_id))]
    pub async fn import_targets(
        &self,
        bytes: &[u8],
        file_name: Option<&str>,
    ) -> ImportResult<TargetUploadSummary> {
        let start_time = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());
        info!(batch_id = %batch_id, file_name = ?file_name, "开始导入销售目标");

        let default_year = self
            .config
            .get_default_target_year()
            .await
            .map_err(|e| ImportError::config(config_keys::DEFAULT_TARGET_YEAR, e))?;

        // === 步骤 1: 解析文件 ===
        debug!("步骤 1: 解析文件");
        let sheet = self.file_parser.parse(bytes, file_name)?;

        // === 步骤 2: 行校验 ===
        debug!("步骤 2: 行校验");
        let (targets, issues) = extract_targets(&sheet, default_year)?;

        // === 步骤 3: 目标分解 ===
        debug!("步骤 3: 目标分解");
        let monthly = self.allocator.allocate_all(&targets);

        // === 步骤 4: 月度 upsert ===
        debug!("步骤 4: 月度 upsert");
        let monthly_upserts = self.target_repo.upsert_many(&monthly)?;

        let summary = TargetUploadSummary {
            batch_id: batch_id.clone(),
            rows_read: sheet.rows.len(),
            rows_allocated: targets.len(),
            monthly_upserts,
            rows_rejected: issues.len(),
            issues,
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        };

        self.batch_repo.insert(&ImportBatch {
            batch_id: batch_id.clone(),
            kind: BatchKind::Target,
            file_name: file_name.map(|s| s.to_string()),
            status: ImportStatus::Success,
            message: None,
            total_rows: summary.rows_read as i64,
            imported_rows: summary.rows_allocated as i64,
            duplicate_rows: 0,
            skipped_rows: summary.rows_rejected as i64,
            missing_count: 0,
            report_path: None,
            config_snapshot: None,
            elapsed_ms: summary.elapsed_ms as i64,
            created_at: None,
        })?;

        info!(
            batch_id = %batch_id,
            rows_allocated = summary.rows_allocated,
            monthly_upserts = monthly_upserts,
            rows_rejected = summary.rows_rejected,
            "销售目标导入完成"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_csv(text: &str) -> ParsedSheet {
        UniversalFileParser
            .parse(text.as_bytes(), Some("targets.csv"))
            .unwrap()
    }

    #[test]
    fn test_rows_with_year_column() {
        let sheet = parse_csv("Salesman Name,Year,Semester,Target\nAni,2024,1,600\nBudi,,2,1200\n");
        let (targets, issues) = extract_targets(&sheet, 2025).unwrap();
        assert!(issues.is_empty());
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].year, 2024);
        assert_eq!(targets[0].semester, Semester::First);
        assert_eq!(targets[1].year, 2025);
        assert_eq!(targets[1].semester, Semester::Second);
    }

    #[test]
    fn test_bad_semester_rejects_only_that_row() {
        let sheet = parse_csv("Salesman Name,Semester,Target\nAni,3,600\nBudi,1,\"1,200\"\n");
        let (targets, issues) = extract_targets(&sheet, 2025).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].salesperson, "Budi");
        assert_eq!(targets[0].target_amount, 1200.0);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "semester");
        assert_eq!(issues[0].row_number, 2);
    }

    #[test]
    fn test_missing_required_headers() {
        let sheet = parse_csv("Name,Semester\nAni,1\n");
        match extract_targets(&sheet, 2025) {
            Err(ImportError::MissingRequiredColumns { missing }) => {
                assert_eq!(missing, vec!["Salesman Name".to_string(), "Target".to_string()]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
