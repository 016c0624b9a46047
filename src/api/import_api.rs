// ==========================================
// 销售台账 - 导入 API
// ==========================================
// 职责: 封装销售明细 / 成本主数据 / 销售目标上传，以及批次查询与明细删除
// 响应: {status, rows_imported, duplicates_skipped, message, missing_count, report_reference}
// 刷新: 写入成功后触发业绩读模型失效
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::performance_api::{PerformanceApi, RefreshTrigger};
use crate::config::config_manager::ConfigManager;
use crate::domain::cost::CostUploadSummary;
use crate::domain::target::TargetUploadSummary;
use crate::domain::transaction::{ImportBatch, RowIssue, SalesImportOutcome};
use crate::domain::types::ImportStatus;
use crate::importer::cost_importer::CostImporter;
use crate::importer::importer_trait::SalesImporter;
use crate::importer::sales_importer_impl::SalesImporterImpl;
use crate::importer::target_importer::TargetImporter;
use crate::repository::import_batch_repo::ImportBatchRepository;
use crate::repository::sales_repo::SalesTransactionRepository;
use crate::repository::sales_repo_impl::SalesTransactionRepositoryImpl;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// 销售导入响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesImportResponse {
    pub status: ImportStatus,
    pub batch_id: String,
    pub rows_imported: usize,
    pub duplicates_skipped: usize,
    pub rows_skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// 缺失成本的产品数（仅 error）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_count: Option<usize>,
    /// 缺失成本报告（仅 error，单列 Description）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_reference: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_products: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<RowIssue>,
    pub elapsed_ms: u64,
}

impl From<SalesImportOutcome> for SalesImportResponse {
    fn from(outcome: SalesImportOutcome) -> Self {
        let status = outcome.status();
        match outcome {
            SalesImportOutcome::Imported(s) => Self {
                status,
                batch_id: s.batch_id,
                rows_imported: s.rows_imported,
                duplicates_skipped: s.duplicates_skipped,
                rows_skipped: s.rows_skipped,
                message: None,
                missing_count: None,
                report_reference: None,
                missing_products: Vec::new(),
                issues: s.issues,
                elapsed_ms: s.elapsed_ms,
            },
            SalesImportOutcome::NothingNew(s) => Self {
                status,
                batch_id: s.batch_id,
                rows_imported: 0,
                duplicates_skipped: s.duplicates_skipped,
                rows_skipped: s.rows_skipped,
                message: Some("没有新数据".to_string()),
                missing_count: None,
                report_reference: None,
                missing_products: Vec::new(),
                issues: s.issues,
                elapsed_ms: s.elapsed_ms,
            },
            SalesImportOutcome::Blocked { summary, missing } => Self {
                status,
                batch_id: summary.batch_id,
                rows_imported: 0,
                duplicates_skipped: summary.duplicates_skipped,
                rows_skipped: summary.rows_skipped,
                message: Some(format!(
                    "{} 个产品缺少成本 (COGS)，请先更新成本主数据后重新上传",
                    missing.missing_count()
                )),
                missing_count: Some(missing.missing_count()),
                report_reference: missing.report_path,
                missing_products: missing.products,
                issues: summary.issues,
                elapsed_ms: summary.elapsed_ms,
            },
        }
    }
}

type DefaultSalesImporter = SalesImporterImpl<SalesTransactionRepositoryImpl, ConfigManager>;

// ==========================================
// ImportApi - 导入 API
// ==========================================
pub struct ImportApi {
    sales_importer: DefaultSalesImporter,
    cost_importer: CostImporter,
    target_importer: TargetImporter<ConfigManager>,
    sales_repo: Arc<SalesTransactionRepositoryImpl>,
    batch_repo: Arc<ImportBatchRepository>,
    performance_api: Arc<PerformanceApi>,
}

impl ImportApi {
    pub fn new(
        sales_importer: DefaultSalesImporter,
        cost_importer: CostImporter,
        target_importer: TargetImporter<ConfigManager>,
        sales_repo: Arc<SalesTransactionRepositoryImpl>,
        batch_repo: Arc<ImportBatchRepository>,
        performance_api: Arc<PerformanceApi>,
    ) -> Self {
        Self {
            sales_importer,
            cost_importer,
            target_importer,
            sales_repo,
            batch_repo,
            performance_api,
        }
    }

    fn refresh(&self, trigger: RefreshTrigger) {
        if let Err(e) = self.performance_api.refresh(trigger) {
            warn!(error = %e, trigger = %trigger, "读模型刷新失败");
        }
    }

    // ==========================================
    // 销售明细
    // ==========================================

    /// 导入销售明细（内存内容）
    ///
    /// # 返回
    /// - Ok(status = success / info / error): 批次级结果
    /// - Err(ApiError): 文件无法解析等结构性错误
    pub async fn import_sales(
        &self,
        bytes: &[u8],
        file_name: Option<&str>,
    ) -> ApiResult<SalesImportResponse> {
        let outcome = self.sales_importer.import_sales(bytes, file_name).await?;
        if outcome.rows_imported() > 0 {
            self.refresh(RefreshTrigger::SalesImported);
        }
        Ok(SalesImportResponse::from(outcome))
    }

    /// 导入销售明细（文件路径）
    pub async fn import_sales_file(&self, path: &Path) -> ApiResult<SalesImportResponse> {
        let (bytes, name) = read_upload(path).await?;
        self.import_sales(&bytes, name.as_deref()).await
    }

    // ==========================================
    // 成本主数据
    // ==========================================

    pub async fn upload_costs(
        &self,
        bytes: &[u8],
        file_name: Option<&str>,
    ) -> ApiResult<CostUploadSummary> {
        let summary = self.cost_importer.import_costs(bytes, file_name)?;
        self.refresh(RefreshTrigger::CostUploaded);
        Ok(summary)
    }

    pub async fn upload_costs_file(&self, path: &Path) -> ApiResult<CostUploadSummary> {
        let (bytes, name) = read_upload(path).await?;
        self.upload_costs(&bytes, name.as_deref()).await
    }

    // ==========================================
    // 销售目标
    // ==========================================

    pub async fn upload_targets(
        &self,
        bytes: &[u8],
        file_name: Option<&str>,
    ) -> ApiResult<TargetUploadSummary> {
        let summary = self.target_importer.import_targets(bytes, file_name).await?;
        self.refresh(RefreshTrigger::TargetUploaded);
        Ok(summary)
    }

    pub async fn upload_targets_file(&self, path: &Path) -> ApiResult<TargetUploadSummary> {
        let (bytes, name) = read_upload(path).await?;
        self.upload_targets(&bytes, name.as_deref()).await
    }

    // ==========================================
    // 批次与删除
    // ==========================================

    /// 最近的导入批次（新 → 旧）
    pub async fn list_recent_batches(&self, limit: usize) -> ApiResult<Vec<ImportBatch>> {
        Ok(self.batch_repo.list_recent(limit)?)
    }

    pub async fn get_batch(&self, batch_id: &str) -> ApiResult<ImportBatch> {
        self.batch_repo
            .find_by_id(batch_id)?
            .ok_or_else(|| ApiError::NotFound(format!("导入批次(id={})不存在", batch_id)))
    }

    /// 明细总数
    pub async fn count_transactions(&self) -> ApiResult<i64> {
        Ok(self.sales_repo.count_transactions().await?)
    }

    /// 按单据号删除明细（被更正的单据）
    pub async fn delete_transactions_by_documents(
        &self,
        document_ids: &[String],
    ) -> ApiResult<usize> {
        if document_ids.is_empty() {
            return Err(ApiError::InvalidInput("单据号列表为空".to_string()));
        }
        let deleted = self.sales_repo.delete_by_documents(document_ids).await?;
        info!(documents = document_ids.len(), deleted = deleted, "按单据号删除明细");
        self.refresh(RefreshTrigger::TransactionsDeleted);
        Ok(deleted)
    }

    /// 按期间删除明细（整年或单月）
    pub async fn delete_transactions_by_period(
        &self,
        year: i32,
        month: Option<u32>,
    ) -> ApiResult<usize> {
        if let Some(m) = month {
            if !(1..=12).contains(&m) {
                return Err(ApiError::InvalidInput(format!("月份超出范围: {}", m)));
            }
        }
        let deleted = self.sales_repo.delete_by_period(year, month).await?;
        info!(year = year, month = ?month, deleted = deleted, "按期间删除明细");
        self.refresh(RefreshTrigger::TransactionsDeleted);
        Ok(deleted)
    }
}

/// 读取上传文件，返回内容与文件名
async fn read_upload(path: &Path) -> ApiResult<(Vec<u8>, Option<String>)> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        ApiError::ImportError(format!("文件读取失败 ({}): {}", path.display(), e))
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());
    Ok((bytes, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cost::MissingCostReport;
    use crate::domain::transaction::SalesImportSummary;

    #[test]
    fn test_blocked_response_shape() {
        let outcome = SalesImportOutcome::Blocked {
            summary: SalesImportSummary {
                batch_id: "b-1".to_string(),
                total_rows: 3,
                ..Default::default()
            },
            missing: MissingCostReport {
                products: vec!["Widget-X".to_string()],
                report_path: Some("/tmp/missing_cogs_b-1.csv".to_string()),
            },
        };
        let response = SalesImportResponse::from(outcome);
        assert_eq!(response.status, ImportStatus::Error);
        assert_eq!(response.missing_count, Some(1));
        assert_eq!(response.rows_imported, 0);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["report_reference"], "/tmp/missing_cogs_b-1.csv");
    }

    #[test]
    fn test_info_response_omits_missing_fields() {
        let outcome = SalesImportOutcome::NothingNew(SalesImportSummary {
            batch_id: "b-2".to_string(),
            total_rows: 3,
            duplicates_skipped: 3,
            ..Default::default()
        });
        let json = serde_json::to_value(SalesImportResponse::from(outcome)).unwrap();
        assert_eq!(json["status"], "info");
        assert_eq!(json["rows_imported"], 0);
        assert_eq!(json["duplicates_skipped"], 3);
        assert!(json.get("missing_count").is_none());
    }
}
