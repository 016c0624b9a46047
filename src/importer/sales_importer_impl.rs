// ==========================================
// 销售台账 - 销售明细导入器实现
// ==========================================
// 职责: 整合导入流程，从上传内容到数据库
// 流程: 解析 → 映射 → 清洗 → 去重 → 成本校验 → 毛利派生 → 落库
// 批次语义: 去重查询、成本校验、写入视为一个单元；成本校验失败则不提交任何行
// 并发: 同一导入器实例内串行执行（单写者），存储层唯一约束兜底
// ==========================================

use crate::config::pipeline_config_trait::PipelineConfigReader;
use crate::config::config_keys;
use crate::domain::cost::MissingCostReport;
use crate::domain::transaction::{
    ImportBatch, RowIssue, SalesImportOutcome, SalesImportSummary, SalesTransaction,
};
use crate::domain::types::{BatchKind, ImportStatus};
use crate::importer::conflict_handler::{ConflictHandler, KeyedRecord};
use crate::importer::cost_resolver::{CostResolution, CostResolver};
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::FieldMapper;
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::importer_trait::SalesImporter;
use crate::importer::missing_cost_report::write_missing_cost_report;
use crate::importer::profit_calculator::ProfitCalculator;
use crate::repository::cost_repo::ProductCostRepository;
use crate::repository::import_batch_repo::ImportBatchRepository;
use crate::repository::sales_repo::SalesTransactionRepository;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 单批次内的管道配置
struct PipelineSettings {
    calculator: ProfitCalculator,
    conflict_handler: ConflictHandler,
    skip_cost_validation: bool,
    report_dir: std::path::PathBuf,
    snapshot: Option<String>,
}

// ==========================================
// SalesImporterImpl - 销售明细导入器实现
// ==========================================
pub struct SalesImporterImpl<R, C>
where
    R: SalesTransactionRepository,
    C: PipelineConfigReader,
{
    // 数据访问层
    sales_repo: Arc<R>,
    cost_repo: Arc<ProductCostRepository>,
    batch_repo: Arc<ImportBatchRepository>,

    // 配置读取器
    config: Arc<C>,

    // 导入组件
    file_parser: UniversalFileParser,
    field_mapper: FieldMapper,
    data_cleaner: DataCleaner,
    cost_resolver: CostResolver,

    // 单写者锁
    write_guard: AsyncMutex<()>,
}

impl<R, C> SalesImporterImpl<R, C>
where
    R: SalesTransactionRepository,
    C: PipelineConfigReader,
{
    pub fn new(
        sales_repo: Arc<R>,
        cost_repo: Arc<ProductCostRepository>,
        batch_repo: Arc<ImportBatchRepository>,
        config: Arc<C>,
    ) -> Self {
        Self {
            sales_repo,
            cost_repo,
            batch_repo,
            config,
            file_parser: UniversalFileParser,
            field_mapper: FieldMapper::default(),
            data_cleaner: DataCleaner,
            cost_resolver: CostResolver,
            write_guard: AsyncMutex::new(()),
        }
    }

    async fn load_settings(&self) -> ImportResult<PipelineSettings> {
        let fallback = self
            .config
            .get_fallback_cost_ratio()
            .await
            .map_err(|e| ImportError::config(config_keys::FALLBACK_COST_RATIO, e))?;
        let marketing = self
            .config
            .get_marketing_rate()
            .await
            .map_err(|e| ImportError::config(config_keys::MARKETING_RATE, e))?;
        let policy = self
            .config
            .get_unkeyed_row_policy()
            .await
            .map_err(|e| ImportError::config(config_keys::UNKEYED_ROW_POLICY, e))?;
        let skip_cost_validation = self
            .config
            .get_skip_cost_validation()
            .await
            .map_err(|e| ImportError::config(config_keys::SKIP_COST_VALIDATION, e))?;
        let report_dir = self
            .config
            .get_report_dir()
            .await
            .map_err(|e| ImportError::config(config_keys::REPORT_DIR, e))?;

        let snapshot = match self.config.config_snapshot().await {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(error = %e, "配置快照获取失败，批次记录不含快照");
                None
            }
        };

        Ok(PipelineSettings {
            calculator: ProfitCalculator::new(fallback, marketing),
            conflict_handler: ConflictHandler::new(policy),
            skip_cost_validation,
            report_dir,
            snapshot,
        })
    }

    fn build_batch(
        summary: &SalesImportSummary,
        file_name: Option<&str>,
        status: ImportStatus,
        message: Option<String>,
        missing: Option<&MissingCostReport>,
        snapshot: Option<String>,
    ) -> ImportBatch {
        ImportBatch {
            batch_id: summary.batch_id.clone(),
            kind: BatchKind::Sales,
            file_name: file_name.map(|s| s.to_string()),
            status,
            message,
            total_rows: summary.total_rows as i64,
            imported_rows: summary.rows_imported as i64,
            duplicate_rows: summary.duplicates_skipped as i64,
            skipped_rows: summary.rows_skipped as i64,
            missing_count: missing.map(|m| m.missing_count() as i64).unwrap_or(0),
            report_path: missing.and_then(|m| m.report_path.clone()),
            config_snapshot: snapshot,
            elapsed_ms: summary.elapsed_ms as i64,
            created_at: None,
        }
    }

    /// 新行 → 落库明细（附毛利派生）
    fn derive_transactions(
        rows: &[KeyedRecord],
        cost_map: &HashMap<String, f64>,
        calculator: &ProfitCalculator,
        batch_id: &str,
    ) -> Vec<SalesTransaction> {
        let mut fallback_rows = 0usize;
        let transactions: Vec<SalesTransaction> = rows
            .iter()
            .map(|keyed| {
                let record = &keyed.record;
                let unit_cost = record
                    .description
                    .as_ref()
                    .and_then(|d| cost_map.get(d).copied());
                let profit = calculator.derive(record.revenue, record.quantity, unit_cost);
                if profit.used_fallback {
                    fallback_rows += 1;
                }
                SalesTransaction::from_raw(
                    record,
                    keyed.row_hash(),
                    profit.profit,
                    profit.marketing_spend,
                    batch_id,
                )
            })
            .collect();

        if fallback_rows > 0 {
            warn!(
                fallback_rows = fallback_rows,
                ratio = calculator.fallback_cost_ratio,
                "部分行使用兜底成本比例计算毛利"
            );
        }
        transactions
    }
}

#[async_trait]
impl<R, C> SalesImporter for SalesImporterImpl<R, C>
where
    R: SalesTransactionRepository + Send + Sync,
    C: PipelineConfigReader + Send + Sync,
{
    /// 导入销售明细
    ///
    /// # 返回
    /// - Imported: 新行已全部提交
    /// - NothingNew: 全部为重复或被跳过
    /// - Blocked: 存在缺失成本的产品，整批未提交，附报告路径
    #[instrument(skip(self, bytes), fields(batch_id))]
    async fn import_sales(
        &self,
        bytes: &[u8],
        file_name: Option<&str>,
    ) -> ImportResult<SalesImportOutcome> {
        let _writer = self.write_guard.lock().await;

        let start_time = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());
        info!(batch_id = %batch_id, file_name = ?file_name, size = bytes.len(), "开始导入销售明细");

        let settings = self.load_settings().await?;

        // === 步骤 1: 解析文件 ===
        debug!("步骤 1: 解析文件");
        let sheet = self.file_parser.parse(bytes, file_name).map_err(|e| {
            error!(error = %e, "文件解析失败");
            e
        })?;
        info!(rows = sheet.rows.len(), headers = sheet.headers.len(), "文件解析完成");

        let mut issues: Vec<RowIssue> = Vec::new();
        for row in &sheet.rows {
            for column in &row.lossy_columns {
                issues.push(RowIssue::warning(
                    row.row_number,
                    column,
                    "单元格含非 UTF-8 字节，已按替换字符解码",
                ));
            }
        }

        // === 步骤 2: 字段映射 ===
        debug!("步骤 2: 字段映射");
        let mapped = self.field_mapper.map_sheet(&sheet)?;

        // === 步骤 3: 数据清洗 ===
        debug!("步骤 3: 数据清洗");
        let mut records = Vec::with_capacity(mapped.len());
        for row in &mapped {
            let (record, row_issues) = self.data_cleaner.clean_row(row);
            issues.extend(row_issues);
            records.push(record);
        }
        let total_rows = records.len();
        debug!(rows = total_rows, warnings = issues.len(), "数据清洗完成");

        // === 步骤 4: 去重（一次性读取已落库键） ===
        debug!("步骤 4: 去重");
        let existing = self.sales_repo.fetch_existing_keys().await?;
        let partition = settings.conflict_handler.partition(records, &existing);
        issues.extend(partition.issues);
        let duplicates = partition.duplicates;
        let mut skipped = partition.skipped;
        info!(
            new_rows = partition.new_rows.len(),
            duplicates = duplicates,
            skipped = skipped,
            policy = %settings.conflict_handler.policy(),
            "去重完成"
        );

        // 无产品描述的新行无法对应成本，跳过
        let mut new_rows = partition.new_rows;
        if !settings.skip_cost_validation {
            new_rows.retain(|keyed| {
                if keyed.record.description.is_some() {
                    true
                } else {
                    skipped += 1;
                    issues.push(RowIssue::error(
                        keyed.record.row_number,
                        "description",
                        "产品描述缺失，无法校验成本，已跳过",
                    ));
                    false
                }
            });
        }

        let mut summary = SalesImportSummary {
            batch_id: batch_id.clone(),
            total_rows,
            rows_imported: 0,
            duplicates_skipped: duplicates,
            rows_skipped: skipped,
            issues,
            elapsed_ms: 0,
        };

        if new_rows.is_empty() {
            summary.elapsed_ms = start_time.elapsed().as_millis() as u64;
            let batch = Self::build_batch(
                &summary,
                file_name,
                ImportStatus::Info,
                Some("没有新数据".to_string()),
                None,
                settings.snapshot,
            );
            self.batch_repo.insert(&batch)?;
            info!(duplicates = duplicates, skipped = skipped, "没有新数据，批次结束");
            return Ok(SalesImportOutcome::NothingNew(summary));
        }

        // === 步骤 5: 成本校验 ===
        debug!("步骤 5: 成本校验");
        let cost_map = self.cost_repo.load_cost_map()?;
        if settings.skip_cost_validation {
            warn!("已跳过成本校验（skip_cost_validation = true）");
        } else if let CostResolution::Missing(products) =
            self.cost_resolver.resolve(&new_rows, &cost_map)
        {
            let report_path =
                match write_missing_cost_report(&settings.report_dir, &batch_id, &products) {
                    Ok(path) => Some(path.display().to_string()),
                    Err(e) => {
                        error!(error = %e, "缺失成本报告写入失败");
                        None
                    }
                };
            let missing = MissingCostReport {
                products,
                report_path,
            };

            summary.elapsed_ms = start_time.elapsed().as_millis() as u64;
            let message = format!("{} 个产品缺少成本，整批未导入", missing.missing_count());
            let batch = Self::build_batch(
                &summary,
                file_name,
                ImportStatus::Error,
                Some(message),
                Some(&missing),
                settings.snapshot,
            );
            self.batch_repo.insert(&batch)?;

            warn!(
                missing_count = missing.missing_count(),
                report_path = ?missing.report_path,
                "成本校验未通过，批次被阻断"
            );
            return Ok(SalesImportOutcome::Blocked { summary, missing });
        }

        // === 步骤 6: 毛利派生 ===
        debug!("步骤 6: 毛利派生");
        let transactions =
            Self::derive_transactions(&new_rows, &cost_map, &settings.calculator, &batch_id);

        // === 步骤 7: 落库（批次记录 + 明细同一事务） ===
        debug!("步骤 7: 落库");
        summary.rows_imported = transactions.len();
        summary.elapsed_ms = start_time.elapsed().as_millis() as u64;
        let batch = Self::build_batch(
            &summary,
            file_name,
            ImportStatus::Success,
            None,
            None,
            settings.snapshot,
        );
        let inserted = self
            .sales_repo
            .insert_batch_atomic(&batch, transactions)
            .await
            .map_err(|e| {
                error!(error = %e, "明细写入失败，整批回滚");
                ImportError::from(e)
            })?;
        summary.rows_imported = inserted;

        info!(
            batch_id = %batch_id,
            rows_imported = inserted,
            duplicates = summary.duplicates_skipped,
            skipped = summary.rows_skipped,
            elapsed_ms = summary.elapsed_ms,
            "销售明细导入完成"
        );
        Ok(SalesImportOutcome::Imported(summary))
    }
}
