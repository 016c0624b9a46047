// ==========================================
// 销售台账 - 导入层
// ==========================================
// 职责: 外部表格导入（销售明细 / 成本主数据 / 销售目标）
// 支持: Excel (.xlsx/.xls), CSV
// ==========================================

// 模块声明
pub mod conflict_handler;
pub mod cost_importer;
pub mod cost_resolver;
pub mod data_cleaner;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod importer_trait;
pub mod missing_cost_report;
pub mod profit_calculator;
pub mod sales_importer_impl;
pub mod target_importer;

// 重导出核心类型
pub use conflict_handler::{ConflictHandler, DedupPartition, KeyedRecord};
pub use cost_importer::CostImporter;
pub use cost_resolver::{CostResolution, CostResolver};
pub use data_cleaner::DataCleaner;
pub use error::{ImportError, ImportResult};
pub use field_mapper::{CanonicalField, ColumnMapping, FieldMapper, MappedRow};
pub use file_parser::{CsvParser, ExcelParser, FileFormat, ParsedRow, ParsedSheet, UniversalFileParser};
pub use profit_calculator::{ProfitBreakdown, ProfitCalculator};
pub use sales_importer_impl::SalesImporterImpl;
pub use target_importer::TargetImporter;

// 重导出 Trait 接口
pub use importer_trait::{FileParser, SalesImporter};
