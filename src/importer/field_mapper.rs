// ==========================================
// 销售台账 - 字段映射器实现
// ==========================================
// 职责: ERP 表头 → 标准字段
// 规则: 映射表带版本号；表头比较忽略大小写与首尾空白；未知表头忽略
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{ParsedRow, ParsedSheet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// 当前销售明细映射表版本
pub const SALES_MAPPING_VERSION: u32 = 1;

// ==========================================
// CanonicalField - 标准字段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    DocumentId,
    LineId,
    ProductCode,
    Description,
    ProductGroup,
    Customer,
    Salesperson,
    Channel,
    Branch,
    Quantity,
    Revenue,
    TransactionDate,
}

impl CanonicalField {
    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::DocumentId => "document_id",
            CanonicalField::LineId => "line_id",
            CanonicalField::ProductCode => "product_code",
            CanonicalField::Description => "description",
            CanonicalField::ProductGroup => "product_group",
            CanonicalField::Customer => "customer",
            CanonicalField::Salesperson => "salesperson",
            CanonicalField::Channel => "channel",
            CanonicalField::Branch => "branch",
            CanonicalField::Quantity => "quantity",
            CanonicalField::Revenue => "revenue",
            CanonicalField::TransactionDate => "transaction_date",
        }
    }
}

// ==========================================
// ColumnMapping - 版本化映射表
// ==========================================
// 标准字段 → 可接受的源表头变体（按优先级）
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    pub version: u32,
    entries: Vec<(CanonicalField, Vec<&'static str>)>,
}

impl ColumnMapping {
    /// 销售明细映射 v1
    pub fn sales_v1() -> Self {
        use CanonicalField::*;
        Self {
            version: SALES_MAPPING_VERSION,
            entries: vec![
                (DocumentId, vec!["Billing Document", "Document", "Document No", "Invoice No"]),
                (LineId, vec!["Billing Item", "Item", "Line", "Line No"]),
                (ProductCode, vec!["Material", "Product Code", "Material Code"]),
                (Description, vec!["Description", "Material Description", "Product Description"]),
                (ProductGroup, vec!["PH3", "Product Group"]),
                (Customer, vec!["Name of Bill to", "Customer", "Customer Name", "Bill To"]),
                (Salesperson, vec!["Salesman Name", "Salesperson", "Sales Rep", "Salesman"]),
                (Channel, vec!["Dist", "Channel", "Distribution Channel"]),
                (Branch, vec!["Branch", "Sales Office"]),
                (Quantity, vec!["Billing Qty", "Quantity", "Qty"]),
                (Revenue, vec!["Net Value", "Revenue", "Net Amount"]),
                (TransactionDate, vec!["Billing Date", "Transaction Date", "Date"]),
            ],
        }
    }

    /// 按表头解析出每个标准字段对应的实际列名
    pub fn resolve(&self, headers: &[String]) -> ResolvedColumns {
        let normalized: HashMap<String, &String> = headers
            .iter()
            .filter(|h| !h.trim().is_empty())
            .map(|h| (normalize_header(h), h))
            .collect();

        let mut columns = HashMap::new();
        let mut used: Vec<&String> = Vec::new();
        for (field, variants) in &self.entries {
            let mut matched: Vec<&String> = variants
                .iter()
                .filter_map(|v| normalized.get(&normalize_header(v)).copied())
                .collect();
            if matched.len() > 1 {
                warn!(
                    field = field.name(),
                    headers = ?matched,
                    "多个表头映射到同一标准字段，取优先级最高者"
                );
            }
            if !matched.is_empty() {
                let header = matched.remove(0);
                used.push(header);
                columns.insert(*field, header.clone());
            }
        }

        let ignored: Vec<String> = headers
            .iter()
            .filter(|h| !h.trim().is_empty() && !used.contains(h))
            .cloned()
            .collect();
        if !ignored.is_empty() {
            debug!(ignored = ?ignored, mapping_version = self.version, "未映射的表头已忽略");
        }

        ResolvedColumns { columns, ignored }
    }
}

fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase()
}

/// 在表头中查找任一候选名（大小写不敏感），返回原始表头
///
/// 用于成本/目标等主数据上传的固定列
pub fn find_header(headers: &[String], variants: &[&str]) -> Option<String> {
    variants.iter().find_map(|v| {
        let wanted = normalize_header(v);
        headers
            .iter()
            .find(|h| normalize_header(h) == wanted)
            .cloned()
    })
}

// ==========================================
// ResolvedColumns - 解析后的列映射
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ResolvedColumns {
    columns: HashMap<CanonicalField, String>,
    pub ignored: Vec<String>,
}

impl ResolvedColumns {
    pub fn has(&self, field: CanonicalField) -> bool {
        self.columns.contains_key(&field)
    }

    pub fn header_for(&self, field: CanonicalField) -> Option<&str> {
        self.columns.get(&field).map(|s| s.as_str())
    }

    /// 销售明细的最低结构要求: 标识列或收入列至少存在其一
    pub fn ensure_sales_extract(&self, headers: &[String]) -> ImportResult<()> {
        let has_identity = self.has(CanonicalField::DocumentId) || self.has(CanonicalField::LineId);
        if !has_identity && !self.has(CanonicalField::Revenue) {
            return Err(ImportError::NotASalesExtract {
                headers: headers.to_vec(),
            });
        }
        Ok(())
    }
}

// ==========================================
// MappedRow - 映射后的行（仍为文本）
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow {
    pub row_number: usize,
    values: HashMap<CanonicalField, String>,
}

impl MappedRow {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            values: HashMap::new(),
        }
    }

    pub fn with(mut self, field: CanonicalField, value: &str) -> Self {
        self.values.insert(field, value.to_string());
        self
    }

    /// 取字段文本（空白视为缺失）
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.values
            .get(&field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

pub struct FieldMapper {
    mapping: ColumnMapping,
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self::new(ColumnMapping::sales_v1())
    }
}

impl FieldMapper {
    pub fn new(mapping: ColumnMapping) -> Self {
        Self { mapping }
    }

    pub fn mapping_version(&self) -> u32 {
        self.mapping.version
    }

    /// 映射整张表
    ///
    /// # 错误
    /// - NotASalesExtract: 标识列与收入列均缺失
    pub fn map_sheet(&self, sheet: &ParsedSheet) -> ImportResult<Vec<MappedRow>> {
        let resolved = self.mapping.resolve(&sheet.headers);
        resolved.ensure_sales_extract(&sheet.headers)?;

        Ok(sheet
            .rows
            .iter()
            .map(|row| self.map_row(&resolved, row))
            .collect())
    }

    fn map_row(&self, resolved: &ResolvedColumns, row: &ParsedRow) -> MappedRow {
        let mut mapped = MappedRow::new(row.row_number);
        for (field, header) in &resolved.columns {
            if let Some(value) = row.cells.get(header) {
                mapped.values.insert(*field, value.clone());
            }
        }
        mapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(headers: &[&str], rows: Vec<Vec<&str>>) -> ParsedSheet {
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(idx, values)| ParsedRow {
                row_number: idx + 2,
                cells: headers
                    .iter()
                    .cloned()
                    .zip(values.into_iter().map(|v| v.to_string()))
                    .collect(),
                lossy_columns: Vec::new(),
            })
            .collect();
        ParsedSheet { headers, rows }
    }

    #[test]
    fn test_maps_erp_headers_case_insensitive() {
        let s = sheet(
            &["billing document", "Billing Item", "Net Value", "Unrelated"],
            vec![vec!["9001", "10", "500", "x"]],
        );
        let rows = FieldMapper::default().map_sheet(&s).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(CanonicalField::DocumentId), Some("9001"));
        assert_eq!(rows[0].get(CanonicalField::LineId), Some("10"));
        assert_eq!(rows[0].get(CanonicalField::Revenue), Some("500"));
        assert_eq!(rows[0].get(CanonicalField::Salesperson), None);
    }

    #[test]
    fn test_rejects_non_sales_sheet() {
        let s = sheet(&["Foo", "Bar"], vec![vec!["1", "2"]]);
        let err = FieldMapper::default().map_sheet(&s).unwrap_err();
        assert!(matches!(err, ImportError::NotASalesExtract { .. }));
    }

    #[test]
    fn test_missing_optional_columns_allowed() {
        let s = sheet(&["Net Value"], vec![vec!["100"]]);
        let rows = FieldMapper::default().map_sheet(&s).unwrap();
        assert_eq!(rows[0].get(CanonicalField::Revenue), Some("100"));
        assert_eq!(rows[0].get(CanonicalField::DocumentId), None);
    }

    #[test]
    fn test_resolve_reports_ignored_headers() {
        let headers = vec!["Dist".to_string(), "Extra".to_string()];
        let resolved = ColumnMapping::sales_v1().resolve(&headers);
        assert_eq!(resolved.header_for(CanonicalField::Channel), Some("Dist"));
        assert_eq!(resolved.ignored, vec!["Extra".to_string()]);
    }
}
