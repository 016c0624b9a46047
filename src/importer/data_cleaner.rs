// ==========================================
// 销售台账 - 数据清洗器实现
// ==========================================
// 职责: 文本 TRIM / NULL 标准化 / 数值强转 / 日期解析
// 规则: 单元格级异常降级为 None + 行级 WARNING，不中断批次
// ==========================================

use crate::domain::transaction::{RawSalesRecord, RowIssue};
use crate::domain::types::month_label;
use crate::importer::field_mapper::{CanonicalField, MappedRow};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

/// 支持的日期格式（按优先级；斜杠格式按月在前解析）
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y%m%d",
    "%d.%m.%Y",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d-%b-%Y",
    "%b %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Excel 日期序列号合理区间（1954-10 ~ 2119-01）
const EXCEL_SERIAL_RANGE: std::ops::RangeInclusive<f64> = 20_000.0..=80_000.0;

/// Excel 可表示的最大序列号（9999-12-31）
const EXCEL_SERIAL_MAX: f64 = 2_958_465.0;

/// Excel 序列号 → 日期（1900 闰年缺陷下的基准日为 1899-12-30）
///
/// 超出 Excel 可表示范围的值返回 None
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=EXCEL_SERIAL_MAX).contains(&serial) {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::try_days(serial.floor() as i64)?)
}

/// 空白 → None，其余去首尾空白
pub fn normalize_text(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

/// 标识类字段: 去掉数值导出带出的 ".0" 后缀
pub fn normalize_identifier(value: Option<&str>) -> Option<String> {
    normalize_text(value).map(|v| match v.strip_suffix(".0") {
        Some(stripped) if !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit()) => {
            stripped.to_string()
        }
        _ => v,
    })
}

/// 数值强转: 先按标准浮点文本解析（含科学计数法），
/// 失败再去掉数字、小数点、负号以外的字符后解析
///
/// "4.01E+10" → 40100000000.0；"1,500.00" → 1500.0；"USD 300" → 300.0；无法解析 → None
pub fn coerce_number(value: &str) -> Option<f64> {
    if let Ok(v) = value.trim().parse::<f64>() {
        if v.is_finite() {
            return Some(v);
        }
    }
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// 日期解析（文本格式 / 日期时间格式 / Excel 序列号）
pub fn parse_transaction_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.date());
        }
    }

    match trimmed.parse::<f64>() {
        Ok(serial) if EXCEL_SERIAL_RANGE.contains(&serial) => excel_serial_to_date(serial),
        _ => None,
    }
}

pub struct DataCleaner;

impl DataCleaner {
    /// 映射行 → 类型化中间结构
    ///
    /// 收入/日期/数量无法解析时置空并记 WARNING，行本身保留
    pub fn clean_row(&self, row: &MappedRow) -> (RawSalesRecord, Vec<RowIssue>) {
        let mut issues = Vec::new();
        let row_number = row.row_number;

        let revenue = match row.get(CanonicalField::Revenue) {
            None => None,
            Some(raw) => {
                let parsed = coerce_number(raw);
                if parsed.is_none() {
                    issues.push(RowIssue::warning(
                        row_number,
                        CanonicalField::Revenue.name(),
                        format!("收入无法解析，置空: {}", raw),
                    ));
                }
                parsed
            }
        };

        let quantity = match row.get(CanonicalField::Quantity) {
            None => 0.0,
            Some(raw) => match coerce_number(raw) {
                Some(q) => q,
                None => {
                    issues.push(RowIssue::warning(
                        row_number,
                        CanonicalField::Quantity.name(),
                        format!("数量无法解析，按 0 处理: {}", raw),
                    ));
                    0.0
                }
            },
        };

        let transaction_date = match row.get(CanonicalField::TransactionDate) {
            None => None,
            Some(raw) => {
                let parsed = parse_transaction_date(raw);
                if parsed.is_none() {
                    issues.push(RowIssue::warning(
                        row_number,
                        CanonicalField::TransactionDate.name(),
                        format!("日期无法解析，年月置空: {}", raw),
                    ));
                }
                parsed
            }
        };

        let record = RawSalesRecord {
            document_id: normalize_identifier(row.get(CanonicalField::DocumentId)),
            line_id: normalize_identifier(row.get(CanonicalField::LineId)),
            product_code: normalize_identifier(row.get(CanonicalField::ProductCode)),
            description: normalize_text(row.get(CanonicalField::Description)),
            product_group: normalize_text(row.get(CanonicalField::ProductGroup)),
            customer: normalize_text(row.get(CanonicalField::Customer)),
            salesperson: normalize_text(row.get(CanonicalField::Salesperson)),
            channel: normalize_text(row.get(CanonicalField::Channel)),
            branch: normalize_text(row.get(CanonicalField::Branch)),
            quantity,
            revenue,
            transaction_date,
            year: transaction_date.map(|d| d.year()),
            month: transaction_date.map(|d| d.month()),
            month_label: transaction_date
                .and_then(|d| month_label(d.month()))
                .map(|s| s.to_string()),
            row_number,
        };

        (record, issues)
    }
}
