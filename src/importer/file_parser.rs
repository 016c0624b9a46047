// ==========================================
// 销售台账 - 文件解析器实现
// ==========================================
// 阶段 0: 字节流 → 表头 + 行（单元格统一为字符串）
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 规则: 完全空白的行在此阶段丢弃
// 规则: CSV 单元格非 UTF-8 时按替换字符解码，并记下列名供行级告警
// ==========================================

use crate::importer::data_cleaner::excel_serial_to_date;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::FileParser;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use tracing::warn;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const ZIP_SIGNATURE: &[u8] = &[0x50, 0x4B, 0x03, 0x04];
const OLE_SIGNATURE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
/// 内容嗅探时检查的前缀长度
const SNIFF_WINDOW: usize = 4096;

// ==========================================
// 解析结果
// ==========================================

/// 一行数据（表头 → 单元格文本）
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub row_number: usize, // 原始行号（表头为第 1 行）
    pub cells: HashMap<String, String>,
    pub lossy_columns: Vec<String>, // 经替换字符解码的列
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSheet {
    pub headers: Vec<String>,
    pub rows: Vec<ParsedRow>,
}

impl ParsedSheet {
    fn push_row(&mut self, row_number: usize, values: Vec<String>, lossy: &[usize]) {
        let mut cells = HashMap::new();
        let mut lossy_columns = Vec::new();
        for (col_idx, value) in values.into_iter().enumerate() {
            if let Some(header) = self.headers.get(col_idx) {
                if header.is_empty() {
                    continue;
                }
                if lossy.contains(&col_idx) {
                    lossy_columns.push(header.clone());
                }
                cells.insert(header.clone(), value.trim().to_string());
            }
        }

        // 跳过完全空白的行
        if cells.values().all(|v| v.is_empty()) {
            return;
        }

        self.rows.push(ParsedRow {
            row_number,
            cells,
            lossy_columns,
        });
    }
}

// ==========================================
// 文件格式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
    Xls,
}

impl FileFormat {
    /// 按文件扩展名判定
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "csv" => Some(FileFormat::Csv),
            "xlsx" | "xlsm" => Some(FileFormat::Xlsx),
            "xls" => Some(FileFormat::Xls),
            _ => None,
        }
    }

    /// 按内容签名判定（zip → xlsx，OLE → xls，无 NUL 字节的文本 → csv）
    ///
    /// 文本不要求是合法 UTF-8（ERP 常导出 Windows-1252）
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(ZIP_SIGNATURE) {
            Some(FileFormat::Xlsx)
        } else if bytes.starts_with(OLE_SIGNATURE) {
            Some(FileFormat::Xls)
        } else if !bytes.is_empty() && !bytes.iter().take(SNIFF_WINDOW).any(|b| *b == 0) {
            Some(FileFormat::Csv)
        } else {
            None
        }
    }
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_bytes(&self, bytes: &[u8]) -> ImportResult<ParsedSheet> {
        let content = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(content);

        let headers: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(|h| String::from_utf8_lossy(h).trim().to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(ImportError::EmptyFile);
        }

        let mut sheet = ParsedSheet {
            headers,
            rows: Vec::new(),
        };

        for (row_idx, result) in reader.byte_records().enumerate() {
            let record = result?;
            // 表头为第 1 行
            let row_number = row_idx + 2;

            let mut lossy = Vec::new();
            let values = record
                .iter()
                .enumerate()
                .map(|(col_idx, field)| match std::str::from_utf8(field) {
                    Ok(v) => v.to_string(),
                    Err(_) => {
                        lossy.push(col_idx);
                        String::from_utf8_lossy(field).into_owned()
                    }
                })
                .collect();

            if !lossy.is_empty() {
                warn!(
                    row_number = row_number,
                    columns = ?lossy,
                    "单元格含非 UTF-8 字节，已按替换字符解码"
                );
            }
            sheet.push_row(row_number, values, &lossy);
        }

        Ok(sheet)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse_bytes(&self, bytes: &[u8]) -> ImportResult<ParsedSheet> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        // 读取第一个 sheet
        let sheet_names = workbook.sheet_names();
        let sheet_name = sheet_names
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;

        let range = workbook.worksheet_range(&sheet_name)?;

        // 提取表头（第一行）
        let mut rows = range.rows();
        let header_row = rows.next().ok_or(ImportError::EmptyFile)?;
        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| cell_to_string(cell).trim().to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(ImportError::EmptyFile);
        }

        let mut sheet = ParsedSheet {
            headers,
            rows: Vec::new(),
        };

        // range 从已用区域左上角开始，行号按表头行偏移
        let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);
        for (idx, data_row) in rows.enumerate() {
            let values = data_row.iter().map(cell_to_string).collect();
            sheet.push_row(first_row + idx + 2, values, &[]);
        }

        Ok(sheet)
    }
}

/// 单元格 → 文本
///
/// - 整数值的浮点数去掉小数部分（单据号常被存为数值）
/// - Excel 日期序列号转为 YYYY-MM-DD
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_number(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match excel_serial_to_date(dt.as_f64()) {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => format_number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}

fn format_number(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

// ==========================================
// 通用文件解析器（按文件名或内容签名选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    /// 解析上传内容
    ///
    /// # 参数
    /// - bytes: 文件内容
    /// - file_name: 原始文件名（可选，用于扩展名判定）
    pub fn parse(&self, bytes: &[u8], file_name: Option<&str>) -> ImportResult<ParsedSheet> {
        let format = file_name
            .and_then(FileFormat::from_file_name)
            .or_else(|| FileFormat::sniff(bytes))
            .ok_or_else(|| {
                ImportError::UnsupportedFormat(file_name.unwrap_or("<未知>").to_string())
            })?;

        match format {
            FileFormat::Csv => CsvParser.parse_bytes(bytes),
            FileFormat::Xlsx | FileFormat::Xls => ExcelParser.parse_bytes(bytes),
        }
    }

    /// 读取磁盘文件后解析
    pub fn parse_file<P: AsRef<Path>>(&self, file_path: P) -> ImportResult<ParsedSheet> {
        let path = file_path.as_ref();
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        let bytes = std::fs::read(path)?;
        let name = path.file_name().and_then(|n| n.to_str());
        self.parse(&bytes, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_parser_valid_content() {
        let content = "Billing Document,Net Value,Salesman Name\n9001,\"1,500.00\",Alice\n9002,300,Bob\n";
        let sheet = CsvParser.parse_bytes(content.as_bytes()).unwrap();

        assert_eq!(sheet.headers, vec!["Billing Document", "Net Value", "Salesman Name"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0].row_number, 2);
        assert_eq!(
            sheet.rows[0].cells.get("Net Value"),
            Some(&"1,500.00".to_string())
        );
    }

    #[test]
    fn test_csv_parser_skip_empty_rows_and_bom() {
        let mut content = UTF8_BOM.to_vec();
        content.extend_from_slice(b"Material,Net Value\nM1,10\n,\nM2,20\n");
        let sheet = CsvParser.parse_bytes(&content).unwrap();

        assert_eq!(sheet.headers[0], "Material");
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[1].row_number, 4);
    }

    #[test]
    fn test_sniff_format() {
        assert_eq!(FileFormat::sniff(b"PK\x03\x04rest"), Some(FileFormat::Xlsx));
        assert_eq!(FileFormat::sniff(OLE_SIGNATURE), Some(FileFormat::Xls));
        assert_eq!(FileFormat::sniff(b"a,b\n1,2\n"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::sniff(&[0xFF, 0xFE, 0x00, 0x9F]), None);
        assert_eq!(FileFormat::sniff(b"Name\nJos\xE9\n"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::sniff(b""), None);
    }

    #[test]
    fn test_csv_parser_non_utf8_cell_keeps_row() {
        let content: &[u8] =
            b"Billing Document,Name of Bill to,Net Value\n9001,PT Maju,100\n9002,Caf\xE9 Jaya,200\n";
        let sheet = CsvParser.parse_bytes(content).unwrap();

        assert_eq!(sheet.rows.len(), 2);
        assert!(sheet.rows[0].lossy_columns.is_empty());
        assert_eq!(sheet.rows[1].lossy_columns, vec!["Name of Bill to".to_string()]);
        assert_eq!(
            sheet.rows[1].cells.get("Name of Bill to"),
            Some(&"Caf\u{FFFD} Jaya".to_string())
        );
        assert_eq!(sheet.rows[1].cells.get("Net Value"), Some(&"200".to_string()));
    }

    #[test]
    fn test_corrupt_excel_is_structural_error() {
        let result = UniversalFileParser.parse(b"PK\x03\x04 not really a zip", Some("sales.xlsx"));
        assert!(result.is_err());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(90001234.0), "90001234");
        assert_eq!(format_number(12.5), "12.5");
    }
}
