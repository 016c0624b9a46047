// ==========================================
// 销售台账 - 缺失成本报告
// ==========================================
// 格式: CSV，单列 Description，每个缺失产品一行
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use std::fs;
use std::path::{Path, PathBuf};

pub const REPORT_COLUMN: &str = "Description";

/// 报告文件名: missing_cogs_<batch_id>.csv
pub fn report_file_name(batch_id: &str) -> String {
    format!("missing_cogs_{}.csv", batch_id)
}

/// 写出缺失成本报告，返回文件路径
pub fn write_missing_cost_report(
    report_dir: &Path,
    batch_id: &str,
    products: &[String],
) -> ImportResult<PathBuf> {
    fs::create_dir_all(report_dir)
        .map_err(|e| ImportError::ReportWriteError(format!("{}: {}", report_dir.display(), e)))?;

    let path = report_dir.join(report_file_name(batch_id));
    let mut writer = csv::Writer::from_path(&path)
        .map_err(|e| ImportError::ReportWriteError(e.to_string()))?;

    writer
        .write_record([REPORT_COLUMN])
        .map_err(|e| ImportError::ReportWriteError(e.to_string()))?;
    for product in products {
        writer
            .write_record([product.as_str()])
            .map_err(|e| ImportError::ReportWriteError(e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| ImportError::ReportWriteError(e.to_string()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_report_single_column() {
        let dir = tempdir().unwrap();
        let products = vec!["Widget-X".to_string(), "Widget, Y".to_string()];
        let path = write_missing_cost_report(dir.path(), "b-1", &products).unwrap();

        assert!(path.ends_with("missing_cogs_b-1.csv"));

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.headers().unwrap().iter().collect::<Vec<_>>(), vec!["Description"]);
        let rows: Vec<String> = reader
            .records()
            .map(|r| r.unwrap().get(0).unwrap().to_string())
            .collect();
        assert_eq!(rows, products);
    }
}
