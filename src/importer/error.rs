// ==========================================
// 销售台账 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 只承载结构性/基础设施故障；行级问题与批次阻断以值返回
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("文件为空: 缺少表头行")]
    EmptyFile,

    // ===== 结构性错误 =====
    #[error("不是销售明细文件: 缺少单据号/行号列且缺少收入列 (表头: {headers:?})")]
    NotASalesExtract { headers: Vec<String> },

    #[error("缺少必需列: {missing:?}")]
    MissingRequiredColumns { missing: Vec<String> },

    // ===== 报告 =====
    #[error("缺失成本报告写入失败: {0}")]
    ReportWriteError(String),

    // ===== 数据库错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    // ===== 配置错误 =====
    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 配置读取失败的统一包装
    pub fn config(key: &str, err: impl std::fmt::Display) -> Self {
        ImportError::ConfigReadError {
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ImportError::FileNotFound(err.to_string()),
            _ => ImportError::FileReadError(err.to_string()),
        }
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::Repository(RepositoryError::from(err))
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
