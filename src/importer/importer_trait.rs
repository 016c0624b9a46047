// ==========================================
// 销售台账 - 导入层 Trait 定义
// ==========================================
// 职责: 定义解析器与销售导入器接口（不包含实现）
// ==========================================

use crate::domain::transaction::SalesImportOutcome;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::ParsedSheet;
use async_trait::async_trait;

// ==========================================
// FileParser Trait
// ==========================================
// 实现者: CsvParser / ExcelParser
pub trait FileParser: Send + Sync {
    /// 字节流 → 表头 + 非空行
    ///
    /// # 错误
    /// - 内容无法按该格式解析（结构性错误，整个操作失败）
    fn parse_bytes(&self, bytes: &[u8]) -> ImportResult<ParsedSheet>;
}

// ==========================================
// SalesImporter Trait
// ==========================================
// 流程: 解析 → 映射 → 清洗 → 去重 → 成本校验 → 毛利派生 → 落库
#[async_trait]
pub trait SalesImporter: Send + Sync {
    /// 导入一份销售明细提取文件
    ///
    /// # 返回
    /// - Ok(Imported / NothingNew / Blocked): 批次级结果
    /// - Err: 结构性错误或基础设施故障（未提交任何数据）
    async fn import_sales(
        &self,
        bytes: &[u8],
        file_name: Option<&str>,
    ) -> ImportResult<SalesImportOutcome>;
}
