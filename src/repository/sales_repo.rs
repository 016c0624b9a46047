// ==========================================
// 销售台账 - 销售明细 Repository Trait
// ==========================================
// 职责: 定义销售明细数据访问接口（不包含业务逻辑）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::transaction::{ImportBatch, SalesTransaction};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use std::collections::HashSet;

// ==========================================
// ExistingKeys - 已落库去重键集合
// ==========================================
// 每批次只查询一次，导入层在内存中做反连接
#[derive(Debug, Clone, Default)]
pub struct ExistingKeys {
    pub natural: HashSet<(String, String)>, // (document_id, line_id)
    pub hashes: HashSet<String>,            // row_hash
}

impl ExistingKeys {
    pub fn contains_natural(&self, document_id: &str, line_id: &str) -> bool {
        self.natural
            .contains(&(document_id.to_string(), line_id.to_string()))
    }

    pub fn contains_hash(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.natural.len() + self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.natural.is_empty() && self.hashes.is_empty()
    }
}

// ==========================================
// SalesTransactionRepository Trait
// ==========================================
// 实现者: SalesTransactionRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait SalesTransactionRepository: Send + Sync {
    /// 一次性读取全部已存在的去重键
    async fn fetch_existing_keys(&self) -> RepositoryResult<ExistingKeys>;

    /// 批次记录 + 明细在同一事务中写入
    ///
    /// # 返回
    /// - Ok(usize): 写入的明细行数
    /// - Err: 任一行失败（含唯一约束兜底）则整批回滚
    async fn insert_batch_atomic(
        &self,
        batch: &ImportBatch,
        rows: Vec<SalesTransaction>,
    ) -> RepositoryResult<usize>;

    /// 统计明细总行数
    async fn count_transactions(&self) -> RepositoryResult<i64>;

    /// 查询指定批次写入的明细
    async fn list_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<SalesTransaction>>;

    /// 删除指定单据号的全部明细（被新提取覆盖的旧数据）
    async fn delete_by_documents(&self, document_ids: &[String]) -> RepositoryResult<usize>;

    /// 删除指定年月的全部明细
    async fn delete_by_period(&self, year: i32, month: Option<u32>) -> RepositoryResult<usize>;
}
