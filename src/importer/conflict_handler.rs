// ==========================================
// 销售台账 - 去重键派生与冲突处理
// ==========================================
// 职责: 计算每行的去重键，按已落库键集合做反连接
// 规则:
// - 自然键 = 单据号 + 行号
// - 单据号/行号缺失时按无键行策略处理（拒绝 / 视为新行 / 内容指纹）
// - 同批次内重复: 首次出现为新行，其后计为重复
// ==========================================

use crate::domain::transaction::{DedupKey, RawSalesRecord, RowIssue};
use crate::domain::types::UnkeyedRowPolicy;
use crate::repository::sales_repo::ExistingKeys;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// 带去重键的待写入行
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedRecord {
    pub record: RawSalesRecord,
    pub key: DedupKey,
}

impl KeyedRecord {
    /// 内容指纹（仅 CONTENT_HASH 策略的无键行有值）
    pub fn row_hash(&self) -> Option<String> {
        match &self.key {
            DedupKey::Content(hash) => Some(hash.clone()),
            _ => None,
        }
    }
}

/// 反连接结果
#[derive(Debug, Clone, Default)]
pub struct DedupPartition {
    pub new_rows: Vec<KeyedRecord>,
    pub duplicates: usize,
    pub skipped: usize,
    pub issues: Vec<RowIssue>,
}

/// 整行内容指纹（SHA-256 十六进制）
///
/// 字段以 0x1F 分隔，缺失字段为空串，数值统一保留 4 位小数
pub fn content_hash(record: &RawSalesRecord) -> String {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    let parts = [
        text(&record.document_id),
        text(&record.line_id),
        record
            .transaction_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        text(&record.salesperson),
        text(&record.channel),
        text(&record.branch),
        text(&record.customer),
        text(&record.product_code),
        text(&record.description),
        text(&record.product_group),
        format!("{:.4}", record.quantity),
        record.revenue.map(|r| format!("{:.4}", r)).unwrap_or_default(),
    ];

    let mut hasher = Sha256::new();
    hasher.update(parts.join("\u{1F}").as_bytes());
    hex::encode(hasher.finalize())
}

pub struct ConflictHandler {
    policy: UnkeyedRowPolicy,
}

impl ConflictHandler {
    pub fn new(policy: UnkeyedRowPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> UnkeyedRowPolicy {
        self.policy
    }

    /// 派生去重键
    ///
    /// # 返回
    /// - None: 无键行且策略为 REJECT
    pub fn derive_key(&self, record: &RawSalesRecord) -> Option<DedupKey> {
        if let (Some(doc), Some(line)) = (&record.document_id, &record.line_id) {
            return Some(DedupKey::Natural {
                document_id: doc.clone(),
                line_id: line.clone(),
            });
        }

        match self.policy {
            UnkeyedRowPolicy::Reject => None,
            UnkeyedRowPolicy::AlwaysNew => Some(DedupKey::Unkeyed),
            UnkeyedRowPolicy::ContentHash => Some(DedupKey::Content(content_hash(record))),
        }
    }

    /// 按已落库键集合划分新行 / 重复行 / 被拒行
    pub fn partition(&self, records: Vec<RawSalesRecord>, existing: &ExistingKeys) -> DedupPartition {
        let mut result = DedupPartition::default();
        let mut seen: HashSet<DedupKey> = HashSet::new();

        for record in records {
            let key = match self.derive_key(&record) {
                Some(k) => k,
                None => {
                    result.skipped += 1;
                    result.issues.push(RowIssue::error(
                        record.row_number,
                        "document_id/line_id",
                        "单据号或行号缺失，无法去重，已跳过",
                    ));
                    continue;
                }
            };

            let is_duplicate = match &key {
                DedupKey::Natural {
                    document_id,
                    line_id,
                } => existing.contains_natural(document_id, line_id) || seen.contains(&key),
                DedupKey::Content(hash) => existing.contains_hash(hash) || seen.contains(&key),
                DedupKey::Unkeyed => false,
            };

            if is_duplicate {
                result.duplicates += 1;
                continue;
            }

            if key != DedupKey::Unkeyed {
                seen.insert(key.clone());
            }
            result.new_rows.push(KeyedRecord { record, key });
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(doc: Option<&str>, line: Option<&str>, revenue: f64, row_number: usize) -> RawSalesRecord {
        RawSalesRecord {
            document_id: doc.map(|s| s.to_string()),
            line_id: line.map(|s| s.to_string()),
            description: Some("Widget-X".to_string()),
            quantity: 1.0,
            revenue: Some(revenue),
            row_number,
            ..Default::default()
        }
    }

    #[test]
    fn test_partition_against_existing_keys() {
        let mut existing = ExistingKeys::default();
        existing
            .natural
            .insert(("9001".to_string(), "10".to_string()));

        let handler = ConflictHandler::new(UnkeyedRowPolicy::Reject);
        let result = handler.partition(
            vec![
                record(Some("9001"), Some("10"), 100.0, 2),
                record(Some("9001"), Some("20"), 100.0, 3),
            ],
            &existing,
        );

        assert_eq!(result.new_rows.len(), 1);
        assert_eq!(result.duplicates, 1);
        assert_eq!(result.new_rows[0].record.row_number, 3);
    }

    #[test]
    fn test_intra_batch_duplicate_first_wins() {
        let handler = ConflictHandler::new(UnkeyedRowPolicy::Reject);
        let result = handler.partition(
            vec![
                record(Some("9001"), Some("10"), 100.0, 2),
                record(Some("9001"), Some("10"), 999.0, 3),
            ],
            &ExistingKeys::default(),
        );

        assert_eq!(result.new_rows.len(), 1);
        assert_eq!(result.new_rows[0].record.revenue, Some(100.0));
        assert_eq!(result.duplicates, 1);
    }

    #[test]
    fn test_reject_policy_skips_unkeyed() {
        let handler = ConflictHandler::new(UnkeyedRowPolicy::Reject);
        let result = handler.partition(
            vec![record(Some("9001"), None, 100.0, 2)],
            &ExistingKeys::default(),
        );
        assert!(result.new_rows.is_empty());
        assert_eq!(result.skipped, 1);
        assert_eq!(result.issues[0].row_number, 2);
    }

    #[test]
    fn test_always_new_policy_never_deduplicates() {
        let handler = ConflictHandler::new(UnkeyedRowPolicy::AlwaysNew);
        let result = handler.partition(
            vec![record(None, None, 100.0, 2), record(None, None, 100.0, 3)],
            &ExistingKeys::default(),
        );
        assert_eq!(result.new_rows.len(), 2);
        assert_eq!(result.duplicates, 0);
    }

    #[test]
    fn test_content_hash_policy() {
        let handler = ConflictHandler::new(UnkeyedRowPolicy::ContentHash);
        let first = record(None, None, 100.0, 2);
        let hash = content_hash(&first);

        let mut existing = ExistingKeys::default();
        existing.hashes.insert(hash.clone());

        let result = handler.partition(
            vec![first, record(None, None, 250.0, 3)],
            &existing,
        );
        assert_eq!(result.duplicates, 1);
        assert_eq!(result.new_rows.len(), 1);
        assert!(result.new_rows[0].row_hash().is_some());
        assert_ne!(result.new_rows[0].row_hash(), Some(hash));
    }

    #[test]
    fn test_content_hash_ignores_row_number() {
        let a = record(None, None, 100.0, 2);
        let b = record(None, None, 100.0, 50);
        assert_eq!(content_hash(&a), content_hash(&b));
        assert_eq!(content_hash(&a).len(), 64);
    }
}
