// ==========================================
// 销售台账 - 成本校验
// ==========================================
// 红线: 新行引用的产品只要有一个没有成本，整批不得提交
// ==========================================

use crate::importer::conflict_handler::KeyedRecord;
use std::collections::{BTreeSet, HashMap};

/// 成本校验结果
#[derive(Debug, Clone, PartialEq)]
pub enum CostResolution {
    /// 全部产品都有成本
    Resolved,
    /// 缺失成本的产品描述（去重、排序）
    Missing(Vec<String>),
}

impl CostResolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, CostResolution::Resolved)
    }
}

pub struct CostResolver;

impl CostResolver {
    /// 新行引用的产品描述集合
    pub fn referenced_products(rows: &[KeyedRecord]) -> BTreeSet<String> {
        rows.iter()
            .filter_map(|r| r.record.description.clone())
            .collect()
    }

    /// 对照成本主数据
    pub fn resolve(&self, rows: &[KeyedRecord], cost_map: &HashMap<String, f64>) -> CostResolution {
        let missing: Vec<String> = Self::referenced_products(rows)
            .into_iter()
            .filter(|desc| !cost_map.contains_key(desc))
            .collect();

        if missing.is_empty() {
            CostResolution::Resolved
        } else {
            CostResolution::Missing(missing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::{DedupKey, RawSalesRecord};

    fn keyed(description: &str) -> KeyedRecord {
        KeyedRecord {
            record: RawSalesRecord {
                description: Some(description.to_string()),
                ..Default::default()
            },
            key: DedupKey::Unkeyed,
        }
    }

    #[test]
    fn test_missing_products_deduplicated() {
        let mut cost_map = HashMap::new();
        cost_map.insert("Widget-A".to_string(), 10.0);

        let rows = vec![keyed("Widget-X"), keyed("Widget-A"), keyed("Widget-X")];
        assert_eq!(
            CostResolver.resolve(&rows, &cost_map),
            CostResolution::Missing(vec!["Widget-X".to_string()])
        );
    }

    #[test]
    fn test_all_resolved() {
        let mut cost_map = HashMap::new();
        cost_map.insert("Widget-X".to_string(), 100.0);
        assert!(CostResolver.resolve(&[keyed("Widget-X")], &cost_map).is_resolved());
        assert!(CostResolver.resolve(&[], &HashMap::new()).is_resolved());
    }
}
