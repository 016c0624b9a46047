// ==========================================
// 销售台账 - 毛利与营销费用派生
// ==========================================
// cost_of_line = unit_cost × quantity      （quantity > 0 且有成本）
//              = revenue × fallback_ratio  （其他情况，仅跳过成本校验时可达）
// profit       = revenue - cost_of_line
// marketing    = revenue × marketing_rate
// ==========================================

use crate::config::{DEFAULT_FALLBACK_COST_RATIO, DEFAULT_MARKETING_RATE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfitBreakdown {
    pub cost_of_line: f64,
    pub profit: f64,
    pub marketing_spend: f64,
    pub used_fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfitCalculator {
    pub fallback_cost_ratio: f64,
    pub marketing_rate: f64,
}

impl Default for ProfitCalculator {
    fn default() -> Self {
        Self {
            fallback_cost_ratio: DEFAULT_FALLBACK_COST_RATIO,
            marketing_rate: DEFAULT_MARKETING_RATE,
        }
    }
}

impl ProfitCalculator {
    pub fn new(fallback_cost_ratio: f64, marketing_rate: f64) -> Self {
        Self {
            fallback_cost_ratio,
            marketing_rate,
        }
    }

    /// 派生单行毛利
    ///
    /// revenue 缺失按 0 计
    pub fn derive(&self, revenue: Option<f64>, quantity: f64, unit_cost: Option<f64>) -> ProfitBreakdown {
        let revenue = revenue.unwrap_or(0.0);
        let (cost_of_line, used_fallback) = match unit_cost {
            Some(cost) if quantity > 0.0 => (cost * quantity, false),
            _ => (revenue * self.fallback_cost_ratio, true),
        };

        ProfitBreakdown {
            cost_of_line,
            profit: revenue - cost_of_line,
            marketing_spend: revenue * self.marketing_rate,
            used_fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profit_from_unit_cost() {
        let calc = ProfitCalculator::default();
        let result = calc.derive(Some(1_000_000.0), 10.0, Some(50_000.0));
        assert_eq!(result.cost_of_line, 500_000.0);
        assert_eq!(result.profit, 500_000.0);
        assert_eq!(result.marketing_spend, 100_000.0);
        assert!(!result.used_fallback);
    }

    #[test]
    fn test_fallback_when_quantity_not_positive() {
        let calc = ProfitCalculator::default();
        let result = calc.derive(Some(1000.0), 0.0, Some(50.0));
        assert!(result.used_fallback);
        assert!((result.profit - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_when_cost_unknown() {
        let calc = ProfitCalculator::new(0.6, 0.05);
        let result = calc.derive(Some(200.0), 3.0, None);
        assert!(result.used_fallback);
        assert!((result.profit - 80.0).abs() < 1e-9);
        assert!((result.marketing_spend - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_revenue_counts_as_zero() {
        let result = ProfitCalculator::default().derive(None, 2.0, Some(100.0));
        assert_eq!(result.profit, -200.0);
        assert_eq!(result.marketing_spend, 0.0);
    }
}
