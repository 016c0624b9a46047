// ==========================================
// 销售台账 - 业绩读模型
// ==========================================
// 职责: 业绩记录、汇总、分组、KPI 等派生视图结构
// 红线: 派生数据不落库，读取时由明细与目标计算
// ==========================================

use crate::domain::types::{AchievementStatus, PerformanceGrain, Semester};
use serde::{Deserialize, Serialize};

// ==========================================
// 通用比率
// ==========================================

/// 达成率 = revenue / target × 100，target 为 0 时为 0
pub fn achievement_pct(revenue: f64, target: f64) -> f64 {
    if target > 0.0 {
        revenue / target * 100.0
    } else {
        0.0
    }
}

/// 毛利率 = profit / revenue × 100，revenue 为 0 时为 0
pub fn margin_pct(profit: f64, revenue: f64) -> f64 {
    if revenue != 0.0 {
        profit / revenue * 100.0
    } else {
        0.0
    }
}

/// 同比增长 = (current - previous) / previous × 100，previous 为 0 时为 0
pub fn growth_pct(current: f64, previous: f64) -> f64 {
    if previous != 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    }
}

// ==========================================
// StatusThresholds - 达成状态阈值
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusThresholds {
    pub on_target_pct: f64,
    pub at_risk_pct: f64,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            on_target_pct: 100.0,
            at_risk_pct: 80.0,
        }
    }
}

impl StatusThresholds {
    pub fn classify(&self, achievement_pct: f64) -> AchievementStatus {
        if achievement_pct >= self.on_target_pct {
            AchievementStatus::OnTarget
        } else if achievement_pct >= self.at_risk_pct {
            AchievementStatus::AtRisk
        } else {
            AchievementStatus::OffTarget
        }
    }
}

// ==========================================
// MonthlyActual - 月度实绩（明细汇总）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyActual {
    pub salesperson: String,
    pub year: i32,
    pub month: u32,
    pub revenue: f64,
    pub profit: f64,
}

// ==========================================
// PerformanceRecord - 月度业绩
// ==========================================
// 粒度: (salesperson, year, month)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub salesperson: String,
    pub year: i32,
    pub month: u32,
    pub semester: Semester,
    pub revenue: f64,
    pub profit: f64,
    pub target: f64,
    pub achievement_pct: f64,
}

// ==========================================
// PerformanceRollup - 汇总业绩
// ==========================================
// 达成率由汇总后的分子分母重新计算，不对月度百分比求平均
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRollup {
    pub salesperson: String,
    pub grain: PerformanceGrain,
    pub year: i32,
    pub semester: Option<Semester>, // 学期粒度时有值
    pub month: Option<u32>,         // 月粒度时有值
    pub revenue: f64,
    pub profit: f64,
    pub target: f64,
    pub achievement_pct: f64,
    pub status: AchievementStatus,
}

// ==========================================
// PerformanceQuery - 业绩查询参数
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerformanceQuery {
    pub year: Option<i32>, // 月/学期粒度必填
    pub semester: Option<Semester>,
    pub month: Option<u32>,
    pub grain: PerformanceGrain,
}

impl PerformanceQuery {
    pub fn monthly(year: i32) -> Self {
        Self {
            year: Some(year),
            semester: None,
            month: None,
            grain: PerformanceGrain::Month,
        }
    }

    pub fn semester(year: i32, semester: Semester) -> Self {
        Self {
            year: Some(year),
            semester: Some(semester),
            month: None,
            grain: PerformanceGrain::Semester,
        }
    }

    pub fn yearly(year: Option<i32>) -> Self {
        Self {
            year,
            semester: None,
            month: None,
            grain: PerformanceGrain::Year,
        }
    }

    /// 月份是否落在过滤范围内
    pub fn accepts_month(&self, month: u32) -> bool {
        if let Some(m) = self.month {
            if m != month {
                return false;
            }
        }
        match self.semester {
            Some(s) => s.contains_month(month),
            None => true,
        }
    }
}

// ==========================================
// 分组维度
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakdownDimension {
    Channel,
    Branch,
    Product,
    Customer,
    Salesperson,
}

impl BreakdownDimension {
    /// 对应 sales_transaction 列名（固定白名单，不接受外部输入）
    pub fn column(self) -> &'static str {
        match self {
            BreakdownDimension::Channel => "channel",
            BreakdownDimension::Branch => "branch",
            BreakdownDimension::Product => "description",
            BreakdownDimension::Customer => "customer",
            BreakdownDimension::Salesperson => "salesperson",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub label: String,
    pub revenue: f64,
    pub profit: f64,
    pub marketing_spend: f64,
    pub quantity: f64,
    pub deals: i64, // 明细行数
    pub margin_pct: f64,
}

// ==========================================
// KPI 与趋势
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    pub year: i32,
    pub revenue: f64,
    pub profit: f64,
    pub marketing_spend: f64,
    pub margin_pct: f64,
    pub previous_revenue: f64,
    pub previous_profit: f64,
    pub revenue_growth_pct: f64,
    pub profit_growth_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTrendPoint {
    pub month: u32,
    pub month_label: String,
    pub revenue: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub salesperson: String,
    pub revenue: f64,
    pub profit: f64,
    pub target: f64,
    pub achievement_pct: f64,
    pub status: AchievementStatus,
}

/// 季节性热力格（年 × 月）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalityCell {
    pub year: i32,
    pub month: u32,
    pub revenue: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_achievement_pct_zero_target() {
        assert_eq!(achievement_pct(500.0, 0.0), 0.0);
        assert!((achievement_pct(80.0, 100.0) - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_growth_pct_zero_previous() {
        assert_eq!(growth_pct(100.0, 0.0), 0.0);
        assert!((growth_pct(150.0, 100.0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_status_thresholds() {
        let t = StatusThresholds::default();
        assert_eq!(t.classify(100.0), AchievementStatus::OnTarget);
        assert_eq!(t.classify(99.99), AchievementStatus::AtRisk);
        assert_eq!(t.classify(80.0), AchievementStatus::AtRisk);
        assert_eq!(t.classify(79.99), AchievementStatus::OffTarget);
        assert_eq!(t.classify(0.0), AchievementStatus::OffTarget);
    }

    #[test]
    fn test_query_month_filter() {
        let q = PerformanceQuery::semester(2025, Semester::Second);
        assert!(!q.accepts_month(6));
        assert!(q.accepts_month(7));

        let mut q = PerformanceQuery::monthly(2025);
        q.month = Some(3);
        assert!(q.accepts_month(3));
        assert!(!q.accepts_month(4));
    }
}
