// ==========================================
// 销售台账 - 业绩汇总引擎
// ==========================================
// 职责: 月度实绩 × 月度目标 → 业绩记录 → 学期/年度汇总 → 状态分级
// 红线: 达成率由汇总后的 Σrevenue / Σtarget 重新计算，禁止对月度百分比求平均
// 红线: Engine 不拼 SQL，输入由 PerformanceRepository / MonthlyTargetRepository 提供
// ==========================================

use crate::domain::performance::{
    achievement_pct, LeaderboardEntry, MonthlyActual, PerformanceQuery, PerformanceRecord,
    PerformanceRollup, StatusThresholds,
};
use crate::domain::target::MonthlyTarget;
use crate::domain::types::{PerformanceGrain, Semester};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// 汇总分组键: (year, 学期或月份序号, salesperson)
type RollupKey = (i32, u32, String);

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    revenue: f64,
    profit: f64,
    target: f64,
}

impl Totals {
    fn add(&mut self, record: &PerformanceRecord) {
        self.revenue += record.revenue;
        self.profit += record.profit;
        self.target += record.target;
    }
}

// ==========================================
// PerformanceAggregator - 业绩汇总引擎
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceAggregator {
    thresholds: StatusThresholds,
}

impl PerformanceAggregator {
    pub fn new(thresholds: StatusThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> StatusThresholds {
        self.thresholds
    }

    // ==========================================
    // 月度粒度
    // ==========================================

    /// 实绩与目标按 (salesperson, year, month) 全连接
    ///
    /// - 无目标的月份 target = 0
    /// - 有目标无销售的月份 revenue = profit = 0（保证汇总分母完整）
    #[instrument(skip(self, actuals, targets), fields(actuals = actuals.len(), targets = targets.len()))]
    pub fn monthly_records(
        &self,
        actuals: &[MonthlyActual],
        targets: &[MonthlyTarget],
        query: &PerformanceQuery,
    ) -> Vec<PerformanceRecord> {
        let in_scope = |year: i32, month: u32| -> bool {
            query.year.map_or(true, |y| y == year) && query.accepts_month(month)
        };

        let mut joined: BTreeMap<(i32, u32, String), PerformanceRecord> = BTreeMap::new();

        for actual in actuals.iter().filter(|a| in_scope(a.year, a.month)) {
            let Some(semester) = Semester::from_month(actual.month) else {
                continue;
            };
            let entry = joined
                .entry((actual.year, actual.month, actual.salesperson.clone()))
                .or_insert_with(|| PerformanceRecord {
                    salesperson: actual.salesperson.clone(),
                    year: actual.year,
                    month: actual.month,
                    semester,
                    revenue: 0.0,
                    profit: 0.0,
                    target: 0.0,
                    achievement_pct: 0.0,
                });
            entry.revenue += actual.revenue;
            entry.profit += actual.profit;
        }

        for target in targets.iter().filter(|t| in_scope(t.year, t.month)) {
            let entry = joined
                .entry((target.year, target.month, target.salesperson.clone()))
                .or_insert_with(|| PerformanceRecord {
                    salesperson: target.salesperson.clone(),
                    year: target.year,
                    month: target.month,
                    semester: target.semester,
                    revenue: 0.0,
                    profit: 0.0,
                    target: 0.0,
                    achievement_pct: 0.0,
                });
            entry.target += target.target_amount;
        }

        let records: Vec<PerformanceRecord> = joined
            .into_values()
            .map(|mut r| {
                r.achievement_pct = achievement_pct(r.revenue, r.target);
                r
            })
            .collect();

        debug!(records = records.len(), "月度业绩连接完成");
        records
    }

    // ==========================================
    // 汇总粒度
    // ==========================================

    /// 按查询粒度汇总
    pub fn rollup(
        &self,
        records: &[PerformanceRecord],
        grain: PerformanceGrain,
    ) -> Vec<PerformanceRollup> {
        let mut groups: BTreeMap<RollupKey, Totals> = BTreeMap::new();
        for record in records {
            let period = match grain {
                PerformanceGrain::Month => record.month,
                PerformanceGrain::Semester => record.semester.number() as u32,
                PerformanceGrain::Year => 0,
            };
            groups
                .entry((record.year, period, record.salesperson.clone()))
                .or_default()
                .add(record);
        }

        groups
            .into_iter()
            .map(|((year, period, salesperson), totals)| {
                let pct = achievement_pct(totals.revenue, totals.target);
                PerformanceRollup {
                    salesperson,
                    grain,
                    year,
                    semester: match grain {
                        PerformanceGrain::Semester => Semester::from_number(period as i64),
                        _ => None,
                    },
                    month: match grain {
                        PerformanceGrain::Month => Some(period),
                        _ => None,
                    },
                    revenue: totals.revenue,
                    profit: totals.profit,
                    target: totals.target,
                    achievement_pct: pct,
                    status: self.thresholds.classify(pct),
                }
            })
            .collect()
    }

    /// 查询入口: 连接 + 汇总
    pub fn aggregate(
        &self,
        actuals: &[MonthlyActual],
        targets: &[MonthlyTarget],
        query: &PerformanceQuery,
    ) -> Vec<PerformanceRollup> {
        let records = self.monthly_records(actuals, targets, query);
        self.rollup(&records, query.grain)
    }

    // ==========================================
    // 排行榜
    // ==========================================

    /// 按销售员汇总范围内全部月份，仅保留 target > 0，按达成率降序
    pub fn leaderboard(&self, records: &[PerformanceRecord]) -> Vec<LeaderboardEntry> {
        let mut per_person: BTreeMap<String, Totals> = BTreeMap::new();
        for record in records {
            per_person
                .entry(record.salesperson.clone())
                .or_default()
                .add(record);
        }

        let mut entries: Vec<LeaderboardEntry> = per_person
            .into_iter()
            .filter(|(_, totals)| totals.target > 0.0)
            .map(|(salesperson, totals)| {
                let pct = achievement_pct(totals.revenue, totals.target);
                LeaderboardEntry {
                    rank: 0,
                    salesperson,
                    revenue: totals.revenue,
                    profit: totals.profit,
                    target: totals.target,
                    achievement_pct: pct,
                    status: self.thresholds.classify(pct),
                }
            })
            .collect();

        entries.sort_by(|a, b| {
            b.achievement_pct
                .total_cmp(&a.achievement_pct)
                .then_with(|| a.salesperson.cmp(&b.salesperson))
        });
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.rank = i + 1;
        }
        entries
    }
}
