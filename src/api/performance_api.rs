// ==========================================
// 销售台账 - 业绩查询 API
// ==========================================
// 职责: 业绩汇总、排行榜、KPI、趋势、分组、季节性
// 读模型: 按查询参数缓存计算结果，由显式 refresh 触发失效
// 刷新时机: 销售导入成功 / 成本上传 / 目标上传 / 明细删除 / 手动
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::ConfigManager;
use crate::config::pipeline_config_trait::PipelineConfigReader;
use crate::domain::performance::{
    growth_pct, margin_pct, BreakdownDimension, BreakdownEntry, KpiSummary, LeaderboardEntry,
    MonthlyTrendPoint, PerformanceQuery, PerformanceRecord, PerformanceRollup, SeasonalityCell,
    StatusThresholds,
};
use crate::domain::types::{month_label, PerformanceGrain, Semester};
use crate::engine::performance_aggregator::PerformanceAggregator;
use crate::repository::performance_repo::PerformanceRepository;
use crate::repository::target_repo::MonthlyTargetRepository;
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

// ==========================================
// 刷新触发源
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// 销售明细导入成功
    SalesImported,
    /// 成本主数据上传
    CostUploaded,
    /// 销售目标上传
    TargetUploaded,
    /// 明细删除
    TransactionsDeleted,
    /// 手动刷新
    ManualRefresh,
}

impl RefreshTrigger {
    pub fn as_str(&self) -> &str {
        match self {
            RefreshTrigger::SalesImported => "SalesImported",
            RefreshTrigger::CostUploaded => "CostUploaded",
            RefreshTrigger::TargetUploaded => "TargetUploaded",
            RefreshTrigger::TransactionsDeleted => "TransactionsDeleted",
            RefreshTrigger::ManualRefresh => "ManualRefresh",
        }
    }
}

impl fmt::Display for RefreshTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 读模型快照
// ==========================================

/// 单个查询的计算结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub query: PerformanceQuery,
    pub records: Vec<PerformanceRecord>, // 月度粒度明细
    pub rollups: Vec<PerformanceRollup>, // 按 query.grain 汇总
    pub leaderboard: Vec<LeaderboardEntry>,
    pub thresholds: StatusThresholds,
    pub computed_at: String,
}

/// 年度总览（驾驶舱首屏）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearOverview {
    pub year: i32,
    pub kpi: KpiSummary,
    pub trend: Vec<MonthlyTrendPoint>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

// ==========================================
// PerformanceApi - 业绩查询 API
// ==========================================
pub struct PerformanceApi {
    performance_repo: Arc<PerformanceRepository>,
    target_repo: Arc<MonthlyTargetRepository>,
    config: Arc<ConfigManager>,
    cache: Mutex<HashMap<PerformanceQuery, Arc<PerformanceSnapshot>>>,
    generation: AtomicU64, // 每次 refresh 递增
}

impl PerformanceApi {
    pub fn new(
        performance_repo: Arc<PerformanceRepository>,
        target_repo: Arc<MonthlyTargetRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            performance_repo,
            target_repo,
            config,
            cache: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    // ==========================================
    // 读模型管理
    // ==========================================

    /// 使全部缓存失效
    pub fn refresh(&self, trigger: RefreshTrigger) -> ApiResult<()> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|e| ApiError::InternalError(format!("读模型锁获取失败: {}", e)))?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let dropped = cache.len();
        cache.clear();
        info!(
            trigger = %trigger,
            dropped = dropped,
            generation = generation,
            "业绩读模型已刷新"
        );
        Ok(())
    }

    /// 当前缓存的快照数
    pub fn cached_snapshots(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// 当前读模型代次
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn validate_query(query: &PerformanceQuery) -> ApiResult<()> {
        if query.year.is_none() && query.grain != PerformanceGrain::Year {
            return Err(ApiError::InvalidInput(format!(
                "{:?} 粒度查询必须指定年份",
                query.grain
            )));
        }
        if let Some(month) = query.month {
            if !(1..=12).contains(&month) {
                return Err(ApiError::InvalidInput(format!("月份超出范围: {}", month)));
            }
        }
        Ok(())
    }

    async fn thresholds(&self) -> ApiResult<StatusThresholds> {
        self.config
            .get_status_thresholds()
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))
    }

    /// 读取（或计算并缓存）查询快照
    #[instrument(skip(self))]
    pub async fn snapshot(&self, query: PerformanceQuery) -> ApiResult<Arc<PerformanceSnapshot>> {
        Self::validate_query(&query)?;

        if let Ok(cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&query) {
                debug!("读模型命中");
                return Ok(hit.clone());
            }
        }

        // 先记代次再读库: 计算期间发生 refresh 则结果作废
        let generation = self.current_generation();
        let snapshot = Arc::new(self.compute_snapshot(query).await?);
        self.store_snapshot(generation, snapshot.clone());
        Ok(snapshot)
    }

    /// 计算查询快照（不读写缓存）
    pub(crate) async fn compute_snapshot(
        &self,
        query: PerformanceQuery,
    ) -> ApiResult<PerformanceSnapshot> {
        let thresholds = self.thresholds().await?;
        let aggregator = PerformanceAggregator::new(thresholds);

        let (actuals, targets) = self.performance_repo.actuals_with_targets(query.year)?;

        let records = aggregator.monthly_records(&actuals, &targets, &query);
        let rollups = aggregator.rollup(&records, query.grain);
        let leaderboard = aggregator.leaderboard(&records);
        debug!(rollups = rollups.len(), "读模型已计算");

        Ok(PerformanceSnapshot {
            query,
            records,
            rollups,
            leaderboard,
            thresholds,
            computed_at: Utc::now().to_rfc3339(),
        })
    }

    /// 写入缓存; 代次已变化（期间发生过 refresh）时丢弃
    pub(crate) fn store_snapshot(
        &self,
        generation: u64,
        snapshot: Arc<PerformanceSnapshot>,
    ) -> bool {
        match self.cache.lock() {
            // refresh 在同一把锁内递增代次，比较与写入不会被穿插
            Ok(mut cache) if self.generation.load(Ordering::SeqCst) == generation => {
                cache.insert(snapshot.query, snapshot);
                true
            }
            Ok(_) => {
                debug!(generation = generation, "读模型已失效，本次结果不缓存");
                false
            }
            Err(e) => {
                warn!(error = %e, "读模型锁获取失败，本次结果不缓存");
                false
            }
        }
    }

    // ==========================================
    // 业绩与排行
    // ==========================================

    /// 按粒度的业绩汇总
    pub async fn performance(&self, query: PerformanceQuery) -> ApiResult<Vec<PerformanceRollup>> {
        Ok(self.snapshot(query).await?.rollups.clone())
    }

    /// 月度粒度业绩明细
    pub async fn monthly_records(&self, year: i32) -> ApiResult<Vec<PerformanceRecord>> {
        Ok(self
            .snapshot(PerformanceQuery::monthly(year))
            .await?
            .records
            .clone())
    }

    /// 排行榜（仅 target > 0，按达成率降序）
    pub async fn leaderboard(&self, query: PerformanceQuery) -> ApiResult<Vec<LeaderboardEntry>> {
        Ok(self.snapshot(query).await?.leaderboard.clone())
    }

    // ==========================================
    // KPI / 趋势
    // ==========================================

    /// 年度（可选学期）KPI，含同比
    pub async fn kpi_summary(
        &self,
        year: i32,
        semester: Option<Semester>,
    ) -> ApiResult<KpiSummary> {
        let current = self.performance_repo.period_totals(year, semester)?;
        let previous = self.performance_repo.period_totals(year - 1, semester)?;

        Ok(KpiSummary {
            year,
            revenue: current.revenue,
            profit: current.profit,
            marketing_spend: current.marketing_spend,
            margin_pct: margin_pct(current.profit, current.revenue),
            previous_revenue: previous.revenue,
            previous_profit: previous.profit,
            revenue_growth_pct: growth_pct(current.revenue, previous.revenue),
            profit_growth_pct: growth_pct(current.profit, previous.profit),
        })
    }

    /// 月度趋势（12 个月，无数据月份为 0）
    pub async fn monthly_trend(&self, year: i32) -> ApiResult<Vec<MonthlyTrendPoint>> {
        let totals: HashMap<u32, (f64, f64)> = self
            .performance_repo
            .monthly_totals(year)?
            .into_iter()
            .map(|(month, revenue, profit)| (month, (revenue, profit)))
            .collect();

        Ok((1..=12u32)
            .map(|month| {
                let (revenue, profit) = totals.get(&month).copied().unwrap_or((0.0, 0.0));
                MonthlyTrendPoint {
                    month,
                    month_label: month_label(month).unwrap_or_default().to_string(),
                    revenue,
                    profit,
                }
            })
            .collect())
    }

    /// 年度总览: KPI + 趋势 + 排行榜
    pub async fn year_overview(&self, year: i32) -> ApiResult<YearOverview> {
        let (kpi, trend, leaderboard) = futures::try_join!(
            self.kpi_summary(year, None),
            self.monthly_trend(year),
            self.leaderboard(PerformanceQuery::yearly(Some(year))),
        )?;
        Ok(YearOverview {
            year,
            kpi,
            trend,
            leaderboard,
        })
    }

    // ==========================================
    // 分组 / 季节性
    // ==========================================

    /// 按维度分组（渠道/分公司/产品/客户/销售员），可限制 Top-N
    pub async fn breakdown(
        &self,
        dimension: BreakdownDimension,
        year: Option<i32>,
        semester: Option<Semester>,
        limit: Option<usize>,
    ) -> ApiResult<Vec<BreakdownEntry>> {
        if limit == Some(0) {
            return Err(ApiError::InvalidInput("limit 必须大于 0".to_string()));
        }
        Ok(self
            .performance_repo
            .breakdown(dimension, year, semester, limit)?)
    }

    /// 季节性热力格
    pub async fn seasonality(
        &self,
        year: Option<i32>,
        semester: Option<Semester>,
    ) -> ApiResult<Vec<SeasonalityCell>> {
        Ok(self.performance_repo.seasonality(year, semester)?)
    }

    // ==========================================
    // 年份
    // ==========================================

    /// 有数据的年份（明细或目标），降序
    pub async fn available_years(&self) -> ApiResult<Vec<i32>> {
        let mut years: BTreeSet<i32> = self
            .performance_repo
            .available_years()?
            .into_iter()
            .collect();
        years.extend(self.target_repo.distinct_years()?);
        Ok(years.into_iter().rev().collect())
    }

    /// 默认年份: 最近有数据的年份，否则当前日历年
    pub async fn default_year(&self) -> ApiResult<i32> {
        Ok(self
            .available_years()
            .await?
            .first()
            .copied()
            .unwrap_or_else(|| chrono::Local::now().year()))
    }
}
