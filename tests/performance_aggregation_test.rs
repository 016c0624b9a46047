// ==========================================
// 业绩汇总端到端测试
// ==========================================
// 覆盖: 分子分母汇总 / 状态分级 / 排行榜 / KPI 同比 / 分组 / 读模型刷新 / 删除
// ==========================================

mod test_helpers;

use sales_ledger::domain::performance::{BreakdownDimension, PerformanceQuery};
use sales_ledger::domain::types::{AchievementStatus, PerformanceGrain, Semester};
use test_helpers::{cost_csv, sales_csv, setup_env, target_csv, SalesRow, TestEnv};

async fn seed(env: &TestEnv, rows: &[SalesRow]) {
    let api = &env.state.import_api;
    api.upload_costs(cost_csv(&[("Widget-X", 100.0)]).as_bytes(), None)
        .await
        .unwrap();
    let response = api.import_sales(sales_csv(rows).as_bytes(), None).await.unwrap();
    assert_eq!(response.rows_imported, rows.len());
}

#[tokio::test]
async fn test_year_rollup_is_denominator_correct() {
    let env = setup_env();
    seed(
        &env,
        &[SalesRow::new("1", "10", "Widget-X")
            .amounts(1.0, 300.0)
            .date("2025-01-20")],
    )
    .await;
    env.state
        .import_api
        .upload_targets(
            target_csv(&[("Ani", 2025, 1, 600.0), ("Ani", 2025, 2, 1200.0)]).as_bytes(),
            None,
        )
        .await
        .unwrap();

    let perf = &env.state.performance_api;

    // 月度: 12 个月都在（有目标无销售的月份 revenue = 0）
    let monthly = perf.performance(PerformanceQuery::monthly(2025)).await.unwrap();
    assert_eq!(monthly.len(), 12);
    assert!((monthly[0].achievement_pct - 300.0).abs() < 1e-9);

    // 学期 1: 300 / 600
    let sem = perf
        .performance(PerformanceQuery::semester(2025, Semester::First))
        .await
        .unwrap();
    assert_eq!(sem.len(), 1);
    assert!((sem[0].achievement_pct - 50.0).abs() < 1e-9);
    assert_eq!(sem[0].status, AchievementStatus::OffTarget);

    // 年度: 300 / 1800，不是月度百分比的平均值 25%
    let year = perf
        .performance(PerformanceQuery::yearly(Some(2025)))
        .await
        .unwrap();
    assert_eq!(year.len(), 1);
    assert_eq!(year[0].grain, PerformanceGrain::Year);
    assert_eq!(year[0].target, 1800.0);
    assert!((year[0].achievement_pct - 300.0 / 1800.0 * 100.0).abs() < 1e-9);
    assert!((year[0].profit - 200.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_leaderboard_only_salespeople_with_targets() {
    let env = setup_env();
    seed(
        &env,
        &[
            SalesRow::new("1", "10", "Widget-X").salesperson("Ani").amounts(1.0, 90.0),
            SalesRow::new("2", "10", "Widget-X").salesperson("Budi").amounts(1.0, 120.0),
            SalesRow::new("3", "10", "Widget-X").salesperson("Citra").amounts(1.0, 5000.0),
        ],
    )
    .await;
    env.state
        .import_api
        .upload_targets(
            target_csv(&[("Ani", 2025, 1, 600.0), ("Budi", 2025, 1, 600.0)]).as_bytes(),
            None,
        )
        .await
        .unwrap();

    let mut query = PerformanceQuery::monthly(2025);
    query.month = Some(1);
    let board = env.state.performance_api.leaderboard(query).await.unwrap();

    assert_eq!(board.len(), 2);
    assert_eq!(board[0].salesperson, "Budi");
    assert_eq!(board[0].rank, 1);
    assert_eq!(board[0].status, AchievementStatus::OnTarget);
    assert_eq!(board[1].salesperson, "Ani");
    assert_eq!(board[1].status, AchievementStatus::AtRisk);
}

#[tokio::test]
async fn test_kpi_summary_year_over_year() {
    let env = setup_env();
    seed(
        &env,
        &[
            SalesRow::new("1", "10", "Widget-X").amounts(1.0, 1000.0).date("2024-05-01"),
            SalesRow::new("2", "10", "Widget-X").amounts(1.0, 1500.0).date("2025-05-01"),
        ],
    )
    .await;

    let perf = &env.state.performance_api;
    let kpi = perf.kpi_summary(2025, None).await.unwrap();
    assert_eq!(kpi.revenue, 1500.0);
    assert_eq!(kpi.previous_revenue, 1000.0);
    assert!((kpi.revenue_growth_pct - 50.0).abs() < 1e-9);
    assert!((kpi.marketing_spend - 150.0).abs() < 1e-9);

    let first_year = perf.kpi_summary(2024, None).await.unwrap();
    assert_eq!(first_year.revenue_growth_pct, 0.0);

    assert_eq!(perf.available_years().await.unwrap(), vec![2025, 2024]);
    assert_eq!(perf.default_year().await.unwrap(), 2025);

    let overview = perf.year_overview(2025).await.unwrap();
    assert_eq!(overview.trend.len(), 12);
    assert_eq!(overview.trend[4].revenue, 1500.0);
}

#[tokio::test]
async fn test_channel_breakdown_with_limit_and_semester() {
    let env = setup_env();
    seed(
        &env,
        &[
            SalesRow::new("1", "10", "Widget-X").channel("Retail").amounts(1.0, 100.0),
            SalesRow::new("2", "10", "Widget-X").channel("Online").amounts(1.0, 400.0),
            SalesRow::new("3", "10", "Widget-X").channel("Online").amounts(1.0, 100.0),
            SalesRow::new("4", "10", "Widget-X")
                .channel("Dealer")
                .amounts(1.0, 900.0)
                .date("2025-09-01"),
        ],
    )
    .await;

    let perf = &env.state.performance_api;
    let top = perf
        .breakdown(BreakdownDimension::Channel, Some(2025), Some(Semester::First), Some(1))
        .await
        .unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].label, "Online");
    assert_eq!(top[0].revenue, 500.0);
    assert_eq!(top[0].deals, 2);

    let all = perf
        .breakdown(BreakdownDimension::Channel, Some(2025), None, None)
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].label, "Dealer");

    let cells = perf.seasonality(Some(2025), None).await.unwrap();
    assert_eq!(cells.len(), 2);
}

#[tokio::test]
async fn test_read_model_refreshed_after_ingestion_and_delete() {
    let env = setup_env();
    seed(&env, &[SalesRow::new("1", "10", "Widget-X").amounts(1.0, 100.0)]).await;

    let perf = &env.state.performance_api;
    let query = PerformanceQuery::yearly(Some(2025));
    let before = perf.performance(query).await.unwrap();
    assert_eq!(before[0].revenue, 100.0);
    assert_eq!(perf.cached_snapshots(), 1);

    env.state
        .import_api
        .import_sales(
            sales_csv(&[SalesRow::new("2", "10", "Widget-X").amounts(1.0, 50.0)]).as_bytes(),
            None,
        )
        .await
        .unwrap();
    assert_eq!(perf.cached_snapshots(), 0);
    let after = perf.performance(query).await.unwrap();
    assert_eq!(after[0].revenue, 150.0);

    let deleted = env
        .state
        .import_api
        .delete_transactions_by_documents(&["2".to_string()])
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    let after_delete = perf.performance(query).await.unwrap();
    assert_eq!(after_delete[0].revenue, 100.0);

    let deleted = env
        .state
        .import_api
        .delete_transactions_by_period(2025, Some(1))
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    assert!(perf.performance(query).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rows_without_salesperson_excluded_from_performance() {
    let env = setup_env();
    seed(
        &env,
        &[
            SalesRow::new("1", "10", "Widget-X").amounts(1.0, 100.0),
            SalesRow::new("2", "10", "Widget-X").salesperson("").amounts(1.0, 700.0),
        ],
    )
    .await;

    let perf = &env.state.performance_api;
    let rows = perf.performance(PerformanceQuery::yearly(Some(2025))).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].revenue, 100.0);

    let kpi = perf.kpi_summary(2025, None).await.unwrap();
    assert_eq!(kpi.revenue, 800.0);
}
