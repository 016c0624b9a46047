// ==========================================
// 销售目标上传与分解测试
// ==========================================

mod test_helpers;

use rusqlite::Connection;
use sales_ledger::api::ApiError;
use sales_ledger::config::config_keys;
use sales_ledger::domain::types::Semester;
use sales_ledger::repository::MonthlyTargetRepository;
use std::sync::{Arc, Mutex};
use test_helpers::{setup_env, target_csv};

fn target_repo(db_path: &str) -> MonthlyTargetRepository {
    let conn = Connection::open(db_path).unwrap();
    MonthlyTargetRepository::from_connection(Arc::new(Mutex::new(conn))).unwrap()
}

#[tokio::test]
async fn test_large_semester_target_sums_back() {
    let env = setup_env();
    let summary = env
        .state
        .import_api
        .upload_targets(
            target_csv(&[("Budi", 2025, 1, 40_100_000_000.0)]).as_bytes(),
            Some("targets.csv"),
        )
        .await
        .unwrap();
    assert_eq!(summary.rows_allocated, 1);
    assert_eq!(summary.monthly_upserts, 6);

    let months = target_repo(&env.db_path).list(Some(2025)).unwrap();
    assert_eq!(months.len(), 6);
    assert!(months.iter().all(|m| m.semester == Semester::First));
    assert!(months.iter().all(|m| (1..=6).contains(&m.month)));
    let sum: f64 = months.iter().map(|m| m.target_amount).sum();
    assert!((sum - 40_100_000_000.0).abs() <= 1.0);
}

#[tokio::test]
async fn test_reupload_overwrites_monthly_targets() {
    let env = setup_env();
    let api = &env.state.import_api;

    api.upload_targets(target_csv(&[("Ani", 2025, 2, 600.0)]).as_bytes(), None)
        .await
        .unwrap();
    api.upload_targets(target_csv(&[("Ani", 2025, 2, 1200.0)]).as_bytes(), None)
        .await
        .unwrap();

    let months = target_repo(&env.db_path).list(Some(2025)).unwrap();
    assert_eq!(months.len(), 6);
    assert!(months.iter().all(|m| m.target_amount == 200.0));
    assert!(months.iter().all(|m| m.month >= 7));
}

#[tokio::test]
async fn test_bad_rows_rejected_individually() {
    let env = setup_env();
    let csv = "Salesman Name,Year,Semester,Target\nAni,2025,3,600\n,2025,1,600\nBudi,2025,1,abc\nCitra,2025,2,1200\n";
    let summary = env
        .state
        .import_api
        .upload_targets(csv.as_bytes(), None)
        .await
        .unwrap();

    assert_eq!(summary.rows_read, 4);
    assert_eq!(summary.rows_allocated, 1);
    assert_eq!(summary.rows_rejected, 3);
    assert_eq!(summary.monthly_upserts, 6);
}

#[tokio::test]
async fn test_missing_year_uses_configured_default() {
    let env = setup_env();
    env.state
        .config_api
        .update_config(config_keys::DEFAULT_TARGET_YEAR, "2031")
        .unwrap();

    env.state
        .import_api
        .upload_targets(b"Salesman Name,Semester,Target\nAni,1,60\n", None)
        .await
        .unwrap();

    let repo = target_repo(&env.db_path);
    assert_eq!(repo.list(Some(2031)).unwrap().len(), 6);
    assert_eq!(repo.distinct_years().unwrap(), vec![2031]);
}

#[tokio::test]
async fn test_missing_target_column_is_structural() {
    let env = setup_env();
    let result = env
        .state
        .import_api
        .upload_targets(b"Salesman Name,Semester\nAni,1\n", None)
        .await;
    match result {
        Err(ApiError::MissingColumns(cols)) => assert_eq!(cols, vec!["Target".to_string()]),
        other => panic!("unexpected result: {:?}", other),
    }
}
