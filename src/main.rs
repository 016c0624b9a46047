// ==========================================
// 销售台账 - 命令行入口
// ==========================================
// 用法:
//   sales-ledger import-sales  <file>
//   sales-ledger import-cost   <file>
//   sales-ledger import-target <file>
//   sales-ledger performance   [year] [semester]
//   sales-ledger batches       [limit]
//   sales-ledger config        <key> <value>
// 数据库: SALES_LEDGER_DB_PATH 或默认数据目录
// ==========================================

use sales_ledger::app::{get_default_db_path, AppState};
use sales_ledger::domain::performance::PerformanceQuery;
use sales_ledger::domain::types::Semester;
use std::path::Path;

const USAGE: &str = "usage: sales-ledger <import-sales|import-cost|import-target|performance|batches|config> [args...]";

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    sales_ledger::logging::init();

    let mut args = std::env::args().skip(1);
    let command = args.next().ok_or(USAGE)?;

    let db_path = get_default_db_path();
    tracing::info!("{} v{}，数据库: {}", sales_ledger::APP_NAME, sales_ledger::VERSION, db_path);
    let state = AppState::new(db_path)?;

    match command.as_str() {
        "import-sales" => {
            let file = args.next().ok_or("import-sales 需要文件路径")?;
            let response = state.import_api.import_sales_file(Path::new(&file)).await?;
            print_json(&response)?;
        }
        "import-cost" => {
            let file = args.next().ok_or("import-cost 需要文件路径")?;
            let summary = state.import_api.upload_costs_file(Path::new(&file)).await?;
            print_json(&summary)?;
        }
        "import-target" => {
            let file = args.next().ok_or("import-target 需要文件路径")?;
            let summary = state.import_api.upload_targets_file(Path::new(&file)).await?;
            print_json(&summary)?;
        }
        "performance" => {
            let year = match args.next() {
                Some(y) => y.parse::<i32>()?,
                None => state.performance_api.default_year().await?,
            };
            let query = match args.next() {
                Some(s) => {
                    let semester = Semester::from_number(s.parse::<i64>()?)
                        .ok_or("学期必须为 1 或 2")?;
                    PerformanceQuery::semester(year, semester)
                }
                None => PerformanceQuery::yearly(Some(year)),
            };
            let rows = state.performance_api.performance(query).await?;
            print_json(&rows)?;
        }
        "batches" => {
            let limit = match args.next() {
                Some(l) => l.parse::<usize>()?,
                None => 20,
            };
            let batches = state.import_api.list_recent_batches(limit).await?;
            print_json(&batches)?;
        }
        "config" => {
            let key = args.next().ok_or("config 需要 <key> <value>")?;
            let value = args.next().ok_or("config 需要 <key> <value>")?;
            state.config_api.update_config(&key, &value)?;
            println!("{} = {}", key, value);
        }
        _ => return Err(USAGE.into()),
    }

    Ok(())
}
