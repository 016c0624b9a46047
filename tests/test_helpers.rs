// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、应用状态装配、CSV / XLSX 测试数据生成
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use sales_ledger::app::AppState;
use sales_ledger::config::config_keys;
use sales_ledger::db::open_and_init;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::{NamedTempFile, TempDir};

/// 销售明细表头（ERP 导出列名）
pub const SALES_HEADER: &str = "Billing Document,Billing Item,Material,Description,PH3,Name of Bill to,Salesman Name,Dist,Branch,Billing Qty,Net Value,Billing Date";

/// 测试环境: 临时数据库 + 临时报告目录 + 应用状态
pub struct TestEnv {
    pub state: AppState,
    pub db_path: String,
    pub report_dir: TempDir,
    _db_file: NamedTempFile,
}

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时路径不是 UTF-8")?
        .to_string();
    open_and_init(&db_path)?;
    Ok((temp_file, db_path))
}

/// 创建完整测试环境（报告目录指向临时目录）
pub fn setup_env() -> TestEnv {
    let (db_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_and_init(&db_path).expect("打开测试数据库失败");
    let state = AppState::from_connection(db_path.clone(), Arc::new(Mutex::new(conn)))
        .expect("初始化AppState失败");

    let report_dir = tempfile::tempdir().expect("创建报告目录失败");
    state
        .config_manager
        .set_global_config_value(config_keys::REPORT_DIR, report_dir.path().to_str().unwrap())
        .expect("写入报告目录配置失败");

    TestEnv {
        state,
        db_path,
        report_dir,
        _db_file: db_file,
    }
}

// ==========================================
// CSV 构造
// ==========================================

/// 一行销售明细
#[derive(Debug, Clone)]
pub struct SalesRow {
    pub document_id: String,
    pub line_id: String,
    pub description: String,
    pub customer: String,
    pub salesperson: String,
    pub channel: String,
    pub branch: String,
    pub quantity: f64,
    pub revenue: f64,
    pub date: String,
}

impl SalesRow {
    pub fn new(document_id: &str, line_id: &str, description: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            line_id: line_id.to_string(),
            description: description.to_string(),
            customer: "PT Maju".to_string(),
            salesperson: "Ani".to_string(),
            channel: "Retail".to_string(),
            branch: "Jakarta".to_string(),
            quantity: 2.0,
            revenue: 500.0,
            date: "2025-01-15".to_string(),
        }
    }

    pub fn salesperson(mut self, name: &str) -> Self {
        self.salesperson = name.to_string();
        self
    }

    pub fn amounts(mut self, quantity: f64, revenue: f64) -> Self {
        self.quantity = quantity;
        self.revenue = revenue;
        self
    }

    pub fn date(mut self, date: &str) -> Self {
        self.date = date.to_string();
        self
    }

    pub fn channel(mut self, channel: &str) -> Self {
        self.channel = channel.to_string();
        self
    }

    fn to_csv_line(&self) -> String {
        format!(
            "{},{},MAT-{},{},PH-A,{},{},{},{},{},{},{}",
            self.document_id,
            self.line_id,
            self.description,
            self.description,
            self.customer,
            self.salesperson,
            self.channel,
            self.branch,
            self.quantity,
            self.revenue,
            self.date
        )
    }
}

/// 销售明细 CSV
pub fn sales_csv(rows: &[SalesRow]) -> String {
    let mut out = String::from(SALES_HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(&row.to_csv_line());
        out.push('\n');
    }
    out
}

/// 销售明细 XLSX（第一个工作表）
///
/// - header_row: 表头所在行（0 起），其上方留空
/// - 单据号/行号/数量/金额写为数值，日期写为带日期格式的序列号（与 ERP 导出一致）
pub fn sales_xlsx(rows: &[SalesRow], header_row: u32) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    {
        let sheet = workbook.add_worksheet();
        for (col, header) in SALES_HEADER.split(',').enumerate() {
            sheet.write_string(header_row, col as u16, header).unwrap();
        }

        for (idx, row) in rows.iter().enumerate() {
            let r = header_row + 1 + idx as u32;
            write_id(sheet, r, 0, &row.document_id);
            write_id(sheet, r, 1, &row.line_id);
            sheet
                .write_string(r, 2, format!("MAT-{}", row.description).as_str())
                .unwrap();
            sheet.write_string(r, 3, row.description.as_str()).unwrap();
            sheet.write_string(r, 4, "PH-A").unwrap();
            sheet.write_string(r, 5, row.customer.as_str()).unwrap();
            sheet.write_string(r, 6, row.salesperson.as_str()).unwrap();
            sheet.write_string(r, 7, row.channel.as_str()).unwrap();
            sheet.write_string(r, 8, row.branch.as_str()).unwrap();
            sheet.write_number(r, 9, row.quantity).unwrap();
            sheet.write_number(r, 10, row.revenue).unwrap();
            match NaiveDate::parse_from_str(&row.date, "%Y-%m-%d") {
                Ok(date) => {
                    sheet
                        .write_number_with_format(r, 11, excel_serial(date), &date_format)
                        .unwrap();
                }
                Err(_) => {
                    sheet.write_string(r, 11, row.date.as_str()).unwrap();
                }
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

fn write_id(sheet: &mut Worksheet, row: u32, col: u16, value: &str) {
    if value.is_empty() {
        return;
    }
    match value.parse::<f64>() {
        Ok(n) => sheet.write_number(row, col, n).unwrap(),
        Err(_) => sheet.write_string(row, col, value).unwrap(),
    };
}

fn excel_serial(date: NaiveDate) -> f64 {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap();
    (date - base).num_days() as f64
}

/// 成本主数据 CSV
pub fn cost_csv(entries: &[(&str, f64)]) -> String {
    let mut out = String::from("Description,COGS\n");
    for (description, cost) in entries {
        out.push_str(&format!("{},{}\n", description, cost));
    }
    out
}

/// 销售目标 CSV（含 Year 列）
pub fn target_csv(entries: &[(&str, i32, u32, f64)]) -> String {
    let mut out = String::from("Salesman Name,Year,Semester,Target\n");
    for (salesperson, year, semester, target) in entries {
        out.push_str(&format!("{},{},{},{}\n", salesperson, year, semester, target));
    }
    out
}
