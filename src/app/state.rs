// ==========================================
// 销售台账 - 应用状态
// ==========================================
// 职责: 围绕单一数据库连接组装仓储、导入器与 API 实例
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::api::{ConfigApi, ImportApi, PerformanceApi};
use crate::config::config_manager::ConfigManager;
use crate::db::open_and_init;
use crate::importer::{CostImporter, SalesImporterImpl, TargetImporter};
use crate::repository::{
    cost_repo::ProductCostRepository, import_batch_repo::ImportBatchRepository,
    performance_repo::PerformanceRepository, sales_repo_impl::SalesTransactionRepositoryImpl,
    target_repo::MonthlyTargetRepository,
};

/// 应用状态
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 导入API
    pub import_api: Arc<ImportApi>,

    /// 业绩查询API
    pub performance_api: Arc<PerformanceApi>,

    /// 配置管理API
    pub config_api: Arc<ConfigApi>,

    /// 配置管理器（供调用方直接读取配置）
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 打开数据库并组装全部组件
    ///
    /// # 返回
    /// - Err(String): 数据库打开或仓储初始化失败
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_and_init(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        Self::from_connection(db_path, Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接组装（测试可传入内存库）
    pub fn from_connection(db_path: String, conn: Arc<Mutex<Connection>>) -> Result<Self, String> {
        // ==========================================
        // 初始化Repository层
        // ==========================================
        let sales_repo = Arc::new(
            SalesTransactionRepositoryImpl::from_connection(conn.clone())
                .map_err(|e| format!("无法创建SalesTransactionRepository: {}", e))?,
        );
        let batch_repo = Arc::new(
            ImportBatchRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ImportBatchRepository: {}", e))?,
        );
        let cost_repo = Arc::new(
            ProductCostRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ProductCostRepository: {}", e))?,
        );
        let target_repo = Arc::new(
            MonthlyTargetRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建MonthlyTargetRepository: {}", e))?,
        );
        let performance_repo = Arc::new(
            PerformanceRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建PerformanceRepository: {}", e))?,
        );
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化API层
        // ==========================================
        let performance_api = Arc::new(PerformanceApi::new(
            performance_repo,
            target_repo.clone(),
            config_manager.clone(),
        ));

        let sales_importer = SalesImporterImpl::new(
            sales_repo.clone(),
            cost_repo.clone(),
            batch_repo.clone(),
            config_manager.clone(),
        );
        let cost_importer = CostImporter::new(cost_repo, batch_repo.clone());
        let target_importer =
            TargetImporter::new(target_repo, batch_repo.clone(), config_manager.clone());

        let import_api = Arc::new(ImportApi::new(
            sales_importer,
            cost_importer,
            target_importer,
            sales_repo,
            batch_repo,
            performance_api.clone(),
        ));

        let config_api = Arc::new(ConfigApi::new(
            config_manager.clone(),
            performance_api.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            import_api,
            performance_api,
            config_api,
            config_manager,
        })
    }
}

/// 默认数据库路径
///
/// 优先级: SALES_LEDGER_DB_PATH → <data dir>/sales-ledger/sales_ledger.db → ./sales_ledger.db
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("SALES_LEDGER_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("sales-ledger");
        match std::fs::create_dir_all(&dir) {
            Ok(()) => return dir.join("sales_ledger.db").to_string_lossy().into_owned(),
            Err(e) => tracing::warn!("数据目录创建失败，使用当前目录: {}", e),
        }
    }

    "./sales_ledger.db".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_in_memory_connection() {
        let conn = Arc::new(Mutex::new(Connection::open_in_memory().unwrap()));
        let state = AppState::from_connection(":memory:".to_string(), conn).unwrap();
        assert_eq!(state.db_path, ":memory:");
        assert_eq!(state.performance_api.cached_snapshots(), 0);
    }
}
