//! 应用装配 - 编排层
//!
//! ## 职责
//!
//! 1. **初始化**：加载配置、创建 HTTP 执行器和两个后端客户端
//! 2. **装配**：三个周期粒度各一个 `ResultsEngine`，共享同一份缓存、计算编排器和发布控制器
//! 3. **草稿**：持有唯一的 `PromotionDraftStore`
//!
//! 本层只做组装和分发，不做具体业务判断。

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::clients::{HttpPromotionClient, HttpResultsClient, PromotionBackend, ResultsBackend};
use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{DraftRepository, FileDraftRepository, HttpExecutor};
use crate::models::Granularity;
use crate::orchestrator::results_engine::ResultsEngine;
use crate::services::{
    Confirmer, Notifier, PublicationController, ResultSetCache, TracingNotifier,
};
use crate::utils::logging;
use crate::workflow::{CalculationOrchestrator, PromotionDraftStore};

/// 外部依赖的集合，测试时用替身替换
pub struct AppDeps {
    pub results: Arc<dyn ResultsBackend>,
    pub promotions: Arc<dyn PromotionBackend>,
    pub drafts: Arc<dyn DraftRepository>,
    pub notifier: Arc<dyn Notifier>,
    pub confirmer: Arc<dyn Confirmer>,
}

/// 应用主结构
pub struct App {
    config: Config,
    sequence: ResultsEngine,
    term: ResultsEngine,
    year: ResultsEngine,
    promotions: PromotionDraftStore,
}

impl App {
    /// 用真实的 HTTP 后端和文件草稿初始化
    pub fn initialize(config: Config, confirmer: Arc<dyn Confirmer>) -> AppResult<Self> {
        logging::log_startup(&config.api_base_url, &config.draft_storage_dir);

        let http = HttpExecutor::new(&config)?;
        let deps = AppDeps {
            results: Arc::new(HttpResultsClient::new(http.clone())),
            promotions: Arc::new(HttpPromotionClient::new(http)),
            drafts: Arc::new(FileDraftRepository::new(&config.draft_storage_dir)),
            notifier: Arc::new(TracingNotifier),
            confirmer,
        };
        Ok(Self::with_deps(config, deps))
    }

    pub fn with_deps(config: Config, deps: AppDeps) -> Self {
        let cache = Arc::new(ResultSetCache::new());
        let calculations = Arc::new(CalculationOrchestrator::new(
            Arc::clone(&deps.notifier),
            Duration::from_millis(config.completion_display_ms),
        ));
        let publication = Arc::new(PublicationController::new(Arc::clone(&deps.notifier)));

        let engine = |granularity: Granularity| {
            ResultsEngine::new(
                granularity,
                Arc::clone(&deps.results),
                config.full_page_size,
                Arc::clone(&cache),
                Arc::clone(&calculations),
                Arc::clone(&publication),
            )
        };
        let sequence = engine(Granularity::Sequence);
        let term = engine(Granularity::Term);
        let year = engine(Granularity::Year);

        let promotions = PromotionDraftStore::new(
            deps.promotions,
            deps.drafts,
            deps.notifier,
            deps.confirmer,
        )
        .with_remarks_required_for(config.remarks_required_for.clone());

        info!("✓ 应用装配完成");
        Self {
            config,
            sequence,
            term,
            year,
            promotions,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self, granularity: Granularity) -> &ResultsEngine {
        match granularity {
            Granularity::Sequence => &self.sequence,
            Granularity::Term => &self.term,
            Granularity::Year => &self.year,
        }
    }

    pub fn promotions(&mut self) -> &mut PromotionDraftStore {
        &mut self.promotions
    }
}
