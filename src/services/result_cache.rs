//! 成绩缓存 - 业务能力层
//!
//! 每个（班级, 周期）持有两份独立视图：
//! - 展示视图：按 (页码, 分页大小, 排序列, 排序方向) 缓存
//! - 全量视图：固定"全部、按名次排序"，用于统计 / 导出 / 前后三名
//!
//! 两份视图只能一起失效。

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use crate::clients::GranularityAdapter;
use crate::error::AppResult;
use crate::models::{PageQuery, PeriodKey, ResultsPage};

#[derive(Debug, Default)]
struct CacheEntry {
    display: HashMap<PageQuery, ResultsPage>,
    full: Option<ResultsPage>,
    results_exist: Option<bool>,
    /// 最近一次展示用的查询，刷新时按它重新拉取
    active_query: Option<PageQuery>,
    /// 每次失效加一，拉取期间发生失效则丢弃旧结果
    generation: u64,
}

/// 刷新后的两份视图
#[derive(Debug, Clone)]
pub struct RefreshedViews {
    pub display: Option<ResultsPage>,
    pub full: ResultsPage,
    pub results_exist: Option<bool>,
}

/// 成绩缓存
#[derive(Debug, Default)]
pub struct ResultSetCache {
    entries: RwLock<HashMap<PeriodKey, CacheEntry>>,
}

impl ResultSetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn cached_display(&self, key: &PeriodKey, query: &PageQuery) -> Option<ResultsPage> {
        self.entries
            .read()
            .await
            .get(key)
            .and_then(|entry| entry.display.get(query).cloned())
    }

    pub async fn cached_full(&self, key: &PeriodKey) -> Option<ResultsPage> {
        self.entries
            .read()
            .await
            .get(key)
            .and_then(|entry| entry.full.clone())
    }

    pub async fn cached_results_exist(&self, key: &PeriodKey) -> Option<bool> {
        self.entries
            .read()
            .await
            .get(key)
            .and_then(|entry| entry.results_exist)
    }

    async fn generation(&self, key: &PeriodKey) -> u64 {
        self.entries
            .read()
            .await
            .get(key)
            .map(|entry| entry.generation)
            .unwrap_or(0)
    }

    /// 读取展示视图，未命中时拉取并缓存
    pub async fn display(
        &self,
        adapter: &GranularityAdapter,
        key: &PeriodKey,
        query: &PageQuery,
    ) -> AppResult<ResultsPage> {
        if let Some(page) = self.cached_display(key, query).await {
            self.entries
                .write()
                .await
                .entry(key.clone())
                .or_default()
                .active_query = Some(query.clone());
            return Ok(page);
        }

        let generation = self.generation(key).await;
        let page = adapter.fetch_page(key, query).await?;

        let mut entries = self.entries.write().await;
        let entry = entries.entry(key.clone()).or_default();
        entry.active_query = Some(query.clone());
        if entry.generation == generation {
            entry.display.insert(query.clone(), page.clone());
        } else {
            debug!("{} 拉取期间缓存已失效，丢弃展示视图", key);
        }
        Ok(page)
    }

    /// 读取全量视图，未命中时拉取并缓存
    pub async fn full(&self, adapter: &GranularityAdapter, key: &PeriodKey) -> AppResult<ResultsPage> {
        if let Some(page) = self.cached_full(key).await {
            return Ok(page);
        }

        let generation = self.generation(key).await;
        let page = adapter.fetch_full(key).await?;

        let mut entries = self.entries.write().await;
        let entry = entries.entry(key.clone()).or_default();
        if entry.generation == generation {
            entry.full = Some(page.clone());
        } else {
            debug!("{} 拉取期间缓存已失效，丢弃全量视图", key);
        }
        Ok(page)
    }

    /// 读取"是否已有成绩"，未命中时询问后端并缓存
    pub async fn results_exist(
        &self,
        adapter: &GranularityAdapter,
        key: &PeriodKey,
    ) -> AppResult<bool> {
        if let Some(exists) = self.cached_results_exist(key).await {
            return Ok(exists);
        }

        let generation = self.generation(key).await;
        let exists = adapter.results_exist(key).await?;

        let mut entries = self.entries.write().await;
        let entry = entries.entry(key.clone()).or_default();
        if entry.generation == generation {
            entry.results_exist = Some(exists);
        }
        Ok(exists)
    }

    /// 使两份视图同时失效
    pub async fn invalidate(&self, key: &PeriodKey) {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key.clone()).or_default();
        entry.display.clear();
        entry.full = None;
        entry.results_exist = None;
        entry.generation += 1;
        debug!("{} 缓存已失效 (generation={})", key, entry.generation);
    }

    /// 失效后并发重新拉取展示视图和全量视图
    ///
    /// 展示视图按最近一次使用的查询重新拉取；从未展示过则只拉全量。
    /// 适配器需要时同时刷新"是否已有成绩"。
    pub async fn refresh(
        &self,
        adapter: &GranularityAdapter,
        key: &PeriodKey,
    ) -> AppResult<RefreshedViews> {
        let active_query = self
            .entries
            .read()
            .await
            .get(key)
            .and_then(|entry| entry.active_query.clone());

        self.invalidate(key).await;

        let display_fut = async {
            match &active_query {
                Some(query) => self.display(adapter, key, query).await.map(Some),
                None => Ok(None),
            }
        };
        let full_fut = self.full(adapter, key);
        let (display, full) = futures::try_join!(display_fut, full_fut)?;

        let results_exist = if adapter.checks_existence() {
            Some(self.results_exist(adapter, key).await?)
        } else {
            None
        };

        Ok(RefreshedViews {
            display,
            full,
            results_exist,
        })
    }
}
