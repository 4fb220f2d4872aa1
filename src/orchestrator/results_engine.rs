//! 成绩引擎 - 编排层
//!
//! 一个周期粒度一个引擎，把适配器、缓存、统计、计算和发布组合在一起，
//! 对外只暴露"看成绩 / 计算 / 发布 / 关闭进度"几个入口。

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::clients::{GranularityAdapter, PublishScope, ResultsBackend};
use crate::error::AppResult;
use crate::models::{Granularity, PageQuery, PeriodKey, ResultsPage, StudentResult};
use crate::services::{
    EnhancedClassStatistics, PublicationController, PublishOutcome, RefreshedViews,
    ResultSetCache, SelectionState, StatisticsAggregator,
};
use crate::workflow::{CalculationOrchestrator, CalculationState};

/// 成绩页面所需的全部数据
#[derive(Debug, Clone)]
pub struct ResultsView {
    /// 当前分页 / 排序下的成绩
    pub page: ResultsPage,
    /// 基于全量视图的增强统计
    pub statistics: EnhancedClassStatistics,
    pub top_students: Vec<StudentResult>,
    pub worst_students: Vec<StudentResult>,
    /// 学期 / 学年才有
    pub results_exist: Option<bool>,
}

/// 单个周期粒度的成绩引擎
pub struct ResultsEngine {
    adapter: GranularityAdapter,
    cache: Arc<ResultSetCache>,
    aggregator: StatisticsAggregator,
    calculations: Arc<CalculationOrchestrator>,
    publication: Arc<PublicationController>,
}

impl ResultsEngine {
    pub fn new(
        granularity: Granularity,
        backend: Arc<dyn ResultsBackend>,
        full_page_size: u32,
        cache: Arc<ResultSetCache>,
        calculations: Arc<CalculationOrchestrator>,
        publication: Arc<PublicationController>,
    ) -> Self {
        Self {
            adapter: GranularityAdapter::new(granularity, backend, full_page_size),
            cache,
            aggregator: StatisticsAggregator::new(),
            calculations,
            publication,
        }
    }

    pub fn granularity(&self) -> Granularity {
        self.adapter.granularity()
    }

    pub fn key(&self, period_id: &str, class_id: &str) -> PeriodKey {
        PeriodKey::new(self.granularity(), period_id, class_id)
    }

    /// 加载成绩页面：展示视图和全量视图并发读取（命中缓存则不发请求）
    pub async fn load_view(&self, key: &PeriodKey, query: &PageQuery) -> AppResult<ResultsView> {
        debug!("{} 加载成绩 (第 {} 页, 排序 {})", key, query.page, query.ordering());

        let (page, full) = futures::try_join!(
            self.cache.display(&self.adapter, key, query),
            self.cache.full(&self.adapter, key)
        )?;

        let results_exist = self.results_exist(key).await?;

        let statistics = self
            .aggregator
            .enhance(&full.results, Some(&full.class_statistics));

        info!(
            "{} 📊 {} 名学生, 及格 {} ({:.1}%), 统计来源 {:?}",
            key,
            statistics.total_students,
            statistics.passed_students,
            statistics.pass_rate(),
            statistics.source
        );

        Ok(ResultsView {
            top_students: self.aggregator.top_students(&full.results),
            worst_students: self.aggregator.worst_students(&full.results),
            page,
            statistics,
            results_exist,
        })
    }

    /// 是否已有成绩（只有学期 / 学年会检查）
    async fn results_exist(&self, key: &PeriodKey) -> AppResult<Option<bool>> {
        if !self.adapter.checks_existence() {
            return Ok(None);
        }
        self.cache.results_exist(&self.adapter, key).await.map(Some)
    }

    pub async fn calculate(&self, key: &PeriodKey) -> AppResult<RefreshedViews> {
        self.calculations.run(&self.adapter, &self.cache, key).await
    }

    pub async fn retry(&self, key: &PeriodKey) -> AppResult<RefreshedViews> {
        self.calculations.retry(&self.adapter, &self.cache, key).await
    }

    pub fn calculation_state(&self, key: &PeriodKey) -> CalculationState {
        self.calculations.state(key)
    }

    pub fn subscribe(&self, key: &PeriodKey) -> watch::Receiver<CalculationState> {
        self.calculations.subscribe(key)
    }

    pub fn dismiss(&self, key: &PeriodKey) -> AppResult<()> {
        self.calculations.dismiss(key)
    }

    pub async fn publish(
        &self,
        key: &PeriodKey,
        scope: &PublishScope,
        value: bool,
        target_ids: &[String],
    ) -> AppResult<PublishOutcome> {
        self.publication
            .publish(&self.adapter, &self.cache, key, scope, value, target_ids)
            .await
    }

    /// 按勾选状态发布，成功后清空勾选
    pub async fn publish_selection(
        &self,
        key: &PeriodKey,
        scope: &PublishScope,
        value: bool,
        selection: &mut SelectionState,
    ) -> AppResult<PublishOutcome> {
        let targets = selection.selected_ids();
        let outcome = self.publish(key, scope, value, &targets).await?;
        if matches!(outcome, PublishOutcome::Applied { .. }) {
            selection.clear();
        }
        Ok(outcome)
    }

    /// 全量视图（导出、勾选"全选"时使用）
    pub async fn full_results(&self, key: &PeriodKey) -> AppResult<Vec<StudentResult>> {
        Ok(self.cache.full(&self.adapter, key).await?.results)
    }

    pub fn is_publishing(&self, key: &PeriodKey, scope: &PublishScope) -> bool {
        self.publication.is_in_flight(key, scope)
    }
}
