//! 计算流程 - 流程层
//!
//! 核心职责：按顺序执行一个（班级, 周期）所需的远程计算步骤，并发布分阶段进度
//!
//! 流程顺序：
//! 1. 逐步调用远程计算（序列 1 步；学期 / 学年 2 步：科目 → 总成绩），每步都等待返回
//! 2. 全部成功后同时刷新展示视图和全量视图（学期 / 学年另刷新"是否已有成绩"）
//! 3. 刷新完成才进入 Complete，经过展示延迟后自动回到 Idle
//!
//! 同一（班级, 周期）同时只允许一个任务；不支持取消。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use crate::clients::GranularityAdapter;
use crate::error::{AppError, AppResult, BusinessError};
use crate::models::PeriodKey;
use crate::services::{Notifier, RefreshedViews, ResultSetCache};
use crate::workflow::calculation_state::{reduce, CalculationEvent, CalculationState};

/// 单个（班级, 周期）的进度通道；`runs` 每次启动加一，复位定时器据此认领自己的那一轮
struct Job {
    tx: watch::Sender<CalculationState>,
    runs: AtomicU64,
}

type JobHandle = Arc<Job>;

/// 计算编排器
pub struct CalculationOrchestrator {
    jobs: Mutex<HashMap<PeriodKey, JobHandle>>,
    notifier: Arc<dyn Notifier>,
    completion_display: Duration,
}

impl CalculationOrchestrator {
    pub fn new(notifier: Arc<dyn Notifier>, completion_display: Duration) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            notifier,
            completion_display,
        }
    }

    fn job(&self, key: &PeriodKey) -> JobHandle {
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(Job {
                    tx: watch::channel(CalculationState::Idle).0,
                    runs: AtomicU64::new(0),
                })
            })
            .clone()
    }

    /// 订阅某个（班级, 周期）的进度
    pub fn subscribe(&self, key: &PeriodKey) -> watch::Receiver<CalculationState> {
        self.job(key).tx.subscribe()
    }

    pub fn state(&self, key: &PeriodKey) -> CalculationState {
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .map(|job| job.tx.borrow().clone())
            .unwrap_or_default()
    }

    /// 界面据此禁用"计算"按钮
    pub fn is_running(&self, key: &PeriodKey) -> bool {
        self.state(key).is_running()
    }

    /// 执行计算
    pub async fn run(
        &self,
        adapter: &GranularityAdapter,
        cache: &ResultSetCache,
        key: &PeriodKey,
    ) -> AppResult<RefreshedViews> {
        let job = self.job(key);
        let tx = &job.tx;
        let steps = adapter.calculation_steps().to_vec();
        let total = steps.len();

        // 检查与切换在同一把锁内完成
        let mut run_id = None;
        tx.send_if_modified(|state| {
            if state.is_running() {
                return false;
            }
            *state = reduce(state, CalculationEvent::Started { total });
            run_id = Some(job.runs.fetch_add(1, Ordering::SeqCst) + 1);
            true
        });
        let Some(run_id) = run_id else {
            return Err(BusinessError::CalculationInProgress {
                key: key.to_string(),
            }
            .into());
        };

        log_calculation_start(key, total);

        for (index, step) in steps.iter().enumerate() {
            info!("{} ⏳ 第 {}/{} 步: {}", key, index + 1, total, step.name());

            if let Err(e) = adapter.run_step(key, *step).await {
                error!("{} ❌ {} 失败: {}", key, step.name(), e);
                apply(
                    tx,
                    CalculationEvent::StepFailed {
                        message: e.user_message(),
                    },
                );
                self.notifier
                    .error(&format!("{}失败: {}", step.name(), e.user_message()));
                return Err(e);
            }

            apply(tx, CalculationEvent::StepSucceeded);
            info!("{} ✓ {} 完成", key, step.name());
        }

        info!("{} 🔄 正在刷新成绩...", key);
        let views = match cache.refresh(adapter, key).await {
            Ok(views) => views,
            Err(e) => {
                error!("{} ❌ 计算完成但刷新成绩失败: {}", key, e);
                apply(
                    tx,
                    CalculationEvent::RefreshFailed {
                        message: e.user_message(),
                    },
                );
                self.notifier
                    .error(&format!("计算完成但刷新成绩失败: {}", e.user_message()));
                return Err(e);
            }
        };

        apply(tx, CalculationEvent::Refreshed);
        self.notifier.success(&format!(
            "{}成绩计算完成，共 {} 名学生",
            key.granularity,
            views.full.results.len()
        ));
        log_calculation_complete(key, &views);

        self.schedule_reset(job.clone(), run_id);
        Ok(views)
    }

    /// 失败后手动重试，从第 1 步重新开始
    pub async fn retry(
        &self,
        adapter: &GranularityAdapter,
        cache: &ResultSetCache,
        key: &PeriodKey,
    ) -> AppResult<RefreshedViews> {
        if !self.state(key).is_failed() {
            return Err(AppError::Business(BusinessError::RetryNotAllowed {
                key: key.to_string(),
            }));
        }
        info!("{} 🔁 重试计算", key);
        self.run(adapter, cache, key).await
    }

    /// 关闭进度对话框，丢弃任务状态；计算进行中不允许关闭
    pub fn dismiss(&self, key: &PeriodKey) -> AppResult<()> {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(job) = jobs.get(key) {
            if job.tx.borrow().is_running() {
                return Err(BusinessError::DismissWhileRunning {
                    key: key.to_string(),
                }
                .into());
            }
            job.tx
                .send_modify(|state| *state = reduce(state, CalculationEvent::Reset));
            jobs.remove(key);
        }
        Ok(())
    }

    /// 完成状态保持一段时间后自动回到 Idle；期间若已开始新一轮则不动
    fn schedule_reset(&self, job: JobHandle, run_id: u64) {
        let delay = self.completion_display;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            job.tx.send_if_modified(|state| {
                let current = job.runs.load(Ordering::SeqCst) == run_id;
                if current && matches!(state, CalculationState::Complete { .. }) {
                    *state = reduce(state, CalculationEvent::Reset);
                    true
                } else {
                    false
                }
            });
        });
    }
}

fn apply(tx: &watch::Sender<CalculationState>, event: CalculationEvent) {
    tx.send_modify(|state| *state = reduce(state, event));
}

// ========== 日志辅助函数 ==========

fn log_calculation_start(key: &PeriodKey, total: usize) {
    info!("{} {}", key, "─".repeat(30));
    info!("{} 🚀 开始计算，共 {} 步", key, total);
}

fn log_calculation_complete(key: &PeriodKey, views: &RefreshedViews) {
    info!(
        "{} ✅ 计算完成: 全量 {} 条, 展示视图 {}, 已有成绩: {:?}",
        key,
        views.full.results.len(),
        if views.display.is_some() { "已刷新" } else { "未打开" },
        views.results_exist
    );
}
