//! 计算进度状态机
//!
//! 用一个带标签的枚举替代"是否在计算 / 第几步 / 对话框是否打开 / 错误信息"几个独立布尔值，
//! 所有变化都经过 `reduce`，不会出现"对话框已关闭但仍在计算"之类的组合。
//!
//! ```text
//! Idle ──Started──▶ Running(1) ──StepSucceeded──▶ Running(2…) ──Refreshed──▶ Complete ──Reset──▶ Idle
//!                        │
//!                        └──StepFailed / RefreshFailed──▶ Failed(step 冻结) ──Started(重试)──▶ Running(1)
//! ```

use tracing::debug;

/// 失败发生的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureScope {
    /// 某一步远程计算被拒绝
    Step,
    /// 计算全部成功，但刷新成绩失败
    Refresh,
}

/// 计算进度
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CalculationState {
    #[default]
    Idle,
    /// `step` 从 1 开始；`refreshing` 表示所有步骤已完成、正在刷新缓存
    Running {
        step: usize,
        total: usize,
        refreshing: bool,
    },
    Complete {
        total: usize,
    },
    Failed {
        step: usize,
        total: usize,
        scope: FailureScope,
        message: String,
    },
}

impl CalculationState {
    pub fn is_running(&self) -> bool {
        matches!(self, CalculationState::Running { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CalculationState::Failed { .. })
    }

    /// 当前（或冻结的）步骤号，Idle 为 0
    pub fn step(&self) -> usize {
        match self {
            CalculationState::Idle => 0,
            CalculationState::Running { step, .. } | CalculationState::Failed { step, .. } => *step,
            CalculationState::Complete { total } => *total,
        }
    }
}

/// 状态事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalculationEvent {
    Started { total: usize },
    StepSucceeded,
    Refreshed,
    StepFailed { message: String },
    RefreshFailed { message: String },
    /// 完成后自动复位，或关闭对话框
    Reset,
}

/// 唯一的状态转换函数，非法转换保持原状态
pub fn reduce(state: &CalculationState, event: CalculationEvent) -> CalculationState {
    use CalculationEvent as E;
    use CalculationState as S;

    let next = match (state, event) {
        (S::Running { .. }, E::Started { .. }) => None,
        (_, E::Started { total }) => Some(S::Running {
            step: 1,
            total,
            refreshing: total == 0,
        }),

        (
            S::Running {
                step,
                total,
                refreshing: false,
            },
            E::StepSucceeded,
        ) => Some(if step < total {
            S::Running {
                step: step + 1,
                total: *total,
                refreshing: false,
            }
        } else {
            S::Running {
                step: *step,
                total: *total,
                refreshing: true,
            }
        }),

        (
            S::Running {
                total,
                refreshing: true,
                ..
            },
            E::Refreshed,
        ) => Some(S::Complete { total: *total }),

        (
            S::Running {
                step,
                total,
                refreshing: false,
            },
            E::StepFailed { message },
        ) => Some(S::Failed {
            step: *step,
            total: *total,
            scope: FailureScope::Step,
            message,
        }),

        (
            S::Running {
                step,
                total,
                refreshing: true,
            },
            E::RefreshFailed { message },
        ) => Some(S::Failed {
            step: *step,
            total: *total,
            scope: FailureScope::Refresh,
            message,
        }),

        (S::Complete { .. } | S::Failed { .. } | S::Idle, E::Reset) => Some(S::Idle),

        _ => None,
    };

    match next {
        Some(next) => next,
        None => {
            debug!("忽略非法的状态转换: {:?}", state);
            state.clone()
        }
    }
}
