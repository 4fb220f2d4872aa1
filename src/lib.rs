//! # Class Results
//!
//! 学校成绩管理引擎：周期成绩的统计、计算、发布，以及学年升级决定的草稿与提交
//!
//! ## 架构设计
//!
//! 本系统采用分层架构，依赖只向下：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `HttpExecutor` - 唯一的 HTTP 出口，统一鉴权和错误转换
//! - `DraftRepository` - 键值草稿存储（文件 / 内存）
//!
//! ### ② 客户端层（Clients）
//! - `ResultsBackend` / `PromotionBackend` - 后端接口
//! - `GranularityAdapter` - 抹平序列 / 学期 / 学年的字段和步骤差异
//!
//! ### ③ 业务能力层（Services）
//! - `ResultSetCache` - 展示视图与全量视图
//! - `StatisticsAggregator` - 增强统计、前后三名
//! - `PublicationController` - 发布 / 取消发布
//! - `Notifier` / `Confirmer` - 通知与确认
//!
//! ### ④ 流程层（Workflow）
//! - `CalculationOrchestrator` - 分步计算与进度状态机
//! - `PromotionDraftStore` - 升级决定草稿会话
//!
//! ### ⑤ 编排层（Orchestration）
//! - `ResultsEngine` - 单个周期粒度的入口
//! - `App` - 应用装配

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{Granularity, PageQuery, PeriodKey, PromotionStatus};
pub use orchestrator::{App, AppDeps, ResultsEngine, ResultsView};
pub use workflow::{CalculationOrchestrator, CalculationState, PromotionDraftStore};
