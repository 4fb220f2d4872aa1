//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `results_engine` - 单个周期粒度的成绩引擎
//! - 组合适配器、缓存、统计、计算编排和发布控制
//! - 对外提供 load_view / calculate / retry / publish / dismiss
//!
//! ### `app` - 应用装配
//! - 由配置创建 HTTP 客户端与文件草稿仓库
//! - 持有三个成绩引擎和升级草稿仓库
//!
//! ## 层次关系
//!
//! ```text
//! app (三个 ResultsEngine + PromotionDraftStore)
//!     ↓
//! results_engine (一个周期粒度)
//!     ↓
//! workflow (计算流程 / 升级草稿流程)
//!     ↓
//! services (缓存 / 统计 / 发布 / 通知)
//!     ↓
//! clients → infrastructure (HttpExecutor / DraftRepository)
//! ```

pub mod app;
pub mod results_engine;

pub use app::{App, AppDeps};
pub use results_engine::{ResultsEngine, ResultsView};
