pub mod notifier;
pub mod publication;
pub mod result_cache;
pub mod selection;
pub mod statistics;

pub use notifier::{
    ConfirmPrompt, Confirmer, FixedConfirmer, Notice, NoticeLevel, Notifier, RecordingNotifier,
    TerminalConfirmer, TracingNotifier,
};
pub use publication::{PublicationController, PublishOutcome};
pub use result_cache::{RefreshedViews, ResultSetCache};
pub use selection::SelectionState;
pub use statistics::{
    EnhancedClassStatistics, GradeDistribution, StatisticsAggregator, StatisticsSource,
};
