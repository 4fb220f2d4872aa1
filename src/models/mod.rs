pub mod grade;
pub mod period;
pub mod promotion;
pub mod result;

pub use grade::{GradeBand, PASS_MARK};
pub use period::{Granularity, PageQuery, PeriodKey, SortDirection};
pub use promotion::{
    DecisionSubmission, PromotionDecision, PromotionDraftEntry, PromotionStatus, PromotionSummary,
    StudentWithDecision, SubmitResult,
};
pub use result::{
    ClassStatistics, ResultsEnvelope, ResultsPage, ResultsPayload, StudentResult, SubjectScore,
    SubjectStatistics,
};
