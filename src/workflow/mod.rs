pub mod calculation_flow;
pub mod calculation_state;
pub mod promotion_flow;

pub use calculation_flow::CalculationOrchestrator;
pub use calculation_state::{reduce, CalculationEvent, CalculationState, FailureScope};
pub use promotion_flow::{PromotionDraftStore, PromotionSession, RefreshOutcome, SubmitOutcome};
