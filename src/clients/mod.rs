pub mod granularity_adapter;
pub mod promotion_client;
pub mod results_client;

pub use granularity_adapter::{FieldMapping, GranularityAdapter};
pub use promotion_client::{HttpPromotionClient, PromotionBackend};
pub use results_client::{CalculationStep, HttpResultsClient, PublishScope, ResultsBackend};
