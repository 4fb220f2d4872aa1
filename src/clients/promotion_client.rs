/// 升级决定 API 客户端
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::error::AppResult;
use crate::infrastructure::HttpExecutor;
use crate::models::{DecisionSubmission, StudentWithDecision, SubmitResult};

/// 升级决定后端
#[async_trait]
pub trait PromotionBackend: Send + Sync {
    async fn fetch_class_students_promotion_data(
        &self,
        class_id: &str,
        year_id: &str,
    ) -> AppResult<Vec<StudentWithDecision>>;

    async fn submit_promotion_decisions(
        &self,
        year_id: &str,
        class_id: &str,
        decisions: &[DecisionSubmission],
    ) -> AppResult<SubmitResult>;
}

/// 基于 HTTP 的升级决定客户端
pub struct HttpPromotionClient {
    http: HttpExecutor,
}

impl HttpPromotionClient {
    pub fn new(http: HttpExecutor) -> Self {
        Self { http }
    }
}

#[async_trait]
impl PromotionBackend for HttpPromotionClient {
    async fn fetch_class_students_promotion_data(
        &self,
        class_id: &str,
        year_id: &str,
    ) -> AppResult<Vec<StudentWithDecision>> {
        let path = format!(
            "api/promotions/classes/{}/years/{}/students/",
            class_id, year_id
        );
        self.http.get_json(&path, &[]).await
    }

    async fn submit_promotion_decisions(
        &self,
        year_id: &str,
        class_id: &str,
        decisions: &[DecisionSubmission],
    ) -> AppResult<SubmitResult> {
        let path = format!(
            "api/promotions/years/{}/classes/{}/decisions/",
            year_id, class_id
        );
        debug!("提交 {} 条升级决定", decisions.len());
        let result: Option<SubmitResult> = self
            .http
            .post_json(&path, &json!({ "decisions": decisions }))
            .await?;
        Ok(result.unwrap_or_default())
    }
}
