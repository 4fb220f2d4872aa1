/// 成绩 API 客户端
///
/// 封装成绩拉取、计算、发布相关的后端调用
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use crate::error::AppResult;
use crate::infrastructure::HttpExecutor;
use crate::models::{PageQuery, PeriodKey, ResultsEnvelope};

/// 一次远程计算步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalculationStep {
    /// 各科成绩（学期 / 学年的第一步）
    SubjectResults,
    /// 总成绩与排名
    OverallResults,
}

impl CalculationStep {
    pub fn path(self) -> &'static str {
        match self {
            CalculationStep::SubjectResults => "calculate-subjects/",
            CalculationStep::OverallResults => "calculate/",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CalculationStep::SubjectResults => "科目成绩计算",
            CalculationStep::OverallResults => "总成绩计算",
        }
    }
}

/// 发布范围
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PublishScope {
    /// 本周期所有科目成绩
    AllSubjects,
    /// 所有学生的总成绩
    AllStudents,
    /// 指定学生的总成绩
    SelectedStudents,
    /// 指定学生的某一科
    SubjectForSelected { subject_id: String },
}

impl PublishScope {
    /// 是否需要显式的学生列表
    pub fn requires_targets(&self) -> bool {
        matches!(
            self,
            PublishScope::SelectedStudents | PublishScope::SubjectForSelected { .. }
        )
    }

    pub fn path(&self) -> &'static str {
        match self {
            PublishScope::AllSubjects => "publish-subjects/",
            PublishScope::AllStudents => "publish/",
            PublishScope::SelectedStudents => "publish-students/",
            PublishScope::SubjectForSelected { .. } => "publish-subject-students/",
        }
    }

    /// 控件标识，用于"同一控件请求进行中"判断
    pub fn control_name(&self) -> String {
        match self {
            PublishScope::AllSubjects => "publish_all_subjects".to_string(),
            PublishScope::AllStudents => "publish_all_students".to_string(),
            PublishScope::SelectedStudents => "publish_selected_students".to_string(),
            PublishScope::SubjectForSelected { subject_id } => {
                format!("publish_subject_{}", subject_id)
            }
        }
    }
}

/// 成绩后端
///
/// 行数据保持原始 JSON，由 `GranularityAdapter` 负责归一化
#[async_trait]
pub trait ResultsBackend: Send + Sync {
    async fn fetch_results(
        &self,
        key: &PeriodKey,
        query: &PageQuery,
    ) -> AppResult<ResultsEnvelope<JsonValue>>;

    async fn calculate(&self, key: &PeriodKey, step: CalculationStep) -> AppResult<()>;

    async fn results_exist(&self, key: &PeriodKey) -> AppResult<bool>;

    /// 返回后端报告的更新条数（如有）
    async fn publish(
        &self,
        key: &PeriodKey,
        scope: &PublishScope,
        value: bool,
        target_ids: &[String],
    ) -> AppResult<Option<u32>>;
}

/// 基于 HTTP 的成绩客户端
pub struct HttpResultsClient {
    http: HttpExecutor,
}

impl HttpResultsClient {
    pub fn new(http: HttpExecutor) -> Self {
        Self { http }
    }

    fn base_path(key: &PeriodKey) -> String {
        format!(
            "api/results/{}/{}/classes/{}/",
            key.granularity.path_segment(),
            key.period_id,
            key.class_id
        )
    }
}

#[async_trait]
impl ResultsBackend for HttpResultsClient {
    async fn fetch_results(
        &self,
        key: &PeriodKey,
        query: &PageQuery,
    ) -> AppResult<ResultsEnvelope<JsonValue>> {
        let path = format!("{}results/", Self::base_path(key));
        let params = [
            ("page", query.page.to_string()),
            ("page_size", query.page_size.to_string()),
            ("ordering", query.ordering()),
        ];
        self.http.get_json(&path, &params).await
    }

    async fn calculate(&self, key: &PeriodKey, step: CalculationStep) -> AppResult<()> {
        let path = format!("{}{}", Self::base_path(key), step.path());
        let response: JsonValue = self.http.post_json(&path, &json!({})).await?;
        debug!("{} {} 返回: {}", key, step.name(), response);
        Ok(())
    }

    async fn results_exist(&self, key: &PeriodKey) -> AppResult<bool> {
        let path = format!("{}exists/", Self::base_path(key));
        let response: JsonValue = self.http.get_json(&path, &[]).await?;
        Ok(response
            .get("exists")
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn publish(
        &self,
        key: &PeriodKey,
        scope: &PublishScope,
        value: bool,
        target_ids: &[String],
    ) -> AppResult<Option<u32>> {
        let path = format!("{}{}", Self::base_path(key), scope.path());
        let mut body = json!({ "is_published": value });
        if scope.requires_targets() {
            body["student_ids"] = json!(target_ids);
        }
        if let PublishScope::SubjectForSelected { subject_id } = scope {
            body["subject_id"] = json!(subject_id);
        }

        let response: JsonValue = self.http.post_json(&path, &body).await?;
        Ok(response
            .get("updated")
            .and_then(|v| v.as_u64())
            .and_then(|n| u32::try_from(n).ok()))
    }
}
