#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use class_results::clients::{CalculationStep, PromotionBackend, PublishScope, ResultsBackend};
use class_results::error::{AppError, AppResult};
use class_results::models::{
    ClassStatistics, DecisionSubmission, PageQuery, PeriodKey, PromotionDecision,
    PromotionStatus, ResultsEnvelope, ResultsPayload, StudentWithDecision, SubmitResult,
};

/// 后端收到的调用
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Fetch { page_size: u32, ordering: String },
    Calculate(CalculationStep),
    Exists,
    Publish {
        scope: PublishScope,
        value: bool,
        targets: Vec<String>,
    },
}

/// 可控的成绩后端替身
#[derive(Default)]
pub struct FakeResultsBackend {
    pub rows: Mutex<Vec<JsonValue>>,
    pub statistics: Mutex<Option<ClassStatistics>>,
    pub calls: Mutex<Vec<Call>>,
    pub failing_steps: Mutex<HashSet<CalculationStep>>,
    pub fail_fetch: Mutex<bool>,
    pub fail_publish: Mutex<Option<String>>,
    pub exists: Mutex<bool>,
    /// 计算与发布请求的人为延迟
    pub step_delay: Mutex<Option<Duration>>,
}

impl FakeResultsBackend {
    pub fn with_rows(rows: Vec<JsonValue>) -> Arc<Self> {
        let backend = Self::default();
        *backend.rows.lock().unwrap() = rows;
        Arc::new(backend)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Fetch { .. }))
            .count()
    }

    pub fn calculate_calls(&self) -> Vec<CalculationStep> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Calculate(step) => Some(step),
                _ => None,
            })
            .collect()
    }

    pub fn fail_step(&self, step: CalculationStep) {
        self.failing_steps.lock().unwrap().insert(step);
    }

    pub fn heal(&self) {
        self.failing_steps.lock().unwrap().clear();
        *self.fail_fetch.lock().unwrap() = false;
        *self.fail_publish.lock().unwrap() = None;
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl ResultsBackend for FakeResultsBackend {
    async fn fetch_results(
        &self,
        _key: &PeriodKey,
        query: &PageQuery,
    ) -> AppResult<ResultsEnvelope<JsonValue>> {
        self.calls.lock().unwrap().push(Call::Fetch {
            page_size: query.page_size,
            ordering: query.ordering(),
        });
        if *self.fail_fetch.lock().unwrap() {
            return Err(AppError::bad_response("results/", 503, "service indisponible"));
        }
        let rows = self.rows.lock().unwrap().clone();
        Ok(ResultsEnvelope {
            count: rows.len() as u32,
            next: None,
            previous: None,
            results: ResultsPayload {
                results: rows,
                class_statistics: self.statistics.lock().unwrap().clone(),
                class_name: Some("6e A".to_string()),
            },
        })
    }

    async fn calculate(&self, _key: &PeriodKey, step: CalculationStep) -> AppResult<()> {
        self.calls.lock().unwrap().push(Call::Calculate(step));
        let delay = *self.step_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_steps.lock().unwrap().contains(&step) {
            return Err(AppError::bad_response(
                step.path(),
                400,
                "Aucune note saisie pour cette période",
            ));
        }
        Ok(())
    }

    async fn results_exist(&self, _key: &PeriodKey) -> AppResult<bool> {
        self.calls.lock().unwrap().push(Call::Exists);
        Ok(*self.exists.lock().unwrap())
    }

    async fn publish(
        &self,
        _key: &PeriodKey,
        scope: &PublishScope,
        value: bool,
        target_ids: &[String],
    ) -> AppResult<Option<u32>> {
        self.calls.lock().unwrap().push(Call::Publish {
            scope: scope.clone(),
            value,
            targets: target_ids.to_vec(),
        });
        let delay = *self.step_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.fail_publish.lock().unwrap().clone() {
            return Err(AppError::bad_response(scope.path(), 400, message));
        }
        Ok(Some(target_ids.len() as u32))
    }
}

/// 可控的升级决定后端替身
#[derive(Default)]
pub struct FakePromotionBackend {
    pub students: Mutex<Vec<StudentWithDecision>>,
    pub submissions: Mutex<Vec<Vec<DecisionSubmission>>>,
    pub fetches: Mutex<usize>,
    pub fail_submit: Mutex<Option<String>>,
}

impl FakePromotionBackend {
    pub fn with_students(students: Vec<StudentWithDecision>) -> Arc<Self> {
        let backend = Self::default();
        *backend.students.lock().unwrap() = students;
        Arc::new(backend)
    }

    pub fn submissions(&self) -> Vec<Vec<DecisionSubmission>> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl PromotionBackend for FakePromotionBackend {
    async fn fetch_class_students_promotion_data(
        &self,
        _class_id: &str,
        _year_id: &str,
    ) -> AppResult<Vec<StudentWithDecision>> {
        *self.fetches.lock().unwrap() += 1;
        Ok(self.students.lock().unwrap().clone())
    }

    async fn submit_promotion_decisions(
        &self,
        _year_id: &str,
        _class_id: &str,
        decisions: &[DecisionSubmission],
    ) -> AppResult<SubmitResult> {
        if let Some(message) = self.fail_submit.lock().unwrap().clone() {
            return Err(AppError::bad_response("decisions/", 400, message));
        }
        self.submissions.lock().unwrap().push(decisions.to_vec());
        Ok(SubmitResult {
            created: decisions.len() as u32,
            updated: 0,
            message: None,
        })
    }
}

// ========== 测试数据 ==========

/// 一行序列成绩
pub fn sequence_row(id: &str, name: &str, average: f64, rank: u32) -> JsonValue {
    json!({
        "student_id": id,
        "student_name": name,
        "average": format!("{:.2}", average),
        "rank": rank,
        "is_published": false,
    })
}

/// 10 名学生：2 优秀、1 很好、1 良好、1 中等、5 待提高
pub fn ten_student_rows() -> Vec<JsonValue> {
    let averages = [17.5, 16.0, 15.0, 13.0, 11.0, 9.5, 8.0, 7.0, 6.0, 5.0];
    averages
        .iter()
        .enumerate()
        .map(|(i, avg)| sequence_row(&format!("s{}", i + 1), &format!("Eleve {}", i + 1), *avg, i as u32 + 1))
        .collect()
}

/// 班级学生名单，`decided` 为已有服务端决定的学生下标
pub fn students(count: usize, decided: &[usize]) -> Vec<StudentWithDecision> {
    (0..count)
        .map(|i| StudentWithDecision {
            student_id: format!("s{}", i + 1),
            full_name: format!("Eleve {}", i + 1),
            matricule: format!("MAT-{:03}", i + 1),
            yearly_average: Some(10.0 + i as f64 / 2.0),
            promotion_decision: decided.contains(&i).then(|| PromotionDecision {
                id: format!("d{}", i + 1),
                student_id: format!("s{}", i + 1),
                status: PromotionStatus::Promoted,
                is_manual: false,
                remarks: None,
                decision_date: None,
                decided_by: None,
            }),
        })
        .collect()
}
