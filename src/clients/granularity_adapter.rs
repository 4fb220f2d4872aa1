//! 周期粒度适配器
//!
//! 序列 / 学期 / 学年三种成绩接口形状略有不同：
//!
//! | 粒度 | 平均分字段       | 姓名字段        | 计算步骤                 | 存在性检查 |
//! |------|------------------|-----------------|--------------------------|------------|
//! | 序列 | `average`        | `student_name`  | 总成绩                   | 否         |
//! | 学期 | `term_average`   | `student_name`  | 科目成绩 → 总成绩        | 是         |
//! | 学年 | `yearly_average` | `student`       | 科目成绩 → 总成绩        | 是         |
//!
//! 适配器把这些差异收敛在边界上，之后的统计、缓存、发布只看到统一的 `StudentResult`。

use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};
use tracing::warn;

use crate::clients::results_client::{CalculationStep, PublishScope, ResultsBackend};
use crate::error::AppResult;
use crate::models::{
    Granularity, PageQuery, PeriodKey, ResultsEnvelope, ResultsPage, StudentResult,
};

/// 原始行中的字段名
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    pub average_field: &'static str,
    pub name_field: &'static str,
}

impl FieldMapping {
    pub fn for_granularity(granularity: Granularity) -> Self {
        match granularity {
            Granularity::Sequence => Self {
                average_field: "average",
                name_field: "student_name",
            },
            Granularity::Term => Self {
                average_field: "term_average",
                name_field: "student_name",
            },
            Granularity::Year => Self {
                average_field: "yearly_average",
                name_field: "student",
            },
        }
    }
}

/// 周期粒度适配器
pub struct GranularityAdapter {
    granularity: Granularity,
    backend: Arc<dyn ResultsBackend>,
    fields: FieldMapping,
    steps: Vec<CalculationStep>,
    checks_existence: bool,
    full_page_size: u32,
}

impl GranularityAdapter {
    pub fn new(
        granularity: Granularity,
        backend: Arc<dyn ResultsBackend>,
        full_page_size: u32,
    ) -> Self {
        let steps = match granularity {
            Granularity::Sequence => vec![CalculationStep::OverallResults],
            Granularity::Term | Granularity::Year => vec![
                CalculationStep::SubjectResults,
                CalculationStep::OverallResults,
            ],
        };

        Self {
            granularity,
            backend,
            fields: FieldMapping::for_granularity(granularity),
            steps,
            checks_existence: granularity != Granularity::Sequence,
            full_page_size,
        }
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn calculation_steps(&self) -> &[CalculationStep] {
        &self.steps
    }

    /// 计算完成后是否需要刷新"是否已有成绩"
    pub fn checks_existence(&self) -> bool {
        self.checks_existence
    }

    /// 全量视图的查询参数
    pub fn full_query(&self) -> PageQuery {
        PageQuery::full(self.full_page_size)
    }

    /// 拉取一页展示用成绩
    pub async fn fetch_page(&self, key: &PeriodKey, query: &PageQuery) -> AppResult<ResultsPage> {
        let envelope = self.backend.fetch_results(key, query).await?;
        self.normalize(envelope)
    }

    /// 拉取全量成绩（按名次排序）
    pub async fn fetch_full(&self, key: &PeriodKey) -> AppResult<ResultsPage> {
        let envelope = self.backend.fetch_results(key, &self.full_query()).await?;
        let page = self.normalize(envelope)?;
        if page.has_next {
            warn!(
                "{} ⚠️ 全量视图未取完 ({}/{} 条)，统计只基于前 {} 条，请调大 full_page_size",
                key,
                page.results.len(),
                page.count,
                self.full_page_size
            );
        }
        Ok(page)
    }

    pub async fn run_step(&self, key: &PeriodKey, step: CalculationStep) -> AppResult<()> {
        self.backend.calculate(key, step).await
    }

    pub async fn results_exist(&self, key: &PeriodKey) -> AppResult<bool> {
        self.backend.results_exist(key).await
    }

    pub async fn publish(
        &self,
        key: &PeriodKey,
        scope: &PublishScope,
        value: bool,
        target_ids: &[String],
    ) -> AppResult<Option<u32>> {
        self.backend.publish(key, scope, value, target_ids).await
    }

    fn normalize(&self, envelope: ResultsEnvelope<JsonValue>) -> AppResult<ResultsPage> {
        let ResultsEnvelope {
            count,
            next,
            previous,
            results: payload,
        } = envelope;

        let results = payload
            .results
            .into_iter()
            .map(|row| self.normalize_row(row))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(ResultsPage {
            count,
            has_next: next.is_some(),
            has_previous: previous.is_some(),
            results,
            class_statistics: payload.class_statistics.unwrap_or_default(),
            class_name: payload.class_name.unwrap_or_default(),
        })
    }

    /// 把一行原始 JSON 转换为统一的 `StudentResult`
    pub fn normalize_row(&self, row: JsonValue) -> AppResult<StudentResult> {
        let mut map = match row {
            JsonValue::Object(map) => map,
            other => {
                warn!("{} 成绩行不是对象，已按空行处理: {}", self.granularity, other);
                Map::new()
            }
        };

        if let Some(average) = map.remove(self.fields.average_field) {
            map.insert("average".to_string(), average);
        }

        // 学年接口的 student 可能是字符串，也可能是 { id, full_name }
        if let Some(student) = map.remove(self.fields.name_field) {
            match student {
                JsonValue::Object(inner) => {
                    if !map.contains_key("student_id") {
                        if let Some(id) = inner.get("id") {
                            map.insert("student_id".to_string(), id.clone());
                        }
                    }
                    let name = inner
                        .get("full_name")
                        .or_else(|| inner.get("name"))
                        .cloned()
                        .unwrap_or(JsonValue::String(String::new()));
                    map.insert("student_name".to_string(), name);
                }
                other => {
                    map.insert("student_name".to_string(), other);
                }
            }
        }

        stringify_id(&mut map, "student_id");
        if let Some(JsonValue::Array(scores)) = map.get_mut("subject_scores") {
            for score in scores.iter_mut() {
                if let JsonValue::Object(score) = score {
                    stringify_id(score, "subject_id");
                }
            }
        }

        let mut result: StudentResult = serde_json::from_value(JsonValue::Object(map))?;
        result.clamp_average();
        Ok(result)
    }
}

/// 数字 ID 转为字符串
fn stringify_id(map: &mut Map<String, JsonValue>, field: &str) {
    if let Some(JsonValue::Number(n)) = map.get(field) {
        let id = n.to_string();
        map.insert(field.to_string(), JsonValue::String(id));
    }
}
