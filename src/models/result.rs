use serde::{Deserialize, Deserializer, Serialize};

/// 单科成绩
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectScore {
    pub subject_id: String,
    #[serde(default)]
    pub subject_name: String,
    /// 缺考时为空
    #[serde(default, deserialize_with = "deserialize_opt_decimal")]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub coefficient: f64,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub weighted_score: f64,
    #[serde(default)]
    pub rank_in_subject: Option<u32>,
    #[serde(default)]
    pub is_published: bool,
}

/// 学生在某一周期的成绩（统一形状，各粒度的字段差异在适配器中抹平）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentResult {
    pub student_id: String,
    #[serde(default)]
    pub student_name: String,
    /// 20 分制平均分
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub average: f64,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub total_points: f64,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub total_coefficient: f64,
    #[serde(default)]
    pub subject_scores: Vec<SubjectScore>,
}

impl StudentResult {
    /// 平均分限制在 [0, 20]
    pub fn clamp_average(&mut self) {
        if !self.average.is_finite() {
            self.average = 0.0;
        }
        self.average = self.average.clamp(0.0, 20.0);
    }
}

/// 单科统计（后端原样透传）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectStatistics {
    pub subject_id: String,
    pub subject_name: String,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub class_average: f64,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub highest_score: f64,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub lowest_score: f64,
    pub passed_students: u32,
}

/// 班级统计
///
/// 五个等级分布字段可能缺失（旧接口不返回），因此为 `Option`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassStatistics {
    pub total_students: u32,
    pub passed_students: u32,
    pub failed_students: u32,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub pass_percentage: f64,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub class_average: f64,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub highest_average: f64,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub lowest_average: f64,
    pub excellent_count: Option<u32>,
    pub very_good_count: Option<u32>,
    pub good_count: Option<u32>,
    pub average_count: Option<u32>,
    pub needs_improvement_count: Option<u32>,
    pub subject_statistics: Vec<SubjectStatistics>,
}

impl ClassStatistics {
    /// 五个分布字段全部存在时返回
    pub fn distribution(&self) -> Option<[u32; 5]> {
        Some([
            self.excellent_count?,
            self.very_good_count?,
            self.good_count?,
            self.average_count?,
            self.needs_improvement_count?,
        ])
    }
}

/// 后端返回的内层结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsPayload<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub class_statistics: Option<ClassStatistics>,
    #[serde(default)]
    pub class_name: Option<String>,
}

/// 后端分页信封：`{ count, next, previous, results: { results, class_statistics, class_name } }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsEnvelope<T> {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: ResultsPayload<T>,
}

/// 归一化后的一页成绩
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsPage {
    pub count: u32,
    pub has_next: bool,
    pub has_previous: bool,
    pub results: Vec<StudentResult>,
    pub class_statistics: ClassStatistics,
    pub class_name: String,
}

// ========== 数值反序列化 ==========
// 后端 Decimal 字段可能序列化为字符串（"12.50"）或数字

fn value_to_decimal<E: serde::de::Error>(value: serde_json::Value) -> Result<Option<f64>, E> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| E::custom(format!("无法转换数值: {}", n))),
        serde_json::Value::String(s) if s.trim().is_empty() => Ok(None),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| E::custom(format!("无法解析数值字符串: {}", s))),
        other => Err(E::custom(format!("期望数值或字符串，实际为: {}", other))),
    }
}

fn deserialize_decimal<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_to_decimal::<D::Error>(value)?.unwrap_or(0.0))
}

fn deserialize_opt_decimal<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    value_to_decimal::<D::Error>(value)
}
