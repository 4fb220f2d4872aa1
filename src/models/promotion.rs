use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 升级状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromotionStatus {
    #[default]
    Pending,
    Promoted,
    Conditional,
    Repeated,
    Graduated,
}

impl PromotionStatus {
    /// 草稿中允许手动选择的状态（毕业只由服务端给出）
    pub fn is_editable(self) -> bool {
        !matches!(self, PromotionStatus::Graduated)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PromotionStatus::Pending => "pending",
            PromotionStatus::Promoted => "promoted",
            PromotionStatus::Conditional => "conditional",
            PromotionStatus::Repeated => "repeated",
            PromotionStatus::Graduated => "graduated",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(PromotionStatus::Pending),
            "promoted" => Some(PromotionStatus::Promoted),
            "conditional" => Some(PromotionStatus::Conditional),
            "repeated" => Some(PromotionStatus::Repeated),
            "graduated" => Some(PromotionStatus::Graduated),
            _ => None,
        }
    }
}

impl std::fmt::Display for PromotionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 服务端的升级决定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionDecision {
    pub id: String,
    pub student_id: String,
    pub status: PromotionStatus,
    #[serde(default)]
    pub is_manual: bool,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub decision_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub decided_by: Option<String>,
}

/// 班级学生及其已有的升级决定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentWithDecision {
    pub student_id: String,
    pub full_name: String,
    #[serde(default)]
    pub matricule: String,
    #[serde(default)]
    pub yearly_average: Option<f64>,
    #[serde(default)]
    pub promotion_decision: Option<PromotionDecision>,
}

/// 草稿中的一条工作记录
///
/// `fetched_promotion_decision` 是打开会话时的服务端快照，只用于差异展示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionDraftEntry {
    pub student_id: String,
    pub full_name: String,
    #[serde(default)]
    pub matricule: String,
    pub promotion_status: PromotionStatus,
    #[serde(default)]
    pub remarks: String,
    #[serde(default)]
    pub fetched_promotion_decision: Option<PromotionDecision>,
}

impl PromotionDraftEntry {
    /// 由服务端基线构建：无决定时为待定、备注为空
    pub fn from_baseline(student: &StudentWithDecision) -> Self {
        let decision = student.promotion_decision.as_ref();
        Self {
            student_id: student.student_id.clone(),
            full_name: student.full_name.clone(),
            matricule: student.matricule.clone(),
            promotion_status: decision.map(|d| d.status).unwrap_or_default(),
            remarks: decision
                .and_then(|d| d.remarks.clone())
                .unwrap_or_default(),
            fetched_promotion_decision: decision.cloned(),
        }
    }

    /// 与基线快照相比是否有改动
    pub fn is_changed(&self) -> bool {
        match &self.fetched_promotion_decision {
            Some(decision) => {
                decision.status != self.promotion_status
                    || decision.remarks.as_deref().unwrap_or_default() != self.remarks
            }
            None => self.promotion_status != PromotionStatus::Pending || !self.remarks.is_empty(),
        }
    }

    /// 搜索过滤：姓名或学号，忽略大小写
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self.full_name.to_lowercase().contains(&query)
            || self.matricule.to_lowercase().contains(&query)
    }
}

/// 提交给服务端的一条决定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionSubmission {
    pub student_id: String,
    pub status: PromotionStatus,
    pub remarks: String,
}

impl From<&PromotionDraftEntry> for DecisionSubmission {
    fn from(entry: &PromotionDraftEntry) -> Self {
        Self {
            student_id: entry.student_id.clone(),
            status: entry.promotion_status,
            remarks: entry.remarks.clone(),
        }
    }
}

/// 批量提交结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitResult {
    pub created: u32,
    pub updated: u32,
    pub message: Option<String>,
}

/// 各状态人数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PromotionSummary {
    pub pending: usize,
    pub promoted: usize,
    pub conditional: usize,
    pub repeated: usize,
    pub graduated: usize,
}

impl PromotionSummary {
    pub fn from_statuses(statuses: impl IntoIterator<Item = PromotionStatus>) -> Self {
        let mut summary = Self::default();
        for status in statuses {
            match status {
                PromotionStatus::Pending => summary.pending += 1,
                PromotionStatus::Promoted => summary.promoted += 1,
                PromotionStatus::Conditional => summary.conditional += 1,
                PromotionStatus::Repeated => summary.repeated += 1,
                PromotionStatus::Graduated => summary.graduated += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.pending + self.promoted + self.conditional + self.repeated + self.graduated
    }
}
