use serde::{Deserialize, Serialize};

/// 成绩等级（固定阈值，20 分制）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeBand {
    /// ≥ 16
    Excellent,
    /// [14, 16)
    VeryGood,
    /// [12, 14)
    Good,
    /// [10, 12)
    Average,
    /// < 10
    NeedsImprovement,
}

/// 及格线
pub const PASS_MARK: f64 = 10.0;

impl GradeBand {
    /// 从高到低
    pub const ALL: [GradeBand; 5] = [
        GradeBand::Excellent,
        GradeBand::VeryGood,
        GradeBand::Good,
        GradeBand::Average,
        GradeBand::NeedsImprovement,
    ];

    pub fn from_average(average: f64) -> Self {
        if average >= 16.0 {
            GradeBand::Excellent
        } else if average >= 14.0 {
            GradeBand::VeryGood
        } else if average >= 12.0 {
            GradeBand::Good
        } else if average >= PASS_MARK {
            GradeBand::Average
        } else {
            GradeBand::NeedsImprovement
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GradeBand::Excellent => "优秀",
            GradeBand::VeryGood => "很好",
            GradeBand::Good => "良好",
            GradeBand::Average => "中等",
            GradeBand::NeedsImprovement => "待提高",
        }
    }
}

impl std::fmt::Display for GradeBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
