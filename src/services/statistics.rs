//! 班级统计服务 - 业务能力层
//!
//! 输入全量成绩列表和后端给出的班级统计，输出一份"不会退化"的增强统计：
//! - 后端的五档分布字段齐全且至少一项非零，或列表为空 → 原样信任后端
//! - 否则按固定阈值在客户端重新计算五档分布
//! - 后端未给出人数/平均分等基础字段时，同样由列表补齐
//! - 前三名 / 后三名由全量列表稳定排序得出
//!
//! 本模块所有函数都不会失败。

use serde::Serialize;
use tracing::debug;

use crate::models::{ClassStatistics, GradeBand, StudentResult, SubjectStatistics, PASS_MARK};
use crate::utils::percentage;

/// 前三名 / 后三名的人数
pub const PODIUM_SIZE: usize = 3;

/// 分布数据的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatisticsSource {
    Backend,
    ClientComputed,
}

/// 五档分布
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GradeDistribution {
    pub excellent: u32,
    pub very_good: u32,
    pub good: u32,
    pub average: u32,
    pub needs_improvement: u32,
}

impl GradeDistribution {
    pub fn from_results(results: &[StudentResult]) -> Self {
        let mut distribution = Self::default();
        for result in results {
            match GradeBand::from_average(result.average) {
                GradeBand::Excellent => distribution.excellent += 1,
                GradeBand::VeryGood => distribution.very_good += 1,
                GradeBand::Good => distribution.good += 1,
                GradeBand::Average => distribution.average += 1,
                GradeBand::NeedsImprovement => distribution.needs_improvement += 1,
            }
        }
        distribution
    }

    fn from_array([excellent, very_good, good, average, needs_improvement]: [u32; 5]) -> Self {
        Self {
            excellent,
            very_good,
            good,
            average,
            needs_improvement,
        }
    }

    pub fn total(&self) -> u32 {
        self.excellent + self.very_good + self.good + self.average + self.needs_improvement
    }

    pub fn count(&self, band: GradeBand) -> u32 {
        match band {
            GradeBand::Excellent => self.excellent,
            GradeBand::VeryGood => self.very_good,
            GradeBand::Good => self.good,
            GradeBand::Average => self.average,
            GradeBand::NeedsImprovement => self.needs_improvement,
        }
    }

    /// 某一档占全班的百分比，学生数为 0 时为 0
    pub fn percentage_of(&self, band: GradeBand, total_students: u32) -> f64 {
        percentage(self.count(band), total_students)
    }
}

/// 增强后的班级统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancedClassStatistics {
    pub total_students: u32,
    pub passed_students: u32,
    pub failed_students: u32,
    pub pass_percentage: f64,
    pub class_average: f64,
    pub highest_average: f64,
    pub lowest_average: f64,
    pub distribution: GradeDistribution,
    pub source: StatisticsSource,
    pub subject_statistics: Vec<SubjectStatistics>,
}

impl EnhancedClassStatistics {
    /// 及格率（按人数重新计算，避免后端百分比缺失）
    pub fn pass_rate(&self) -> f64 {
        percentage(self.passed_students, self.total_students)
    }
}

/// 统计聚合器
#[derive(Debug, Default, Clone, Copy)]
pub struct StatisticsAggregator;

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self
    }

    /// 由全量成绩和后端统计得出增强统计
    pub fn enhance(
        &self,
        full_results: &[StudentResult],
        backend: Option<&ClassStatistics>,
    ) -> EnhancedClassStatistics {
        let fallback = ClassStatistics::default();
        let backend = backend.unwrap_or(&fallback);

        let backend_distribution = backend.distribution();
        let trust_backend = full_results.is_empty()
            || backend_distribution
                .map(|counts| counts.iter().any(|&c| c > 0))
                .unwrap_or(false);

        let (distribution, source) = if trust_backend {
            (
                backend_distribution
                    .map(GradeDistribution::from_array)
                    .unwrap_or_default(),
                StatisticsSource::Backend,
            )
        } else {
            debug!(
                "后端分布字段缺失或全为 0，按 {} 条成绩在客户端重新计算",
                full_results.len()
            );
            (
                GradeDistribution::from_results(full_results),
                StatisticsSource::ClientComputed,
            )
        };

        let mut enhanced = EnhancedClassStatistics {
            total_students: backend.total_students,
            passed_students: backend.passed_students,
            failed_students: backend.failed_students,
            pass_percentage: backend.pass_percentage,
            class_average: backend.class_average,
            highest_average: backend.highest_average,
            lowest_average: backend.lowest_average,
            distribution,
            source,
            subject_statistics: backend.subject_statistics.clone(),
        };

        if enhanced.total_students == 0 && !full_results.is_empty() {
            fill_basic_fields(&mut enhanced, full_results);
        }

        enhanced
    }

    /// 平均分最高的前三名（稳定排序，同分保持原顺序）
    pub fn top_students(&self, full_results: &[StudentResult]) -> Vec<StudentResult> {
        let mut sorted = full_results.to_vec();
        sorted.sort_by(|a, b| b.average.total_cmp(&a.average));
        sorted.truncate(PODIUM_SIZE);
        sorted
    }

    /// 平均分最低的后三名（稳定排序，同分保持原顺序）
    pub fn worst_students(&self, full_results: &[StudentResult]) -> Vec<StudentResult> {
        let mut sorted = full_results.to_vec();
        sorted.sort_by(|a, b| a.average.total_cmp(&b.average));
        sorted.truncate(PODIUM_SIZE);
        sorted
    }
}

fn fill_basic_fields(enhanced: &mut EnhancedClassStatistics, results: &[StudentResult]) {
    let total = results.len() as u32;
    let passed = results.iter().filter(|r| r.average >= PASS_MARK).count() as u32;
    let sum: f64 = results.iter().map(|r| r.average).sum();

    enhanced.total_students = total;
    enhanced.passed_students = passed;
    enhanced.failed_students = total - passed;
    enhanced.pass_percentage = percentage(passed, total);
    enhanced.class_average = sum / f64::from(total);
    enhanced.highest_average = results
        .iter()
        .map(|r| r.average)
        .fold(f64::MIN, f64::max);
    enhanced.lowest_average = results
        .iter()
        .map(|r| r.average)
        .fold(f64::MAX, f64::min);
}
