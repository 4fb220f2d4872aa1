use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// 周期粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// 单次考试序列
    Sequence,
    /// 学期
    Term,
    /// 学年
    Year,
}

impl Granularity {
    /// URL 路径片段
    pub fn path_segment(self) -> &'static str {
        match self {
            Granularity::Sequence => "sequences",
            Granularity::Term => "terms",
            Granularity::Year => "years",
        }
    }

    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            Granularity::Sequence => "序列",
            Granularity::Term => "学期",
            Granularity::Year => "学年",
        }
    }
}

impl Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 班级 + 周期，缓存与计算任务的主键
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodKey {
    pub granularity: Granularity,
    pub period_id: String,
    pub class_id: String,
}

impl PeriodKey {
    pub fn new(
        granularity: Granularity,
        period_id: impl Into<String>,
        class_id: impl Into<String>,
    ) -> Self {
        Self {
            granularity,
            period_id: period_id.into(),
            class_id: class_id.into(),
        }
    }
}

impl Display for PeriodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} #{} 班级#{}]",
            self.granularity, self.period_id, self.class_id
        )
    }
}

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// 成绩表的分页与排序参数
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageQuery {
    /// 页码（从 1 开始）
    pub page: u32,
    pub page_size: u32,
    pub sort_column: String,
    pub sort_direction: SortDirection,
}

impl PageQuery {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size,
            sort_column: "rank".to_string(),
            sort_direction: SortDirection::Asc,
        }
    }

    pub fn sorted_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_column = column.into();
        self.sort_direction = direction;
        self
    }

    /// 全量视图：一页取完，固定按名次排序
    pub fn full(page_size: u32) -> Self {
        Self::new(1, page_size)
    }

    /// 后端 ordering 参数，降序加 "-" 前缀
    pub fn ordering(&self) -> String {
        match self.sort_direction {
            SortDirection::Asc => self.sort_column.clone(),
            SortDirection::Desc => format!("-{}", self.sort_column),
        }
    }
}
