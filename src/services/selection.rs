//! 学生勾选状态
//!
//! "全选"只作用于当前搜索过滤后的视图，而不是全部学生

use std::collections::BTreeSet;

use crate::models::StudentResult;

#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    selected: BTreeSet<String>,
    search: String,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    fn matches(&self, result: &StudentResult) -> bool {
        let query = self.search.trim().to_lowercase();
        query.is_empty()
            || result.student_name.to_lowercase().contains(&query)
            || result.student_id.to_lowercase().contains(&query)
    }

    /// 当前搜索条件下可见的学生
    pub fn filtered<'a>(&self, results: &'a [StudentResult]) -> Vec<&'a StudentResult> {
        results.iter().filter(|r| self.matches(r)).collect()
    }

    pub fn toggle(&mut self, student_id: &str) {
        if !self.selected.remove(student_id) {
            self.selected.insert(student_id.to_string());
        }
    }

    pub fn is_selected(&self, student_id: &str) -> bool {
        self.selected.contains(student_id)
    }

    /// 勾选当前过滤视图中的全部学生
    pub fn select_all_filtered(&mut self, results: &[StudentResult]) {
        let ids: Vec<String> = self
            .filtered(results)
            .into_iter()
            .map(|r| r.student_id.clone())
            .collect();
        self.selected.extend(ids);
    }

    /// 取消勾选当前过滤视图中的全部学生
    pub fn deselect_all_filtered(&mut self, results: &[StudentResult]) {
        let ids: Vec<String> = self
            .filtered(results)
            .into_iter()
            .map(|r| r.student_id.clone())
            .collect();
        for id in ids {
            self.selected.remove(&id);
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}
