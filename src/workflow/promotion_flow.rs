//! 升级决定草稿流程 - 流程层
//!
//! 为（班级, 学年）提供一个可持久化的工作面：
//!
//! 1. **打开**：存储中有结构合法的草稿则原样采用（草稿激活）；否则由服务端基线构建（干净）。
//!    打开本身从不写存储。
//! 2. **编辑**：单条或对过滤结果批量修改，每次修改后整体写入存储。
//! 3. **刷新**：草稿激活时需用户确认，才丢弃草稿并强制重新拉取基线。
//! 4. **提交**：只发送非待定的决定；仍有待定时需确认（提示待定人数）。
//!    成功后清除草稿、使基线缓存失效、关闭会话；失败时草稿保留。
//!
//! 存储中的草稿形状不合法时静默丢弃，回退到服务端基线，不提示用户。

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{debug, error, info, warn};

use crate::clients::PromotionBackend;
use crate::error::{AppResult, BusinessError, ValidationError};
use crate::infrastructure::{draft_key, DraftRepository};
use crate::models::{
    DecisionSubmission, PromotionDraftEntry, PromotionStatus, PromotionSummary,
    StudentWithDecision, SubmitResult,
};
use crate::services::{ConfirmPrompt, Confirmer, Notifier};

/// 一次打开的草稿会话
#[derive(Debug, Clone, PartialEq)]
pub struct PromotionSession {
    class_id: String,
    year_id: String,
    entries: Vec<PromotionDraftEntry>,
    draft_active: bool,
}

impl PromotionSession {
    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn year_id(&self) -> &str {
        &self.year_id
    }

    pub fn entries(&self) -> &[PromotionDraftEntry] {
        &self.entries
    }

    pub fn is_draft_active(&self) -> bool {
        self.draft_active
    }

    pub fn entry(&self, student_id: &str) -> Option<&PromotionDraftEntry> {
        self.entries.iter().find(|e| e.student_id == student_id)
    }

    /// 当前搜索条件下可见的记录
    pub fn filtered(&self, query: &str) -> Vec<&PromotionDraftEntry> {
        self.entries.iter().filter(|e| e.matches(query)).collect()
    }

    /// 与服务端快照不同的记录
    pub fn changed_entries(&self) -> Vec<&PromotionDraftEntry> {
        self.entries.iter().filter(|e| e.is_changed()).collect()
    }

    pub fn summary(&self) -> PromotionSummary {
        PromotionSummary::from_statuses(self.entries.iter().map(|e| e.promotion_status))
    }
}

/// 刷新结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Reloaded,
    Cancelled,
}

/// 提交结果
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Submitted {
        submitted: usize,
        pending: usize,
        result: SubmitResult,
    },
    Cancelled,
}

/// 升级决定草稿仓库
pub struct PromotionDraftStore {
    backend: Arc<dyn PromotionBackend>,
    repository: Arc<dyn DraftRepository>,
    notifier: Arc<dyn Notifier>,
    confirmer: Arc<dyn Confirmer>,
    remarks_required_for: Vec<PromotionStatus>,
    baselines: HashMap<(String, String), Vec<StudentWithDecision>>,
    session: Option<PromotionSession>,
}

impl PromotionDraftStore {
    pub fn new(
        backend: Arc<dyn PromotionBackend>,
        repository: Arc<dyn DraftRepository>,
        notifier: Arc<dyn Notifier>,
        confirmer: Arc<dyn Confirmer>,
    ) -> Self {
        Self {
            backend,
            repository,
            notifier,
            confirmer,
            remarks_required_for: vec![PromotionStatus::Conditional],
            baselines: HashMap::new(),
            session: None,
        }
    }

    /// 设置必须填写备注的状态
    pub fn with_remarks_required_for(mut self, statuses: Vec<PromotionStatus>) -> Self {
        self.remarks_required_for = statuses;
        self
    }

    pub fn session(&self) -> Option<&PromotionSession> {
        self.session.as_ref()
    }

    fn session_mut(&mut self) -> AppResult<&mut PromotionSession> {
        self.session
            .as_mut()
            .ok_or_else(|| BusinessError::SessionNotOpen.into())
    }

    /// 服务端基线，`force` 时跳过缓存
    async fn baseline(
        &mut self,
        class_id: &str,
        year_id: &str,
        force: bool,
    ) -> AppResult<Vec<StudentWithDecision>> {
        let cache_key = (class_id.to_string(), year_id.to_string());
        if !force {
            if let Some(students) = self.baselines.get(&cache_key) {
                return Ok(students.clone());
            }
        }

        let students = self
            .backend
            .fetch_class_students_promotion_data(class_id, year_id)
            .await?;
        debug!(
            "[班级 {} 学年 {}] 拉取基线 {} 名学生",
            class_id,
            year_id,
            students.len()
        );
        self.baselines.insert(cache_key, students.clone());
        Ok(students)
    }

    /// 基线中各状态人数（服务端已保存的决定）
    pub async fn baseline_summary(
        &mut self,
        class_id: &str,
        year_id: &str,
    ) -> AppResult<PromotionSummary> {
        let students = self.baseline(class_id, year_id, false).await?;
        Ok(PromotionSummary::from_statuses(students.iter().map(|s| {
            s.promotion_decision
                .as_ref()
                .map(|d| d.status)
                .unwrap_or_default()
        })))
    }

    /// 打开会话
    pub async fn open(&mut self, class_id: &str, year_id: &str) -> AppResult<&PromotionSession> {
        let baseline = self.baseline(class_id, year_id, false).await?;
        let key = draft_key(class_id, year_id);

        let stored = match self.repository.get(&key) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("读取草稿失败，使用服务端基线: {}", e);
                None
            }
        };

        let adopted = stored.and_then(|raw| self.adopt_draft(&key, &raw, &baseline));
        let (entries, draft_active) = match adopted {
            Some(entries) => {
                info!(
                    "[班级 {} 学年 {}] 📝 恢复本地草稿 ({} 条)",
                    class_id,
                    year_id,
                    entries.len()
                );
                (entries, true)
            }
            None => {
                info!(
                    "[班级 {} 学年 {}] 从服务端基线创建工作集 ({} 名学生)",
                    class_id,
                    year_id,
                    baseline.len()
                );
                (
                    baseline.iter().map(PromotionDraftEntry::from_baseline).collect(),
                    false,
                )
            }
        };

        self.session = Some(PromotionSession {
            class_id: class_id.to_string(),
            year_id: year_id.to_string(),
            entries,
            draft_active,
        });
        self.session.as_ref().ok_or_else(|| BusinessError::SessionNotOpen.into())
    }

    /// 校验存储中的草稿：必须是数组、每项可解析、学生集合与在读名单一致。
    /// 不合法时静默丢弃。
    fn adopt_draft(
        &self,
        key: &str,
        raw: &str,
        baseline: &[StudentWithDecision],
    ) -> Option<Vec<PromotionDraftEntry>> {
        let parsed = serde_json::from_str::<JsonValue>(raw)
            .ok()
            .filter(|value| value.is_array())
            .and_then(|value| serde_json::from_value::<Vec<PromotionDraftEntry>>(value).ok());

        let entries = match parsed {
            Some(entries) => entries,
            None => {
                debug!("草稿 {} 形状不合法，已丢弃", key);
                self.discard_stored(key);
                return None;
            }
        };

        let draft_ids: BTreeSet<&str> = entries.iter().map(|e| e.student_id.as_str()).collect();
        let enrolled: BTreeSet<&str> = baseline.iter().map(|s| s.student_id.as_str()).collect();
        if draft_ids != enrolled || draft_ids.len() != entries.len() {
            debug!("草稿 {} 的学生名单与在读名单不一致，已丢弃", key);
            self.discard_stored(key);
            return None;
        }

        Some(entries)
    }

    fn discard_stored(&self, key: &str) {
        if let Err(e) = self.repository.clear(key) {
            debug!("清除无效草稿失败: {}", e);
        }
    }

    /// 整体写入存储并标记草稿激活
    fn persist(&mut self) -> AppResult<()> {
        let repository = Arc::clone(&self.repository);
        let session = self.session_mut()?;
        session.draft_active = true;
        let key = draft_key(&session.class_id, &session.year_id);
        let json = serde_json::to_string(&session.entries)?;
        repository.set(&key, &json)
    }

    /// 修改一名学生的状态
    pub fn set_status(&mut self, student_id: &str, status: PromotionStatus) -> AppResult<()> {
        ensure_editable(status)?;
        let session = self.session_mut()?;
        let entry = find_entry(session, student_id)?;
        entry.promotion_status = status;
        self.persist()
    }

    /// 修改一名学生的备注
    pub fn set_remarks(&mut self, student_id: &str, remarks: &str) -> AppResult<()> {
        let session = self.session_mut()?;
        let entry = find_entry(session, student_id)?;
        entry.remarks = remarks.to_string();
        self.persist()
    }

    /// 对当前过滤结果批量设置状态，返回修改条数
    pub fn bulk_set_status(&mut self, query: &str, status: PromotionStatus) -> AppResult<usize> {
        ensure_editable(status)?;
        let session = self.session_mut()?;
        let mut changed = 0;
        for entry in session.entries.iter_mut().filter(|e| e.matches(query)) {
            entry.promotion_status = status;
            changed += 1;
        }

        if changed == 0 {
            self.notifier.warning("当前过滤条件下没有学生");
            return Ok(0);
        }

        self.persist()?;
        info!("批量设置 {} 名学生为 {}", changed, status);
        Ok(changed)
    }

    /// 丢弃草稿并强制从服务端重新加载
    pub async fn refresh(&mut self) -> AppResult<RefreshOutcome> {
        let (class_id, year_id, draft_active) = {
            let session = self.session_mut()?;
            (
                session.class_id.clone(),
                session.year_id.clone(),
                session.draft_active,
            )
        };

        if draft_active && !self.confirmer.confirm(&ConfirmPrompt::DiscardDraft) {
            info!("[班级 {} 学年 {}] 用户取消了刷新", class_id, year_id);
            return Ok(RefreshOutcome::Cancelled);
        }

        let baseline = self.baseline(&class_id, &year_id, true).await?;
        self.repository.clear(&draft_key(&class_id, &year_id))?;

        let session = self.session_mut()?;
        session.entries = baseline.iter().map(PromotionDraftEntry::from_baseline).collect();
        session.draft_active = false;
        info!(
            "[班级 {} 学年 {}] 🔄 已从服务端重新加载 {} 名学生",
            class_id,
            year_id,
            baseline.len()
        );
        Ok(RefreshOutcome::Reloaded)
    }

    /// 提交非待定的决定
    pub async fn submit(&mut self) -> AppResult<SubmitOutcome> {
        let remarks_required_for = self.remarks_required_for.clone();
        let session = self.session_mut()?;
        let class_id = session.class_id.clone();
        let year_id = session.year_id.clone();
        let total = session.entries.len();

        let decisions: Vec<DecisionSubmission> = session
            .entries
            .iter()
            .filter(|e| e.promotion_status != PromotionStatus::Pending)
            .map(DecisionSubmission::from)
            .collect();

        if decisions.is_empty() {
            let err = ValidationError::NothingToSubmit { total };
            self.notifier.warning(&err.to_string());
            return Err(err.into());
        }

        let missing: Vec<String> = decisions
            .iter()
            .filter(|d| remarks_required_for.contains(&d.status) && d.remarks.trim().is_empty())
            .map(|d| d.student_id.clone())
            .collect();
        if !missing.is_empty() {
            let err = ValidationError::MissingRemarks {
                student_ids: missing,
            };
            self.notifier.warning(&err.to_string());
            return Err(err.into());
        }

        let pending = total - decisions.len();
        if pending > 0 {
            let prompt = ConfirmPrompt::SubmitWithPending {
                pending,
                submitting: decisions.len(),
            };
            if !self.confirmer.confirm(&prompt) {
                info!("[班级 {} 学年 {}] 用户取消了提交", class_id, year_id);
                return Ok(SubmitOutcome::Cancelled);
            }
        }

        info!(
            "[班级 {} 学年 {}] 📤 提交 {} 条决定 (待定 {})",
            class_id,
            year_id,
            decisions.len(),
            pending
        );

        let submitted = self
            .backend
            .submit_promotion_decisions(&year_id, &class_id, &decisions)
            .await;
        let result = match submitted {
            Ok(result) => result,
            Err(e) => {
                error!("[班级 {} 学年 {}] ❌ 提交失败: {}", class_id, year_id, e);
                // 保证失败后草稿仍在存储中
                if let Err(persist_err) = self.persist() {
                    warn!("提交失败后保存草稿也失败: {}", persist_err);
                }
                self.notifier
                    .error(&format!("提交升级决定失败: {}", e.user_message()));
                return Err(e);
            }
        };

        // 服务端已接受，清理草稿失败只记录，不影响提交结果
        if let Err(e) = self.repository.clear(&draft_key(&class_id, &year_id)) {
            warn!(
                "[班级 {} 学年 {}] ⚠️ 提交成功但清理草稿失败: {}",
                class_id, year_id, e
            );
        }
        self.baselines.remove(&(class_id.clone(), year_id.clone()));
        self.session = None;

        self.notifier
            .success(&format!("已提交 {} 条升级决定", decisions.len()));
        info!(
            "[班级 {} 学年 {}] ✅ 提交成功 (新建 {}, 更新 {})",
            class_id, year_id, result.created, result.updated
        );

        Ok(SubmitOutcome::Submitted {
            submitted: decisions.len(),
            pending,
            result,
        })
    }

    /// 关闭会话，草稿保留在存储中
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(
                "[班级 {} 学年 {}] 关闭会话 (草稿激活: {})",
                session.class_id, session.year_id, session.draft_active
            );
        }
    }
}

fn ensure_editable(status: PromotionStatus) -> AppResult<()> {
    if status.is_editable() {
        Ok(())
    } else {
        Err(ValidationError::StatusNotEditable {
            status: status.to_string(),
        }
        .into())
    }
}

fn find_entry<'a>(
    session: &'a mut PromotionSession,
    student_id: &str,
) -> AppResult<&'a mut PromotionDraftEntry> {
    session
        .entries
        .iter_mut()
        .find(|e| e.student_id == student_id)
        .ok_or_else(|| {
            ValidationError::UnknownStudent {
                student_id: student_id.to_string(),
            }
            .into()
        })
}
