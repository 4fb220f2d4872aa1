//! 发布控制 - 业务能力层
//!
//! 四种范围切换 `is_published`：全部科目、全部学生、指定学生、指定学生的某一科。
//! 不做乐观更新：失败时原状态不变；成功时先刷新两份缓存视图再报告成功。

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use crate::clients::{GranularityAdapter, PublishScope};
use crate::error::{AppResult, BusinessError};
use crate::models::PeriodKey;
use crate::services::notifier::Notifier;
use crate::services::result_cache::ResultSetCache;

/// 发布结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// 已发布 / 已取消发布，附带后端报告的更新条数
    Applied { updated: Option<u32> },
    /// 指定学生为空，未发出请求
    Skipped,
}

type ControlKey = (PeriodKey, String);

/// 请求进行期间占用控件，结束时自动释放
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<ControlKey>>,
    key: ControlKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

/// 发布控制器
pub struct PublicationController {
    notifier: Arc<dyn Notifier>,
    in_flight: Mutex<HashSet<ControlKey>>,
}

impl PublicationController {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// 该控件是否有请求在进行（界面据此禁用按钮）
    pub fn is_in_flight(&self, key: &PeriodKey, scope: &PublishScope) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&(key.clone(), scope.control_name()))
    }

    fn acquire(&self, key: &PeriodKey, scope: &PublishScope) -> AppResult<InFlightGuard<'_>> {
        let control = (key.clone(), scope.control_name());
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(control.clone()) {
            return Err(BusinessError::RequestInFlight {
                control: scope.control_name(),
            }
            .into());
        }
        Ok(InFlightGuard {
            set: &self.in_flight,
            key: control,
        })
    }

    /// 切换发布状态
    pub async fn publish(
        &self,
        adapter: &GranularityAdapter,
        cache: &ResultSetCache,
        key: &PeriodKey,
        scope: &PublishScope,
        value: bool,
        target_ids: &[String],
    ) -> AppResult<PublishOutcome> {
        let action = if value { "发布" } else { "取消发布" };

        if scope.requires_targets() && target_ids.is_empty() {
            warn!("{} {} 未选择学生，跳过请求", key, describe(scope));
            self.notifier
                .warning(&format!("请先选择要{}的学生", action));
            return Ok(PublishOutcome::Skipped);
        }

        let _guard = self.acquire(key, scope)?;

        info!(
            "{} 📤 {} {} (学生数: {})",
            key,
            action,
            describe(scope),
            if scope.requires_targets() {
                target_ids.len().to_string()
            } else {
                "全部".to_string()
            }
        );

        let updated = match adapter.publish(key, scope, value, target_ids).await {
            Ok(updated) => updated,
            Err(e) => {
                error!("{} {}失败: {}", key, action, e);
                self.notifier.error(&format!(
                    "{}{}失败: {}",
                    describe(scope),
                    action,
                    e.user_message()
                ));
                return Err(e);
            }
        };

        // 先刷新两份视图，再报告成功
        if let Err(e) = cache.refresh(adapter, key).await {
            warn!("{} {}成功但刷新成绩失败: {}", key, action, e);
            self.notifier.warning(&format!(
                "{}已{}，但刷新成绩失败: {}",
                describe(scope),
                action,
                e.user_message()
            ));
        } else {
            self.notifier
                .success(&format!("{}已{}", describe(scope), action));
        }

        info!("{} ✓ {}完成 (更新: {:?})", key, action, updated);
        Ok(PublishOutcome::Applied { updated })
    }
}

fn describe(scope: &PublishScope) -> String {
    match scope {
        PublishScope::AllSubjects => "全部科目成绩".to_string(),
        PublishScope::AllStudents => "全部学生总成绩".to_string(),
        PublishScope::SelectedStudents => "所选学生总成绩".to_string(),
        PublishScope::SubjectForSelected { subject_id } => {
            format!("所选学生的科目 {} 成绩", subject_id)
        }
    }
}
