//! 通知与确认 - 业务能力层
//!
//! 只负责"告诉用户结果"和"向用户确认"两种能力，不关心流程

use std::sync::Mutex;

use tracing::{error, info, warn};

/// 通知级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// 一条用户可见的通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// 通知渠道（成功 / 警告 / 错误），具体展示方式由调用方决定
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);

    fn success(&self, message: &str) {
        self.notify(NoticeLevel::Success, message);
    }

    fn warning(&self, message: &str) {
        self.notify(NoticeLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.notify(NoticeLevel::Error, message);
    }
}

/// 输出到日志的通知渠道
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Success => info!("✅ {}", message),
            NoticeLevel::Warning => warn!("⚠️ {}", message),
            NoticeLevel::Error => error!("❌ {}", message),
        }
    }
}

/// 记录所有通知，供界面轮询或测试断言
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self, level: NoticeLevel) -> usize {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|n| n.level == level)
            .count()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Notice {
                level,
                message: message.to_string(),
            });
    }
}

/// 需要用户确认的操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmPrompt {
    /// 丢弃本地草稿并从服务端重新加载
    DiscardDraft,
    /// 仍有学生为待定，只提交其余决定
    SubmitWithPending { pending: usize, submitting: usize },
}

impl ConfirmPrompt {
    pub fn message(&self) -> String {
        match self {
            ConfirmPrompt::DiscardDraft => {
                "本地草稿中的修改将被丢弃并从服务端重新加载，是否继续？".to_string()
            }
            ConfirmPrompt::SubmitWithPending {
                pending,
                submitting,
            } => format!(
                "还有 {} 名学生为待定状态，本次只提交其余 {} 条决定，是否继续？",
                pending, submitting
            ),
        }
    }
}

/// 确认能力
pub trait Confirmer: Send + Sync {
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool;
}

/// 固定回答的确认器，同时记录收到的提示
#[derive(Debug)]
pub struct FixedConfirmer {
    answer: bool,
    prompts: Mutex<Vec<ConfirmPrompt>>,
}

impl FixedConfirmer {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<ConfirmPrompt> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Confirmer for FixedConfirmer {
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.clone());
        self.answer
    }
}

/// 在终端询问 y/N，读不到输入时视为拒绝
#[derive(Debug, Default)]
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        use std::io::Write;

        print!("{} [y/N] ", prompt.message());
        if std::io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match std::io::stdin().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            Err(e) => {
                warn!("读取确认输入失败: {}", e);
                false
            }
        }
    }
}
