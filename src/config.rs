use std::path::Path;

use serde::Deserialize;

use crate::error::{AppError, AppResult, ConfigError, FileError};
use crate::models::PromotionStatus;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 后端 API 根地址
    pub api_base_url: String,
    /// 后端 API 令牌（Bearer）
    pub api_token: String,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    /// 成绩表默认分页大小
    pub default_page_size: u32,
    /// 全量拉取时使用的分页大小（统计 / 导出 / 前后三名）
    pub full_page_size: u32,
    /// 计算完成后进度对话框保持"完成"状态的时长（毫秒）
    pub completion_display_ms: u64,
    /// 升级决定草稿的存放目录
    pub draft_storage_dir: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 必须填写备注的升级状态
    pub remarks_required_for: Vec<PromotionStatus>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            api_token: String::new(),
            request_timeout_secs: 60,
            default_page_size: 25,
            full_page_size: 1000,
            completion_display_ms: 1500,
            draft_storage_dir: "drafts".to_string(),
            verbose_logging: false,
            remarks_required_for: vec![PromotionStatus::Conditional],
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载配置，文件中缺失的键使用默认值，随后应用环境变量覆盖
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AppError::File(FileError::NotFound {
                path: path.display().to_string(),
            }));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            AppError::File(FileError::TomlParseFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })
        })?;

        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn with_env_overrides(self) -> Self {
        let default = self;
        Self {
            api_base_url: std::env::var("RESULTS_API_BASE_URL").unwrap_or(default.api_base_url),
            api_token: std::env::var("RESULTS_API_TOKEN").unwrap_or(default.api_token),
            request_timeout_secs: std::env::var("RESULTS_REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.request_timeout_secs),
            default_page_size: std::env::var("RESULTS_DEFAULT_PAGE_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.default_page_size),
            full_page_size: std::env::var("RESULTS_FULL_PAGE_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.full_page_size),
            completion_display_ms: std::env::var("RESULTS_COMPLETION_DISPLAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.completion_display_ms),
            draft_storage_dir: std::env::var("RESULTS_DRAFT_DIR").unwrap_or(default.draft_storage_dir),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            remarks_required_for: default.remarks_required_for,
        }
    }

    /// 检查互相矛盾的取值
    pub fn validate(&self) -> AppResult<()> {
        if self.default_page_size == 0 {
            return Err(AppError::Config(ConfigError::InvalidValue {
                key: "default_page_size".to_string(),
                reason: "分页大小必须大于 0".to_string(),
            }));
        }
        if self.full_page_size < self.default_page_size {
            return Err(AppError::Config(ConfigError::InvalidValue {
                key: "full_page_size".to_string(),
                reason: format!(
                    "全量分页大小 {} 小于默认分页大小 {}",
                    self.full_page_size, self.default_page_size
                ),
            }));
        }
        Ok(())
    }
}
