//! 草稿存储 - 基础设施层
//!
//! 字符串键 → JSON 字符串，无过期时间。只负责存取，不校验内容形状。

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::debug;

use crate::error::{AppResult, StorageError};

/// 升级决定草稿的存储键
pub fn draft_key(class_id: &str, year_id: &str) -> String {
    format!("promotionDecisions_{}_{}", class_id, year_id)
}

/// 草稿仓库
pub trait DraftRepository: Send + Sync {
    fn get(&self, key: &str) -> AppResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> AppResult<()>;
    fn clear(&self, key: &str) -> AppResult<()>;
}

/// 内存仓库，同时记录写入次数
#[derive(Default)]
pub struct InMemoryDraftRepository {
    entries: Mutex<HashMap<String, String>>,
    writes: Mutex<usize>,
}

impl InMemoryDraftRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// set 被调用的次数
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 直接放入原始值，不计入写入次数
    pub fn seed(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }
}

impl DraftRepository for InMemoryDraftRepository {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        *self.writes.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }

    fn clear(&self, key: &str) -> AppResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}

/// 文件仓库：每个键一个 `{key}.json` 文件
pub struct FileDraftRepository {
    dir: PathBuf,
}

impl FileDraftRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

impl DraftRepository for FileDraftRepository {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| StorageError::ReadFailed {
            key: key.to_string(),
            source: Box::new(e),
        })?;
        Ok(Some(content))
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let path = self.path_for(key);
        let write = || -> std::io::Result<()> {
            fs::create_dir_all(&self.dir)?;
            // 先写临时文件再改名，避免中途崩溃留下半个草稿
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, value)?;
            fs::rename(&tmp, &path)
        };
        write().map_err(|e| StorageError::WriteFailed {
            key: key.to_string(),
            source: Box::new(e),
        })?;
        debug!("草稿已写入: {}", path.display());
        Ok(())
    }

    fn clear(&self, key: &str) -> AppResult<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| StorageError::ClearFailed {
                key: key.to_string(),
                source: Box::new(e),
            })?;
        }
        Ok(())
    }
}
