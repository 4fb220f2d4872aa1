use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 草稿存储错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// 客户端校验错误（不会发出网络请求）
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),
    /// 业务逻辑错误
    #[error("业务错误: {0}")]
    Business(#[from] BusinessError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: BoxedSource,
    },
    /// API 返回错误响应，message 原样透传给用户
    #[error("API返回错误响应 ({endpoint}): status={status}, message={message}")]
    BadResponse {
        endpoint: String,
        status: u16,
        message: String,
    },
    /// JSON 解析失败
    #[error("JSON解析失败: {source}")]
    JsonParseFailed {
        #[source]
        source: BoxedSource,
    },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: BoxedSource,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: BoxedSource,
    },
}

/// 草稿存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 写入草稿失败
    #[error("写入草稿失败 (key: {key}): {source}")]
    WriteFailed {
        key: String,
        #[source]
        source: BoxedSource,
    },
    /// 删除草稿失败
    #[error("删除草稿失败 (key: {key}): {source}")]
    ClearFailed {
        key: String,
        #[source]
        source: BoxedSource,
    },
    /// 读取草稿失败
    #[error("读取草稿失败 (key: {key}): {source}")]
    ReadFailed {
        key: String,
        #[source]
        source: BoxedSource,
    },
}

/// 客户端校验错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// 缺少必填备注
    #[error("以下学生缺少必填备注: {}", .student_ids.join(", "))]
    MissingRemarks { student_ids: Vec<String> },
    /// 没有可提交的决定（全部为待定）
    #[error("没有可提交的决定，共 {total} 名学生均为待定")]
    NothingToSubmit { total: usize },
    /// 学生不在当前名单中
    #[error("学生 {student_id} 不在当前名单中")]
    UnknownStudent { student_id: String },
    /// 该状态只能由服务端产生
    #[error("状态 {status} 不能手动设置")]
    StatusNotEditable { status: String },
}

/// 业务逻辑错误
#[derive(Debug, Error)]
pub enum BusinessError {
    /// 同一班级/周期已有计算在进行
    #[error("计算正在进行中: {key}")]
    CalculationInProgress { key: String },
    /// 计算对话框正在运行，不能关闭
    #[error("计算正在进行中，不能关闭进度对话框: {key}")]
    DismissWhileRunning { key: String },
    /// 只有失败状态可以重试
    #[error("当前状态不可重试: {key}")]
    RetryNotAllowed { key: String },
    /// 同一控件已有请求在进行
    #[error("请求正在进行中: {control}")]
    RequestInFlight { control: String },
    /// 升级决定会话未打开
    #[error("升级决定会话未打开")]
    SessionNotOpen,
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置值不合法
    #[error("配置项 {key} 不合法: {reason}")]
    InvalidValue { key: String, reason: String },
}

// ========== 从常见错误类型转换 ==========

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map(|u| u.path().to_string())
            .unwrap_or_default();
        AppError::Api(ApiError::RequestFailed {
            endpoint,
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建服务端错误响应
    pub fn bad_response(endpoint: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        AppError::Api(ApiError::BadResponse {
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 面向用户的提示文本
    ///
    /// 服务端返回的 message 原样透传，其余错误使用完整描述
    pub fn user_message(&self) -> String {
        match self {
            AppError::Api(ApiError::BadResponse { message, .. }) => message.clone(),
            other => other.to_string(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
