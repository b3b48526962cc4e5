//! SCE 错误定义

use std::time::Duration;
use thiserror::Error;

/// 错误响应没有正文时使用的说明
pub const NO_EXPLANATION: &str = "云平台返回了错误但未提供说明";

/// SCE 适配器错误类型
#[derive(Error, Debug)]
pub enum SceError {
    /// 缺少上下文、访问端点或凭据
    #[error("配置错误: {0}")]
    Configuration(String),

    /// 网络连接或读取失败
    #[error("网络传输错误: {0}")]
    Transport(String),

    /// 收到了格式正确但状态码不符合预期的 HTTP 响应
    #[error("协议错误 [{status} {reason}]: {body}")]
    Protocol {
        status: u16,
        reason: String,
        body: String,
    },

    /// 本地 XML 解析或编码失败
    #[error("内部错误: {0}")]
    Internal(String),

    #[error("{resource} 等待超时 (上限 {}s)", .waited.as_secs())]
    PollTimeout { resource: String, waited: Duration },

    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 云平台语义层面的失败，例如资源已挂载、没有可用规格
    #[error("云平台错误: {0}")]
    Cloud(String),

    #[error("操作已取消: {0}")]
    Cancelled(String),
}

impl SceError {
    pub fn unsupported(capability: impl Into<String>) -> Self {
        SceError::Unsupported(capability.into())
    }

    pub fn cloud(message: impl Into<String>) -> Self {
        SceError::Cloud(message.into())
    }

    /// HTTP 状态码 (仅协议错误)
    pub fn status(&self) -> Option<u16> {
        match self {
            SceError::Protocol { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 该云平台对非法 ID 的单资源查询返回 500 而不是 404
    pub fn is_not_found_quirk(&self) -> bool {
        self.status() == Some(500)
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}

/// SCE 结果类型
pub type Result<T> = std::result::Result<T, SceError>;
