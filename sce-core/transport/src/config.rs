//! 传输层配置
//!
//! `ProviderContext` 由宿主框架提供，`EndpointConfig` 从中一次性派生，
//! 在整个会话内保持不变。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::error::{Result, SceError};

/// 代理主机属性名
pub const PROXY_HOST_PROPERTY: &str = "proxyHost";
/// 代理端口属性名
pub const PROXY_PORT_PROPERTY: &str = "proxyPort";

/// 宿主框架传入的上下文
#[derive(Clone, Default)]
pub struct ProviderContext {
    /// 云平台访问端点
    pub endpoint: Option<String>,

    /// 账号
    pub account_number: String,

    /// 当前区域
    pub region_id: String,

    /// 公钥令牌 (作为 Basic 认证用户名)
    pub access_public: Option<Vec<u8>>,

    /// 私钥令牌 (作为 Basic 认证密码)
    pub access_private: Option<Vec<u8>>,

    /// 自定义属性
    pub custom_properties: HashMap<String, String>,
}

impl ProviderContext {
    pub fn new(endpoint: &str, account_number: &str, region_id: &str) -> Self {
        Self {
            endpoint: Some(endpoint.to_string()),
            account_number: account_number.to_string(),
            region_id: region_id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, public: &[u8], private: &[u8]) -> Self {
        self.access_public = Some(public.to_vec());
        self.access_private = Some(private.to_vec());
        self
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.custom_properties.insert(key.to_string(), value.to_string());
        self
    }
}

impl fmt::Debug for ProviderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderContext")
            .field("endpoint", &self.endpoint)
            .field("account_number", &self.account_number)
            .field("region_id", &self.region_id)
            .field("custom_properties", &self.custom_properties)
            .finish_non_exhaustive()
    }
}

/// HTTP 代理
///
/// 代理本身始终以 http 访问，https 端点通过 CONNECT 隧道转发。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// 访问端点配置
#[derive(Clone)]
pub struct EndpointConfig {
    base_url: Url,
    username: String,
    password: String,
    proxy: Option<ProxyConfig>,
}

impl EndpointConfig {
    /// 从宿主上下文派生端点配置，任何网络调用之前完成校验
    pub fn from_context(ctx: &ProviderContext) -> Result<Self> {
        let endpoint = ctx
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| SceError::Configuration("未配置云平台访问端点".to_string()))?;

        let base_url = normalize_endpoint(endpoint)?;

        let (public, private) = match (&ctx.access_public, &ctx.access_private) {
            (Some(public), Some(private)) => (public, private),
            _ => return Err(SceError::Configuration("缺少访问凭据".to_string())),
        };
        let username = String::from_utf8(public.clone())
            .map_err(|e| SceError::Internal(format!("访问凭据不是合法的 UTF-8: {}", e)))?;
        let password = String::from_utf8(private.clone())
            .map_err(|e| SceError::Internal(format!("访问凭据不是合法的 UTF-8: {}", e)))?;

        let proxy = proxy_from_properties(&ctx.custom_properties, base_url.scheme())?;

        Ok(Self {
            base_url,
            username,
            password,
            proxy,
        })
    }

    /// 以 `/` 结尾的基础 URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_ref()
    }

    /// 把相对路径拼接到基础 URL 上，路径开头的 `/` 会被去掉
    pub fn resolve(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| SceError::Configuration(format!("无效的资源路径 {}: {}", path, e)))
    }
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("password", &"***")
            .field("proxy", &self.proxy)
            .finish()
    }
}

fn normalize_endpoint(endpoint: &str) -> Result<Url> {
    let mut normalized = endpoint.to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized)
        .map_err(|e| SceError::Configuration(format!("无效的访问端点 {}: {}", endpoint, e)))
}

fn proxy_from_properties(
    properties: &HashMap<String, String>,
    endpoint_scheme: &str,
) -> Result<Option<ProxyConfig>> {
    let host = match properties.get(PROXY_HOST_PROPERTY).map(|h| h.trim()) {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => return Ok(None),
    };

    // 端点协议只决定缺省端口
    let default_port = if endpoint_scheme == "https" { 443 } else { 80 };

    let port = match properties.get(PROXY_PORT_PROPERTY).map(|p| p.trim()) {
        Some(p) if !p.is_empty() => p
            .parse::<u16>()
            .map_err(|_| SceError::Configuration(format!("无效的代理端口: {}", p)))?,
        _ => 0,
    };

    Ok(Some(ProxyConfig {
        host,
        port: if port == 0 { default_port } else { port },
    }))
}

/// 传输层配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// 连接超时（秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// 请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// 是否验证 SSL 证书
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,

    /// 是否输出请求/响应报文 (debug 级别)
    #[serde(default)]
    pub wire_log: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            verify_ssl: default_verify_ssl(),
            wire_log: false,
        }
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

// 默认值函数
fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    120
}

fn default_verify_ssl() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(endpoint: &str) -> ProviderContext {
        ProviderContext::new(endpoint, "20012345", "41").with_credentials(b"alice", b"s3cret")
    }

    #[test]
    fn test_endpoint_gets_trailing_slash() {
        let cfg = EndpointConfig::from_context(&context("https://sce.example.com/api/v1")).unwrap();
        assert_eq!(cfg.base_url().as_str(), "https://sce.example.com/api/v1/");

        let url = cfg.resolve("/instances/vm-1").unwrap();
        assert_eq!(url.as_str(), "https://sce.example.com/api/v1/instances/vm-1");
    }

    #[test]
    fn test_missing_endpoint_is_configuration_error() {
        let mut ctx = context("https://sce.example.com/");
        ctx.endpoint = None;
        let err = EndpointConfig::from_context(&ctx).unwrap_err();
        assert!(matches!(err, SceError::Configuration(_)));

        ctx.endpoint = Some("   ".to_string());
        assert!(matches!(
            EndpointConfig::from_context(&ctx),
            Err(SceError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_credentials() {
        let ctx = ProviderContext::new("https://sce.example.com/", "1", "41");
        assert!(matches!(
            EndpointConfig::from_context(&ctx),
            Err(SceError::Configuration(_))
        ));
    }

    #[test]
    fn test_credentials_must_be_utf8() {
        let ctx = ProviderContext::new("https://sce.example.com/", "1", "41")
            .with_credentials(&[0xff, 0xfe], b"pw");
        assert!(matches!(
            EndpointConfig::from_context(&ctx),
            Err(SceError::Internal(_))
        ));
    }

    #[test]
    fn test_proxy_default_ports() {
        let ctx = context("https://sce.example.com/").with_property(PROXY_HOST_PROPERTY, "proxy.local");
        let cfg = EndpointConfig::from_context(&ctx).unwrap();
        let proxy = cfg.proxy().unwrap();
        assert_eq!(proxy.port, 443);
        assert_eq!(proxy.url(), "http://proxy.local:443");

        let ctx = context("http://sce.example.com/")
            .with_property(PROXY_HOST_PROPERTY, "proxy.local")
            .with_property(PROXY_PORT_PROPERTY, "");
        let cfg = EndpointConfig::from_context(&ctx).unwrap();
        assert_eq!(cfg.proxy().unwrap().port, 80);

        let ctx = context("http://sce.example.com/")
            .with_property(PROXY_HOST_PROPERTY, "proxy.local")
            .with_property(PROXY_PORT_PROPERTY, "3128");
        let cfg = EndpointConfig::from_context(&ctx).unwrap();
        assert_eq!(cfg.proxy().unwrap().url(), "http://proxy.local:3128");
    }

    #[test]
    fn test_no_proxy_without_host() {
        let ctx = context("https://sce.example.com/").with_property(PROXY_PORT_PROPERTY, "8080");
        let cfg = EndpointConfig::from_context(&ctx).unwrap();
        assert!(cfg.proxy().is_none());
    }

    #[test]
    fn test_debug_hides_password() {
        let cfg = EndpointConfig::from_context(&context("https://sce.example.com/")).unwrap();
        let text = format!("{:?}", cfg);
        assert!(!text.contains("s3cret"));
    }
}
