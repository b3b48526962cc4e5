//! SCE 适配器配置
//!
//! 支持从多个源加载配置:
//! - 环境变量 (优先级最高)
//! - 配置文件 (TOML)
//! - 默认值 (优先级最低)
//!
//! 配置文件搜索路径 (按优先级):
//! 1. `SCE_CONFIG` 环境变量指定的路径
//! 2. `./sce.toml` (当前目录)
//! 3. `~/.config/sce/config.toml` (用户配置目录)
//! 4. `/etc/sce/config.toml` (系统配置目录)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sce_transport::config::{PROXY_HOST_PROPERTY, PROXY_PORT_PROPERTY};
use sce_transport::{ProviderContext, TransportConfig};

use crate::poller::DEFAULT_POLL_INTERVAL;

/// 配置 (顶层)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceConfig {
    /// 账号与访问端点
    #[serde(default)]
    pub account: AccountConfig,

    /// 传输层配置
    #[serde(default)]
    pub transport: TransportConfig,

    /// 轮询配置
    #[serde(default)]
    pub poll: PollConfig,
}

/// 账号配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    /// 访问端点
    pub endpoint: Option<String>,

    /// 账号
    #[serde(default)]
    pub account_number: String,

    /// 区域
    #[serde(default)]
    pub region_id: String,

    /// 访问用户名 (公钥令牌)
    pub access_public: Option<String>,

    /// 访问密码 (私钥令牌)
    pub access_private: Option<String>,

    /// 代理主机
    pub proxy_host: Option<String>,

    /// 代理端口
    pub proxy_port: Option<u16>,

    /// 其他自定义属性
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

/// 轮询配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// 轮询间隔 (秒)
    #[serde(default = "default_poll_interval")]
    pub interval: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

impl AccountConfig {
    /// 转换为宿主上下文，凭据按 UTF-8 字节传递
    pub fn to_context(&self) -> ProviderContext {
        let mut custom_properties = self.properties.clone();
        if let Some(host) = &self.proxy_host {
            custom_properties.insert(PROXY_HOST_PROPERTY.to_string(), host.clone());
        }
        if let Some(port) = self.proxy_port {
            custom_properties.insert(PROXY_PORT_PROPERTY.to_string(), port.to_string());
        }

        ProviderContext {
            endpoint: self.endpoint.clone(),
            account_number: self.account_number.clone(),
            region_id: self.region_id.clone(),
            access_public: self.access_public.as_ref().map(|s| s.as_bytes().to_vec()),
            access_private: self.access_private.as_ref().map(|s| s.as_bytes().to_vec()),
            custom_properties,
        }
    }
}

// ============================================
// 配置加载实现
// ============================================

impl SceConfig {
    /// 从多个源加载配置 (优先级: 环境变量 > 配置文件 > 默认值)
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// 指定配置文件时跳过搜索路径，环境变量仍然生效
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::find_config_file);
        let mut config = match path {
            Some(path) => {
                tracing::debug!("加载配置文件: {:?}", path);
                Self::load_from_file(&path)?
            }
            None => {
                tracing::debug!("未找到配置文件，使用默认配置");
                Self::default()
            }
        };

        config.apply_env_vars()?;
        Ok(config)
    }

    /// 从指定文件加载配置
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("解析配置文件失败: {:?}", path))
    }

    /// 查找配置文件 (按优先级搜索)
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = env::var("SCE_CONFIG") {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
        }

        let mut candidates = vec![PathBuf::from("./sce.toml")];
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".config/sce/config.toml"));
        }
        #[cfg(target_os = "linux")]
        candidates.push(PathBuf::from("/etc/sce/config.toml"));

        candidates.into_iter().find(|p| p.exists())
    }

    /// 从环境变量覆盖配置
    fn apply_env_vars(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let account = &mut self.account;

        if let Some(endpoint) = lookup("SCE_ENDPOINT") {
            account.endpoint = Some(endpoint);
        }
        if let Some(number) = lookup("SCE_ACCOUNT") {
            account.account_number = number;
        }
        if let Some(region) = lookup("SCE_REGION") {
            account.region_id = region;
        }
        if let Some(public) = lookup("SCE_ACCESS_PUBLIC") {
            account.access_public = Some(public);
        }
        if let Some(private) = lookup("SCE_ACCESS_PRIVATE") {
            account.access_private = Some(private);
        }
        if let Some(host) = lookup("SCE_PROXY_HOST") {
            account.proxy_host = Some(host);
        }
        if let Some(port) = lookup("SCE_PROXY_PORT") {
            account.proxy_port = Some(port.parse().context("SCE_PROXY_PORT 无效")?);
        }
        if let Some(interval) = lookup("SCE_POLL_INTERVAL") {
            self.poll.interval = interval.parse().context("SCE_POLL_INTERVAL 无效")?;
        }

        Ok(())
    }

    /// 宿主上下文
    pub fn context(&self) -> ProviderContext {
        self.account.to_context()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SceConfig::default();
        assert_eq!(config.poll.interval, 15);
        assert!(config.account.endpoint.is_none());
        assert!(config.transport.verify_ssl);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[account]
endpoint = "https://www-147.ibm.com/computecloud/enterprise/api/rest/20100331"
account_number = "20012345"
region_id = "41"
access_public = "user@example.com"
access_private = "secret"
proxy_host = "proxy.local"

[poll]
interval = 5
"#
        )
        .unwrap();

        let config = SceConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.account.region_id, "41");
        assert_eq!(config.poll.interval(), Duration::from_secs(5));
        assert_eq!(config.transport.connect_timeout, 10);

        let ctx = config.context();
        assert_eq!(ctx.access_public.as_deref(), Some("user@example.com".as_bytes()));
        assert_eq!(
            ctx.custom_properties.get(PROXY_HOST_PROPERTY).map(String::as_str),
            Some("proxy.local")
        );
        assert!(!ctx.custom_properties.contains_key(PROXY_PORT_PROPERTY));
    }

    #[test]
    fn test_invalid_file_is_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[poll]\ninterval = \"soon\"").unwrap();
        assert!(SceConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SCE_ENDPOINT", "http://localhost:8080/api"),
            ("SCE_REGION", "82"),
            ("SCE_ACCESS_PUBLIC", "alice"),
            ("SCE_PROXY_PORT", "3128"),
            ("SCE_POLL_INTERVAL", "1"),
        ]
        .into_iter()
        .collect();

        let mut config = SceConfig::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.account.endpoint.as_deref(), Some("http://localhost:8080/api"));
        assert_eq!(config.account.region_id, "82");
        assert_eq!(config.account.access_public.as_deref(), Some("alice"));
        assert_eq!(config.account.proxy_port, Some(3128));
        assert_eq!(config.poll.interval, 1);
    }

    #[test]
    fn test_invalid_override() {
        let mut config = SceConfig::default();
        let result = config.apply_overrides(|k| (k == "SCE_PROXY_PORT").then(|| "abc".to_string()));
        assert!(result.is_err());
    }
}
