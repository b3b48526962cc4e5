//! 公共工具函数模块
//!
//! 提供各命令模块共享的功能，包括：
//! - 加载配置并创建 SCE 客户端
//! - Ctrl-C 取消正在进行的等待
//! - 基于 `ResourceSupport` 的通用列表/详情输出
//! - 架构、平台参数解析

use std::path::Path;

use anyhow::{bail, Context as _, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sce_cloud::{Architecture, Platform, ResourceSupport, SceClient, SceConfig};

use crate::commands::output::{output_list, output_one, Format, TableRow};

/// 命令执行上下文
pub struct Context {
    pub client: SceClient,
    pub format: Format,
}

impl Context {
    /// 加载配置并创建客户端
    ///
    /// 收到 Ctrl-C 时取消客户端上所有正在进行的轮询。
    pub fn load(config_path: Option<&str>, format: &str) -> Result<Self> {
        let format = Format::parse(format)?;
        let config = SceConfig::load_from(config_path.map(Path::new)).context("加载配置失败")?;

        let token = CancellationToken::new();
        let on_signal = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("收到中断信号，取消等待");
                on_signal.cancel();
            }
        });

        let client = SceClient::from_config(&config)
            .context("创建 SCE 客户端失败")?
            .with_cancellation(token);
        info!(
            "账号 {}，区域 {}",
            client.account_number(),
            client.region_id()
        );

        Ok(Self { client, format })
    }
}

/// 列出任意资源
pub async fn list_resources<A>(ctx: &Context, api: &A) -> Result<()>
where
    A: ResourceSupport + Sync,
    A::Resource: TableRow + Serialize,
{
    let items = api
        .list()
        .await
        .with_context(|| format!("查询 {} 列表失败", api.resource_kind()))?;
    output_list(&items, ctx.format)
}

/// 按 ID 显示任意资源
pub async fn show_resource<A>(ctx: &Context, api: &A, id: &str) -> Result<()>
where
    A: ResourceSupport + Sync,
    A::Resource: TableRow + Serialize,
{
    match api
        .get(id)
        .await
        .with_context(|| format!("查询 {} 失败: {}", api.resource_kind(), id))?
    {
        Some(item) => output_one(&item, ctx.format),
        None => bail!("{} 不存在: {}", api.resource_kind(), id),
    }
}

pub fn parse_architecture(value: &str) -> Result<Architecture> {
    match value.to_lowercase().as_str() {
        "i32" | "i386" | "32" => Ok(Architecture::I32),
        "i64" | "x86_64" | "64" => Ok(Architecture::I64),
        other => bail!("不支持的架构: {} (可选 i32/i64)", other),
    }
}

pub fn parse_platform(value: &str) -> Result<Platform> {
    let platform = match value.to_lowercase().as_str() {
        "unix" | "linux" => Platform::Unix,
        "windows" => Platform::Windows,
        "redhat" | "rhel" => Platform::RedHat,
        "suse" => Platform::Suse,
        "centos" => Platform::CentOs,
        "ubuntu" => Platform::Ubuntu,
        "debian" => Platform::Debian,
        other => bail!("不支持的平台: {}", other),
    };
    Ok(platform)
}
