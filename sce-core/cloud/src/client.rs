//! SCE 客户端核心实现

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sce_transport::{ProviderContext, Result, SceTransport, TransportConfig};

use crate::api::{
    ImageApi, IpAddressApi, KeypairApi, RegionApi, VirtualMachineApi, VlanApi, VolumeApi,
};
use crate::catalog::ProductCatalog;
use crate::config::{PollConfig, SceConfig};
use crate::mapping::MappingScope;
use crate::poller::Poller;

/// SCE 客户端
///
/// 克隆代价很低，克隆出的客户端共享同一个 HTTP 连接池和产品目录缓存。
#[derive(Debug, Clone)]
pub struct SceClient {
    /// 传输层
    transport: SceTransport,

    /// 账号
    account_number: String,

    /// 当前区域
    region_id: String,

    /// 轮询间隔
    poll_interval: Duration,

    /// 实例规格目录 (只获取一次)
    catalog: Arc<OnceCell<ProductCatalog>>,

    /// 长时间等待的取消令牌
    cancel: Option<CancellationToken>,
}

impl SceClient {
    /// 创建新的 SCE 客户端，缺少端点或凭据时立即返回配置错误
    pub fn new(ctx: &ProviderContext, transport: TransportConfig, poll: PollConfig) -> Result<Self> {
        let transport = SceTransport::from_context(ctx, transport)?;
        info!(
            "创建 SCE 客户端: {} (账号 {}, 区域 {})",
            transport.endpoint().base_url(),
            ctx.account_number,
            ctx.region_id
        );

        Ok(Self {
            transport,
            account_number: ctx.account_number.clone(),
            region_id: ctx.region_id.clone(),
            poll_interval: poll.interval(),
            catalog: Arc::new(OnceCell::new()),
            cancel: None,
        })
    }

    /// 从配置创建
    pub fn from_config(config: &SceConfig) -> Result<Self> {
        Self::new(&config.context(), config.transport.clone(), config.poll.clone())
    }

    /// 返回一个带取消令牌的客户端，令牌取消后所有轮询立即结束
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
            ..self.clone()
        }
    }

    /// 覆盖轮询间隔
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// 获取区域 API
    pub fn region(&self) -> RegionApi<'_> {
        RegionApi::new(self)
    }

    /// 获取存储卷 API
    pub fn volume(&self) -> VolumeApi<'_> {
        VolumeApi::new(self)
    }

    /// 获取虚拟机 API
    pub fn vm(&self) -> VirtualMachineApi<'_> {
        VirtualMachineApi::new(self)
    }

    /// 获取镜像 API
    pub fn image(&self) -> ImageApi<'_> {
        ImageApi::new(self)
    }

    /// 获取静态 IP API
    pub fn ip_address(&self) -> IpAddressApi<'_> {
        IpAddressApi::new(self)
    }

    /// 获取 VLAN API
    pub fn vlan(&self) -> VlanApi<'_> {
        VlanApi::new(self)
    }

    /// 获取 SSH 密钥 API
    pub fn keypair(&self) -> KeypairApi<'_> {
        KeypairApi::new(self)
    }

    /// 校验上下文，凭据有效时返回账号
    pub async fn test_context(&self) -> Option<String> {
        self.region().test_context().await
    }

    pub fn transport(&self) -> &SceTransport {
        &self.transport
    }

    pub fn account_number(&self) -> &str {
        &self.account_number
    }

    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    pub(crate) fn scope(&self) -> MappingScope<'_> {
        MappingScope {
            region_id: &self.region_id,
            account_number: &self.account_number,
        }
    }

    /// 按配置的间隔和取消令牌构造轮询器
    pub(crate) fn poller(&self, timeout: Duration) -> Poller {
        Poller::new(timeout)
            .with_interval(self.poll_interval)
            .with_cancellation(self.cancel.clone())
    }

    pub(crate) fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    /// 实例规格目录，首次访问时从 `offerings/image` 获取
    ///
    /// 并发的首次访问只会触发一次请求；获取失败不会缓存，下次访问重试。
    pub async fn product_catalog(&self) -> Result<&ProductCatalog> {
        // Err(None) 表示云平台没有返回目录，此时不填充缓存
        let fetched = self
            .catalog
            .get_or_try_init(|| async {
                info!("获取实例规格目录");
                match self.transport.get_xml("offerings/image").await {
                    Ok(Some(doc)) => Ok(ProductCatalog::from_document(&doc)),
                    Ok(None) => Err(None),
                    Err(e) => Err(Some(e)),
                }
            })
            .await;

        match fetched {
            Ok(catalog) => Ok(catalog),
            Err(Some(e)) => Err(e),
            Err(None) => {
                warn!("云平台未返回任何镜像规格，下次访问重试");
                Ok(ProductCatalog::empty())
            }
        }
    }
}
