//! SCE 资源适配层
//!
//! 在传输层之上把云平台的 XML 资源翻译为强类型实体，并提供长耗时操作
//! 所需的状态轮询。
//!
//! # 功能
//!
//! - **区域管理** (`RegionApi`): 区域、数据中心、上下文校验
//! - **存储卷管理** (`VolumeApi`): 创建、挂载、卸载、删除，存储规格选择
//! - **虚拟机管理** (`VirtualMachineApi`): 创建、克隆、删除、重启，实例规格目录
//! - **镜像管理** (`ImageApi`): 查询、搜索、捕获 (同步/异步)、删除
//! - **静态 IP 管理** (`IpAddressApi`): 地址池、申请、释放
//! - **VLAN 管理** (`VlanApi`)
//! - **SSH 密钥管理** (`KeypairApi`)
//!
//! # 示例
//!
//! ```ignore
//! use sce_cloud::{SceClient, SceConfig, VolumeCreateOptions};
//!
//! let config = SceConfig::load()?;
//! let client = SceClient::from_config(&config)?;
//!
//! // 按容量创建存储卷，自动选择最合适的规格
//! let volume_id = client
//!     .volume()
//!     .create(&VolumeCreateOptions {
//!         name: "data".into(),
//!         size_gb: 20,
//!         ..Default::default()
//!     })
//!     .await?;
//!
//! // 挂载到虚拟机 (等待存储卷就绪)
//! client.volume().attach(&volume_id, "vm-123", "/dev/sdf").await?;
//! ```

pub mod api;
pub mod capture;
pub mod catalog;
pub mod client;
pub mod codes;
pub mod config;
pub mod mapping;
pub mod models;
pub mod password;
pub mod poller;

pub use api::{
    ImageApi, IpAddressApi, KeypairApi, RegionApi, ResourceSupport, VirtualMachineApi, VlanApi,
    VolumeApi,
};
pub use capture::ImageCaptureTask;
pub use catalog::{parse_product_shape, ProductCatalog, ProductShape};
pub use client::SceClient;
pub use config::{AccountConfig, PollConfig, SceConfig};
pub use models::*;
pub use poller::{PollError, Poller, DEFAULT_POLL_INTERVAL};

pub use sce_transport::{ProviderContext, Result, SceError, TransportConfig};
