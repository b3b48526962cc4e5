//! SCE 资源 API 模块
//!
//! 每类资源一个独立的 API，彼此之间除共享的客户端外没有状态：
//! - 区域/数据中心 (RegionApi)
//! - 存储卷 (VolumeApi)
//! - 虚拟机 (VirtualMachineApi)
//! - 镜像 (ImageApi)
//! - 静态 IP (IpAddressApi)
//! - VLAN (VlanApi)
//! - SSH 密钥 (KeypairApi)

use async_trait::async_trait;

use sce_transport::Result;

pub mod address;
pub mod image;
pub mod keypair;
pub mod region;
pub mod vlan;
pub mod vm;
pub mod volume;

pub use address::IpAddressApi;
pub use image::ImageApi;
pub use keypair::KeypairApi;
pub use region::RegionApi;
pub use vlan::VlanApi;
pub use vm::VirtualMachineApi;
pub use volume::VolumeApi;

/// 所有资源共有的查询接口
#[async_trait]
pub trait ResourceSupport {
    type Resource: Send;

    /// 资源类别名称 (用于日志和输出)
    fn resource_kind(&self) -> &'static str;

    /// 当前区域内的全部资源
    async fn list(&self) -> Result<Vec<Self::Resource>>;

    /// 按 ID 查询，不存在时返回 `None`
    async fn get(&self, id: &str) -> Result<Option<Self::Resource>>;
}
