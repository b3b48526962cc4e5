//! 静态 IP 地址 API
//!
//! 地址类型 (公网/私网) 不在地址记录中，需要通过 `OfferingID`
//! 与 `offerings/address` 中的规格对应，因此每次查询地址都会同时查询规格。

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use sce_transport::{Document, Element, Result, SceError};

use crate::api::ResourceSupport;
use crate::client::SceClient;
use crate::codes::is_discarded_address_state;
use crate::mapping::{text_of, MappingScope};
use crate::models::{AddressOffering, AddressType, IpAddress, ResourceStatus};
use crate::poller::PollError;

/// 申请/释放地址的等待上限
pub const ADDRESS_WAIT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

// 0 新建, 2 空闲；释放或失败 (4/5/7) 的地址在映射时被丢弃
const STATE_NEW: &str = "0";
const STATE_FREE: &str = "2";

/// 解析 `offerings/address`，`ipType` 为 1 表示私网
pub fn parse_address_offerings(doc: &Document) -> Vec<AddressOffering> {
    doc.elements_by_tag_name("Offerings")
        .into_iter()
        .filter_map(|node| {
            let id = node.child("ID").and_then(text_of)?;
            let ip_type = node.child("ipType").and_then(text_of)?;
            Some(AddressOffering {
                id,
                address_type: if ip_type == "1" {
                    AddressType::Private
                } else {
                    AddressType::Public
                },
            })
        })
        .collect()
}

/// 地址记录映射
///
/// 已释放/失败的地址、类型无法确定的地址以及其他区域的地址都会被丢弃。
pub fn to_address(
    node: &Element,
    scope: &MappingScope<'_>,
    offerings: &[AddressOffering],
) -> Option<IpAddress> {
    let mut id = None;
    let mut address = None;
    let mut server_id = None;
    let mut region_id = None;
    let mut address_type = None;
    let mut state_code = None;

    for child in node.child_elements() {
        let Some(value) = text_of(child) else {
            continue;
        };
        match child.name().to_ascii_lowercase().as_str() {
            "id" => id = Some(value),
            "ip" => address = Some(value),
            "instanceid" => server_id = Some(value),
            "location" => region_id = Some(value),
            "offeringid" => {
                address_type = offerings
                    .iter()
                    .find(|o| o.id == value)
                    .map(|o| o.address_type)
            }
            "state" => {
                if is_discarded_address_state(&value) {
                    return None;
                }
                state_code = Some(value);
            }
            _ => {}
        }
    }

    let id = id?;
    let address_type = address_type?;
    let region_id = region_id.filter(|r| r == scope.region_id)?;
    Some(IpAddress {
        id,
        address,
        address_type,
        region_id,
        server_id,
        state_code,
    })
}

/// 静态 IP 地址 API
pub struct IpAddressApi<'a> {
    client: &'a SceClient,
}

impl<'a> IpAddressApi<'a> {
    /// 创建新的静态 IP API 实例
    pub(crate) fn new(client: &'a SceClient) -> Self {
        Self { client }
    }

    /// 地址规格列表
    pub async fn list_offerings(&self) -> Result<Vec<AddressOffering>> {
        let doc = self.client.transport().get_xml("offerings/address").await?;
        Ok(doc
            .map(|doc| parse_address_offerings(&doc))
            .unwrap_or_default())
    }

    /// 当前区域的全部有效地址 (包括尚未分配到具体 IP 的)
    async fn list_all(&self) -> Result<Vec<IpAddress>> {
        let Some(doc) = self.client.transport().get_xml("addresses").await? else {
            return Ok(Vec::new());
        };
        let offerings = self.list_offerings().await?;
        let scope = self.client.scope();

        Ok(doc
            .elements_by_tag_name("Address")
            .into_iter()
            .filter_map(|node| to_address(node, &scope, &offerings))
            .collect())
    }

    /// 已分配 IP 的地址
    pub async fn list(&self) -> Result<Vec<IpAddress>> {
        info!("查询静态 IP 列表");
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|a| a.address.is_some())
            .collect())
    }

    /// 公网地址池，`unassigned_only` 时只返回空闲且未绑定的地址
    pub async fn list_public_pool(&self, unassigned_only: bool) -> Result<Vec<IpAddress>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|a| a.address_type == AddressType::Public)
            .filter(|a| !unassigned_only || (a.server_id.is_none() && a.is_available()))
            .collect())
    }

    /// 私网地址池
    pub async fn list_private_pool(&self, unassigned_only: bool) -> Result<Vec<IpAddress>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|a| a.address_type == AddressType::Private)
            .filter(|a| !unassigned_only || a.server_id.is_none())
            .collect())
    }

    /// 地址状态，`true` 表示空闲可用
    pub async fn list_status(&self) -> Result<Vec<ResourceStatus<bool>>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .map(|a| ResourceStatus {
                state: a.is_available(),
                id: a.id,
            })
            .collect())
    }

    /// 查询地址 (云平台没有单个地址的查询接口，只能在列表中匹配)
    pub async fn get(&self, address_id: &str) -> Result<Option<IpAddress>> {
        Ok(self.list().await?.into_iter().find(|a| a.id == address_id))
    }

    async fn lookup(&self, address_id: &str) -> Result<Option<IpAddress>> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .find(|a| a.id == address_id))
    }

    /// 申请地址，等待分配到具体 IP 后返回地址 ID
    pub async fn request(&self, address_type: AddressType) -> Result<String> {
        info!("申请静态 IP: {:?}", address_type);
        let offerings = self.list_offerings().await?;
        let offering = offerings
            .iter()
            .find(|o| o.address_type == address_type)
            .ok_or_else(|| SceError::cloud(format!("没有 {:?} 类型的地址规格", address_type)))?;

        let body = self
            .client
            .transport()
            .post(
                "addresses",
                &[
                    ("offeringID", offering.id.clone()),
                    ("location", self.client.region_id().to_string()),
                ],
            )
            .await?
            .ok_or_else(|| SceError::cloud("云平台接受了请求但没有返回地址信息"))?;
        let doc = self.client.transport().parse(&body)?;

        let scope = self.client.scope();
        let address = doc
            .elements_by_tag_name("Address")
            .into_iter()
            .find_map(|node| to_address(node, &scope, &offerings))
            .ok_or_else(|| SceError::cloud("响应中没有地址"))?;

        debug!("地址 {} 已创建，等待分配", address.id);
        self.client
            .poller(ADDRESS_WAIT_TIMEOUT)
            .poll_until(
                || self.lookup(&address.id),
                |ip| ip.state_code.as_deref() != Some(STATE_NEW) && ip.address.is_some(),
            )
            .await
            .map(|ip| ip.id)
            .map_err(|e| e.into_error(&format!("静态 IP {}", address.id)))
    }

    /// 释放地址
    ///
    /// 等待地址进入空闲状态后删除；已经释放或失败的地址查询不到，直接视为成功。
    pub async fn release(&self, address_id: &str) -> Result<()> {
        info!("释放静态 IP: {}", address_id);
        let settled = self
            .client
            .poller(ADDRESS_WAIT_TIMEOUT)
            .poll_until(
                || self.lookup(address_id),
                |ip| ip.state_code.as_deref() == Some(STATE_FREE),
            )
            .await;

        match settled {
            Ok(_) => {
                self.client
                    .transport()
                    .delete(&format!("addresses/{}", address_id))
                    .await
            }
            Err(PollError::Vanished) => {
                debug!("静态 IP {} 已不存在，无需释放", address_id);
                Ok(())
            }
            Err(e) => {
                warn!("释放静态 IP {} 失败", address_id);
                Err(e.into_error(&format!("静态 IP {}", address_id)))
            }
        }
    }

    pub async fn is_subscribed(&self) -> Result<bool> {
        self.client.vm().is_subscribed().await
    }

    pub async fn assign(&self, _address_id: &str, _server_id: &str) -> Result<()> {
        Err(SceError::unsupported("绑定静态 IP 到虚拟机"))
    }

    pub async fn assign_to_network_interface(&self, _address_id: &str, _nic_id: &str) -> Result<()> {
        Err(SceError::unsupported("绑定静态 IP 到网卡"))
    }

    pub async fn release_from_server(&self, _address_id: &str) -> Result<()> {
        Err(SceError::unsupported("从虚拟机解绑静态 IP"))
    }

    pub async fn forward(
        &self,
        _address_id: &str,
        _public_port: u16,
        _private_port: u16,
        _server_id: &str,
    ) -> Result<String> {
        Err(SceError::unsupported("端口转发"))
    }

    pub async fn stop_forward(&self, _rule_id: &str) -> Result<()> {
        Err(SceError::unsupported("端口转发"))
    }

    pub async fn request_for_vlan(&self, _vlan_id: &str) -> Result<String> {
        Err(SceError::unsupported("为 VLAN 申请地址"))
    }

    pub async fn request_ipv6(&self) -> Result<String> {
        Err(SceError::unsupported("IPv6 地址"))
    }
}

#[async_trait]
impl<'a> ResourceSupport for IpAddressApi<'a> {
    type Resource = IpAddress;

    fn resource_kind(&self) -> &'static str {
        "address"
    }

    async fn list(&self) -> Result<Vec<IpAddress>> {
        IpAddressApi::list(self).await
    }

    async fn get(&self, id: &str) -> Result<Option<IpAddress>> {
        IpAddressApi::get(self, id).await
    }
}
