//! VLAN API
//!
//! 云平台只提供预先分配的私有 VLAN，没有子网、路由表、网卡等概念。

use async_trait::async_trait;
use tracing::info;

use sce_transport::{Element, Result, SceError};

use crate::api::ResourceSupport;
use crate::client::SceClient;
use crate::mapping::{map_all, text_of, FromXmlNode, MappingScope};
use crate::models::{ResourceStatus, VirtualMachine, Vlan};

impl FromXmlNode for Vlan {
    const TAG: &'static str = "Vlan";

    fn from_node(node: &Element, scope: &MappingScope<'_>) -> Option<Self> {
        let id = node.child("ID").and_then(text_of)?;
        let region_id = node
            .child("Location")
            .and_then(text_of)
            .filter(|r| r == scope.region_id)?;
        let name = node.child("Name").and_then(text_of).unwrap_or_else(|| id.clone());

        Some(Vlan {
            description: format!("{} [#{}]", name, id),
            id,
            name,
            region_id,
        })
    }
}

/// VLAN API
pub struct VlanApi<'a> {
    client: &'a SceClient,
}

impl<'a> VlanApi<'a> {
    /// 创建新的 VLAN API 实例
    pub(crate) fn new(client: &'a SceClient) -> Self {
        Self { client }
    }

    /// 当前区域可用的 VLAN
    pub async fn list(&self) -> Result<Vec<Vlan>> {
        info!("查询 VLAN 列表");
        let doc = self.client.transport().get_xml("offerings/vlan").await?;
        Ok(doc
            .map(|doc| map_all(&doc, &self.client.scope()))
            .unwrap_or_default())
    }

    /// VLAN 状态，列出的 VLAN 总是可用
    pub async fn list_status(&self) -> Result<Vec<ResourceStatus<bool>>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .map(|v| ResourceStatus { id: v.id, state: true })
            .collect())
    }

    pub async fn get(&self, vlan_id: &str) -> Result<Option<Vlan>> {
        Ok(self.list().await?.into_iter().find(|v| v.id == vlan_id))
    }

    /// VLAN 中的虚拟机
    pub async fn list_resources(&self, vlan_id: &str) -> Result<Vec<VirtualMachine>> {
        Ok(self
            .client
            .vm()
            .list()
            .await?
            .into_iter()
            .filter(|vm| vm.vlan_id.as_deref() == Some(vlan_id))
            .collect())
    }

    pub async fn is_subscribed(&self) -> Result<bool> {
        self.client.vm().is_subscribed().await
    }

    pub async fn create(&self, _cidr: &str, _name: &str) -> Result<Vlan> {
        Err(SceError::unsupported("创建 VLAN"))
    }

    pub async fn remove(&self, _vlan_id: &str) -> Result<()> {
        Err(SceError::unsupported("删除 VLAN"))
    }

    pub async fn create_subnet(&self, _vlan_id: &str, _cidr: &str) -> Result<String> {
        Err(SceError::unsupported("子网"))
    }

    pub async fn remove_subnet(&self, _subnet_id: &str) -> Result<()> {
        Err(SceError::unsupported("子网"))
    }

    pub async fn create_routing_table(&self, _vlan_id: &str, _name: &str) -> Result<String> {
        Err(SceError::unsupported("路由表"))
    }

    pub async fn remove_routing_table(&self, _table_id: &str) -> Result<()> {
        Err(SceError::unsupported("路由表"))
    }

    pub async fn create_network_interface(&self, _vlan_id: &str) -> Result<String> {
        Err(SceError::unsupported("网卡管理"))
    }

    pub async fn remove_network_interface(&self, _nic_id: &str) -> Result<()> {
        Err(SceError::unsupported("网卡管理"))
    }

    pub async fn create_internet_gateway(&self, _vlan_id: &str) -> Result<String> {
        Err(SceError::unsupported("互联网网关"))
    }

    pub async fn remove_internet_gateway(&self, _vlan_id: &str) -> Result<()> {
        Err(SceError::unsupported("互联网网关"))
    }
}

#[async_trait]
impl<'a> ResourceSupport for VlanApi<'a> {
    type Resource = Vlan;

    fn resource_kind(&self) -> &'static str {
        "vlan"
    }

    async fn list(&self) -> Result<Vec<Vlan>> {
        VlanApi::list(self).await
    }

    async fn get(&self, id: &str) -> Result<Option<Vlan>> {
        VlanApi::get(self, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sce_transport::Document;

    #[test]
    fn test_vlan_mapping() {
        let doc = Document::parse(
            r#"<DescribeVlansResponse>
  <Vlan><ID>vlan-1</ID><Name>dev net</Name><Location>41</Location></Vlan>
  <Vlan><ID>vlan-2</ID><Location>41</Location></Vlan>
  <Vlan><ID>vlan-3</ID><Name>remote</Name><Location>82</Location></Vlan>
</DescribeVlansResponse>"#,
        )
        .unwrap();

        let vlans: Vec<Vlan> = map_all(
            &doc,
            &MappingScope {
                region_id: "41",
                account_number: "20012345",
            },
        );
        assert_eq!(vlans.len(), 2);
        assert_eq!(vlans[0].description, "dev net [#vlan-1]");
        assert_eq!(vlans[1].name, "vlan-2");
    }
}
