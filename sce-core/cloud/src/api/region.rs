//! 区域与数据中心 API

use async_trait::async_trait;
use tracing::{debug, info, warn};

use sce_transport::{Element, Result};

use crate::api::ResourceSupport;
use crate::client::SceClient;
use crate::codes::jurisdiction_for;
use crate::mapping::{map_all, map_first, text_of, FromXmlNode, MappingScope};
use crate::models::{DataCenter, Region};

impl FromXmlNode for Region {
    const TAG: &'static str = "Location";

    // 区域列表本身跨区域，不做区域过滤
    fn from_node(node: &Element, _scope: &MappingScope<'_>) -> Option<Self> {
        let mut id = None;
        let mut name = None;
        let mut storage = false;
        let mut compute = false;

        for child in node.child_elements() {
            if child.is("ID") {
                id = text_of(child);
            } else if child.is("Name") {
                name = text_of(child);
            } else if child.is("Capabilities") {
                for capability in child.child_elements().filter(|c| c.is("Capability")) {
                    match capability.attribute("id") {
                        Some(cap) if cap.starts_with("oss.storage") => storage = true,
                        Some(cap) if cap.starts_with("oss.instance.spec") => compute = true,
                        _ => {}
                    }
                }
            }
        }

        let id = id?;
        let name = name.unwrap_or_else(|| id.clone());
        Some(Region {
            jurisdiction: jurisdiction_for(&name).to_string(),
            id,
            name,
            storage,
            compute,
        })
    }
}

/// 区域 API
pub struct RegionApi<'a> {
    client: &'a SceClient,
}

impl<'a> RegionApi<'a> {
    /// 创建新的区域 API 实例
    pub(crate) fn new(client: &'a SceClient) -> Self {
        Self { client }
    }

    /// 查询全部区域
    pub async fn list(&self) -> Result<Vec<Region>> {
        info!("查询区域列表");
        let doc = self.client.transport().get_xml("locations").await?;
        Ok(doc
            .map(|doc| map_all(&doc, &self.client.scope()))
            .unwrap_or_default())
    }

    /// 查询区域详情
    ///
    /// 该云平台对不存在的区域 ID 返回 500，此时退回到列表匹配。
    pub async fn get(&self, region_id: &str) -> Result<Option<Region>> {
        info!("查询区域详情: {}", region_id);
        match self
            .client
            .transport()
            .get_xml(&format!("locations/{}", region_id))
            .await
        {
            Ok(doc) => Ok(doc.and_then(|doc| map_first(&doc, &self.client.scope()))),
            Err(e) if e.is_not_found_quirk() => {
                debug!("区域 {} 查询返回 500，改为列表匹配", region_id);
                Ok(self.list().await?.into_iter().find(|r| r.id == region_id))
            }
            Err(e) => Err(e),
        }
    }

    /// 区域下的数据中心 (与区域一一对应)
    pub async fn list_data_centers(&self, region_id: &str) -> Result<Vec<DataCenter>> {
        info!("查询数据中心列表: {}", region_id);
        Ok(self
            .get(region_id)
            .await?
            .map(to_data_center)
            .into_iter()
            .collect())
    }

    pub async fn get_data_center(&self, data_center_id: &str) -> Result<Option<DataCenter>> {
        Ok(self.get(data_center_id).await?.map(to_data_center))
    }

    /// 当前配置的区域
    pub async fn current(&self) -> Result<Option<Region>> {
        self.get(self.client.region_id()).await
    }

    /// 校验上下文：能读取区域列表时返回账号，否则返回 `None`
    pub async fn test_context(&self) -> Option<String> {
        match self.client.transport().get_xml("locations").await {
            Ok(Some(_)) => {
                debug!("账号有效: {}", self.client.account_number());
                Some(self.client.account_number().to_string())
            }
            Ok(None) => {
                warn!("上下文校验失败，账号无效: {}", self.client.account_number());
                None
            }
            Err(e) => {
                warn!("上下文校验失败: {}", e);
                None
            }
        }
    }
}

fn to_data_center(region: Region) -> DataCenter {
    DataCenter {
        id: region.id.clone(),
        name: region.name,
        region_id: region.id,
    }
}

#[async_trait]
impl<'a> ResourceSupport for RegionApi<'a> {
    type Resource = Region;

    fn resource_kind(&self) -> &'static str {
        "region"
    }

    async fn list(&self) -> Result<Vec<Region>> {
        RegionApi::list(self).await
    }

    async fn get(&self, id: &str) -> Result<Option<Region>> {
        RegionApi::get(self, id).await
    }
}
