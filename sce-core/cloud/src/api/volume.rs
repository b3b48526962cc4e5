//! 存储卷 API
//!
//! 提供存储卷管理功能，包括：
//! - 存储卷查询、创建 (按规格/容量/克隆)、删除
//! - 挂载与卸载
//! - 存储规格选择

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use sce_transport::{Document, Element, Result, SceError};

use crate::api::ResourceSupport;
use crate::client::SceClient;
use crate::codes::decode_volume_state;
use crate::mapping::{map_all, map_first, parse_timestamp, text_of, FromXmlNode, MappingScope};
use crate::models::{
    OfferingSelection, Platform, ResourceStatus, StorageOffering, Volume, VolumeCreateOptions,
    VolumeProduct, VolumeState,
};
use crate::poller::PollError;

/// 挂载/卸载/删除前等待状态稳定的上限
pub const VOLUME_WAIT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

pub const MAX_VOLUME_SIZE_GB: u64 = 5000;
pub const MIN_VOLUME_SIZE_GB: u64 = 1;

// 状态码: 4 空闲, 5 已挂载, 6 已删除
const STATE_DETACHED: &str = "4";
const STATE_ATTACHED: &str = "5";
const STATE_DELETED: &str = "6";

const RAW_FORMAT: &str = "RAW";

impl FromXmlNode for Volume {
    const TAG: &'static str = "Volume";

    fn from_node(node: &Element, scope: &MappingScope<'_>) -> Option<Self> {
        let mut id = None;
        let mut name = None;
        let mut description = None;
        let mut region_id = None;
        let mut size_gb = 0;
        let mut state = VolumeState::Pending;
        let mut state_code = None;
        let mut created = None;
        let mut vm_id = None;

        for child in node.child_elements() {
            let Some(value) = text_of(child) else {
                continue;
            };
            match child.name().to_ascii_lowercase().as_str() {
                "id" => id = Some(value),
                "name" => name = Some(value),
                "description" => description = Some(value),
                "location" => region_id = Some(value),
                "size" => {
                    size_gb = value.parse().unwrap_or_else(|_| {
                        warn!("无效的存储卷容量: {}", value);
                        0
                    })
                }
                "state" => {
                    state = decode_volume_state(&value);
                    state_code = Some(value);
                }
                "createdtime" => created = parse_timestamp(&value),
                "instanceid" => vm_id = Some(value),
                _ => {}
            }
        }

        let id = id?;
        let region_id = region_id.filter(|r| r == scope.region_id)?;
        Some(Volume {
            name: name.unwrap_or_else(|| id.clone()),
            id,
            description,
            region_id,
            size_gb,
            state,
            state_code,
            created,
            vm_id,
        })
    }
}

fn state_is(volume: &Volume, codes: &[&str]) -> bool {
    volume
        .state_code
        .as_deref()
        .map(|c| codes.contains(&c))
        .unwrap_or(false)
}

/// 解析 `offerings/storage` 中的全部规格
pub fn parse_storage_offerings(doc: &Document) -> Vec<StorageOffering> {
    doc.elements_by_tag_name("Offerings")
        .into_iter()
        .filter_map(to_storage_offering)
        .collect()
}

fn to_storage_offering(node: &Element) -> Option<StorageOffering> {
    let mut id = None;
    let mut sizes = Vec::new();
    let mut formats = Vec::new();

    for child in node.child_elements() {
        if child.is("ID") {
            id = text_of(child);
        } else if child.is("SupportedSizes") {
            if let Some(list) = text_of(child) {
                for size in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                    match size.parse::<u64>() {
                        Ok(size) => sizes.push(size),
                        Err(_) => warn!("无效的存储规格容量: {}", size),
                    }
                }
            }
        } else if child.is("SupportedFormats") {
            for format in child.child_elements().filter(|f| f.is("Format")) {
                if let Some(format_id) = format.child_text("ID").filter(|f| !f.is_empty()) {
                    formats.push(format_id.to_string());
                }
            }
        }
    }

    Some(StorageOffering {
        id: id?,
        sizes,
        formats,
    })
}

/// 按容量选择规格
///
/// 只考虑支持 RAW 格式的规格；取不小于请求容量的最小尺寸，
/// 没有时取小于请求容量的最大尺寸。
pub fn select_offering(offerings: &[StorageOffering], size_gb: u64) -> Option<OfferingSelection> {
    let candidates = offerings
        .iter()
        .filter(|o| o.is_raw())
        .flat_map(|o| o.sizes.iter().map(move |s| (o, *s)));

    let mut at_least: Option<(&StorageOffering, u64)> = None;
    let mut below: Option<(&StorageOffering, u64)> = None;

    for (offering, size) in candidates {
        if size >= size_gb {
            if at_least.map(|(_, best)| size < best).unwrap_or(true) {
                at_least = Some((offering, size));
            }
        } else if below.map(|(_, best)| size > best).unwrap_or(true) {
            below = Some((offering, size));
        }
    }

    at_least.or(below).map(|(offering, size)| OfferingSelection {
        offering_id: offering.id.clone(),
        size_gb: size,
        format: RAW_FORMAT.to_string(),
    })
}

/// 按规格 ID 查找，不限格式，容量取首个支持的大小
pub fn find_offering_by_product(
    offerings: &[StorageOffering],
    product_id: &str,
) -> Option<OfferingSelection> {
    offerings
        .iter()
        .find(|o| o.id == product_id)
        .and_then(|o| {
            o.sizes.first().map(|size| OfferingSelection {
                offering_id: o.id.clone(),
                size_gb: *size,
                format: RAW_FORMAT.to_string(),
            })
        })
}

/// 存储卷 API
pub struct VolumeApi<'a> {
    client: &'a SceClient,
}

impl<'a> VolumeApi<'a> {
    /// 创建新的存储卷 API 实例
    pub(crate) fn new(client: &'a SceClient) -> Self {
        Self { client }
    }

    /// 查询当前区域的全部存储卷
    pub async fn list(&self) -> Result<Vec<Volume>> {
        info!("查询存储卷列表");
        let doc = self.client.transport().get_xml("storage").await?;
        Ok(doc
            .map(|doc| map_all(&doc, &self.client.scope()))
            .unwrap_or_default())
    }

    /// 查询存储卷状态
    pub async fn list_status(&self) -> Result<Vec<ResourceStatus<VolumeState>>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .map(|v| ResourceStatus {
                id: v.id,
                state: v.state,
            })
            .collect())
    }

    /// 查询存储卷详情，非法 ID 返回 500 时退回到列表匹配
    pub async fn get(&self, volume_id: &str) -> Result<Option<Volume>> {
        debug!("查询存储卷详情: {}", volume_id);
        match self
            .client
            .transport()
            .get_xml(&format!("storage/{}", volume_id))
            .await
        {
            Ok(doc) => Ok(doc.and_then(|doc| map_first(&doc, &self.client.scope()))),
            Err(e) if e.is_not_found_quirk() => {
                debug!("存储卷 {} 查询返回 500，改为列表匹配", volume_id);
                Ok(self.list().await?.into_iter().find(|v| v.id == volume_id))
            }
            Err(e) => Err(e),
        }
    }

    /// 存储规格列表
    pub async fn list_offerings(&self) -> Result<Vec<StorageOffering>> {
        info!("查询存储规格");
        match self.client.transport().get_xml("offerings/storage").await? {
            Some(doc) => Ok(parse_storage_offerings(&doc)),
            None => Err(SceError::cloud("没有可用的存储规格")),
        }
    }

    /// 存储卷产品列表 (仅 RAW 规格)
    pub async fn list_products(&self) -> Result<Vec<VolumeProduct>> {
        Ok(self
            .list_offerings()
            .await?
            .into_iter()
            .filter(StorageOffering::is_raw)
            .filter_map(|o| {
                o.sizes.first().map(|size| VolumeProduct {
                    name: format!("{} - {}", o.id, RAW_FORMAT),
                    size_gb: *size,
                    id: o.id.clone(),
                })
            })
            .collect())
    }

    /// 创建存储卷，返回新存储卷 ID
    pub async fn create(&self, options: &VolumeCreateOptions) -> Result<String> {
        info!("创建存储卷: {}", options.name);
        let region = self.client.region_id().to_string();
        let mut params = vec![("name", options.name.clone())];

        match &options.snapshot_id {
            Some(source) => {
                params.push(("targetLocationID", region));
                params.push(("sourceDiskID", source.clone()));
                params.push(("type", "clone".to_string()));
            }
            None => {
                let offerings = self.list_offerings().await?;
                let selection = match &options.product_id {
                    Some(product_id) => find_offering_by_product(&offerings, product_id),
                    None => select_offering(&offerings, options.size_gb),
                }
                .ok_or_else(|| SceError::cloud("没有可用的存储规格"))?;

                debug!(
                    "选中存储规格: {} ({}GB)",
                    selection.offering_id, selection.size_gb
                );
                params.push(("location", region));
                params.push(("offeringID", selection.offering_id));
                params.push(("format", selection.format));
                params.push(("size", selection.size_gb.to_string()));
            }
        }

        let body = self
            .client
            .transport()
            .post("storage", &params)
            .await?
            .ok_or_else(|| SceError::cloud("云平台接受了请求但没有返回存储卷信息"))?;
        let doc = self.client.transport().parse(&body)?;

        map_first::<Volume>(&doc, &self.client.scope())
            .map(|v| v.id)
            .ok_or_else(|| SceError::cloud("响应中没有存储卷"))
    }

    /// 挂载到虚拟机
    ///
    /// 已挂载时直接报错；否则等待存储卷变为空闲后再提交挂载。
    pub async fn attach(&self, volume_id: &str, server_id: &str, device_id: &str) -> Result<()> {
        info!("挂载存储卷: {} -> {} ({})", volume_id, server_id, device_id);
        let volume = self
            .get(volume_id)
            .await?
            .ok_or_else(|| SceError::cloud(format!("存储卷不存在: {}", volume_id)))?;

        if volume.vm_id.is_some() || state_is(&volume, &[STATE_ATTACHED]) {
            return Err(SceError::cloud(format!("存储卷 {} 已挂载到虚拟机", volume_id)));
        }

        let volume = self
            .wait_for_state(volume_id, &[STATE_DETACHED, STATE_ATTACHED])
            .await?;
        if state_is(&volume, &[STATE_ATTACHED]) {
            return Ok(());
        }

        self.client
            .transport()
            .put(
                &format!("instances/{}", server_id),
                &[
                    ("type", "attach".to_string()),
                    ("storageID", volume_id.to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    /// 从虚拟机卸载
    pub async fn detach(&self, volume_id: &str) -> Result<()> {
        info!("卸载存储卷: {}", volume_id);
        let volume = self
            .get(volume_id)
            .await?
            .ok_or_else(|| SceError::cloud(format!("存储卷不存在: {}", volume_id)))?;

        let server_id = volume
            .vm_id
            .clone()
            .ok_or_else(|| SceError::cloud(format!("无法确定存储卷 {} 挂载的虚拟机", volume_id)))?;

        let volume = self
            .wait_for_state(volume_id, &[STATE_ATTACHED, STATE_DETACHED])
            .await?;
        if state_is(&volume, &[STATE_DETACHED]) {
            return Ok(());
        }

        self.client
            .transport()
            .put(
                &format!("instances/{}", server_id),
                &[
                    ("type", "detach".to_string()),
                    ("storageID", volume_id.to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    /// 删除存储卷，等待其进入可删除状态后提交
    pub async fn remove(&self, volume_id: &str) -> Result<()> {
        info!("删除存储卷: {}", volume_id);
        self.wait_for_state(volume_id, &[STATE_ATTACHED, STATE_DETACHED, STATE_DELETED])
            .await?;
        self.client
            .transport()
            .delete(&format!("storage/{}", volume_id))
            .await
    }

    /// 是否开通了块存储
    pub async fn is_subscribed(&self) -> Result<bool> {
        match self.client.region().current().await {
            Ok(region) => Ok(region.map(|r| r.storage).unwrap_or(false)),
            Err(e) if e.is_auth_failure() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// 可用的挂载设备名
    pub fn list_possible_device_ids(&self, platform: Platform) -> Vec<String> {
        let names = ["f", "g", "h", "i", "j"];
        if platform.is_windows() {
            names.iter().map(|n| format!("xvd{}", n)).collect()
        } else {
            names.iter().map(|n| format!("/dev/sd{}", n)).collect()
        }
    }

    async fn wait_for_state(&self, volume_id: &str, codes: &[&str]) -> Result<Volume> {
        self.client
            .poller(VOLUME_WAIT_TIMEOUT)
            .poll_until(|| self.get(volume_id), |v| state_is(v, codes))
            .await
            .map_err(|e| {
                if let PollError::Timeout { last, .. } = &e {
                    warn!(
                        "存储卷 {} 等待超时，当前状态码 {:?}",
                        volume_id, last.state_code
                    );
                }
                e.into_error(&format!("存储卷 {}", volume_id))
            })
    }
}

#[async_trait]
impl<'a> ResourceSupport for VolumeApi<'a> {
    type Resource = Volume;

    fn resource_kind(&self) -> &'static str {
        "volume"
    }

    async fn list(&self) -> Result<Vec<Volume>> {
        VolumeApi::list(self).await
    }

    async fn get(&self, id: &str) -> Result<Option<Volume>> {
        VolumeApi::get(self, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offering(id: &str, sizes: &[u64], format: &str) -> StorageOffering {
        StorageOffering {
            id: id.to_string(),
            sizes: sizes.to_vec(),
            formats: vec![format.to_string()],
        }
    }

    #[test]
    fn test_select_smallest_fitting_size() {
        let offerings = vec![offering("20001208", &[10, 25, 50], "RAW")];
        let selected = select_offering(&offerings, 20).unwrap();
        assert_eq!(selected.offering_id, "20001208");
        assert_eq!(selected.size_gb, 25);
        assert_eq!(selected.format, "RAW");

        assert_eq!(select_offering(&offerings, 25).unwrap().size_gb, 25);
        assert_eq!(select_offering(&offerings, 1).unwrap().size_gb, 10);
    }

    #[test]
    fn test_select_largest_below_when_nothing_fits() {
        let offerings = vec![offering("20001208", &[10, 25, 50], "RAW")];
        assert_eq!(select_offering(&offerings, 2000).unwrap().size_gb, 50);
    }

    #[test]
    fn test_select_only_raw() {
        let offerings = vec![
            offering("ext3-small", &[20], "EXT3"),
            offering("raw-big", &[100], "RAW"),
        ];
        let selected = select_offering(&offerings, 20).unwrap();
        assert_eq!(selected.offering_id, "raw-big");
        assert_eq!(selected.size_gb, 100);

        assert!(select_offering(&[offering("ext3", &[20], "EXT3")], 20).is_none());
        assert!(select_offering(&[], 20).is_none());
    }

    #[test]
    fn test_select_across_offerings() {
        let offerings = vec![
            offering("a", &[256, 512], "RAW"),
            offering("b", &[60, 120], "RAW"),
        ];
        let selected = select_offering(&offerings, 100).unwrap();
        assert_eq!((selected.offering_id.as_str(), selected.size_gb), ("b", 120));
    }

    #[test]
    fn test_find_by_product() {
        let offerings = vec![
            offering("20001208", &[10, 25], "RAW"),
            offering("20001209", &[50], "EXT3"),
        ];
        let found = find_offering_by_product(&offerings, "20001208").unwrap();
        assert_eq!(found.size_gb, 10);
        let ext3 = find_offering_by_product(&offerings, "20001209").unwrap();
        assert_eq!(ext3.offering_id, "20001209");
        assert_eq!(ext3.size_gb, 50);
        assert!(find_offering_by_product(&offerings, "missing").is_none());
    }

    #[test]
    fn test_parse_offerings() {
        let doc = Document::parse(
            r#"<DescribeOfferingsResponse>
  <Offerings>
    <ID>20001208</ID>
    <Location>41</Location>
    <SupportedSizes>10, 25,50</SupportedSizes>
    <SupportedFormats>
      <Format><Label>raw</Label><ID>RAW</ID></Format>
      <Format><Label>ext3</Label><ID>EXT3</ID></Format>
    </SupportedFormats>
  </Offerings>
  <Offerings><SupportedSizes>10</SupportedSizes></Offerings>
</DescribeOfferingsResponse>"#,
        )
        .unwrap();

        let offerings = parse_storage_offerings(&doc);
        assert_eq!(offerings.len(), 1);
        assert_eq!(offerings[0].sizes, vec![10, 25, 50]);
        assert_eq!(offerings[0].formats, vec!["RAW", "EXT3"]);
        assert!(offerings[0].is_raw());
    }

    #[test]
    fn test_volume_mapping_and_region_filter() {
        let doc = Document::parse(
            r#"<DescribeVolumesResponse>
  <Volume>
    <ID>vol-1</ID><Location>41</Location><Size>25</Size><State>4</State>
    <CreatedTime>2012-03-14T09:26:53.123Z</CreatedTime>
  </Volume>
  <Volume><ID>vol-2</ID><Location>82</Location><State>4</State></Volume>
  <Volume><ID>vol-3</ID><Location>41</Location><State>5</State><InstanceID>vm-9</InstanceID><Name>data</Name></Volume>
  <Volume><Location>41</Location></Volume>
</DescribeVolumesResponse>"#,
        )
        .unwrap();

        let scope = MappingScope {
            region_id: "41",
            account_number: "20012345",
        };
        let volumes: Vec<Volume> = map_all(&doc, &scope);
        assert_eq!(volumes.len(), 2);
        assert!(volumes.iter().all(|v| v.region_id == "41"));

        assert_eq!(volumes[0].name, "vol-1");
        assert_eq!(volumes[0].size_gb, 25);
        assert_eq!(volumes[0].state, VolumeState::Available);
        assert!(volumes[0].created.is_some());

        assert_eq!(volumes[1].vm_id.as_deref(), Some("vm-9"));
        assert!(state_is(&volumes[1], &[STATE_ATTACHED]));
    }
}
