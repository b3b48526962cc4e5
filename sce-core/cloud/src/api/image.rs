//! 镜像 API
//!
//! 提供镜像管理功能，包括：
//! - 镜像查询与搜索
//! - 从虚拟机捕获镜像 (同步/异步)
//! - 删除镜像

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use sce_transport::{Element, Result, SceError};

use crate::api::ResourceSupport;
use crate::capture::ImageCaptureTask;
use crate::client::SceClient;
use crate::codes::{decode_architecture, decode_image_state};
use crate::mapping::{map_all, map_first, parse_timestamp, text_of, FromXmlNode, MappingScope};
use crate::models::{Architecture, ImageFilter, ImageState, MachineImage, Platform};

/// 捕获后等待镜像可用的上限
pub const IMAGE_ACTIVE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

impl FromXmlNode for MachineImage {
    const TAG: &'static str = "Image";

    fn from_node(node: &Element, scope: &MappingScope<'_>) -> Option<Self> {
        let mut id = None;
        let mut name = None;
        let mut description = None;
        let mut region_id = None;
        let mut owner = None;
        let mut state = ImageState::Pending;
        let mut platform = Platform::Unknown;
        let mut architecture = Architecture::I64;
        let mut visibility = None;
        let mut created = None;

        for child in node.child_elements() {
            let Some(value) = text_of(child) else {
                continue;
            };
            match child.name().to_ascii_lowercase().as_str() {
                "id" => id = Some(value),
                "name" => name = Some(value),
                "description" => description = Some(value),
                "location" => region_id = Some(value),
                "state" => state = decode_image_state(&value),
                "owner" => owner = Some(value),
                "platform" => platform = Platform::guess(&value),
                "architecture" => architecture = decode_architecture(&value),
                "visibility" => visibility = Some(value),
                "createdtime" => created = parse_timestamp(&value),
                _ => {}
            }
        }

        let id = id?;
        let region_id = region_id.filter(|r| r == scope.region_id)?;
        let name = name.unwrap_or_else(|| id.clone());
        let description = description.unwrap_or_else(|| format!("{} [#{}]", name, id));
        if platform == Platform::Unknown {
            platform = Platform::guess(&format!("{} {}", name, description));
        }

        Some(MachineImage {
            id,
            name,
            description,
            region_id,
            owner,
            state,
            platform,
            architecture,
            visibility,
            created,
        })
    }
}

impl ImageFilter {
    /// 关键字只匹配名称和描述；平台为 UNIX 时匹配所有类 Unix 系统
    pub fn matches(&self, image: &MachineImage) -> bool {
        if let Some(owner) = &self.owner {
            if image.owner.as_deref() != Some(owner.as_str()) {
                return false;
            }
        }

        if let Some(keyword) = &self.keyword {
            let keyword = keyword.to_lowercase();
            if !image.name.to_lowercase().contains(&keyword)
                && !image.description.to_lowercase().contains(&keyword)
            {
                return false;
            }
        }

        match self.platform {
            Some(Platform::Unknown) | None => {}
            Some(Platform::Unix) if image.platform.is_unix() => {}
            Some(platform) if platform != image.platform => return false,
            Some(_) => {}
        }

        self.architecture
            .map(|arch| arch == image.architecture)
            .unwrap_or(true)
    }
}

fn is_shared(node: &Element) -> bool {
    node.child("Visibility")
        .and_then(text_of)
        .map(|v| !v.eq_ignore_ascii_case("PRIVATE"))
        .unwrap_or(false)
}

/// 镜像 API
pub struct ImageApi<'a> {
    client: &'a SceClient,
}

impl<'a> ImageApi<'a> {
    /// 创建新的镜像 API 实例
    pub(crate) fn new(client: &'a SceClient) -> Self {
        Self { client }
    }

    /// 当前账号拥有的镜像
    pub async fn list(&self) -> Result<Vec<MachineImage>> {
        self.list_owned_by(self.client.account_number()).await
    }

    /// 指定账号拥有的镜像
    pub async fn list_owned_by(&self, account: &str) -> Result<Vec<MachineImage>> {
        info!("查询镜像列表: {}", account);
        self.filtered(&ImageFilter {
            owner: Some(account.to_string()),
            ..Default::default()
        })
        .await
    }

    /// 按关键字、平台、架构搜索当前区域的全部镜像
    pub async fn search(
        &self,
        keyword: Option<&str>,
        platform: Option<Platform>,
        architecture: Option<Architecture>,
    ) -> Result<Vec<MachineImage>> {
        info!("搜索镜像: {:?} {:?} {:?}", keyword, platform, architecture);
        self.filtered(&ImageFilter {
            owner: None,
            keyword: keyword.map(str::to_string),
            platform,
            architecture,
        })
        .await
    }

    async fn filtered(&self, filter: &ImageFilter) -> Result<Vec<MachineImage>> {
        let doc = self.client.transport().get_xml("offerings/image").await?;
        Ok(doc
            .map(|doc| map_all::<MachineImage>(&doc, &self.client.scope()))
            .unwrap_or_default()
            .into_iter()
            .filter(|img| filter.matches(img))
            .collect())
    }

    /// 查询镜像详情，非法 ID 返回 500 时退回到列表匹配
    pub async fn get(&self, image_id: &str) -> Result<Option<MachineImage>> {
        debug!("查询镜像详情: {}", image_id);
        match self
            .client
            .transport()
            .get_xml(&format!("offerings/image/{}", image_id))
            .await
        {
            Ok(doc) => Ok(doc.and_then(|doc| map_first(&doc, &self.client.scope()))),
            Err(e) if e.is_not_found_quirk() => {
                debug!("镜像 {} 查询返回 500，改为列表匹配", image_id);
                Ok(self
                    .filtered(&ImageFilter::default())
                    .await?
                    .into_iter()
                    .find(|img| img.id == image_id))
            }
            Err(e) => Err(e),
        }
    }

    /// 从虚拟机捕获镜像，返回新镜像 ID (镜像此时通常仍在 PENDING)
    pub async fn capture(&self, vm_id: &str, name: &str, description: &str) -> Result<String> {
        info!("捕获镜像: {} -> {}", vm_id, name);
        let body = self
            .client
            .transport()
            .put(
                &format!("instances/{}", vm_id),
                &[
                    ("state", "save".to_string()),
                    ("name", name.to_string()),
                    ("description", description.to_string()),
                ],
            )
            .await?
            .ok_or_else(|| SceError::cloud("捕获镜像时云平台没有返回内容"))?;
        let doc = self.client.transport().parse(&body)?;

        map_first::<MachineImage>(&doc, &self.client.scope())
            .map(|img| img.id)
            .ok_or_else(|| SceError::cloud("响应中没有镜像"))
    }

    /// 等待镜像变为 ACTIVE
    pub async fn wait_until_active(&self, image_id: &str) -> Result<MachineImage> {
        self.client
            .poller(IMAGE_ACTIVE_TIMEOUT)
            .poll_until(
                || self.get(image_id),
                |img| img.state == ImageState::Active,
            )
            .await
            .map_err(|e| e.into_error(&format!("镜像 {}", image_id)))
    }

    /// 在后台任务中捕获镜像并等待其可用
    pub fn capture_async(&self, vm_id: &str, name: &str, description: &str) -> ImageCaptureTask {
        ImageCaptureTask::spawn(self.client.clone(), vm_id, name, description)
    }

    /// 删除镜像
    pub async fn remove(&self, image_id: &str) -> Result<()> {
        info!("删除镜像: {}", image_id);
        self.client
            .transport()
            .delete(&format!("offerings/image/{}", image_id))
            .await
    }

    /// 镜像是否对其他账号可见
    pub async fn is_shared_with_public(&self, image_id: &str) -> Result<bool> {
        let doc = self
            .client
            .transport()
            .get_xml(&format!("offerings/image/{}", image_id))
            .await?;
        Ok(doc
            .and_then(|doc| doc.elements_by_tag_name("Image").first().map(|n| is_shared(n)))
            .unwrap_or(false))
    }

    pub async fn is_subscribed(&self) -> Result<bool> {
        self.client.vm().is_subscribed().await
    }

    /// 云平台没有共享接口，总是为空
    pub async fn list_shares(&self, _image_id: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    pub async fn share(&self, _image_id: &str, _account: &str, _allow: bool) -> Result<()> {
        Err(SceError::unsupported("镜像共享"))
    }

    pub async fn download(&self, _image_id: &str) -> Result<Vec<u8>> {
        Err(SceError::unsupported("镜像下载"))
    }

    pub async fn install_from_upload(&self, _image: &[u8]) -> Result<String> {
        Err(SceError::unsupported("上传安装镜像"))
    }

    pub async fn register_from_storage(&self, _location: &str) -> Result<String> {
        Err(SceError::unsupported("从存储注册镜像"))
    }

    pub async fn capture_to_storage(&self, _vm_id: &str, _directory: &str) -> Result<String> {
        Err(SceError::unsupported("捕获镜像到存储"))
    }

    pub async fn transfer(&self, _image_id: &str) -> Result<String> {
        Err(SceError::unsupported("跨云迁移镜像"))
    }
}

#[async_trait]
impl<'a> ResourceSupport for ImageApi<'a> {
    type Resource = MachineImage;

    fn resource_kind(&self) -> &'static str {
        "image"
    }

    async fn list(&self) -> Result<Vec<MachineImage>> {
        ImageApi::list(self).await
    }

    async fn get(&self, id: &str) -> Result<Option<MachineImage>> {
        ImageApi::get(self, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sce_transport::Document;

    const IMAGES: &str = r#"<DescribeImagesResponse>
  <Image>
    <ID>20010001</ID>
    <Name>Red Hat Enterprise Linux 6 (64-bit)</Name>
    <Location>41</Location>
    <State>1</State>
    <Owner>SYSTEM</Owner>
    <Visibility>PUBLIC</Visibility>
    <Architecture>x86_64</Architecture>
    <Platform>Red Hat Enterprise Linux/6</Platform>
  </Image>
  <Image>
    <ID>20010002</ID>
    <Name>web tier</Name>
    <Description>Windows Server 2008 golden image</Description>
    <Location>41</Location>
    <State>0</State>
    <Owner>jdoe@example.com</Owner>
    <Visibility>PRIVATE</Visibility>
    <Architecture>i386</Architecture>
  </Image>
  <Image>
    <ID>20010003</ID>
    <Location>82</Location>
    <State>1</State>
  </Image>
  <Image>
    <ID>20010004</ID>
    <Location>41</Location>
    <State>9</State>
    <Architecture>ppc</Architecture>
  </Image>
</DescribeImagesResponse>"#;

    fn images() -> Vec<MachineImage> {
        let doc = Document::parse(IMAGES).unwrap();
        map_all(
            &doc,
            &MappingScope {
                region_id: "41",
                account_number: "jdoe@example.com",
            },
        )
    }

    #[test]
    fn test_image_mapping() {
        let images = images();
        assert_eq!(images.len(), 3);

        assert_eq!(images[0].state, ImageState::Active);
        assert_eq!(images[0].platform, Platform::RedHat);
        assert_eq!(images[0].architecture, Architecture::I64);

        assert_eq!(images[1].platform, Platform::Windows);
        assert_eq!(images[1].architecture, Architecture::I32);
        assert_eq!(images[1].state, ImageState::Pending);

        assert_eq!(images[2].name, "20010004");
        assert_eq!(images[2].description, "20010004 [#20010004]");
        assert_eq!(images[2].state, ImageState::Pending);
        assert_eq!(images[2].architecture, Architecture::I64);
    }

    #[test]
    fn test_filter_by_owner_and_keyword() {
        let images = images();
        let owned = ImageFilter {
            owner: Some("jdoe@example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(images.iter().filter(|i| owned.matches(i)).count(), 1);

        let keyword = ImageFilter {
            keyword: Some("GOLDEN".to_string()),
            ..Default::default()
        };
        assert!(keyword.matches(&images[1]));
        assert!(!keyword.matches(&images[0]));
    }

    #[test]
    fn test_filter_unix_family() {
        let images = images();
        let unix = ImageFilter {
            platform: Some(Platform::Unix),
            ..Default::default()
        };
        assert!(unix.matches(&images[0]));
        assert!(!unix.matches(&images[1]));

        let windows_32 = ImageFilter {
            platform: Some(Platform::Windows),
            architecture: Some(Architecture::I32),
            ..Default::default()
        };
        assert!(windows_32.matches(&images[1]));
        assert!(!windows_32.matches(&images[0]));
    }

    #[test]
    fn test_visibility() {
        let doc = Document::parse(IMAGES).unwrap();
        let nodes = doc.elements_by_tag_name("Image");
        assert!(is_shared(nodes[0]));
        assert!(!is_shared(nodes[1]));
        assert!(!is_shared(nodes[2]));
    }
}
