//! 虚拟机 API
//!
//! 提供虚拟机生命周期管理功能，包括：
//! - 虚拟机查询、创建、克隆、删除、重启
//! - 控制台日志
//! - 实例规格目录

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use sce_transport::{Element, Result, SceError};

use crate::api::ResourceSupport;
use crate::client::SceClient;
use crate::codes::decode_vm_state;
use crate::mapping::{
    is_private_address, map_all, map_first, parse_timestamp, push_unique, text_of, FromXmlNode,
    MappingScope,
};
use crate::models::{
    Architecture, Platform, ResourceStatus, VirtualMachine, VmLaunchOptions, VmProduct,
    VmState,
};
use crate::password::generate_password;

/// 删除前等待虚拟机脱离 PENDING 的上限
pub const TERMINATE_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// 辅助 IP 数量上限
pub const MAX_SECONDARY_IPS: usize = 3;

impl FromXmlNode for VirtualMachine {
    const TAG: &'static str = "Instance";

    fn from_node(node: &Element, scope: &MappingScope<'_>) -> Option<Self> {
        let mut id = None;
        let mut name = None;
        let mut region_id = None;
        let mut owner = None;
        let mut hostname = None;
        let mut state = VmState::Pending;
        let mut state_code = None;
        let mut product_id = None;
        let mut image_id = None;
        let mut platform = Platform::Unknown;
        let mut public_addresses = Vec::new();
        let mut private_addresses = Vec::new();
        let mut vlan_id = None;
        let mut created = None;

        let mut add_address = |ip: String| {
            if is_private_address(&ip) {
                push_unique(&mut private_addresses, ip);
            } else {
                push_unique(&mut public_addresses, ip);
            }
        };

        for child in node.child_elements() {
            match child.name().to_ascii_lowercase().as_str() {
                "primaryip" | "secondaryip" => {
                    if let Some(ip) = child.child("IP").and_then(text_of) {
                        add_address(ip);
                    }
                }
                "vlan" => vlan_id = child.child("ID").and_then(text_of),
                "software" => {
                    for app in child.child_elements() {
                        let is_os = app
                            .child_text("Type")
                            .map(|t| t.eq_ignore_ascii_case("OS"))
                            .unwrap_or(false);
                        if let (true, Some(os)) = (is_os, app.child_text("Name")) {
                            platform = Platform::guess(os);
                        }
                    }
                }
                tag => {
                    let Some(value) = text_of(child) else {
                        continue;
                    };
                    match tag {
                        "id" => id = Some(value),
                        "name" => name = Some(value),
                        "location" => region_id = Some(value),
                        "owner" => owner = Some(value),
                        "hostname" => hostname = Some(value),
                        "ip" => add_address(value),
                        "imageid" => image_id = Some(value),
                        "instancetype" => product_id = Some(value),
                        "status" => {
                            state = decode_vm_state(&value);
                            state_code = Some(value);
                        }
                        "launchtime" => created = parse_timestamp(&value),
                        _ => {}
                    }
                }
            }
        }

        let id = id?;
        let region_id = region_id.filter(|r| r == scope.region_id)?;
        let name = name.unwrap_or_else(|| id.clone());
        Some(VirtualMachine {
            description: name.clone(),
            id,
            name,
            region_id,
            owner,
            hostname,
            state,
            state_code,
            product_id,
            image_id,
            platform,
            public_addresses,
            private_addresses,
            vlan_id,
            created,
            root_user: None,
            root_password: None,
        })
    }
}

/// 解析 `key=value` 形式的用户数据
///
/// 每行一个参数，`#`/`!` 开头为注释；分隔符为第一个 `=` 或 `:`。
/// 同名参数以最后一次出现为准。
pub fn parse_user_data(text: &str) -> Vec<(String, String)> {
    let mut entries: Vec<(String, String)> = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let (key, value) = match line.find(|c| c == '=' || c == ':') {
            Some(idx) => (line[..idx].trim(), line[idx + 1..].trim()),
            None => (line, ""),
        };
        if key.is_empty() {
            continue;
        }
        match entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => entries.push((key.to_string(), value.to_string())),
        }
    }

    entries
}

/// 虚拟机 API
pub struct VirtualMachineApi<'a> {
    client: &'a SceClient,
}

impl<'a> VirtualMachineApi<'a> {
    /// 创建新的虚拟机 API 实例
    pub(crate) fn new(client: &'a SceClient) -> Self {
        Self { client }
    }

    /// 查询当前区域的全部虚拟机
    pub async fn list(&self) -> Result<Vec<VirtualMachine>> {
        info!("查询虚拟机列表");
        let doc = self.client.transport().get_xml("instances").await?;
        Ok(doc
            .map(|doc| map_all(&doc, &self.client.scope()))
            .unwrap_or_default())
    }

    /// 查询虚拟机状态
    pub async fn list_status(&self) -> Result<Vec<ResourceStatus<VmState>>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .map(|vm| ResourceStatus {
                id: vm.id,
                state: vm.state,
            })
            .collect())
    }

    /// 查询虚拟机详情，其他区域的虚拟机视为不存在
    pub async fn get(&self, vm_id: &str) -> Result<Option<VirtualMachine>> {
        debug!("查询虚拟机详情: {}", vm_id);
        let doc = self
            .client
            .transport()
            .get_xml(&format!("instances/{}", vm_id))
            .await?;
        Ok(doc.and_then(|doc| map_first(&doc, &self.client.scope())))
    }

    /// 创建虚拟机
    ///
    /// Unix 镜像需要 SSH 公钥 (未指定时自动选择或新建)；
    /// Windows 镜像生成随机初始密码，随返回的虚拟机一并给出。
    pub async fn launch(&self, options: &VmLaunchOptions) -> Result<VirtualMachine> {
        info!("创建虚拟机: {} (镜像 {})", options.name, options.image_id);
        let image = self
            .client
            .image()
            .get(&options.image_id)
            .await?
            .ok_or_else(|| SceError::cloud(format!("镜像不存在: {}", options.image_id)))?;

        let user_data = options
            .user_data
            .as_deref()
            .map(parse_user_data)
            .unwrap_or_default();

        let mut params: Vec<(&str, String)> = vec![
            ("name", options.name.clone()),
            ("instanceType", options.product_id.clone()),
            ("imageID", options.image_id.clone()),
            ("location", self.client.region_id().to_string()),
        ];

        let mut password = None;
        if image.platform.is_unix() {
            let keypair = match &options.keypair {
                Some(name) => name.clone(),
                None => self.identify_keypair().await?,
            };
            params.push(("publicKey", keypair));
        } else if image.platform.is_windows() {
            if let Some(user) = &options.username {
                debug!("指定初始用户: {}", user);
                params.push(("UserName", user.clone()));
            }
            let generated = generate_password(options.username.as_deref().unwrap_or_default());
            params.push(("Password", generated.clone()));
            password = Some(generated);
        }

        if let Some(vlan) = &options.vlan_id {
            params.push(("vlanID", vlan.clone()));
        }

        if let Some((primary, secondary)) = options.static_ip_ids.split_first() {
            params.push(("ip", primary.clone()));
            if secondary.len() > MAX_SECONDARY_IPS {
                warn!(
                    "辅助 IP 最多 {} 个，忽略多余的 {} 个",
                    MAX_SECONDARY_IPS,
                    secondary.len() - MAX_SECONDARY_IPS
                );
            }
            for ip in secondary.iter().take(MAX_SECONDARY_IPS) {
                params.push(("SecondaryIP", ip.clone()));
            }
        }

        for (key, value) in &user_data {
            params.push((key.as_str(), value.clone()));
        }

        let body = self
            .client
            .transport()
            .post("instances", &params)
            .await?
            .ok_or_else(|| SceError::cloud("云平台接受了请求但没有返回虚拟机信息"))?;
        let doc = self.client.transport().parse(&body)?;

        let mut vm: VirtualMachine = map_first(&doc, &self.client.scope())
            .ok_or_else(|| SceError::cloud("响应中没有虚拟机"))?;
        if let Some(description) = &options.description {
            vm.description = description.clone();
        }
        vm.root_user = options.username.clone();
        vm.root_password = password;
        info!("虚拟机已提交创建: {}", vm.id);
        Ok(vm)
    }

    /// 取第一个已有密钥，没有时新建一个
    async fn identify_keypair(&self) -> Result<String> {
        let keys = self.client.keypair();
        if let Some(existing) = keys.list().await?.into_iter().next() {
            return Ok(existing.name);
        }

        let name = format!("dsn{}", chrono::Utc::now().timestamp_millis());
        info!("没有可用的 SSH 密钥，自动创建: {}", name);
        Ok(keys.create(&name).await?.name)
    }

    /// 克隆虚拟机
    ///
    /// 先从源虚拟机捕获镜像，等待镜像可用后以相同规格创建新虚拟机。
    pub async fn clone(&self, vm_id: &str, name: &str, description: &str) -> Result<VirtualMachine> {
        info!("克隆虚拟机: {} -> {}", vm_id, name);
        let vm = self
            .get(vm_id)
            .await?
            .ok_or_else(|| SceError::cloud(format!("虚拟机不存在: {}", vm_id)))?;

        let images = self.client.image();
        let image_id = images.capture(vm_id, name, description).await?;

        let product = match &vm.product_id {
            Some(product_id) => self.get_product(product_id).await?,
            None => None,
        }
        .ok_or_else(|| SceError::cloud(format!("虚拟机 {} 的实例规格未知", vm_id)))?;

        images.wait_until_active(&image_id).await?;

        self.launch(&VmLaunchOptions {
            name: name.to_string(),
            description: Some(description.to_string()),
            product_id: product.id,
            image_id,
            ..Default::default()
        })
        .await
    }

    /// 删除虚拟机，等待其脱离 PENDING 后提交
    pub async fn terminate(&self, vm_id: &str) -> Result<()> {
        info!("删除虚拟机: {}", vm_id);
        self.client
            .poller(TERMINATE_TIMEOUT)
            .poll_until(|| self.get(vm_id), |vm| vm.state != VmState::Pending)
            .await
            .map_err(|e| e.into_error(&format!("虚拟机 {}", vm_id)))?;

        self.client
            .transport()
            .delete(&format!("instances/{}", vm_id))
            .await
    }

    /// 重启虚拟机
    pub async fn reboot(&self, vm_id: &str) -> Result<()> {
        info!("重启虚拟机: {}", vm_id);
        self.client
            .transport()
            .put(
                &format!("instances/{}", vm_id),
                &[("state", "restart".to_string())],
            )
            .await?;
        Ok(())
    }

    /// 控制台日志，每个 `<Logs>` 一行
    pub async fn console_output(&self, vm_id: &str) -> Result<String> {
        let Some(doc) = self
            .client
            .transport()
            .get_xml(&format!("instances/{}/logs", vm_id))
            .await?
        else {
            return Ok(String::new());
        };

        let mut console = String::new();
        for log in doc.elements_by_tag_name("Logs") {
            if let Some(text) = log.text() {
                console.push_str(text);
                console.push('\n');
            }
        }
        Ok(console)
    }

    /// 查询实例规格
    pub async fn get_product(&self, product_id: &str) -> Result<Option<VmProduct>> {
        Ok(self.client.product_catalog().await?.find(product_id).cloned())
    }

    /// 指定架构的实例规格
    pub async fn list_products(&self, architecture: Architecture) -> Result<Vec<VmProduct>> {
        Ok(self
            .client
            .product_catalog()
            .await?
            .products(architecture)
            .to_vec())
    }

    /// 当前区域是否提供计算实例
    pub async fn is_subscribed(&self) -> Result<bool> {
        match self.client.region().current().await {
            Ok(region) => Ok(region.map(|r| r.compute).unwrap_or(false)),
            Err(e) if e.is_auth_failure() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// 云平台不支持标签，调用被忽略
    pub async fn update_tags(&self, vm_id: &str, tags: &[(String, String)]) -> Result<()> {
        debug!("忽略虚拟机 {} 的 {} 个标签", vm_id, tags.len());
        Ok(())
    }

    pub async fn start(&self, _vm_id: &str) -> Result<()> {
        Err(SceError::unsupported("虚拟机启动"))
    }

    pub async fn stop(&self, _vm_id: &str) -> Result<()> {
        Err(SceError::unsupported("虚拟机停止"))
    }

    pub async fn pause(&self, _vm_id: &str) -> Result<()> {
        Err(SceError::unsupported("虚拟机暂停"))
    }

    pub async fn unpause(&self, _vm_id: &str) -> Result<()> {
        Err(SceError::unsupported("虚拟机恢复暂停"))
    }

    pub async fn suspend(&self, _vm_id: &str) -> Result<()> {
        Err(SceError::unsupported("虚拟机挂起"))
    }

    pub async fn resume(&self, _vm_id: &str) -> Result<()> {
        Err(SceError::unsupported("虚拟机恢复挂起"))
    }
}

#[async_trait]
impl<'a> ResourceSupport for VirtualMachineApi<'a> {
    type Resource = VirtualMachine;

    fn resource_kind(&self) -> &'static str {
        "vm"
    }

    async fn list(&self) -> Result<Vec<VirtualMachine>> {
        VirtualMachineApi::list(self).await
    }

    async fn get(&self, id: &str) -> Result<Option<VirtualMachine>> {
        VirtualMachineApi::get(self, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sce_transport::Document;

    fn scope(region: &str) -> MappingScope<'_> {
        MappingScope {
            region_id: region,
            account_number: "20012345",
        }
    }

    const INSTANCE: &str = r#"<DescribeInstanceResponse>
  <Instance>
    <ID>vm-123</ID>
    <Location>reg-1</Location>
    <Status>5</Status>
    <Owner>jdoe@example.com</Owner>
    <InstanceType>COP64.2/4096/60</InstanceType>
    <ImageID>20010001</ImageID>
    <IP>170.224.161.40</IP>
    <PrimaryIP><IP>170.224.161.40</IP><Hostname>vhost0013</Hostname></PrimaryIP>
    <SecondaryIP><IP>10.0.0.12</IP></SecondaryIP>
    <Vlan><ID>vlan-7</ID><Name>private</Name></Vlan>
    <LaunchTime>2012-03-14T09:26:53.123Z</LaunchTime>
    <Software>
      <Application><Name>Red Hat Enterprise Linux 6</Name><Type>OS</Type></Application>
      <Application><Name>DB2</Name><Type>DB</Type></Application>
    </Software>
  </Instance>
</DescribeInstanceResponse>"#;

    #[test]
    fn test_instance_mapping() {
        let doc = Document::parse(INSTANCE).unwrap();
        let vm: VirtualMachine = map_first(&doc, &scope("reg-1")).unwrap();

        assert_eq!(vm.id, "vm-123");
        assert_eq!(vm.state, VmState::Running);
        assert_eq!(vm.name, "vm-123");
        assert_eq!(vm.description, "vm-123");
        assert_eq!(vm.public_addresses, vec!["170.224.161.40"]);
        assert_eq!(vm.private_addresses, vec!["10.0.0.12"]);
        assert_eq!(vm.vlan_id.as_deref(), Some("vlan-7"));
        assert_eq!(vm.platform, Platform::RedHat);
        assert_eq!(vm.product_id.as_deref(), Some("COP64.2/4096/60"));
        assert!(vm.created.is_some());
    }

    #[test]
    fn test_instance_other_region_dropped() {
        let doc = Document::parse(INSTANCE).unwrap();
        assert!(map_first::<VirtualMachine>(&doc, &scope("reg-2")).is_none());
    }

    #[test]
    fn test_unknown_status_is_pending() {
        let doc = Document::parse(
            "<R><Instance><ID>vm-1</ID><Location>reg-1</Location><Status>42</Status></Instance></R>",
        )
        .unwrap();
        let vm: VirtualMachine = map_first(&doc, &scope("reg-1")).unwrap();
        assert_eq!(vm.state, VmState::Pending);
        assert_eq!(vm.state_code.as_deref(), Some("42"));
    }

    #[test]
    fn test_parse_user_data() {
        let parsed = parse_user_data(
            "# bootstrap\nfoo=bar\n\n  spaced : value with spaces \n!ignored\nfoo=baz\nflag\n=orphan",
        );
        assert_eq!(
            parsed,
            vec![
                ("foo".to_string(), "baz".to_string()),
                ("spaced".to_string(), "value with spaces".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
    }
}
