//! SCE 资源数据模型
//!
//! **数据来源**: 云平台 REST API 的 XML 响应 (实时查询，除产品目录外无缓存)
//!
//! 所有实体在映射完成、必填字段齐全后一次性构建，之后不再修改。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// 生命周期状态
// ============================================

/// 虚拟机状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VmState {
    Pending,
    Running,
    Paused,
    Rebooting,
    Stopping,
    Terminated,
}

/// 存储卷状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeState {
    Pending,
    Available,
    Deleted,
}

/// 镜像状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageState {
    Pending,
    Active,
    Deleted,
}

/// CPU 架构
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Architecture {
    I32,
    I64,
}

/// 操作系统平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Unknown,
    Windows,
    RedHat,
    Suse,
    CentOs,
    Ubuntu,
    Debian,
    /// 无法细分的类 Unix 系统
    Unix,
}

impl Platform {
    /// 根据名称/描述文本猜测平台
    pub fn guess(text: &str) -> Platform {
        let text = text.to_lowercase();

        if text.contains("windows") || text.contains("win2k") || text.starts_with("win ") {
            Platform::Windows
        } else if text.contains("red hat") || text.contains("redhat") || text.contains("rhel") {
            Platform::RedHat
        } else if text.contains("suse") || text.contains("sles") {
            Platform::Suse
        } else if text.contains("centos") {
            Platform::CentOs
        } else if text.contains("ubuntu") {
            Platform::Ubuntu
        } else if text.contains("debian") {
            Platform::Debian
        } else if text.contains("linux") || text.contains("unix") || text.contains("aix") {
            Platform::Unix
        } else {
            Platform::Unknown
        }
    }

    pub fn is_windows(self) -> bool {
        self == Platform::Windows
    }

    pub fn is_unix(self) -> bool {
        !matches!(self, Platform::Windows | Platform::Unknown)
    }
}

/// IP 地址类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddressType {
    Public,
    Private,
}

/// 资源状态摘要 (list_status 系列接口)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStatus<S> {
    pub id: String,
    pub state: S,
}

// ============================================
// 区域
// ============================================

/// 区域
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// 区域 ID
    pub id: String,

    /// 区域名称 (缺省为 ID)
    pub name: String,

    /// 司法辖区 (US/CA/EU/SG/JP)
    pub jurisdiction: String,

    /// 是否提供块存储
    pub storage: bool,

    /// 是否提供计算实例
    pub compute: bool,
}

/// 数据中心 (每个区域恰好一个，ID 与区域相同)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCenter {
    pub id: String,
    pub name: String,
    pub region_id: String,
}

// ============================================
// 存储卷
// ============================================

/// 存储卷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// 存储卷 ID
    pub id: String,

    /// 名称 (缺省为 ID)
    pub name: String,

    /// 描述
    pub description: Option<String>,

    /// 所属区域
    pub region_id: String,

    /// 容量 (GB)
    pub size_gb: u64,

    /// 生命周期状态
    pub state: VolumeState,

    /// 云平台原始状态码
    pub state_code: Option<String>,

    /// 创建时间
    pub created: Option<DateTime<Utc>>,

    /// 挂载的虚拟机 ID
    pub vm_id: Option<String>,
}

/// 存储规格 (offerings/storage)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageOffering {
    pub id: String,
    pub sizes: Vec<u64>,
    pub formats: Vec<String>,
}

impl StorageOffering {
    pub fn is_raw(&self) -> bool {
        self.formats.iter().any(|f| f.eq_ignore_ascii_case("RAW"))
    }
}

/// 选中的存储规格
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferingSelection {
    pub offering_id: String,
    pub size_gb: u64,
    pub format: String,
}

/// 存储卷产品 (每个 RAW 规格对应一个，容量取首个支持的大小)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeProduct {
    /// 产品 ID，即规格 ID
    pub id: String,
    pub name: String,
    pub size_gb: u64,
}

/// 创建存储卷参数
#[derive(Debug, Clone, Default)]
pub struct VolumeCreateOptions {
    /// 名称
    pub name: String,

    /// 按产品 ID 选择规格 (优先于 size_gb)
    pub product_id: Option<String>,

    /// 期望容量 (GB)
    pub size_gb: u64,

    /// 从已有存储卷克隆
    pub snapshot_id: Option<String>,
}

// ============================================
// 虚拟机
// ============================================

/// 虚拟机
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachine {
    /// 虚拟机 ID
    pub id: String,

    /// 名称 (缺省为 ID)
    pub name: String,

    /// 描述 (缺省为名称)
    pub description: String,

    /// 所属区域，数据中心 ID 与之相同
    pub region_id: String,

    /// 所有者
    pub owner: Option<String>,

    /// 主机名
    pub hostname: Option<String>,

    /// 生命周期状态
    pub state: VmState,

    /// 云平台原始状态码
    pub state_code: Option<String>,

    /// 实例规格
    pub product_id: Option<String>,

    /// 镜像 ID
    pub image_id: Option<String>,

    /// 操作系统
    pub platform: Platform,

    /// 公网地址
    pub public_addresses: Vec<String>,

    /// 私网地址
    pub private_addresses: Vec<String>,

    /// 所在 VLAN
    pub vlan_id: Option<String>,

    /// 启动时间
    pub created: Option<DateTime<Utc>>,

    /// 初始用户 (仅创建时返回)
    pub root_user: Option<String>,

    /// 初始密码 (仅创建时返回)
    pub root_password: Option<String>,
}

/// 实例规格
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmProduct {
    /// 规格 ID，如 `COP32.1/2048/60`
    pub id: String,

    /// 显示名称 (Label)
    pub name: String,

    /// 描述 (Detail)
    pub description: String,

    pub cpu_count: u32,

    /// 内存 (MB)
    pub ram_mb: u64,

    /// 根磁盘 (GB)
    pub root_volume_gb: u64,

    pub architecture: Architecture,
}

/// 创建虚拟机参数
#[derive(Debug, Clone, Default)]
pub struct VmLaunchOptions {
    pub name: String,

    /// 描述，云平台不保存，只写入返回的虚拟机
    pub description: Option<String>,

    pub product_id: String,
    pub image_id: String,

    /// Windows 镜像的初始用户名
    pub username: Option<String>,

    /// Unix 镜像使用的密钥，缺省时自动选择或创建
    pub keypair: Option<String>,

    pub vlan_id: Option<String>,

    /// 静态 IP 地址 ID，第一个作为主地址，其余最多 3 个作为辅助地址
    pub static_ip_ids: Vec<String>,

    /// `key=value` 格式的用户数据，每行一个参数
    pub user_data: Option<String>,
}

// ============================================
// 镜像
// ============================================

/// 机器镜像
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineImage {
    /// 镜像 ID
    pub id: String,

    /// 名称
    pub name: String,

    /// 描述 (缺省为 `名称 [#ID]`)
    pub description: String,

    /// 所属区域
    pub region_id: String,

    /// 所有者
    pub owner: Option<String>,

    /// 生命周期状态
    pub state: ImageState,

    /// 操作系统
    pub platform: Platform,

    /// 架构
    pub architecture: Architecture,

    /// 可见性 (PUBLIC/PRIVATE/SHARED)
    pub visibility: Option<String>,

    /// 创建时间
    pub created: Option<DateTime<Utc>>,
}

/// 镜像查询条件
#[derive(Debug, Clone, Default)]
pub struct ImageFilter {
    /// 只返回该账号拥有的镜像
    pub owner: Option<String>,

    /// 名称或描述包含的关键字 (忽略大小写)
    pub keyword: Option<String>,

    pub platform: Option<Platform>,

    pub architecture: Option<Architecture>,
}

// ============================================
// 网络
// ============================================

/// 静态 IP 地址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddress {
    /// 地址 ID
    pub id: String,

    /// 地址值 (分配完成前可能为空)
    pub address: Option<String>,

    /// 地址类型
    pub address_type: AddressType,

    /// 所属区域
    pub region_id: String,

    /// 绑定的虚拟机
    pub server_id: Option<String>,

    /// 云平台原始状态码
    pub state_code: Option<String>,
}

impl IpAddress {
    /// 状态码 2 表示空闲可用
    pub fn is_available(&self) -> bool {
        self.state_code.as_deref() == Some("2")
    }
}

/// IP 地址规格
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressOffering {
    pub id: String,
    pub address_type: AddressType,
}

/// VLAN
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vlan {
    pub id: String,
    pub name: String,
    pub description: String,
    pub region_id: String,
}

// ============================================
// 身份
// ============================================

/// SSH 密钥
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypair {
    /// 密钥名称 (同时作为 ID)
    pub name: String,

    /// 公钥
    pub public_key: Option<String>,

    /// 私钥 (仅创建时返回)
    #[serde(skip_serializing)]
    pub private_key: Option<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_guess() {
        assert_eq!(Platform::guess("Microsoft Windows Server 2008 R2"), Platform::Windows);
        assert_eq!(Platform::guess("Red Hat Enterprise Linux 6.3"), Platform::RedHat);
        assert_eq!(Platform::guess("SUSE Linux Enterprise Server 11"), Platform::Suse);
        assert_eq!(Platform::guess("IBM DB2 Express-C on Linux"), Platform::Unix);
        assert_eq!(Platform::guess("WebSphere Portal"), Platform::Unknown);
    }

    #[test]
    fn test_platform_families() {
        assert!(Platform::Windows.is_windows());
        assert!(!Platform::Windows.is_unix());
        assert!(Platform::RedHat.is_unix());
        assert!(!Platform::Unknown.is_unix());
        assert!(!Platform::Unknown.is_windows());
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(serde_json::to_string(&VmState::Running).unwrap(), "\"RUNNING\"");
        assert_eq!(serde_json::to_string(&Architecture::I64).unwrap(), "\"I64\"");
    }

    #[test]
    fn test_raw_offering() {
        let offering = StorageOffering {
            id: "20001208".to_string(),
            sizes: vec![10, 25],
            formats: vec!["ext3".to_string(), "raw".to_string()],
        };
        assert!(offering.is_raw());
    }
}
