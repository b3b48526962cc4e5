//! SCE CLI 应用

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "sce")]
#[command(about = "SmartCloud Enterprise 资源管理工具", long_about = None)]
#[command(version)]
struct Cli {
    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// 配置文件路径 (缺省按 SCE_CONFIG、./sce.toml、~/.config/sce/config.toml 查找)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// 输出格式 (table/json)
    #[arg(short = 'f', long, global = true, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 校验账号与凭据
    Context,

    /// 区域与数据中心
    Region {
        #[command(subcommand)]
        action: RegionAction,
    },

    /// 存储卷管理
    Volume {
        #[command(subcommand)]
        action: VolumeAction,
    },

    /// 虚拟机管理
    Vm {
        #[command(subcommand)]
        action: VmAction,
    },

    /// 镜像管理
    Image {
        #[command(subcommand)]
        action: ImageAction,
    },

    /// 静态 IP 管理
    Ip {
        #[command(subcommand)]
        action: IpAction,
    },

    /// VLAN 查询
    Vlan {
        #[command(subcommand)]
        action: VlanAction,
    },

    /// SSH 密钥管理
    Keypair {
        #[command(subcommand)]
        action: KeypairAction,
    },
}

#[derive(Subcommand)]
pub enum RegionAction {
    /// 列出区域
    List,
    /// 区域详情
    Get { id: String },
    /// 区域下的数据中心
    DataCenters { id: String },
}

#[derive(Subcommand)]
pub enum VolumeAction {
    /// 列出存储卷
    List,
    /// 存储卷详情
    Get { id: String },
    /// 列出存储卷产品
    Products,
    /// 创建存储卷
    Create {
        /// 名称
        name: String,
        /// 期望容量 (GB)
        #[arg(short, long, default_value = "10")]
        size: u64,
        /// 产品 ID (优先于容量)
        #[arg(long)]
        product: Option<String>,
        /// 从已有存储卷克隆
        #[arg(long, conflicts_with_all = ["product", "size"])]
        snapshot: Option<String>,
    },
    /// 挂载到虚拟机
    Attach {
        id: String,
        /// 虚拟机 ID
        #[arg(long)]
        vm: String,
        /// 设备名
        #[arg(long, default_value = "/dev/sdf")]
        device: String,
    },
    /// 从虚拟机卸载
    Detach { id: String },
    /// 删除存储卷
    Remove { id: String },
}

#[derive(Subcommand)]
pub enum VmAction {
    /// 列出虚拟机
    List,
    /// 虚拟机详情
    Get { id: String },
    /// 列出实例规格
    Products {
        /// 架构 (i32/i64)
        #[arg(long, default_value = "i64")]
        arch: String,
    },
    /// 创建虚拟机
    Launch {
        /// 名称
        name: String,
        /// 描述
        #[arg(long)]
        description: Option<String>,
        /// 实例规格 ID
        #[arg(long)]
        product: String,
        /// 镜像 ID
        #[arg(long)]
        image: String,
        /// Windows 初始用户名
        #[arg(long)]
        username: Option<String>,
        /// Unix 登录密钥
        #[arg(long)]
        keypair: Option<String>,
        /// VLAN ID
        #[arg(long)]
        vlan: Option<String>,
        /// 静态 IP 地址 ID (可重复，第一个为主地址)
        #[arg(long = "ip")]
        ips: Vec<String>,
        /// 用户数据文件 (key=value 格式)
        #[arg(long)]
        user_data: Option<String>,
    },
    /// 通过捕获镜像克隆虚拟机
    Clone {
        id: String,
        /// 新虚拟机名称
        name: String,
        /// 描述
        #[arg(long, default_value = "")]
        description: String,
    },
    /// 删除虚拟机
    Terminate { id: String },
    /// 重启虚拟机
    Reboot { id: String },
    /// 控制台输出
    Console { id: String },
}

#[derive(Subcommand)]
pub enum ImageAction {
    /// 列出当前账号的镜像
    List {
        /// 指定账号
        #[arg(long)]
        owner: Option<String>,
    },
    /// 搜索镜像
    Search {
        /// 名称或描述关键字
        keyword: Option<String>,
        /// 平台 (windows/unix/redhat/suse/...)
        #[arg(long)]
        platform: Option<String>,
        /// 架构 (i32/i64)
        #[arg(long)]
        arch: Option<String>,
    },
    /// 镜像详情
    Get { id: String },
    /// 从虚拟机捕获镜像并等待可用
    Capture {
        /// 虚拟机 ID
        vm: String,
        /// 镜像名称
        name: String,
        /// 描述
        #[arg(long, default_value = "")]
        description: String,
    },
    /// 删除镜像
    Remove { id: String },
}

#[derive(Subcommand)]
pub enum IpAction {
    /// 列出静态 IP
    List,
    /// 地址池
    Pool {
        /// 私网地址池
        #[arg(long)]
        private: bool,
        /// 只显示未分配的地址
        #[arg(long)]
        unassigned: bool,
    },
    /// 申请地址
    Request {
        /// 申请私网地址
        #[arg(long)]
        private: bool,
    },
    /// 释放地址
    Release { id: String },
}

#[derive(Subcommand)]
pub enum VlanAction {
    /// 列出 VLAN
    List,
    /// VLAN 中的虚拟机
    Members { id: String },
}

#[derive(Subcommand)]
pub enum KeypairAction {
    /// 列出密钥
    List,
    /// 创建密钥，私钥写入指定文件
    Create {
        name: String,
        /// 私钥输出路径
        #[arg(short, long)]
        output: String,
    },
    /// 删除密钥
    Delete { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志，RUST_LOG 优先；日志写到 stderr，避免干扰 JSON 输出
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("SCE CLI 启动");

    let ctx = commands::common::Context::load(cli.config.as_deref(), &cli.format)?;

    match cli.command {
        Commands::Context => commands::region::test_context(&ctx).await?,
        Commands::Region { action } => commands::region::handle(&ctx, action).await?,
        Commands::Volume { action } => commands::volume::handle(&ctx, action).await?,
        Commands::Vm { action } => commands::vm::handle(&ctx, action).await?,
        Commands::Image { action } => commands::image::handle(&ctx, action).await?,
        Commands::Ip { action } => commands::network::handle_ip(&ctx, action).await?,
        Commands::Vlan { action } => commands::network::handle_vlan(&ctx, action).await?,
        Commands::Keypair { action } => commands::keypair::handle(&ctx, action).await?,
    }

    Ok(())
}
