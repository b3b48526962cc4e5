//! CLI 命令处理模块

pub mod common; // 客户端创建与通用列表/详情输出
pub mod image;
pub mod keypair;
pub mod network; // 静态 IP 与 VLAN
pub mod output;
pub mod region;
pub mod vm;
pub mod volume;
