//! 云平台状态码解码表
//!
//! `lookup_*` 为纯查表，未知编码返回 `None`；`decode_*` 在未知编码时
//! 退化为最保守的 PENDING 并记录告警，不会让单个新编码影响整批列表。

use tracing::warn;

use crate::models::{Architecture, ImageState, VmState, VolumeState};

pub fn lookup_volume_state(code: &str) -> Option<VolumeState> {
    match code {
        "0" | "1" | "2" | "7" | "12" | "13" | "14" => Some(VolumeState::Pending),
        "3" | "6" => Some(VolumeState::Deleted),
        "4" | "5" | "8" | "9" | "10" | "11" => Some(VolumeState::Available),
        _ => None,
    }
}

pub fn decode_volume_state(code: &str) -> VolumeState {
    lookup_volume_state(code).unwrap_or_else(|| {
        warn!("未知的存储卷状态码: {}", code);
        VolumeState::Pending
    })
}

pub fn lookup_vm_state(code: &str) -> Option<VmState> {
    match code {
        "0" | "1" | "4" | "6" | "9" | "14" | "15" => Some(VmState::Pending),
        "2" | "3" => Some(VmState::Terminated),
        "5" => Some(VmState::Running),
        "7" | "10" | "12" => Some(VmState::Stopping),
        "8" | "13" => Some(VmState::Rebooting),
        "11" => Some(VmState::Paused),
        _ => None,
    }
}

pub fn decode_vm_state(code: &str) -> VmState {
    lookup_vm_state(code).unwrap_or_else(|| {
        warn!("未知的虚拟机状态码: {}", code);
        VmState::Pending
    })
}

pub fn lookup_image_state(code: &str) -> Option<ImageState> {
    match code {
        "0" | "2" | "4" | "5" | "6" => Some(ImageState::Pending),
        "1" => Some(ImageState::Active),
        "3" | "7" => Some(ImageState::Deleted),
        _ => None,
    }
}

pub fn decode_image_state(code: &str) -> ImageState {
    lookup_image_state(code).unwrap_or_else(|| {
        warn!("未知的镜像状态码: {}", code);
        ImageState::Pending
    })
}

pub fn lookup_architecture(code: &str) -> Option<Architecture> {
    if code == "i386" {
        Some(Architecture::I32)
    } else if code.starts_with("x86") {
        Some(Architecture::I64)
    } else {
        None
    }
}

/// 镜像架构，未知时按 64 位处理
pub fn decode_architecture(code: &str) -> Architecture {
    lookup_architecture(code).unwrap_or_else(|| {
        warn!("未知的架构: {}", code);
        Architecture::I64
    })
}

/// 产品目录中的架构，未知时按 32 位处理
pub fn decode_catalog_architecture(code: &str) -> Architecture {
    lookup_architecture(code).unwrap_or_else(|| {
        warn!("产品目录中的未知架构: {}", code);
        Architecture::I32
    })
}

/// 地址状态码 4/5/6/7 表示已释放或失败，映射时直接丢弃
pub fn is_discarded_address_state(code: &str) -> bool {
    matches!(code, "4" | "5" | "6" | "7")
}

/// 区域名称到司法辖区
pub fn jurisdiction_for(region_name: &str) -> &'static str {
    if region_name.contains("Canada") {
        "CA"
    } else if region_name.contains("Germany") {
        "EU"
    } else if region_name.contains("Singapore") {
        "SG"
    } else if region_name.contains("Japan") {
        "JP"
    } else {
        "US"
    }
}
