//! XML 元素到资源实体的映射
//!
//! 每类资源实现 `FromXmlNode`：遍历 `<资源>` 元素的直接子元素，
//! 按标签名 (忽略大小写) 读取首个文本子节点，复合字段向下递归一层，
//! 未识别的标签忽略。缺少 ID 或不属于当前区域的元素返回 `None`。

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use sce_transport::{Document, Element};

/// 映射时需要的调用方上下文
#[derive(Debug, Clone, Copy)]
pub struct MappingScope<'a> {
    /// 当前区域，跨区域的资源会被过滤
    pub region_id: &'a str,
    pub account_number: &'a str,
}

pub trait FromXmlNode: Sized {
    /// 资源元素的标签名
    const TAG: &'static str;

    fn from_node(node: &Element, scope: &MappingScope<'_>) -> Option<Self>;
}

/// 映射文档中所有 `T::TAG` 元素，丢弃无效项
pub fn map_all<T: FromXmlNode>(doc: &Document, scope: &MappingScope<'_>) -> Vec<T> {
    doc.elements_by_tag_name(T::TAG)
        .into_iter()
        .filter_map(|node| T::from_node(node, scope))
        .collect()
}

/// 映射文档中第一个有效的 `T::TAG` 元素
pub fn map_first<T: FromXmlNode>(doc: &Document, scope: &MappingScope<'_>) -> Option<T> {
    doc.elements_by_tag_name(T::TAG)
        .into_iter()
        .find_map(|node| T::from_node(node, scope))
}

/// 非空文本
pub(crate) fn text_of(node: &Element) -> Option<String> {
    node.text().filter(|t| !t.is_empty()).map(str::to_string)
}

/// 解析云平台时间戳，格式为 `yyyy-MM-ddTHH:mm:ss[.SSS]Z`
///
/// 无法解析时返回 `None` 并记录告警，不影响其余字段
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    const FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.3fZ", "%Y-%m-%dT%H:%M:%SZ"];

    let parsed = FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc());

    if parsed.is_none() {
        warn!("无法解析时间戳: {}", value);
    }
    parsed
}

/// 私网地址: 10/8、192.168/16、169.254/16、172.16/12
pub fn is_private_address(ip: &str) -> bool {
    if ip.starts_with("10.") || ip.starts_with("192.168") || ip.starts_with("169.254") {
        return true;
    }
    if let Some(rest) = ip.strip_prefix("172.") {
        let parts: Vec<&str> = ip.split('.').collect();
        if parts.len() != 4 {
            return false;
        }
        if let Some(second) = rest.split('.').next().and_then(|s| s.parse::<u8>().ok()) {
            return (16..=31).contains(&second);
        }
    }
    false
}

pub(crate) fn push_unique(addresses: &mut Vec<String>, address: String) {
    if !addresses.contains(&address) {
        addresses.push(address);
    }
}
