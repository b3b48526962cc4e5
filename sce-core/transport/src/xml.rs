//! XML 文档模型
//!
//! 基于 quick-xml 构建的轻量 DOM，只保留资源映射需要的部分：
//! 元素、属性和文本节点。文档只在单次调用内使用，不做缓存。

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Result, SceError};

/// 子节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(Element),
    Text(String),
}

/// XML 元素
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl Element {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 标签名比较 (忽略大小写)
    pub fn is(&self, tag: &str) -> bool {
        self.name.eq_ignore_ascii_case(tag)
    }

    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// 第一个同名子元素 (忽略大小写)
    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.is(tag))
    }

    /// 第一个子节点为文本时返回去除首尾空白后的内容
    pub fn text(&self) -> Option<&str> {
        match self.children.first() {
            Some(XmlNode::Text(t)) => Some(t.trim()),
            _ => None,
        }
    }

    /// `child(tag)` 的文本
    pub fn child_text(&self, tag: &str) -> Option<&str> {
        self.child(tag).and_then(Element::text)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// 按文档顺序返回所有同名后代元素 (区分大小写，不含自身)
    pub fn elements_by_tag_name(&self, tag: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect_descendants(tag, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, tag: &str, found: &mut Vec<&'a Element>) {
        for child in self.child_elements() {
            if child.name == tag {
                found.push(child);
            }
            child.collect_descendants(tag, found);
        }
    }
}

/// 解析后的 XML 文档
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
}

impl Document {
    /// 解析 XML 文本，格式错误返回 `SceError::Internal`
    pub fn parse(body: &str) -> Result<Self> {
        let mut reader = Reader::from_str(body);
        reader.trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| xml_error(reader.buffer_position(), e))?;

            match event {
                Event::Start(start) => {
                    stack.push(open_element(&start)?);
                }
                Event::Empty(start) => {
                    let element = open_element(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| SceError::Internal("XML 结束标签不匹配".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let value = text
                        .unescape()
                        .map_err(|e| xml_error(reader.buffer_position(), e))?;
                    push_text(&mut stack, value.into_owned());
                }
                Event::CData(data) => {
                    let value = String::from_utf8(data.into_inner().into_owned())
                        .map_err(|e| SceError::Internal(format!("CDATA 不是合法的 UTF-8: {}", e)))?;
                    push_text(&mut stack, value);
                }
                Event::Eof => break,
                // 声明、注释、处理指令与映射无关
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(SceError::Internal("XML 文档未正常结束".to_string()));
        }

        root.map(|root| Self { root })
            .ok_or_else(|| SceError::Internal("XML 文档为空".to_string()))
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// 按文档顺序返回所有同名元素 (包含根元素)
    pub fn elements_by_tag_name(&self, tag: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        if self.root.name == tag {
            found.push(&self.root);
        }
        self.root.collect_descendants(tag, &mut found);
        found
    }
}

fn xml_error(position: usize, e: impl std::fmt::Display) -> SceError {
    SceError::Internal(format!("XML 解析错误 (位置 {}): {}", position, e))
}

fn open_element(start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(|e| SceError::Internal(format!("XML 属性错误: {}", e)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| SceError::Internal(format!("XML 属性错误: {}", e)))?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(SceError::Internal("XML 文档包含多个根元素".to_string())),
    }
    Ok(())
}

fn push_text(stack: &mut [Element], text: String) {
    // 根元素之外的文本忽略
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Text(text));
    }
}
