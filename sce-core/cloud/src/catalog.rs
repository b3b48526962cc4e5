//! 实例规格目录
//!
//! 从 `offerings/image` 中每个镜像支持的实例类型汇总而来，按架构分组。
//! 目录在客户端内只获取一次 (见 `SceClient::product_catalog`)。

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use sce_transport::{Document, Element};

use crate::codes::decode_catalog_architecture;
use crate::mapping::text_of;
use crate::models::{Architecture, VmProduct};

/// 规格 ID 中解析出的配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProductShape {
    pub cpu_count: u32,
    pub ram_mb: u64,
    pub root_volume_gb: u64,
}

/// 解析 `系列.CPU/内存MB/磁盘GB[*...]` 格式的规格 ID，无法解析的部分为 0
pub fn parse_product_shape(id: &str) -> ProductShape {
    let parts: Vec<&str> = id.split('/').collect();
    if parts.len() != 3 {
        return ProductShape::default();
    }

    let cpu = parts[0].rsplit('.').next().unwrap_or(parts[0]);
    let disk = match parts[2].find('*') {
        Some(idx) if idx > 0 => &parts[2][..idx],
        _ => parts[2],
    };

    ProductShape {
        cpu_count: cpu.parse().unwrap_or(0),
        ram_mb: parts[1].parse().unwrap_or(0),
        root_volume_gb: disk.parse().unwrap_or(0),
    }
}

/// 实例规格目录
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    products: HashMap<Architecture, Vec<VmProduct>>,
}

impl ProductCatalog {
    /// 从 `offerings/image` 文档构建，没有架构信息的镜像被忽略
    pub fn from_document(doc: &Document) -> Self {
        let mut grouped: HashMap<Architecture, BTreeMap<String, VmProduct>> = HashMap::new();

        for image in doc.elements_by_tag_name("Image") {
            let architecture = image
                .child_elements()
                .find(|e| e.is("Architecture"))
                .and_then(text_of)
                .map(|a| decode_catalog_architecture(&a));

            let Some(architecture) = architecture else {
                continue;
            };

            let entry = grouped.entry(architecture).or_default();
            for types in image.child_elements().filter(|e| e.is("SupportedInstanceTypes")) {
                for instance_type in types.child_elements().filter(|e| e.is("InstanceType")) {
                    if let Some(product) = to_product(instance_type, architecture) {
                        entry.insert(product.id.clone(), product);
                    }
                }
            }
        }

        Self {
            products: grouped
                .into_iter()
                .map(|(arch, products)| (arch, products.into_values().collect()))
                .collect(),
        }
    }

    /// 某架构下的全部规格，按 ID 排序
    pub fn products(&self, architecture: Architecture) -> &[VmProduct] {
        self.products
            .get(&architecture)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn find(&self, product_id: &str) -> Option<&VmProduct> {
        self.products
            .values()
            .flatten()
            .find(|p| p.id == product_id)
    }

    /// 共享的空目录，云平台没有返回规格时使用
    pub fn empty() -> &'static ProductCatalog {
        static EMPTY: OnceLock<ProductCatalog> = OnceLock::new();
        EMPTY.get_or_init(ProductCatalog::default)
    }

    pub fn is_empty(&self) -> bool {
        self.products.values().all(Vec::is_empty)
    }
}

// 产品字段名区分大小写
fn to_product(node: &Element, architecture: Architecture) -> Option<VmProduct> {
    let mut id = None;
    let mut label = None;
    let mut detail = None;

    for child in node.child_elements() {
        match child.name() {
            "ID" => id = text_of(child),
            "Label" => label = text_of(child),
            "Detail" => detail = text_of(child),
            _ => {}
        }
    }

    let id = id?;
    let shape = parse_product_shape(&id);
    Some(VmProduct {
        name: label.unwrap_or_else(|| id.clone()),
        description: detail.unwrap_or_default(),
        cpu_count: shape.cpu_count,
        ram_mb: shape.ram_mb,
        root_volume_gb: shape.root_volume_gb,
        architecture,
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFERINGS: &str = r#"<DescribeImagesResponse>
  <Image>
    <ID>20001150</ID>
    <Architecture>i386</Architecture>
    <SupportedInstanceTypes>
      <InstanceType><ID>COP32.1/2048/60</ID><Label>Copper 32 bit</Label><Detail>Copper - 1 CPU</Detail></InstanceType>
      <InstanceType><ID>BRZ32.1/2048/60*175</ID><Label>Bronze 32 bit</Label></InstanceType>
    </SupportedInstanceTypes>
  </Image>
  <Image>
    <ID>20001151</ID>
    <Architecture>x86_64</Architecture>
    <SupportedInstanceTypes>
      <InstanceType><ID>BRZ64.2/4096/60*500*350</ID><Label>Bronze 64 bit</Label></InstanceType>
    </SupportedInstanceTypes>
  </Image>
  <Image>
    <ID>20001152</ID>
    <Architecture>x86_64</Architecture>
    <SupportedInstanceTypes>
      <InstanceType><ID>BRZ64.2/4096/60*500*350</ID><Label>Bronze 64 bit</Label></InstanceType>
      <InstanceType><Label>no id</Label></InstanceType>
    </SupportedInstanceTypes>
  </Image>
  <Image>
    <ID>20001153</ID>
    <SupportedInstanceTypes>
      <InstanceType><ID>ORPHAN/1/1</ID></InstanceType>
    </SupportedInstanceTypes>
  </Image>
</DescribeImagesResponse>"#;

    #[test]
    fn test_parse_product_shape() {
        assert_eq!(
            parse_product_shape("COP32.1/2048/60"),
            ProductShape { cpu_count: 1, ram_mb: 2048, root_volume_gb: 60 }
        );
        assert_eq!(
            parse_product_shape("BRZ64.2/4096/60*500*350"),
            ProductShape { cpu_count: 2, ram_mb: 4096, root_volume_gb: 60 }
        );
        assert_eq!(parse_product_shape("garbage"), ProductShape::default());
        assert_eq!(parse_product_shape("x.y/abc/10").ram_mb, 0);
    }

    #[test]
    fn test_catalog_groups_by_architecture() {
        let doc = Document::parse(OFFERINGS).unwrap();
        let catalog = ProductCatalog::from_document(&doc);

        let i32_products = catalog.products(Architecture::I32);
        assert_eq!(i32_products.len(), 2);
        assert_eq!(i32_products[0].id, "BRZ32.1/2048/60*175");
        assert_eq!(i32_products[0].root_volume_gb, 60);
        assert_eq!(i32_products[1].name, "Copper 32 bit");

        // 重复的规格只保留一份
        let i64_products = catalog.products(Architecture::I64);
        assert_eq!(i64_products.len(), 1);
        assert_eq!(i64_products[0].cpu_count, 2);

        assert!(catalog.find("ORPHAN/1/1").is_none());
        assert_eq!(
            catalog.find("COP32.1/2048/60").map(|p| p.architecture),
            Some(Architecture::I32)
        );
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = ProductCatalog::default();
        assert!(catalog.is_empty());
        assert!(catalog.products(Architecture::I64).is_empty());
    }
}
