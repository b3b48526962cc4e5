//! SSH 密钥 API
//!
//! 密钥以名称标识；私钥只在创建时返回一次。

use async_trait::async_trait;
use tracing::info;

use sce_transport::{Element, Result, SceError};

use crate::api::ResourceSupport;
use crate::client::SceClient;
use crate::mapping::{map_all, map_first, text_of, FromXmlNode, MappingScope};
use crate::models::Keypair;

impl FromXmlNode for Keypair {
    const TAG: &'static str = "PublicKey";

    fn from_node(node: &Element, _scope: &MappingScope<'_>) -> Option<Self> {
        Some(Keypair {
            name: node.child("KeyName").and_then(text_of)?,
            public_key: node.child("KeyMaterial").and_then(text_of),
            private_key: None,
        })
    }
}

/// 创建响应中的 `<PrivateKey>`，`KeyMaterial` 为私钥
fn to_private_keypair(node: &Element) -> Option<Keypair> {
    Some(Keypair {
        name: node.child("KeyName").and_then(text_of)?,
        public_key: None,
        private_key: node
            .child("KeyMaterial")
            .and_then(text_of)
            .map(String::into_bytes),
    })
}

/// SSH 密钥 API
pub struct KeypairApi<'a> {
    client: &'a SceClient,
}

impl<'a> KeypairApi<'a> {
    /// 创建新的 SSH 密钥 API 实例
    pub(crate) fn new(client: &'a SceClient) -> Self {
        Self { client }
    }

    /// 查询全部密钥
    pub async fn list(&self) -> Result<Vec<Keypair>> {
        info!("查询 SSH 密钥列表");
        let doc = self.client.transport().get_xml("keys").await?;
        Ok(doc
            .map(|doc| map_all(&doc, &self.client.scope()))
            .unwrap_or_default())
    }

    pub async fn get(&self, name: &str) -> Result<Option<Keypair>> {
        let doc = self
            .client
            .transport()
            .get_xml(&format!("keys/{}", name))
            .await?;
        Ok(doc.and_then(|doc| map_first(&doc, &self.client.scope())))
    }

    /// 创建密钥，返回带私钥的密钥对
    pub async fn create(&self, name: &str) -> Result<Keypair> {
        info!("创建 SSH 密钥: {}", name);
        let body = self
            .client
            .transport()
            .post("keys", &[("name", name.to_string())])
            .await?
            .ok_or_else(|| SceError::cloud("云平台接受了请求但没有返回密钥信息"))?;
        let doc = self.client.transport().parse(&body)?;

        let mut keypair = doc
            .elements_by_tag_name("PrivateKey")
            .into_iter()
            .find_map(to_private_keypair)
            .ok_or_else(|| SceError::cloud("响应中没有密钥"))?;

        if let Some(public) = self.get(name).await? {
            keypair.public_key = public.public_key;
        }
        Ok(keypair)
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        info!("删除 SSH 密钥: {}", name);
        self.client
            .transport()
            .delete(&format!("keys/{}", name))
            .await
    }

    /// 云平台不提供指纹，以密钥名称代替
    pub async fn fingerprint(&self, name: &str) -> Result<Option<String>> {
        Ok(self.get(name).await?.map(|k| k.name))
    }

    pub async fn import(&self, _name: &str, _public_key: &str) -> Result<Keypair> {
        Err(SceError::unsupported("导入 SSH 密钥"))
    }
}

#[async_trait]
impl<'a> ResourceSupport for KeypairApi<'a> {
    type Resource = Keypair;

    fn resource_kind(&self) -> &'static str {
        "keypair"
    }

    async fn list(&self) -> Result<Vec<Keypair>> {
        KeypairApi::list(self).await
    }

    async fn get(&self, id: &str) -> Result<Option<Keypair>> {
        KeypairApi::get(self, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sce_transport::Document;

    #[test]
    fn test_public_and_private_keys() {
        let doc = Document::parse(
            r#"<DescribeKeysResponse>
  <PublicKey><KeyName>deploy</KeyName><KeyMaterial>ssh-rsa AAAAB3Nza deploy</KeyMaterial></PublicKey>
  <PublicKey><KeyMaterial>orphan</KeyMaterial></PublicKey>
</DescribeKeysResponse>"#,
        )
        .unwrap();
        let keys: Vec<Keypair> = map_all(
            &doc,
            &MappingScope {
                region_id: "41",
                account_number: "20012345",
            },
        );
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].public_key.as_deref(), Some("ssh-rsa AAAAB3Nza deploy"));

        let doc = Document::parse(
            "<CreateKeyResponse><PrivateKey><KeyName>k1</KeyName><KeyMaterial>-----BEGIN RSA</KeyMaterial></PrivateKey></CreateKeyResponse>",
        )
        .unwrap();
        let created = to_private_keypair(doc.elements_by_tag_name("PrivateKey")[0]).unwrap();
        assert_eq!(created.private_key.as_deref(), Some("-----BEGIN RSA".as_bytes()));
        assert!(created.public_key.is_none());
    }
}
