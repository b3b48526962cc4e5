//! SSH 密钥命令

use anyhow::{Context as _, Result};

use sce_cloud::Keypair;

use crate::commands::common::{list_resources, Context};
use crate::commands::output::{or_dash, TableRow};
use crate::KeypairAction;

impl TableRow for Keypair {
    fn headers() -> Vec<&'static str> {
        vec!["名称", "公钥"]
    }

    fn row(&self) -> Vec<String> {
        let public = self.public_key.as_deref().map(|key| {
            // 公钥太长，只显示开头
            key.chars().take(40).collect::<String>()
        });
        vec![self.name.clone(), or_dash(public.as_deref())]
    }
}

pub async fn handle(ctx: &Context, action: KeypairAction) -> Result<()> {
    let keys = ctx.client.keypair();
    match action {
        KeypairAction::List => list_resources(ctx, &keys).await?,
        KeypairAction::Create { name, output } => {
            let keypair = keys.create(&name).await.context("创建 SSH 密钥失败")?;
            let private = keypair
                .private_key
                .context("云平台没有返回私钥")?;
            tokio::fs::write(&output, &private)
                .await
                .with_context(|| format!("写入私钥失败: {}", output))?;
            restrict_permissions(&output).await?;
            println!("✅ 密钥已创建: {}，私钥已写入 {}", keypair.name, output);
        }
        KeypairAction::Delete { name } => {
            keys.delete(&name).await.context("删除 SSH 密钥失败")?;
            println!("✅ 已删除: {}", name);
        }
    }
    Ok(())
}

#[cfg(unix)]
async fn restrict_permissions(path: &str) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .with_context(|| format!("设置私钥权限失败: {}", path))
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &str) -> Result<()> {
    Ok(())
}
