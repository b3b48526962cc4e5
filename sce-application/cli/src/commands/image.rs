//! 镜像命令

use anyhow::{Context as _, Result};
use tracing::info;

use sce_cloud::MachineImage;

use crate::commands::common::{parse_architecture, parse_platform, show_resource, Context};
use crate::commands::output::{format_time, or_dash, output_list, output_one, TableRow};
use crate::ImageAction;

impl TableRow for MachineImage {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "名称", "状态", "平台", "架构", "所有者", "创建时间"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            format!("{:?}", self.state),
            format!("{:?}", self.platform),
            format!("{:?}", self.architecture),
            or_dash(self.owner.as_deref()),
            format_time(self.created.as_ref()),
        ]
    }
}

pub async fn handle(ctx: &Context, action: ImageAction) -> Result<()> {
    let images = ctx.client.image();
    match action {
        ImageAction::List { owner } => {
            let found = match owner {
                Some(owner) => images.list_owned_by(&owner).await,
                None => images.list().await,
            }
            .context("查询镜像列表失败")?;
            output_list(&found, ctx.format)?;
        }
        ImageAction::Search {
            keyword,
            platform,
            arch,
        } => {
            let platform = platform.as_deref().map(parse_platform).transpose()?;
            let arch = arch.as_deref().map(parse_architecture).transpose()?;
            let found = images
                .search(keyword.as_deref(), platform, arch)
                .await
                .context("搜索镜像失败")?;
            output_list(&found, ctx.format)?;
        }
        ImageAction::Get { id } => show_resource(ctx, &images, &id).await?,
        ImageAction::Capture {
            vm,
            name,
            description,
        } => {
            let task = images.capture_async(&vm, &name, &description);
            info!("正在捕获虚拟机 {} 的镜像 (Ctrl-C 取消)", task.vm_id());
            let image = task.wait().await.context("捕获镜像失败")?;
            output_one(&image, ctx.format)?;
        }
        ImageAction::Remove { id } => {
            images.remove(&id).await.context("删除镜像失败")?;
            println!("✅ 已删除: {}", id);
        }
    }
    Ok(())
}
