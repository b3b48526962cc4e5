//! 存储卷命令

use anyhow::{Context as _, Result};
use tracing::info;

use sce_cloud::{Volume, VolumeCreateOptions, VolumeProduct};

use crate::commands::common::{list_resources, show_resource, Context};
use crate::commands::output::{format_time, or_dash, output_list, TableRow};
use crate::VolumeAction;

impl TableRow for Volume {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "名称", "容量(GB)", "状态", "虚拟机", "创建时间"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.size_gb.to_string(),
            format!("{:?}", self.state),
            or_dash(self.vm_id.as_deref()),
            format_time(self.created.as_ref()),
        ]
    }
}

impl TableRow for VolumeProduct {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "名称", "容量(GB)"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.id.clone(), self.name.clone(), self.size_gb.to_string()]
    }
}

pub async fn handle(ctx: &Context, action: VolumeAction) -> Result<()> {
    let volumes = ctx.client.volume();
    match action {
        VolumeAction::List => list_resources(ctx, &volumes).await?,
        VolumeAction::Get { id } => show_resource(ctx, &volumes, &id).await?,
        VolumeAction::Products => {
            let products = volumes.list_products().await.context("查询存储卷产品失败")?;
            output_list(&products, ctx.format)?;
        }
        VolumeAction::Create {
            name,
            size,
            product,
            snapshot,
        } => {
            let id = volumes
                .create(&VolumeCreateOptions {
                    name,
                    product_id: product,
                    size_gb: size,
                    snapshot_id: snapshot,
                })
                .await
                .context("创建存储卷失败")?;
            println!("✅ 存储卷已创建: {}", id);
        }
        VolumeAction::Attach { id, vm, device } => {
            info!("等待存储卷 {} 就绪后挂载 (Ctrl-C 取消)", id);
            volumes
                .attach(&id, &vm, &device)
                .await
                .context("挂载存储卷失败")?;
            println!("✅ 已提交挂载: {} -> {}", id, vm);
        }
        VolumeAction::Detach { id } => {
            volumes.detach(&id).await.context("卸载存储卷失败")?;
            println!("✅ 已提交卸载: {}", id);
        }
        VolumeAction::Remove { id } => {
            volumes.remove(&id).await.context("删除存储卷失败")?;
            println!("✅ 已删除: {}", id);
        }
    }
    Ok(())
}
