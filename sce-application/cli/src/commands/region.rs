//! 区域命令

use anyhow::{bail, Context as _, Result};

use sce_cloud::{DataCenter, Region};

use crate::commands::common::{list_resources, show_resource, Context};
use crate::commands::output::{output_list, TableRow};
use crate::RegionAction;

impl TableRow for Region {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "名称", "辖区", "块存储", "计算"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.jurisdiction.clone(),
            self.storage.to_string(),
            self.compute.to_string(),
        ]
    }
}

impl TableRow for DataCenter {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "名称", "区域"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.id.clone(), self.name.clone(), self.region_id.clone()]
    }
}

pub async fn handle(ctx: &Context, action: RegionAction) -> Result<()> {
    let regions = ctx.client.region();
    match action {
        RegionAction::List => list_resources(ctx, &regions).await?,
        RegionAction::Get { id } => show_resource(ctx, &regions, &id).await?,
        RegionAction::DataCenters { id } => {
            let centers = regions
                .list_data_centers(&id)
                .await
                .context("查询数据中心失败")?;
            output_list(&centers, ctx.format)?;
        }
    }
    Ok(())
}

/// 校验账号与凭据
pub async fn test_context(ctx: &Context) -> Result<()> {
    match ctx.client.test_context().await {
        Some(account) => {
            println!("✅ 账号有效: {}", account);
            Ok(())
        }
        None => bail!("账号或凭据无效: {}", ctx.client.account_number()),
    }
}
