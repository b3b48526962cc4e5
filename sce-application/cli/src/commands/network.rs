//! 静态 IP 与 VLAN 命令

use anyhow::{Context as _, Result};

use sce_cloud::{AddressType, IpAddress, Vlan};

use crate::commands::common::{list_resources, Context};
use crate::commands::output::{or_dash, output_list, TableRow};
use crate::{IpAction, VlanAction};

impl TableRow for IpAddress {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "地址", "类型", "虚拟机", "状态码"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            or_dash(self.address.as_deref()),
            format!("{:?}", self.address_type),
            or_dash(self.server_id.as_deref()),
            or_dash(self.state_code.as_deref()),
        ]
    }
}

impl TableRow for Vlan {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "名称", "区域"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.id.clone(), self.name.clone(), self.region_id.clone()]
    }
}

fn address_type(private: bool) -> AddressType {
    if private {
        AddressType::Private
    } else {
        AddressType::Public
    }
}

pub async fn handle_ip(ctx: &Context, action: IpAction) -> Result<()> {
    let ips = ctx.client.ip_address();
    match action {
        IpAction::List => list_resources(ctx, &ips).await?,
        IpAction::Pool {
            private,
            unassigned,
        } => {
            let pool = if private {
                ips.list_private_pool(unassigned).await
            } else {
                ips.list_public_pool(unassigned).await
            }
            .context("查询地址池失败")?;
            output_list(&pool, ctx.format)?;
        }
        IpAction::Request { private } => {
            let id = ips
                .request(address_type(private))
                .await
                .context("申请静态 IP 失败")?;
            println!("✅ 已分配: {}", id);
        }
        IpAction::Release { id } => {
            ips.release(&id).await.context("释放静态 IP 失败")?;
            println!("✅ 已释放: {}", id);
        }
    }
    Ok(())
}

pub async fn handle_vlan(ctx: &Context, action: VlanAction) -> Result<()> {
    let vlans = ctx.client.vlan();
    match action {
        VlanAction::List => list_resources(ctx, &vlans).await?,
        VlanAction::Members { id } => {
            let members = vlans
                .list_resources(&id)
                .await
                .context("查询 VLAN 中的虚拟机失败")?;
            output_list(&members, ctx.format)?;
        }
    }
    Ok(())
}
