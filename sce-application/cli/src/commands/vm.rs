//! 虚拟机命令

use anyhow::{Context as _, Result};
use tracing::info;

use sce_cloud::{VirtualMachine, VmLaunchOptions, VmProduct};

use crate::commands::common::{list_resources, parse_architecture, show_resource, Context};
use crate::commands::output::{format_time, or_dash, output_list, output_one, TableRow};
use crate::VmAction;

impl TableRow for VirtualMachine {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "名称", "状态", "规格", "平台", "地址", "启动时间"]
    }

    fn row(&self) -> Vec<String> {
        let addresses = self
            .public_addresses
            .iter()
            .chain(&self.private_addresses)
            .cloned()
            .collect::<Vec<_>>()
            .join(",");
        vec![
            self.id.clone(),
            self.name.clone(),
            format!("{:?}", self.state),
            or_dash(self.product_id.as_deref()),
            format!("{:?}", self.platform),
            if addresses.is_empty() { "-".to_string() } else { addresses },
            format_time(self.created.as_ref()),
        ]
    }
}

impl TableRow for VmProduct {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "名称", "CPU", "内存(MB)", "磁盘(GB)"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.cpu_count.to_string(),
            self.ram_mb.to_string(),
            self.root_volume_gb.to_string(),
        ]
    }
}

pub async fn handle(ctx: &Context, action: VmAction) -> Result<()> {
    let vms = ctx.client.vm();
    match action {
        VmAction::List => list_resources(ctx, &vms).await?,
        VmAction::Get { id } => show_resource(ctx, &vms, &id).await?,
        VmAction::Products { arch } => {
            let products = vms
                .list_products(parse_architecture(&arch)?)
                .await
                .context("查询实例规格失败")?;
            output_list(&products, ctx.format)?;
        }
        VmAction::Launch {
            name,
            description,
            product,
            image,
            username,
            keypair,
            vlan,
            ips,
            user_data,
        } => {
            let user_data = match user_data {
                Some(path) => Some(
                    tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("读取用户数据失败: {}", path))?,
                ),
                None => None,
            };

            let vm = vms
                .launch(&VmLaunchOptions {
                    name,
                    description,
                    product_id: product,
                    image_id: image,
                    username,
                    keypair,
                    vlan_id: vlan,
                    static_ip_ids: ips,
                    user_data,
                })
                .await
                .context("创建虚拟机失败")?;

            output_one(&vm, ctx.format)?;
            if let (Some(user), Some(password)) = (&vm.root_user, &vm.root_password) {
                println!("\n初始用户: {}\n初始密码: {}", user, password);
            }
        }
        VmAction::Clone {
            id,
            name,
            description,
        } => {
            info!("克隆虚拟机 {}，需要等待镜像捕获完成 (Ctrl-C 取消)", id);
            let vm = vms
                .clone(&id, &name, &description)
                .await
                .context("克隆虚拟机失败")?;
            output_one(&vm, ctx.format)?;
        }
        VmAction::Terminate { id } => {
            vms.terminate(&id).await.context("删除虚拟机失败")?;
            println!("✅ 已提交删除: {}", id);
        }
        VmAction::Reboot { id } => {
            vms.reboot(&id).await.context("重启虚拟机失败")?;
            println!("✅ 已提交重启: {}", id);
        }
        VmAction::Console { id } => {
            let output = vms.console_output(&id).await.context("获取控制台输出失败")?;
            print!("{}", output);
        }
    }
    Ok(())
}
