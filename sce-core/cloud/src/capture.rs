//! 异步镜像捕获任务

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sce_transport::{Result, SceError};

use crate::client::SceClient;
use crate::models::MachineImage;

/// 后台执行的镜像捕获
///
/// 任务先提交捕获请求，再等待镜像变为 ACTIVE。取消会立即中断
/// 正在进行的请求或等待，结果通过 [`ImageCaptureTask::wait`] 获取。
#[derive(Debug)]
pub struct ImageCaptureTask {
    vm_id: String,
    cancel: CancellationToken,
    handle: JoinHandle<Result<MachineImage>>,
}

impl ImageCaptureTask {
    pub(crate) fn spawn(client: SceClient, vm_id: &str, name: &str, description: &str) -> Self {
        // 客户端自身的取消令牌同样能终止该任务
        let cancel = client
            .cancellation()
            .map(CancellationToken::child_token)
            .unwrap_or_default();
        let client = client.with_cancellation(cancel.clone());

        let task_cancel = cancel.clone();
        let task_vm = vm_id.to_string();
        let name = name.to_string();
        let description = description.to_string();

        let handle = tokio::spawn(async move {
            let capture = async {
                let images = client.image();
                let image_id = images.capture(&task_vm, &name, &description).await?;
                info!("镜像 {} 已提交，等待可用", image_id);
                images.wait_until_active(&image_id).await
            };

            tokio::select! {
                _ = task_cancel.cancelled() => {
                    warn!("镜像捕获已取消: {}", task_vm);
                    Err(SceError::Cancelled(format!("捕获虚拟机 {} 的镜像", task_vm)))
                }
                result = capture => result,
            }
        });

        Self {
            vm_id: vm_id.to_string(),
            cancel,
            handle,
        }
    }

    pub fn vm_id(&self) -> &str {
        &self.vm_id
    }

    /// 请求取消，`wait` 随后返回 `Cancelled`
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// 等待任务结束，返回可用的镜像
    pub async fn wait(self) -> Result<MachineImage> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => {
                Err(SceError::Cancelled(format!("捕获虚拟机 {} 的镜像", self.vm_id)))
            }
            Err(e) => Err(SceError::Internal(format!("镜像捕获任务异常退出: {}", e))),
        }
    }
}
