//! 资源状态轮询
//!
//! 云端的创建/删除/挂载类操作都是异步完成的：HTTP 调用立即返回，
//! 资源在服务端继续变化状态。`Poller` 把“按固定间隔重新查询直到满足条件或超时”
//! 封装成一个可取消的通用原语，由各资源模块提供查询函数和完成条件。

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use sce_transport::SceError;

/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// 轮询结束但未满足条件
#[derive(Debug)]
pub enum PollError<T> {
    /// 查询返回空，资源已消失
    Vanished,
    /// 超过等待上限，携带最后一次查询到的快照
    Timeout { last: T, waited: Duration },
    Cancelled,
    /// 查询本身失败，原样传递
    Failed(SceError),
}

impl<T> PollError<T> {
    /// 转换为 `SceError`，`resource` 用于错误信息
    pub fn into_error(self, resource: &str) -> SceError {
        match self {
            PollError::Vanished => SceError::cloud(format!("{} 已不存在", resource)),
            PollError::Timeout { waited, .. } => SceError::PollTimeout {
                resource: resource.to_string(),
                waited,
            },
            PollError::Cancelled => SceError::Cancelled(resource.to_string()),
            PollError::Failed(e) => e,
        }
    }
}

/// 轮询器
#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    timeout: Duration,
    cancel: Option<CancellationToken>,
}

impl Poller {
    /// 创建轮询器，`timeout` 为本次等待的上限
    pub fn new(timeout: Duration) -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout,
            cancel: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_cancellation(mut self, token: Option<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 立即查询一次，之后按间隔重复查询，直到 `done` 返回 true
    ///
    /// 截止时间在开始时计算；每次等待不超过剩余时间，因此超时最多在
    /// `timeout` 之后一次查询的耗时内返回。
    pub async fn poll_until<T, F, Fut, P>(&self, mut fetch: F, done: P) -> Result<T, PollError<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = sce_transport::Result<Option<T>>>,
        P: Fn(&T) -> bool,
    {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut attempt = 0u32;

        loop {
            if self.is_cancelled() {
                return Err(PollError::Cancelled);
            }

            attempt += 1;
            let snapshot = match fetch().await {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => return Err(PollError::Vanished),
                Err(e) => return Err(PollError::Failed(e)),
            };

            if done(&snapshot) {
                debug!("轮询完成 (第 {} 次, 耗时 {:?})", attempt, started.elapsed());
                return Ok(snapshot);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PollError::Timeout {
                    last: snapshot,
                    waited: now - started,
                });
            }

            let pause = self.interval.min(deadline - now);
            debug!("等待资源状态变化... (第 {} 次, {:?} 后重试)", attempt, pause);

            match &self.cancel {
                Some(token) => {
                    tokio::select! {
                        _ = token.cancelled() => return Err(PollError::Cancelled),
                        _ = sleep(pause) => {}
                    }
                }
                None => sleep(pause).await,
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|t| t.is_cancelled()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_first_satisfying_snapshot() {
        let calls = counter();
        let poller = Poller::new(Duration::from_secs(600));

        let result = poller
            .poll_until(
                || {
                    let calls = calls.clone();
                    async move { Ok(Some(calls.fetch_add(1, Ordering::SeqCst) + 1)) }
                },
                |n| *n == 3,
            )
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_carries_last_snapshot() {
        let calls = counter();
        let started = Instant::now();
        let poller = Poller::new(Duration::from_secs(60));

        let result = poller
            .poll_until(
                || {
                    let calls = calls.clone();
                    async move { Ok(Some(calls.fetch_add(1, Ordering::SeqCst))) }
                },
                |_| false,
            )
            .await;

        match result {
            Err(PollError::Timeout { last, waited }) => {
                assert_eq!(last, 4);
                assert!(waited >= Duration::from_secs(60));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(started.elapsed() <= Duration::from_secs(60) + DEFAULT_POLL_INTERVAL);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_wait_is_clamped_to_deadline() {
        let calls = counter();
        let started = Instant::now();
        let poller = Poller::new(Duration::from_secs(20));

        let result = poller
            .poll_until(
                || {
                    let calls = calls.clone();
                    async move { Ok(Some(calls.fetch_add(1, Ordering::SeqCst))) }
                },
                |_| false,
            )
            .await;

        assert!(matches!(result, Err(PollError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(20) && elapsed < Duration::from_secs(21));
    }

    #[tokio::test(start_paused = true)]
    async fn test_vanished_returns_without_waiting() {
        let started = Instant::now();
        let poller = Poller::new(Duration::from_secs(1200));

        let result = poller
            .poll_until(|| async { Ok(None::<u32>) }, |_| true)
            .await;

        assert!(matches!(result, Err(PollError::Vanished)));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_is_propagated() {
        let poller = Poller::new(Duration::from_secs(60));
        let result = poller
            .poll_until(
                || async { Err::<Option<u32>, _>(SceError::Transport("connection reset".into())) },
                |_| true,
            )
            .await;

        match result {
            Err(PollError::Failed(SceError::Transport(msg))) => assert_eq!(msg, "connection reset"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_sleep() {
        let token = CancellationToken::new();
        let poller = Poller::new(Duration::from_secs(1200)).with_cancellation(Some(token.clone()));
        let started = Instant::now();

        let canceller = tokio::spawn(async move {
            sleep(Duration::from_secs(20)).await;
            token.cancel();
        });

        let result = poller
            .poll_until(|| async { Ok(Some(0u32)) }, |_| false)
            .await;

        assert!(matches!(result, Err(PollError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(30));
        canceller.await.unwrap();
    }

    #[test]
    fn test_into_error() {
        let err = PollError::<u32>::Timeout {
            last: 1,
            waited: Duration::from_secs(1200),
        }
        .into_error("存储卷 vol-1");
        assert!(matches!(err, SceError::PollTimeout { ref resource, .. } if resource == "存储卷 vol-1"));
        assert!(err.to_string().contains("1200"));

        assert!(matches!(
            PollError::<u32>::Vanished.into_error("vm-1"),
            SceError::Cloud(_)
        ));
    }
}
