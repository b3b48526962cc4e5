//! 集成测试公共设施：本地 mock 云平台
//!
//! 每条路由对应一个响应序列，按请求顺序依次返回，最后一个响应重复使用，
//! 用于模拟资源状态随轮询逐步变化。

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::Router;

use sce_cloud::{PollConfig, ProviderContext, SceClient, TransportConfig};

pub const ACCOUNT: &str = "20012345";
pub const REGION: &str = "41";

const PREFIX: &str = "/api/rest/";

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub body: String,
}

impl Recorded {
    /// 解码表单请求体
    pub fn form(&self) -> Vec<(String, String)> {
        self.body
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (
                    urlencoding::decode(k).unwrap().into_owned(),
                    urlencoding::decode(v).unwrap().into_owned(),
                )
            })
            .collect()
    }

    pub fn param(&self, name: &str) -> Option<String> {
        self.form()
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    pub fn params(&self, name: &str) -> Vec<String> {
        self.form()
            .into_iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v)
            .collect()
    }
}

#[derive(Default)]
struct MockState {
    routes: HashMap<(String, String), Vec<(u16, String)>>,
    requests: Vec<Recorded>,
}

type Shared = Arc<Mutex<MockState>>;

async fn handler(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    body: String,
) -> (StatusCode, String) {
    let path = uri.path().trim_start_matches(PREFIX).to_string();
    let mut state = state.lock().unwrap();
    state.requests.push(Recorded {
        method: method.to_string(),
        path: path.clone(),
        body,
    });

    match state.routes.get_mut(&(method.to_string(), path)) {
        Some(responses) => {
            let (status, body) = if responses.len() > 1 {
                responses.remove(0)
            } else {
                responses[0].clone()
            };
            (StatusCode::from_u16(status).unwrap(), body)
        }
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}

pub struct MockCloud {
    endpoint: String,
    state: Shared,
}

impl MockCloud {
    pub async fn start() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("sce_cloud=debug,sce_transport=debug")
            .try_init();

        let state: Shared = Arc::new(Mutex::new(MockState::default()));
        let app = Router::new().fallback(handler).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            endpoint: format!("http://{}/api/rest", addr),
            state,
        }
    }

    /// 固定响应
    pub fn route(&self, method: &str, path: &str, status: u16, body: &str) {
        self.sequence(method, path, &[(status, body)]);
    }

    /// 依次返回的响应序列
    pub fn sequence(&self, method: &str, path: &str, responses: &[(u16, &str)]) {
        self.state.lock().unwrap().routes.insert(
            (method.to_string(), path.to_string()),
            responses
                .iter()
                .map(|(s, b)| (*s, b.to_string()))
                .collect(),
        );
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, method: &str, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests_to(method, path).len()
    }

    pub fn context(&self, region: &str) -> ProviderContext {
        ProviderContext::new(&self.endpoint, ACCOUNT, region)
            .with_credentials(b"alice@example.com", b"s3cret")
    }

    /// 轮询间隔缩短到 10ms 的客户端
    pub fn client_in(&self, region: &str) -> SceClient {
        SceClient::new(
            &self.context(region),
            TransportConfig::default(),
            PollConfig::default(),
        )
        .unwrap()
        .with_poll_interval(Duration::from_millis(10))
    }

    pub fn client(&self) -> SceClient {
        self.client_in(REGION)
    }
}
