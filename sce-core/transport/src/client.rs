//! SCE 传输客户端核心实现
//!
//! 每次调用完成一次带认证的 HTTP 交换，返回解析后的 XML 文档、
//! 文本响应或分类后的错误。这里不做任何自动重试，重试策略由调用方决定。

use reqwest::{Client, Method, Proxy};
use std::fmt;
use tracing::{debug, error};

use crate::config::{EndpointConfig, ProviderContext, TransportConfig};
use crate::error::{Result, SceError, NO_EXPLANATION};
use crate::xml::Document;

const WIRE: &str = "sce_transport::wire";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// HTTP 方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpVerb {
    fn method(self) -> Method {
        match self {
            HttpVerb::Get => Method::GET,
            HttpVerb::Post => Method::POST,
            HttpVerb::Put => Method::PUT,
            HttpVerb::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// 单次 HTTP 交换的结果分类
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    Success(String),
    /// 204 或空响应体
    SuccessEmpty,
    /// GET 返回 404，表示资源不存在而不是调用失败
    NotFound,
    Failure {
        status: u16,
        reason: String,
        body: String,
    },
}

impl ResponseOutcome {
    /// 转换为文本结果，`Failure` 变为协议错误
    pub fn into_body(self) -> Result<Option<String>> {
        match self {
            ResponseOutcome::Success(body) => Ok(Some(body)),
            ResponseOutcome::SuccessEmpty | ResponseOutcome::NotFound => Ok(None),
            ResponseOutcome::Failure {
                status,
                reason,
                body,
            } => Err(SceError::Protocol {
                status,
                reason,
                body,
            }),
        }
    }
}

/// 按 HTTP 方法对状态码分类
///
/// - GET: 200..=203 成功，404 为不存在
/// - POST/PUT: 200/201/202 成功，204 为空
/// - DELETE: 200/201/202/204 成功
pub fn classify(verb: HttpVerb, status: u16, reason: &str, body: Option<String>) -> ResponseOutcome {
    let success = match verb {
        HttpVerb::Get => {
            if status == 404 {
                return ResponseOutcome::NotFound;
            }
            (200..=203).contains(&status)
        }
        HttpVerb::Post | HttpVerb::Put => {
            if status == 204 {
                return ResponseOutcome::SuccessEmpty;
            }
            matches!(status, 200 | 201 | 202)
        }
        HttpVerb::Delete => matches!(status, 200 | 201 | 202 | 204),
    };

    if success {
        match body {
            Some(body) if !body.trim().is_empty() => ResponseOutcome::Success(body),
            _ => ResponseOutcome::SuccessEmpty,
        }
    } else {
        ResponseOutcome::Failure {
            status,
            reason: reason.to_string(),
            body: body
                .filter(|b| !b.trim().is_empty())
                .unwrap_or_else(|| NO_EXPLANATION.to_string()),
        }
    }
}

/// 表单编码 (UTF-8)，保持参数顺序
pub fn encode_form(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// SCE 传输客户端
#[derive(Clone)]
pub struct SceTransport {
    endpoint: EndpointConfig,
    config: TransportConfig,
    http_client: Client,
}

impl SceTransport {
    /// 创建新的传输客户端
    pub fn new(endpoint: EndpointConfig, config: TransportConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .danger_accept_invalid_certs(!config.verify_ssl);

        if let Some(proxy) = endpoint.proxy() {
            debug!("使用 HTTP 代理: {}", proxy.url());
            let proxy = Proxy::all(proxy.url())
                .map_err(|e| SceError::Configuration(format!("无效的代理配置: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let http_client = builder
            .build()
            .map_err(|e| SceError::Configuration(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            endpoint,
            config,
            http_client,
        })
    }

    /// 直接从宿主上下文创建
    pub fn from_context(ctx: &ProviderContext, config: TransportConfig) -> Result<Self> {
        Self::new(EndpointConfig::from_context(ctx)?, config)
    }

    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    /// GET 并解析为 XML 文档，404 或空响应返回 `None`
    pub async fn get_xml(&self, path: &str) -> Result<Option<Document>> {
        match self.exchange(HttpVerb::Get, path, &[]).await? {
            ResponseOutcome::Success(body) => Ok(Some(self.parse(&body)?)),
            other => other.into_body().map(|_| None),
        }
    }

    /// 提交表单 (POST)
    pub async fn post(&self, path: &str, params: &[(&str, String)]) -> Result<Option<String>> {
        self.exchange(HttpVerb::Post, path, params).await?.into_body()
    }

    /// 提交表单 (PUT)，该云平台把挂载、重启、捕获镜像等操作都放在 PUT 上
    pub async fn put(&self, path: &str, params: &[(&str, String)]) -> Result<Option<String>> {
        self.exchange(HttpVerb::Put, path, params).await?.into_body()
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.exchange(HttpVerb::Delete, path, &[]).await?.into_body().map(|_| ())
    }

    pub fn parse(&self, body: &str) -> Result<Document> {
        Document::parse(body)
    }

    /// 执行一次 HTTP 交换并分类响应
    pub async fn exchange(
        &self,
        verb: HttpVerb,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<ResponseOutcome> {
        let url = self.endpoint.resolve(path)?;
        debug!("SCE API 请求: {} {}", verb, url);

        let mut request = self
            .http_client
            .request(verb.method(), url.clone())
            .basic_auth(self.endpoint.username(), Some(self.endpoint.password()))
            .header("Accept", "text/xml");

        let form = match verb {
            HttpVerb::Post | HttpVerb::Put => {
                let form = encode_form(params);
                request = request
                    .header("Content-Type", FORM_CONTENT_TYPE)
                    .body(form.clone());
                Some(form)
            }
            _ => None,
        };

        if self.config.wire_log {
            debug!(target: WIRE, ">>> {} {}", verb, url);
            if let Some(form) = &form {
                debug!(target: WIRE, ">>> {}", form);
            }
        }

        let response = request.send().await.map_err(|e| {
            error!("SCE API 请求失败: {} {} - {}", verb, url, e);
            SceError::Transport(e.to_string())
        })?;

        let status = response.status();
        let reason = status.canonical_reason().unwrap_or("").to_string();
        debug!("SCE API 响应: {} {}", status.as_u16(), reason);

        let body = if status.is_success() {
            Some(
                response
                    .text()
                    .await
                    .map_err(|e| SceError::Transport(e.to_string()))?,
            )
        } else {
            // 错误响应体尽力读取
            response.text().await.ok()
        };

        if self.config.wire_log {
            debug!(target: WIRE, "<<< {} {}", status.as_u16(), reason);
            if let Some(body) = &body {
                debug!(target: WIRE, "<<< {}", body);
            }
        }

        let outcome = classify(verb, status.as_u16(), &reason, body);
        if let ResponseOutcome::Failure { status, body, .. } = &outcome {
            error!("SCE API 返回错误: {} {} - {} {}", verb, path, status, body);
        }
        Ok(outcome)
    }
}

impl fmt::Debug for SceTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceTransport")
            .field("endpoint", &self.endpoint)
            .field("config", &self.config)
            .finish()
    }
}
