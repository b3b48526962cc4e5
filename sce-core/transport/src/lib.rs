//! SCE 传输层
//!
//! 负责与云平台 REST 端点之间的带认证 HTTP 交换：
//!
//! - **端点配置** (`EndpointConfig`): 基础 URL、Basic 认证凭据、可选代理
//! - **传输客户端** (`SceTransport`): GET/POST/PUT/DELETE 与响应分类
//! - **XML 文档** (`Document`): 响应体解析
//! - **错误分类** (`SceError`)
//!
//! # 示例
//!
//! ```ignore
//! use sce_transport::{ProviderContext, SceTransport, TransportConfig};
//!
//! let ctx = ProviderContext::new("https://www-147.ibm.com/computecloud/enterprise/api/rest/20100331", "20012345", "41")
//!     .with_credentials(b"user@example.com", b"password");
//! let transport = SceTransport::from_context(&ctx, TransportConfig::default())?;
//!
//! if let Some(doc) = transport.get_xml("instances").await? {
//!     for instance in doc.elements_by_tag_name("Instance") {
//!         println!("{:?}", instance.child_text("ID"));
//!     }
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod xml;

pub use client::{classify, encode_form, HttpVerb, ResponseOutcome, SceTransport};
pub use config::{EndpointConfig, ProviderContext, ProxyConfig, TransportConfig};
pub use error::{Result, SceError, NO_EXPLANATION};
pub use xml::{Document, Element, XmlNode};
