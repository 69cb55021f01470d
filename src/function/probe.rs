// probe.rs
use super::{ScanError, ScanSettings};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// 一次HTTP交互的观测结果
#[derive(Debug, Clone)]
pub struct Observation {
    pub elapsed: Duration,
    pub status_ok: bool,
    pub body: String,
}

/// 发起单次探测请求; 网络错误以 Err 返回
#[async_trait]
pub trait Probe: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Observation, ScanError>;
}

pub struct HttpProbe {
    client: Client,
    user_agents: Vec<String>,
    next_agent: AtomicUsize,
    auth_token: Option<String>,
}

impl HttpProbe {
    pub fn new(client: Client, user_agents: Vec<String>, auth_token: Option<String>) -> Self {
        let user_agents = if user_agents.is_empty() {
            vec![default_user_agent()]
        } else {
            user_agents
        };
        Self {
            client,
            user_agents,
            next_agent: AtomicUsize::new(0),
            auth_token,
        }
    }

    // 轮换UA
    fn user_agent(&self) -> &str {
        let idx = self.next_agent.fetch_add(1, Ordering::Relaxed) % self.user_agents.len();
        &self.user_agents[idx]
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn fetch(&self, url: &str) -> Result<Observation, ScanError> {
        let mut req_builder = self.client
            .get(url)
            .header("User-Agent", self.user_agent())
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8");

        if let Some(token) = &self.auth_token {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", token));
        }

        // 计时覆盖发送请求与读取完整响应体
        let start = Instant::now();
        let response = req_builder.send().await?;
        let status_ok = response.status().is_success();
        let body = response.text().await?;
        let elapsed = start.elapsed();

        Ok(Observation { elapsed, status_ok, body })
    }
}

pub fn default_user_agent() -> String {
    format!("sqli_scan/{}", env!("CARGO_PKG_VERSION"))
}

/// 按校验过的 `request_timeout` 构建共享客户端, 所有探测共用连接池
pub fn build_client(settings: &ScanSettings, proxy: Option<&str>) -> Result<Client, ScanError> {
    let builder = Client::builder().timeout(settings.request_timeout);

    let builder = match proxy {
        Some(proxy_url) => builder.proxy(
            reqwest::Proxy::all(proxy_url)
                .map_err(|e| ScanError::InvalidConfig(format!("代理 {} 无效: {}", proxy_url, e)))?,
        ),
        None => builder,
    };

    builder
        .build()
        .map_err(|e| ScanError::ClientError(format!("HTTP客户端初始化失败: {}", e)))
}
