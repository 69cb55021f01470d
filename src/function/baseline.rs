// baseline.rs
use super::probe::Probe;
use super::target::Target;
use tracing::{debug, warn};

/// 未注入payload时的参考响应, 仅联合查询模式使用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Baseline {
    pub body: String,
    pub length: usize,
}

impl Baseline {
    pub fn new(body: String) -> Self {
        let length = body.len();
        Self { body, length }
    }
}

/// 对去掉占位符的URL发起一次请求.
///
/// 网络错误或非成功状态码返回 `None` (基线不可用), 判定器据此降级,
/// 而不是与空页面比较.
pub async fn fetch_baseline<P: Probe + ?Sized>(probe: &P, target: &Target) -> Option<Baseline> {
    let url = target.stripped();
    match probe.fetch(&url).await {
        Ok(observation) if observation.status_ok => {
            debug!(url = %url, length = observation.body.len(), "基线获取成功");
            Some(Baseline::new(observation.body))
        }
        Ok(_) => {
            warn!(url = %url, "基线请求返回非成功状态码, 联合查询检测降级为仅标记匹配");
            None
        }
        Err(e) => {
            warn!(url = %url, error = %e, "基线请求失败, 联合查询检测降级为仅标记匹配");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::ScanError;
    use crate::function::probe::Observation;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct StubProbe {
        response: Result<(bool, &'static str), ()>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Probe for StubProbe {
        async fn fetch(&self, url: &str) -> Result<Observation, ScanError> {
            self.seen.lock().unwrap().push(url.to_string());
            match self.response {
                Ok((status_ok, body)) => Ok(Observation {
                    elapsed: Duration::from_millis(5),
                    status_ok,
                    body: body.to_string(),
                }),
                Err(()) => Err(ScanError::NetworkError("connection refused".into())),
            }
        }
    }

    fn stub(response: Result<(bool, &'static str), ()>) -> StubProbe {
        StubProbe { response, seen: Mutex::new(Vec::new()) }
    }

    #[tokio::test]
    async fn fetches_stripped_url_once() {
        let probe = stub(Ok((true, "<html>item</html>")));
        let target = Target::parse("http://test/item?id=*").unwrap();

        let baseline = fetch_baseline(&probe, &target).await.unwrap();
        assert_eq!(baseline.length, 17);
        assert_eq!(*probe.seen.lock().unwrap(), vec!["http://test/item?id=".to_string()]);
    }

    #[tokio::test]
    async fn failures_mark_baseline_unavailable() {
        let target = Target::parse("http://test/item?id=*").unwrap();
        assert!(fetch_baseline(&stub(Err(())), &target).await.is_none());
        assert!(fetch_baseline(&stub(Ok((false, "not found"))), &target).await.is_none());
    }

    #[tokio::test]
    async fn empty_page_is_still_a_baseline() {
        let target = Target::parse("http://test/item?id=*").unwrap();
        let baseline = fetch_baseline(&stub(Ok((true, ""))), &target).await;
        assert_eq!(baseline, Some(Baseline::new(String::new())));
    }
}
