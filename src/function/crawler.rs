// crawler.rs
// 从根URL开始按层爬取同域链接, 收集带查询参数的URL作为候选目标
use super::ScanError;
use super::probe::Probe;
use super::target::Target;
use futures::stream::{self, StreamExt};
use scraper::{Html, Selector};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

const CRAWL_CONCURRENCY: usize = 10;

pub struct Crawler {
    probe: Arc<dyn Probe>,
    max_depth: usize,
    max_pages: usize,
}

impl Crawler {
    pub fn new(probe: Arc<dyn Probe>, max_depth: usize, max_pages: usize) -> Self {
        Self { probe, max_depth, max_pages }
    }

    /// 返回去重后的候选目标, 一个都没有时报错
    pub async fn discover(&self, root: &str) -> Result<Vec<Target>, ScanError> {
        let root = Url::parse(root)
            .map_err(|e| ScanError::CrawlError(format!("无效的根URL {}: {}", root, e)))?;
        let host = root
            .host_str()
            .ok_or_else(|| ScanError::CrawlError(format!("根URL缺少主机名: {}", root)))?
            .to_string();

        let mut visited: HashSet<String> = HashSet::new();
        let mut candidates: BTreeSet<String> = BTreeSet::new();
        let mut frontier = vec![without_fragment(root)];

        for depth in 0..=self.max_depth {
            if frontier.is_empty() {
                break;
            }

            let mut batch = Vec::new();
            for url in frontier.drain(..) {
                if visited.len() >= self.max_pages {
                    break;
                }
                if visited.insert(url.to_string()) {
                    if has_query(&url) {
                        candidates.insert(url.to_string());
                    }
                    batch.push(url);
                }
            }
            debug!(depth, pages = batch.len(), "爬取层级");

            // 同一层的页面并发抓取
            let pages = stream::iter(batch)
                .map(|url| {
                    let probe = Arc::clone(&self.probe);
                    async move {
                        let result = probe.fetch(url.as_str()).await;
                        (url, result)
                    }
                })
                .buffer_unordered(CRAWL_CONCURRENCY)
                .collect::<Vec<_>>()
                .await;

            for (url, result) in pages {
                let observation = match result {
                    Ok(obs) if obs.status_ok => obs,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(url = %url, error = %e, "爬取失败");
                        continue;
                    }
                };

                for link in extract_links(&url, &observation.body) {
                    if link.host_str() != Some(host.as_str()) {
                        continue;
                    }
                    if has_query(&link) {
                        candidates.insert(link.to_string());
                    }
                    if depth < self.max_depth && !visited.contains(link.as_str()) {
                        frontier.push(link);
                    }
                }
            }
        }

        let targets = candidates
            .iter()
            .filter_map(|url| match Target::parse(url) {
                Ok(target) => Some(target),
                Err(e) => {
                    debug!(url = %url, error = %e, "跳过无法作为目标的URL");
                    None
                }
            })
            .collect::<Vec<_>>();

        if targets.is_empty() {
            return Err(ScanError::CrawlError("未发现带查询参数的URL".into()));
        }
        info!(count = targets.len(), "爬取完成, 发现候选URL");

        Ok(targets)
    }
}

fn has_query(url: &Url) -> bool {
    url.query().is_some_and(|q| !q.is_empty())
}

fn without_fragment(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

// scraper::Html 不是 Send, 解析放在同步函数中完成
fn extract_links(base: &Url, body: &str) -> Vec<Url> {
    let document = Html::parse_document(body);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(without_fragment)
        .collect()
}
