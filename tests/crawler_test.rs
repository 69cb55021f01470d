use sqli_scan::function::crawler::Crawler;
use sqli_scan::function::probe::{HttpProbe, Probe};
use sqli_scan::function::ScanError;
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn http_fetcher() -> Arc<dyn Probe> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    Arc::new(HttpProbe::new(client, vec!["crawler-test/1.0".to_string()], None))
}

async fn page(server: &MockServer, route: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(server)
        .await;
}

#[tokio::test]
async fn discovers_same_host_links_with_query_strings() {
    let server = MockServer::start().await;
    page(
        &server,
        "/",
        r#"<html><body>
            <a href="/products?cat=1">products</a>
            <a href="/about">about</a>
            <a href="https://external.test/search?q=x">external</a>
        </body></html>"#,
    )
    .await;
    page(&server, "/about", r#"<a href="/item?id=7#reviews">item</a><a href="/products?cat=1">again</a>"#).await;

    let crawler = Crawler::new(http_fetcher(), 2, 50);
    let targets = crawler.discover(&server.uri()).await.unwrap();

    let templates: Vec<String> = targets.iter().map(|t| t.template().to_string()).collect();
    assert_eq!(
        templates,
        vec![
            format!("{}/item?id=7*", server.uri()),
            format!("{}/products?cat=1*", server.uri()),
        ]
    );
}

#[tokio::test]
async fn depth_limits_link_following() {
    let server = MockServer::start().await;
    page(&server, "/", r#"<a href="/level1">next</a>"#).await;
    page(&server, "/level1", r#"<a href="/level2">next</a>"#).await;
    page(&server, "/level2", r#"<a href="/deep?id=1">deep</a>"#).await;

    let shallow = Crawler::new(http_fetcher(), 1, 50);
    assert!(matches!(shallow.discover(&server.uri()).await, Err(ScanError::CrawlError(_))));

    let deep = Crawler::new(http_fetcher(), 2, 50);
    let targets = deep.discover(&server.uri()).await.unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].stripped(), format!("{}/deep?id=1", server.uri()));
}
