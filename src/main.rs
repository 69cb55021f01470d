use anyhow::Result;
use structopt::StructOpt;
use sqli_scan::function::scanner::run_scan;
use sqli_scan::function::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 解析命令行参数
    let config = Config::from_args();

    // 2. 初始化日志, 输出到stderr, RUST_LOG 优先
    let default_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // 3. 执行扫描
    let summary = run_scan(config).await?;

    // 4. 显示摘要
    eprintln!("扫描完成！共确认 {} 项漏洞", summary.findings);
    Ok(())
}
