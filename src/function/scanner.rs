// scanner.rs
use super::{Config, ScanError, ScanSettings};
use super::baseline::fetch_baseline;
use super::crawler::Crawler;
use super::payload::{load_lines, load_payloads, load_urls};
use super::probe::{build_client, HttpProbe, Probe};
use super::report::{ConsoleSink, Finding, ReportSink};
use super::target::{Target, PLACEHOLDER};
use super::verifier::verify;
use super::vulnerability::{DetectionMode, ErrorCatalog, ModeSelection, Oracle, UnionMarkers};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// 每种检测模式对应的payload集合, 按执行顺序排列
#[derive(Debug, Clone)]
pub struct ScanPlan {
    sweeps: Vec<(DetectionMode, Arc<Vec<String>>)>,
}

impl ScanPlan {
    pub fn new(selection: ModeSelection, mut payloads: HashMap<DetectionMode, Vec<String>>) -> Result<Self, ScanError> {
        let mut sweeps = Vec::new();
        for mode in selection.modes() {
            match payloads.remove(&mode) {
                Some(list) if !list.is_empty() => sweeps.push((mode, Arc::new(list))),
                _ => {
                    return Err(ScanError::InvalidConfig(format!("模式 '{}' 缺少payload", mode)));
                }
            }
        }
        Ok(Self { sweeps })
    }

    pub fn from_config(config: &Config) -> Result<Self, ScanError> {
        let mut payloads = HashMap::new();
        for mode in config.mode.modes() {
            let path = config.payload_file(mode).ok_or_else(|| {
                ScanError::InvalidConfig(format!("模式 '{}' 需要 --{}-payload 参数", config.mode, mode))
            })?;
            let list = load_payloads(path)?;
            info!(mode = %mode, count = list.len(), "已加载payload");
            payloads.insert(mode, list);
        }
        Self::new(config.mode, payloads)
    }

    pub fn modes(&self) -> Vec<DetectionMode> {
        self.sweeps.iter().map(|(mode, _)| *mode).collect()
    }

    pub fn payload_count(&self) -> usize {
        self.sweeps.iter().map(|(_, list)| list.len()).sum()
    }
}

/// 检测引擎: 对每个目标按模式依次扫描, 模式内按payload并发
pub struct Scanner {
    probe: Arc<dyn Probe>,
    settings: ScanSettings,
    catalog: Arc<ErrorCatalog>,
    markers: Arc<UnionMarkers>,
    sink: Arc<dyn ReportSink>,
    show_progress: bool,
}

impl Scanner {
    pub fn new(
        probe: Arc<dyn Probe>,
        settings: ScanSettings,
        catalog: ErrorCatalog,
        sink: Arc<dyn ReportSink>,
    ) -> Result<Self, ScanError> {
        settings.validate()?;
        let markers = UnionMarkers::new(&settings.union_markers)?;
        Ok(Self {
            probe,
            settings,
            catalog: Arc::new(catalog),
            markers: Arc::new(markers),
            sink,
            show_progress: false,
        })
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// 扫描单个目标, 返回确认的漏洞数.
    /// 每个模式的全部任务结束后才开始下一个模式.
    pub async fn scan_target(&self, target: &Target, plan: &ScanPlan) -> usize {
        let mut confirmed = 0;
        for (mode, payloads) in &plan.sweeps {
            let oracle = self.oracle_for(*mode, target).await;
            confirmed += self.sweep(target, Arc::new(oracle), Arc::clone(payloads)).await;
        }
        confirmed
    }

    async fn oracle_for(&self, mode: DetectionMode, target: &Target) -> Oracle {
        match mode {
            DetectionMode::Time => Oracle::Time {
                threshold: self.settings.time_threshold,
            },
            DetectionMode::Error => Oracle::Error {
                catalog: Arc::clone(&self.catalog),
            },
            DetectionMode::Union => Oracle::Union {
                baseline: fetch_baseline(self.probe.as_ref(), target).await,
                slack: self.settings.union_slack,
                markers: Arc::clone(&self.markers),
            },
        }
    }

    async fn sweep(&self, target: &Target, oracle: Arc<Oracle>, payloads: Arc<Vec<String>>) -> usize {
        let mode = oracle.mode();
        let pb = self.progress_bar(payloads.len() as u64, mode);
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency));
        let mut workers = JoinSet::new();

        for payload in payloads.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let probe = Arc::clone(&self.probe);
            let oracle = Arc::clone(&oracle);
            let sink = Arc::clone(&self.sink);
            let url = target.inject(&payload);
            let candidate = target.template().to_string();
            let attempts = self.settings.verify_attempts;
            let delay = self.settings.verify_delay;
            let pb = pb.clone();

            workers.spawn(async move {
                // 发起请求前获取许可, 任务结束时释放
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return false;
                };

                let probe_ref: &dyn Probe = probe.as_ref();
                let url_ref: &str = &url;
                let evidence = verify(
                    move || probe_ref.fetch(url_ref),
                    |observation| oracle.classify(observation),
                    attempts,
                    delay,
                )
                .await;

                pb.inc(1);
                match evidence {
                    Some(evidence) => {
                        sink.report(&Finding::new(candidate, mode, payload, evidence));
                        true
                    }
                    None => {
                        debug!(mode = %mode, payload = %payload, "未确认");
                        false
                    }
                }
            });
        }

        let mut confirmed = 0;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(true) => confirmed += 1,
                Ok(false) => {}
                Err(e) => warn!(mode = %mode, error = %e, "检测任务异常退出"),
            }
        }

        pb.finish_and_clear();
        confirmed
    }

    fn progress_bar(&self, len: u64, mode: DetectionMode) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("##-"));
        }
        pb.set_message(format!("{} 模式", mode));
        pb
    }
}

/// 扫描摘要
#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub targets_scanned: usize,
    pub findings: usize,
    pub scan_duration: u64,
}

pub async fn run_scan(config: Config) -> Result<ScanSummary, ScanError> {
    // 验证配置, 读取全部输入文件, 任何错误都在发起网络请求之前返回
    config.validate()?;
    let settings = config.settings()?;
    let plan = ScanPlan::from_config(&config)?;

    let catalog = match &config.error_patterns {
        Some(path) => ErrorCatalog::default().with_extra(load_lines(path, "报错指纹")?),
        None => ErrorCatalog::default(),
    };
    let user_agents = match &config.user_agent_file {
        Some(path) => load_lines(path, "UA")?,
        None => Vec::new(),
    };
    let listed_targets = match &config.list {
        Some(path) => Some(
            load_urls(path)?
                .iter()
                .map(|raw| Target::parse(raw))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        None => None,
    };

    confirm_authorization(&config)?;

    println!("正在初始化扫描...");

    // 初始化客户端
    let client = build_client(&settings, config.proxy.as_deref())?;
    let probe: Arc<dyn Probe> = Arc::new(HttpProbe::new(client, user_agents, config.auth_token.clone()));

    let targets = match (listed_targets, &config.url) {
        (Some(targets), _) => targets,
        (None, Some(url)) if url.contains(PLACEHOLDER) => vec![Target::parse(url)?],
        (None, Some(url)) => {
            println!("正在爬取带查询参数的URL...");
            Crawler::new(Arc::clone(&probe), config.depth, config.max_pages)
                .discover(url)
                .await?
        }
        (None, None) => return Err(ScanError::InvalidConfig("必须指定 --url 或 --list".into())),
    };
    println!("已加载 {} 个目标, {} 个payload", targets.len(), plan.payload_count());

    let sink: Arc<dyn ReportSink> = Arc::new(ConsoleSink::new(config.json));
    let scanner = Scanner::new(probe, settings, catalog, sink)?
        .with_progress(!config.no_progress && !config.json);

    let start_time = Instant::now();
    let mut findings = 0;
    for target in &targets {
        info!(url = %target, "正在扫描");
        findings += scanner.scan_target(target, &plan).await;
    }

    let summary = ScanSummary {
        targets_scanned: targets.len(),
        findings,
        scan_duration: start_time.elapsed().as_secs(),
    };

    if !config.json {
        print_summary(&summary, &plan);
    }

    Ok(summary)
}

fn confirm_authorization(config: &Config) -> Result<(), ScanError> {
    if config.yes {
        return Ok(());
    }
    let confirmed = Confirm::new()
        .with_prompt("是否已获得对目标进行安全测试的明确授权?")
        .default(false)
        .interact()?;
    if !confirmed {
        return Err(ScanError::Aborted("未确认授权".into()));
    }
    Ok(())
}

fn print_summary(summary: &ScanSummary, plan: &ScanPlan) {
    let modes = plan
        .modes()
        .iter()
        .map(|mode| mode.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    println!("\n=== 扫描摘要 ===");
    println!("检测模式: {}", modes);
    println!("扫描目标数: {}", summary.targets_scanned);
    println!("扫描时间: {}秒", summary.scan_duration);

    if summary.findings > 0 {
        println!("确认漏洞: {}项", summary.findings);
    } else {
        println!("未发现SQL注入漏洞");
    }
}
