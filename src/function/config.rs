// config.rs
use structopt::StructOpt;
use std::path::PathBuf;
use std::time::Duration;
use super::ScanError;
use super::vulnerability::{DetectionMode, ModeSelection};

#[derive(Debug, StructOpt)]
#[structopt(name = "sqli_scan", about = "基于时间/报错/联合查询三种判定方式的SQL注入检测工具")]
pub struct Config {
    /// 单个目标URL, 用 * 标记payload位置 (不含 * 时从该URL开始爬取)
    #[structopt(short, long)]
    pub url: Option<String>,

    /// URL列表文件 (每行一个)
    #[structopt(short, long)]
    pub list: Option<PathBuf>,

    /// 时间盲注payload文件
    #[structopt(long)]
    pub time_payload: Option<PathBuf>,

    /// 报错注入payload文件
    #[structopt(long)]
    pub error_payload: Option<PathBuf>,

    /// 联合查询注入payload文件
    #[structopt(long)]
    pub union_payload: Option<PathBuf>,

    /// 检测模式: time, error, union, all
    #[structopt(short, long, default_value = "time")]
    pub mode: ModeSelection,

    /// 最大并发payload数
    #[structopt(short, long, default_value = "20")]
    pub concurrency: usize,

    /// 时间盲注的响应时间阈值 (秒)
    #[structopt(long, default_value = "10")]
    pub mrt: u64,

    /// 每个payload的验证次数
    #[structopt(long, default_value = "3")]
    pub verify: u32,

    /// 两次验证之间的间隔 (毫秒)
    #[structopt(long, default_value = "12000")]
    pub verify_delay: u64,

    /// 请求超时时间 (秒), 必须大于 --mrt
    #[structopt(long, default_value = "30")]
    pub timeout: u64,

    /// 联合查询判定时允许的响应长度增量 (字节)
    #[structopt(long, default_value = "50")]
    pub union_slack: usize,

    /// 联合查询回显标记, 逗号分隔
    #[structopt(long, default_value = "1,2,3")]
    pub union_markers: String,

    /// 额外的数据库报错指纹文件 (每行一个)
    #[structopt(long)]
    pub error_patterns: Option<PathBuf>,

    /// 代理服务器 (例如: http://localhost:8080)
    #[structopt(long)]
    pub proxy: Option<String>,

    /// 认证令牌 (Bearer 令牌)
    #[structopt(long)]
    pub auth_token: Option<String>,

    /// User-Agent列表文件, 每行一个UA, 请求时轮换使用
    #[structopt(long)]
    pub user_agent_file: Option<PathBuf>,

    /// 爬取深度
    #[structopt(long, default_value = "2")]
    pub depth: usize,

    /// 最多爬取的页面数
    #[structopt(long, default_value = "200")]
    pub max_pages: usize,

    /// 以JSON行格式输出漏洞
    #[structopt(long)]
    pub json: bool,

    /// 不显示进度条
    #[structopt(long)]
    pub no_progress: bool,

    /// 跳过授权确认
    #[structopt(short, long)]
    pub yes: bool,

    /// 输出调试日志
    #[structopt(short, long)]
    pub verbose: bool,
}

impl Config {
    pub fn validate(&self) -> Result<(), ScanError> {
        // 目标来源
        match (&self.url, &self.list) {
            (None, None) => {
                return Err(ScanError::InvalidConfig("必须指定 --url 或 --list".into()));
            }
            (Some(_), Some(_)) => {
                return Err(ScanError::InvalidConfig("--url 与 --list 不能同时使用".into()));
            }
            (Some(url), None) => {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ScanError::InvalidConfig("请输入正确的URL".into()));
                }
            }
            (None, Some(list)) => {
                if !list.exists() {
                    return Err(ScanError::InvalidConfig(format!("URL列表文件不存在: {:?}", list)));
                }
            }
        }

        // 选中的模式必须有对应的payload文件
        for mode in self.mode.modes() {
            match self.payload_file(mode) {
                None => {
                    return Err(ScanError::InvalidConfig(format!(
                        "模式 '{}' 需要 --{}-payload 参数",
                        self.mode, mode
                    )));
                }
                Some(path) if !path.exists() => {
                    return Err(ScanError::InvalidConfig(format!("payload文件不存在: {:?}", path)));
                }
                Some(_) => {}
            }
        }

        // 验证令牌
        if let Some(token) = &self.auth_token {
            if token.trim().is_empty() {
                return Err(ScanError::InvalidConfig("认证令牌不能为空。".to_string()));
            }
        }

        // 验证代理
        if let Some(proxy) = &self.proxy {
            if !proxy.starts_with("http://") && !proxy.starts_with("https://") && !proxy.starts_with("socks5://") {
                return Err(ScanError::InvalidConfig("代理URL必须以http://、https://或socks5://开头".to_string()));
            }
        }

        if let Some(path) = &self.user_agent_file {
            if !path.exists() {
                return Err(ScanError::InvalidConfig("UA文件不存在。".to_string()));
            }
        }

        if self.depth == 0 || self.max_pages == 0 {
            return Err(ScanError::InvalidConfig("爬取深度与页面数必须大于0".into()));
        }

        self.settings()?.validate()
    }

    pub fn payload_file(&self, mode: DetectionMode) -> Option<&PathBuf> {
        match mode {
            DetectionMode::Time => self.time_payload.as_ref(),
            DetectionMode::Error => self.error_payload.as_ref(),
            DetectionMode::Union => self.union_payload.as_ref(),
        }
    }

    pub fn settings(&self) -> Result<ScanSettings, ScanError> {
        let union_markers = self.union_markers
            .split(',')
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .collect::<Vec<_>>();

        let settings = ScanSettings {
            concurrency: self.concurrency,
            time_threshold: Duration::from_secs(self.mrt),
            verify_attempts: self.verify,
            verify_delay: Duration::from_millis(self.verify_delay),
            request_timeout: Duration::from_secs(self.timeout),
            union_slack: self.union_slack,
            union_markers,
        };
        settings.validate()?;
        Ok(settings)
    }
}

/// 检测引擎参数
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub concurrency: usize,
    pub time_threshold: Duration,
    pub verify_attempts: u32,
    pub verify_delay: Duration,
    pub request_timeout: Duration,
    pub union_slack: usize,
    pub union_markers: Vec<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            concurrency: 20,
            time_threshold: Duration::from_secs(10),
            verify_attempts: 3,
            verify_delay: Duration::from_millis(12000),
            request_timeout: Duration::from_secs(30),
            union_slack: 50,
            union_markers: vec!["1".into(), "2".into(), "3".into()],
        }
    }
}

impl ScanSettings {
    pub fn validate(&self) -> Result<(), ScanError> {
        // 验证并发合理性
        if self.concurrency == 0 || self.concurrency > 100 {
            return Err(ScanError::InvalidConfig("并发数区间为1~100。".to_string()));
        }

        if self.verify_attempts == 0 {
            return Err(ScanError::InvalidConfig("验证次数至少为1。".to_string()));
        }

        if self.time_threshold.is_zero() {
            return Err(ScanError::InvalidConfig("时间阈值必须大于0。".to_string()));
        }

        // 超时不大于阈值时, 真实的慢响应会被当作网络错误
        if self.request_timeout <= self.time_threshold {
            return Err(ScanError::InvalidConfig(format!(
                "请求超时 ({:?}) 必须大于时间阈值 ({:?})",
                self.request_timeout, self.time_threshold
            )));
        }

        if self.union_markers.is_empty() {
            return Err(ScanError::InvalidConfig("联合查询标记不能为空".to_string()));
        }

        Ok(())
    }
}
