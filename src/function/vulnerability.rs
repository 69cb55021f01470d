// vulnerability.rs
// 漏洞判定: 时间盲注 / 报错注入 / 联合查询注入三种检测模式共用一个判定器
use super::ScanError;
use super::baseline::Baseline;
use super::probe::Observation;
use super::report::Evidence;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    Time,
    Error,
    Union,
}

impl DetectionMode {
    pub const ALL: [DetectionMode; 3] = [DetectionMode::Time, DetectionMode::Error, DetectionMode::Union];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMode::Time => "time",
            DetectionMode::Error => "error",
            DetectionMode::Union => "union",
        }
    }
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 命令行 `--mode` 的取值: 单一模式或 `all`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSelection {
    Single(DetectionMode),
    All,
}

impl ModeSelection {
    /// 按执行顺序返回选中的模式 (all 时依次为 time, error, union)
    pub fn modes(&self) -> Vec<DetectionMode> {
        match self {
            ModeSelection::Single(mode) => vec![*mode],
            ModeSelection::All => DetectionMode::ALL.to_vec(),
        }
    }

    pub fn includes(&self, mode: DetectionMode) -> bool {
        match self {
            ModeSelection::Single(selected) => *selected == mode,
            ModeSelection::All => true,
        }
    }
}

impl FromStr for ModeSelection {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "time" => Ok(ModeSelection::Single(DetectionMode::Time)),
            "error" => Ok(ModeSelection::Single(DetectionMode::Error)),
            "union" => Ok(ModeSelection::Single(DetectionMode::Union)),
            "all" => Ok(ModeSelection::All),
            other => Err(ScanError::InvalidConfig(format!(
                "检测模式必须为 time、error、union 或 all, 实际为 '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ModeSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeSelection::Single(mode) => mode.fmt(f),
            ModeSelection::All => f.write_str("all"),
        }
    }
}

// 内置的数据库报错指纹, 区分大小写
const DEFAULT_ERROR_FINGERPRINTS: &[&str] = &[
    // MySQL
    "You have an error in your SQL syntax",
    "mysql_fetch",
    "mysql_num_rows",
    "MySQL server version",
    "Warning: mysql_",
    "mysqli_",
    // PostgreSQL
    "PostgreSQL query failed",
    "pg_query",
    "pg_exec",
    "PSQLException",
    "ERROR: syntax error at or near",
    // MSSQL
    "Microsoft SQL Server",
    "Unclosed quotation mark",
    "ODBC SQL Server Driver",
    "SQLServer JDBC Driver",
    "[SQL Server]",
    // Oracle
    "ORA-0",
    "ORA-1",
    "Oracle error",
    "quoted string not properly terminated",
    // SQLite
    "SQLite/JDBCDriver",
    "SQLite.Exception",
    "sqlite3.OperationalError",
    "SQLITE_ERROR",
    // 通用
    "SQL syntax",
    "Invalid query",
];

/// 报错指纹目录, 作为配置数据而不是判定逻辑的一部分
#[derive(Debug, Clone)]
pub struct ErrorCatalog {
    fingerprints: Vec<String>,
}

impl Default for ErrorCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_FINGERPRINTS.iter().map(|s| s.to_string()).collect())
    }
}

impl ErrorCatalog {
    pub fn new(fingerprints: Vec<String>) -> Self {
        Self { fingerprints }
    }

    /// 在内置目录后追加额外指纹 (已存在的忽略)
    pub fn with_extra<I>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        for pattern in extra {
            if !pattern.is_empty() && !self.fingerprints.contains(&pattern) {
                self.fingerprints.push(pattern);
            }
        }
        self
    }

    /// 返回第一个命中的指纹
    pub fn find_match(&self, body: &str) -> Option<&str> {
        self.fingerprints
            .iter()
            .find(|pattern| body.contains(pattern.as_str()))
            .map(|pattern| pattern.as_str())
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

/// 联合查询注入时回显的标记值, 按独立词匹配 ("1" 不会命中 "10").
/// 只在标记首尾为单词字符的一侧加 `\b`, 标点开头或结尾的标记照常匹配.
#[derive(Debug, Clone)]
pub struct UnionMarkers {
    matchers: Vec<Regex>,
}

impl UnionMarkers {
    pub fn new(tokens: &[String]) -> Result<Self, ScanError> {
        if tokens.is_empty() {
            return Err(ScanError::InvalidConfig("联合查询标记不能为空".into()));
        }
        let matchers = tokens
            .iter()
            .map(|token| {
                Regex::new(&marker_pattern(token))
                    .map_err(|e| ScanError::InvalidConfig(format!("无效的联合查询标记 '{}': {}", token, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { matchers })
    }

    pub fn all_present(&self, body: &str) -> bool {
        self.matchers.iter().all(|re| re.is_match(body))
    }

    pub fn none_present(&self, body: &str) -> bool {
        !self.matchers.iter().any(|re| re.is_match(body))
    }
}

fn marker_pattern(token: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut pattern = String::new();
    if token.starts_with(is_word) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(token));
    if token.ends_with(is_word) {
        pattern.push_str(r"\b");
    }
    pattern
}

/// 单次观测的判定器, 每种检测模式一个变体
#[derive(Debug, Clone)]
pub enum Oracle {
    Time {
        threshold: Duration,
    },
    Error {
        catalog: Arc<ErrorCatalog>,
    },
    Union {
        baseline: Option<Baseline>,
        slack: usize,
        markers: Arc<UnionMarkers>,
    },
}

impl Oracle {
    pub fn mode(&self) -> DetectionMode {
        match self {
            Oracle::Time { .. } => DetectionMode::Time,
            Oracle::Error { .. } => DetectionMode::Error,
            Oracle::Union { .. } => DetectionMode::Union,
        }
    }

    /// 判定单次观测, 阳性时返回证据
    pub fn classify(&self, observation: &Observation) -> Option<Evidence> {
        match self {
            Oracle::Time { threshold } => {
                // 边界包含: 恰好等于阈值也算阳性
                (observation.elapsed >= *threshold).then(|| Evidence::Time {
                    elapsed: observation.elapsed,
                })
            }
            Oracle::Error { catalog } => catalog
                .find_match(&observation.body)
                .map(|pattern| Evidence::Error {
                    pattern: pattern.to_string(),
                }),
            Oracle::Union { baseline, slack, markers } => {
                classify_union(observation, baseline.as_ref(), *slack, markers)
            }
        }
    }
}

fn classify_union(
    observation: &Observation,
    baseline: Option<&Baseline>,
    slack: usize,
    markers: &UnionMarkers,
) -> Option<Evidence> {
    let length = observation.body.len();
    match baseline {
        Some(baseline) => {
            let length_delta = length as i64 - baseline.length as i64;
            let grew = length > baseline.length.saturating_add(slack);
            let surfaced = markers.all_present(&observation.body) && markers.none_present(&baseline.body);
            (grew || surfaced).then_some(Evidence::Union {
                length_delta: Some(length_delta),
                markers_surfaced: surfaced,
            })
        }
        // 基线不可用: 无法判断长度增长, 只保留标记回显判定
        None => markers.all_present(&observation.body).then_some(Evidence::Union {
            length_delta: None,
            markers_surfaced: true,
        }),
    }
}
