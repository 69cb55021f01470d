// report.rs
use super::vulnerability::DetectionMode;
use chrono::Local;
use serde::Serialize;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

/// 各检测模式的证据
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Evidence {
    Time {
        #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
        elapsed: Duration,
    },
    Error {
        pattern: String,
    },
    Union {
        /// 与基线的长度差, 基线不可用时为空
        length_delta: Option<i64>,
        markers_surfaced: bool,
    },
}

fn serialize_millis<S: serde::Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(elapsed.as_millis() as u64)
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evidence::Time { elapsed } => write!(f, "响应延迟 {:.2?}", elapsed),
            Evidence::Error { pattern } => write!(f, "匹配报错指纹 \"{}\"", pattern),
            Evidence::Union { length_delta: Some(delta), markers_surfaced } => {
                write!(f, "响应长度变化 {:+} 字节, 标记回显: {}", delta, markers_surfaced)
            }
            Evidence::Union { length_delta: None, .. } => write!(f, "标记回显 (基线不可用)"),
        }
    }
}

/// 已确认的漏洞
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub url: String,
    pub mode: DetectionMode,
    pub payload: String,
    pub evidence: Evidence,
    pub detected_at: String,
}

impl Finding {
    pub fn new(url: String, mode: DetectionMode, payload: String, evidence: Evidence) -> Self {
        Self {
            url,
            mode,
            payload,
            evidence,
            detected_at: Local::now().to_rfc3339(),
        }
    }
}

/// 接收扫描过程中逐条确认的漏洞
pub trait ReportSink: Send + Sync {
    fn report(&self, finding: &Finding);
}

/// 输出到标准输出, 每条漏洞一行
pub struct ConsoleSink {
    json: bool,
}

impl ConsoleSink {
    pub fn new(json: bool) -> Self {
        Self { json }
    }
}

impl ReportSink for ConsoleSink {
    fn report(&self, finding: &Finding) {
        if self.json {
            match serde_json::to_string(finding) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::error!(error = %e, "序列化漏洞结果失败"),
            }
        } else {
            println!(
                "[+] 存在漏洞 ({}): {} | payload: {} | {}",
                finding.mode, finding.url, finding.payload, finding.evidence
            );
        }
    }
}

/// 收集所有漏洞, 测试中替代控制台输出
#[derive(Default)]
pub struct CapturingSink {
    findings: Mutex<Vec<Finding>>,
}

impl CapturingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn findings(&self) -> Vec<Finding> {
        self.findings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ReportSink for CapturingSink {
    fn report(&self, finding: &Finding) {
        self.findings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(finding.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finding_serializes_with_tagged_evidence() {
        let finding = Finding::new(
            "http://test/item?id=*".to_string(),
            DetectionMode::Time,
            "1' AND SLEEP(6)--".to_string(),
            Evidence::Time { elapsed: Duration::from_millis(6012) },
        );
        let value: serde_json::Value = serde_json::to_value(&finding).unwrap();
        assert_eq!(value["mode"], "time");
        assert_eq!(value["evidence"]["kind"], "time");
        assert_eq!(value["evidence"]["elapsed_ms"], 6012);
        assert_eq!(value["payload"], "1' AND SLEEP(6)--");
    }

    #[test]
    fn union_evidence_without_baseline() {
        let evidence = Evidence::Union { length_delta: None, markers_surfaced: true };
        let value = serde_json::to_value(&evidence).unwrap();
        assert!(value["length_delta"].is_null());
        assert_eq!(evidence.to_string(), "标记回显 (基线不可用)");
    }

    #[test]
    fn capturing_sink_keeps_every_report() {
        let sink = CapturingSink::new();
        let finding = Finding::new(
            "http://test/?q='".to_string(),
            DetectionMode::Error,
            "'".to_string(),
            Evidence::Error { pattern: "SQL syntax".to_string() },
        );
        sink.report(&finding);
        sink.report(&finding);
        assert_eq!(sink.findings().len(), 2);
    }
}
