// target.rs
use super::ScanError;
use std::fmt;
use url::Url;

/// URL模板中payload的占位符
pub const PLACEHOLDER: char = '*';

/// 含唯一占位符的URL模板
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    template: String,
}

impl Target {
    /// 解析目标URL.
    ///
    /// 含一个 `*` 时直接作为模板; 不含占位符但带查询参数时, 占位符追加到查询串末尾,
    /// 即payload拼接在最后一个参数的原值之后.
    pub fn parse(raw: &str) -> Result<Self, ScanError> {
        let raw = raw.trim();
        if !raw.starts_with("http://") && !raw.starts_with("https://") {
            return Err(ScanError::InvalidTarget(format!("请输入正确的URL: {}", raw)));
        }

        match raw.matches(PLACEHOLDER).count() {
            1 => Ok(Self { template: raw.to_string() }),
            0 => Self::from_bare(raw),
            n => Err(ScanError::InvalidTarget(format!("URL中只能有一个占位符, 实际有 {} 个: {}", n, raw))),
        }
    }

    fn from_bare(raw: &str) -> Result<Self, ScanError> {
        let mut url = Url::parse(raw)
            .map_err(|e| ScanError::InvalidTarget(format!("URL解析失败 {}: {}", raw, e)))?;
        url.set_fragment(None);

        let query = match url.query() {
            Some(q) if !q.is_empty() => q.to_string(),
            _ => {
                return Err(ScanError::InvalidTarget(format!("URL没有占位符也没有查询参数: {}", raw)));
            }
        };

        let mut template = url.to_string();
        // to_string() 以查询串结尾 (片段已移除)
        debug_assert!(template.ends_with(&query));
        template.push(PLACEHOLDER);
        Ok(Self { template })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// 用payload替换占位符; `#` 会被编码以免截断为URL片段
    pub fn inject(&self, payload: &str) -> String {
        self.template.replacen(PLACEHOLDER, &payload.replace('#', "%23"), 1)
    }

    /// 去掉占位符后的URL, 用于基线请求
    pub fn stripped(&self) -> String {
        self.template.replacen(PLACEHOLDER, "", 1)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}
