// payload.rs
// 读取payload、URL列表、UA等按行分隔的输入文件
use super::ScanError;
use std::fs;
use std::path::Path;

/// 按行读取, 去除首尾空白并忽略空行, 保持原有顺序.
/// 过滤后为空视为错误, 避免空payload集合得出"未发现漏洞"的结论.
pub fn load_lines(path: &Path, what: &str) -> Result<Vec<String>, ScanError> {
    let content = fs::read_to_string(path)
        .map_err(|e| ScanError::IOError(format!("无法读取{}文件 {:?}: {}", what, path, e)))?;

    let lines = parse_lines(&content);

    if lines.is_empty() {
        return Err(ScanError::EmptyInput(format!("{}文件 {:?} 不包含有效内容", what, path)));
    }

    Ok(lines)
}

pub fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

pub fn load_payloads(path: &Path) -> Result<Vec<String>, ScanError> {
    load_lines(path, "payload")
}

pub fn load_urls(path: &Path) -> Result<Vec<String>, ScanError> {
    load_lines(path, "URL列表")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn skips_blank_lines_and_keeps_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "1' AND SLEEP(6)--\n\n  ' OR '1'='1  \n   \n\" UNION SELECT 1,2,3--\n").unwrap();

        let payloads = load_payloads(file.path()).unwrap();
        assert_eq!(
            payloads,
            vec![
                "1' AND SLEEP(6)--".to_string(),
                "' OR '1'='1".to_string(),
                "\" UNION SELECT 1,2,3--".to_string(),
            ]
        );
    }

    #[test]
    fn blank_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "\n   \n\t\n").unwrap();
        assert!(matches!(load_payloads(file.path()), Err(ScanError::EmptyInput(_))));
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = load_urls(Path::new("/nonexistent/urls.txt"));
        assert!(matches!(result, Err(ScanError::IOError(_))));
    }
}
