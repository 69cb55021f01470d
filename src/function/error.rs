//错误处理板块
use thiserror::Error;
use std::io;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("配置错误: {0}")]
    InvalidConfig(String),

    #[error("网络错误: {0}")]
    NetworkError(String),

    #[error("文件操作错误: {0}")]
    IOError(String),

    #[error("输入为空: {0}")]
    EmptyInput(String),

    #[error("无效目标: {0}")]
    InvalidTarget(String),

    #[error("请求失败: {0}")]
    RequestFailed(String),

    #[error("HTTP客户端错误: {0}")]
    ClientError(String),

    #[error("爬虫错误: {0}")]
    CrawlError(String),

    #[error("序列化错误: {0}")]
    SerializationError(String),

    #[error("扫描已取消: {0}")]
    Aborted(String),
}


impl From<io::Error> for ScanError {
    fn from(err: io::Error) -> Self {
        ScanError::IOError(err.to_string())
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ScanError::NetworkError(format!("请求超时: {}", err))
        } else if err.is_connect() {
            ScanError::NetworkError(format!("连接错误: {}", err))
        } else {
            ScanError::RequestFailed(format!("请求失败: {}", err))
        }
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::SerializationError(err.to_string())
    }
}

impl From<dialoguer::Error> for ScanError {
    fn from(err: dialoguer::Error) -> Self {
        ScanError::IOError(err.to_string())
    }
}
