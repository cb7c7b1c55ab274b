//! 客户端配置
//!
//! 读取优先级：
//! 1. 配置文件 `~/.config/notify-center/config.json`
//! 2. 环境变量 `NOTIFY_CENTER_URL` / `NOTIFY_CENTER_TOKEN` / `NOTIFY_CENTER_PAGE_SIZE`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 默认后端地址
const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// 默认分页大小
const DEFAULT_PAGE_SIZE: u32 = 20;

/// 默认长轮询窗口（秒）
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 55;

/// 客户端配置
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 后端基础地址
    pub base_url: String,
    /// 会话 token，随每个请求发送
    pub session_token: String,
    /// 列表分页大小
    pub page_size: u32,
    /// 推送长轮询窗口（秒）
    pub poll_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            session_token: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
        }
    }
}

/// 配置文件形态，所有字段可缺省
#[derive(Debug, Default, Serialize, Deserialize)]
struct FileConfig {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    session_token: Option<String>,
    #[serde(default)]
    page_size: Option<u32>,
    #[serde(default)]
    poll_timeout_secs: Option<u64>,
}

impl ClientConfig {
    /// 配置目录
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("notify-center")
    }

    /// 配置文件路径
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// 自动加载：默认值 <- 配置文件 <- 环境变量
    pub fn auto_load() -> Result<Self> {
        let mut config = Self::default();

        let path = Self::config_path();
        if path.exists() {
            config.apply_file(&Self::load_file(&path)?);
            debug!(path = %path.display(), "config file loaded");
        }

        config.apply_env();
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<FileConfig> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    fn apply_file(&mut self, file: &FileConfig) {
        if let Some(url) = &file.base_url {
            self.base_url = url.clone();
        }
        if let Some(token) = &file.session_token {
            self.session_token = token.clone();
        }
        if let Some(size) = file.page_size {
            self.page_size = size;
        }
        if let Some(secs) = file.poll_timeout_secs {
            self.poll_timeout_secs = secs;
        }
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("NOTIFY_CENTER_URL") {
            if !url.is_empty() {
                self.base_url = url;
            }
        }
        if let Ok(token) = std::env::var("NOTIFY_CENTER_TOKEN") {
            if !token.is_empty() {
                self.session_token = token;
            }
        }
        if let Ok(size) = std::env::var("NOTIFY_CENTER_PAGE_SIZE") {
            if let Ok(size) = size.parse() {
                self.page_size = size;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.page_size, 20);
        assert!(config.session_token.is_empty());
    }

    #[test]
    fn test_load_file_overlays_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"base_url": "https://admin.example.com", "session_token": "tok-1"}"#,
        )
        .unwrap();

        let mut config = ClientConfig::default();
        config.apply_file(&ClientConfig::load_file(&path).unwrap());

        assert_eq!(config.base_url, "https://admin.example.com");
        assert_eq!(config.session_token, "tok-1");
        // 未出现的字段保持默认
        assert_eq!(config.page_size, 20);
        assert_eq!(config.poll_timeout_secs, 55);
    }

    #[test]
    fn test_load_file_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{broken").unwrap();

        assert!(ClientConfig::load_file(&path).is_err());
    }

    #[test]
    fn test_partial_file_config() {
        let file: FileConfig = serde_json::from_str(r#"{"page_size": 50}"#).unwrap();
        let mut config = ClientConfig::default();
        config.apply_file(&file);
        assert_eq!(config.page_size, 50);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}
