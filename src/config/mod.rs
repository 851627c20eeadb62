//! 服务配置模块
//!
//! 配置来源优先级：环境变量 `TAWFIR_*` > 配置文件 `tawfir.toml` > 默认值

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;

/// 服务配置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// HTTP API 端口
    #[serde(default = "default_web_port")]
    pub web_port: u16,

    /// 数据库连接地址
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// JWT 密钥 (可选，默认从环境变量 JWT_SECRET 读取)
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// JWT 过期时间（小时）
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_hours: i64,

    /// 上传文件存储目录
    #[serde(default = "default_media_dir")]
    pub media_dir: String,

    /// Google OAuth 客户端 ID（用于校验 id_token 的 aud）
    #[serde(default)]
    pub google_client_id: Option<String>,

    /// 开发模式：跳过 Google 令牌的远程校验
    #[serde(default)]
    pub dev_mode: bool,

    /// Firebase 服务账号 JSON 文件路径，未配置时推送只写日志
    #[serde(default)]
    pub fcm_credentials_path: Option<String>,

    /// 过期推广扫描间隔（秒）
    #[serde(default = "default_expiry_sweep_interval")]
    pub expiry_sweep_interval_secs: u64,

    /// 日志文件目录（可选，按天滚动）
    #[serde(default)]
    pub log_dir: Option<String>,

    /// 初始管理员邮箱
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
}

fn default_web_port() -> u16 {
    8000
}

fn default_database_url() -> String {
    "sqlite://data/tawfir.db".to_string()
}

fn default_jwt_expiration() -> i64 {
    24 * 7
}

fn default_media_dir() -> String {
    "./media".to_string()
}

fn default_expiry_sweep_interval() -> u64 {
    3600
}

fn default_admin_email() -> String {
    "admin@tawfir.app".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web_port: default_web_port(),
            database_url: default_database_url(),
            jwt_secret: None,
            jwt_expiration_hours: default_jwt_expiration(),
            media_dir: default_media_dir(),
            google_client_id: None,
            dev_mode: false,
            fcm_credentials_path: None,
            expiry_sweep_interval_secs: default_expiry_sweep_interval(),
            log_dir: None,
            admin_email: default_admin_email(),
        }
    }
}

impl Config {
    /// 获取 JWT 密钥（优先从环境变量读取，其次从配置文件，最后自动生成）
    pub fn get_jwt_secret(&self) -> anyhow::Result<String> {
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            if !secret.is_empty() {
                return Ok(secret);
            }
        }

        if let Some(ref secret) = self.jwt_secret {
            if !secret.is_empty() {
                return Ok(secret.clone());
            }
        }

        Self::get_or_generate_jwt_secret()
    }

    /// 从文件获取或生成新的 JWT 密钥
    fn get_or_generate_jwt_secret() -> anyhow::Result<String> {
        let data_dir = PathBuf::from("./data");
        let secret_file = data_dir.join("jwt_secret.key");

        if secret_file.exists() {
            let secret = fs::read_to_string(&secret_file)
                .with_context(|| format!("无法读取 JWT 密钥文件: {}", secret_file.display()))?;
            let secret = secret.trim();
            if !secret.is_empty() {
                return Ok(secret.to_string());
            }
        }

        let secret = Self::generate_random_secret(64);

        if let Err(e) = fs::create_dir_all(&data_dir) {
            tracing::warn!("无法创建 data 目录: {}", e);
        } else if let Err(e) = fs::write(&secret_file, &secret) {
            tracing::warn!("无法保存 JWT 密钥到文件: {}", e);
        } else {
            tracing::info!("🔑 已生成并保存新的 JWT 密钥到: {}", secret_file.display());
        }

        Ok(secret)
    }

    fn generate_random_secret(length: usize) -> String {
        use rand::Rng;
        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/=";
        let mut rng = rand::rng();
        (0..length)
            .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
            .collect()
    }

    /// 用 `TAWFIR_*` 环境变量覆盖配置项
    fn apply_env_overrides(&mut self) {
        fn env(key: &str) -> Option<String> {
            std::env::var(key).ok().filter(|v| !v.is_empty())
        }

        if let Some(port) = env("TAWFIR_WEB_PORT").and_then(|v| v.parse().ok()) {
            self.web_port = port;
        }
        if let Some(url) = env("TAWFIR_DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(hours) = env("TAWFIR_JWT_EXPIRATION_HOURS").and_then(|v| v.parse().ok()) {
            self.jwt_expiration_hours = hours;
        }
        if let Some(dir) = env("TAWFIR_MEDIA_DIR") {
            self.media_dir = dir;
        }
        if let Some(id) = env("TAWFIR_GOOGLE_CLIENT_ID") {
            self.google_client_id = Some(id);
        }
        if let Some(flag) = env("TAWFIR_DEV_MODE").and_then(|v| v.parse().ok()) {
            self.dev_mode = flag;
        }
        if let Some(path) = env("TAWFIR_FCM_CREDENTIALS") {
            self.fcm_credentials_path = Some(path);
        }
        if let Some(secs) = env("TAWFIR_EXPIRY_SWEEP_INTERVAL").and_then(|v| v.parse().ok()) {
            self.expiry_sweep_interval_secs = secs;
        }
        if let Some(dir) = env("TAWFIR_LOG_DIR") {
            self.log_dir = Some(dir);
        }
        if let Some(email) = env("TAWFIR_ADMIN_EMAIL") {
            self.admin_email = email;
        }
    }
}

static CONFIG: OnceCell<Config> = OnceCell::const_new();

/// 获取全局配置
pub async fn get_config() -> &'static Config {
    CONFIG.get_or_init(init_config).await
}

/// 初始化配置
pub async fn init_config() -> Config {
    let config_paths = ["tawfir.toml", "../tawfir.toml"];

    let mut config = config_paths
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .and_then(|path| match load_file(path) {
            Ok(config) => {
                tracing::info!("📋 加载配置文件: {}", path.display());
                Some(config)
            }
            Err(e) => {
                tracing::error!("{:#}", e);
                None
            }
        })
        .unwrap_or_else(|| {
            tracing::warn!("未找到可用的配置文件，使用默认配置");
            Config::default()
        });

    config.apply_env_overrides();
    config
}

fn load_file(path: &Path) -> anyhow::Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            web_port = 9000
            google_client_id = "abc.apps.googleusercontent.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.web_port, 9000);
        assert_eq!(config.google_client_id.as_deref(), Some("abc.apps.googleusercontent.com"));
        assert_eq!(config.database_url, "sqlite://data/tawfir.db");
        assert_eq!(config.jwt_expiration_hours, 168);
        assert_eq!(config.expiry_sweep_interval_secs, 3600);
        assert!(!config.dev_mode);
    }

    #[test]
    fn test_configured_jwt_secret() {
        let config = Config {
            jwt_secret: Some("file-secret".to_string()),
            ..Config::default()
        };
        if std::env::var("JWT_SECRET").is_err() {
            assert_eq!(config.get_jwt_secret().unwrap(), "file-secret");
        }
    }
}
