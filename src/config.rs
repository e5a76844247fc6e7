use serde::{Deserialize, Serialize};

/// 申报方截图允许的扩展名 (仅图片)
pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "heic"];

/// 银行流水允许的扩展名 (图片 + PDF)
pub const ALLOWED_STATEMENT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "heic", "pdf"];

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String, // 为空表示模型未配置, 所有提取请求快速失败
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

// api_key 不进日志
impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &if self.api_key.is_empty() { "<empty>" } else { "<redacted>" })
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub max_file_size: usize, // 字节
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5001,
            },
            gemini: GeminiConfig {
                api_key: String::new(),
                model: "gemini-2.5-flash-lite".to_string(),
                endpoint: "https://generativelanguage.googleapis.com".to_string(),
                timeout_secs: 30,
            },
            upload: UploadConfig {
                max_file_size: 16 * 1024 * 1024,
            },
        }
    }
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            server: ServerConfig {
                host: std::env::var("SERVER_HOST").unwrap_or(default.server.host),
                port: std::env::var("SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(default.server.port),
            },
            gemini: GeminiConfig {
                api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
                model: std::env::var("GEMINI_MODEL").unwrap_or(default.gemini.model),
                endpoint: std::env::var("GEMINI_ENDPOINT").unwrap_or(default.gemini.endpoint),
                timeout_secs: std::env::var("GEMINI_TIMEOUT_SECS")
                    .ok()
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(default.gemini.timeout_secs),
            },
            upload: UploadConfig {
                max_file_size: std::env::var("MAX_UPLOAD_BYTES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default.upload.max_file_size),
            },
        }
    }

    pub fn model_configured(&self) -> bool {
        !self.gemini.api_key.is_empty()
    }
}
