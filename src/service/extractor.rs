use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GeminiConfig;
use crate::models::{sanitize_batch, ExtractionRecord};
use crate::service::parser::{normalize_response, ParseStats};
use crate::service::prompt;

/// 调用模型端点的失败分类, 均不重试
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("request to model endpoint failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("model endpoint returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("model response contained no text candidate")]
    EmptyResponse,
}

// ============================================================================
// generateContent 接口的请求/响应体 (只声明用到的字段)
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

impl Part {
    fn file(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data: STANDARD.encode(bytes),
            }),
            text: None,
        }
    }

    fn text(text: String) -> Self {
        Self {
            inline_data: None,
            text: Some(text),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// 多模态提取服务: 发送 (文件字节 + MIME + 指令), 把自由文本回复
/// 恢复成 ExtractionRecord。每次归一化都向注入的 ParseStats 上报策略。
pub struct GeminiExtractor {
    http: reqwest::Client,
    config: GeminiConfig,
    stats: Arc<ParseStats>,
}

impl GeminiExtractor {
    pub fn new(config: GeminiConfig, stats: Arc<ParseStats>) -> Result<Self, ExtractError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            config,
            stats,
        })
    }

    /// 付款截图 -> 单条记录。失败不上抛, 折叠成错误记录
    pub async fn extract_claim(&self, bytes: &[u8], mime_type: &str) -> ExtractionRecord {
        match self
            .generate(bytes, mime_type, prompt::claim_prompt(), 2048)
            .await
        {
            Ok(raw) => self.recover_record(&raw, "claim screenshot"),
            Err(e) => {
                warn!("Claim extraction failed: {}", e);
                ExtractionRecord::error(&format!("extraction failed: {}", e))
            }
        }
    }

    /// 银行流水 + 申报数据 -> 被匹配到的那一笔交易
    pub async fn extract_statement(
        &self,
        bytes: &[u8],
        mime_type: &str,
        claimed: &ExtractionRecord,
    ) -> ExtractionRecord {
        match self
            .generate(bytes, mime_type, prompt::statement_prompt(claimed), 2048)
            .await
        {
            Ok(raw) => self.recover_record(&raw, "bank statement"),
            Err(e) => {
                warn!("Statement extraction failed: {}", e);
                ExtractionRecord::error(&format!("extraction failed: {}", e))
            }
        }
    }

    /// 银行流水 + 多条申报数据 -> 与申报数组等长的记录数组。
    /// 传输层失败上抛, 由调用方折叠成逐条 ERROR; 解析失败在这里折叠。
    pub async fn extract_statement_multi(
        &self,
        bytes: &[u8],
        mime_type: &str,
        claims: &[ExtractionRecord],
    ) -> Result<Vec<ExtractionRecord>, ExtractError> {
        let raw = self
            .generate(bytes, mime_type, prompt::statement_multi_prompt(claims), 4096)
            .await?;

        debug!(
            "Raw response (multi statement): {} chars",
            raw.len()
        );
        let (value, strategy) = normalize_response(&raw);
        self.stats.record(strategy);

        match value {
            Some(v) => Ok(sanitize_batch(&v, claims.len())),
            None => {
                warn!("All parsing strategies failed for multi statement response");
                let record = ExtractionRecord::error(&format!(
                    "failed to parse model response; raw sample: {}",
                    truncate(&raw, 200)
                ));
                Ok(vec![record; claims.len()])
            }
        }
    }

    /// 单次阻塞调用: 文件 + 提示词 -> 回复文本。不做任何重试。
    async fn generate(
        &self,
        bytes: &[u8],
        mime_type: &str,
        prompt: String,
        max_output_tokens: u32,
    ) -> Result<String, ExtractError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.endpoint, self.config.model, self.config.api_key
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::file(mime_type, bytes), Part::text(prompt)],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                max_output_tokens,
                response_mime_type: "application/json",
            },
        };

        let response = self.http.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ExtractError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateContentResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(ExtractError::EmptyResponse);
        }
        Ok(text)
    }

    /// 回复文本 -> 单条记录, 记录所用解析策略
    fn recover_record(&self, raw: &str, context: &str) -> ExtractionRecord {
        debug!("Raw response ({}): {} chars", context, raw.len());

        let (value, strategy) = normalize_response(raw);
        self.stats.record(strategy);

        match value {
            Some(v) => ExtractionRecord::from_value(&v),
            None => {
                warn!("All parsing strategies failed for {} response", context);
                ExtractionRecord::error(&format!(
                    "failed to parse model response; raw sample: {}",
                    truncate(raw, 200)
                ))
            }
        }
    }
}

/// 诊断用样本截断, 按字符数而不是字节数, 避免切在多字节边界上
fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_format_uses_camel_case() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::file("image/png", b"abc"), Part::text("hi".to_string())],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                max_output_tokens: 2048,
                response_mime_type: "application/json",
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("generationConfig").is_some());
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");

        let file_part = &value["contents"][0]["parts"][0];
        assert_eq!(file_part["inlineData"]["mimeType"], "image/png");
        assert!(file_part.get("text").is_none());
    }

    #[test]
    fn response_text_is_joined_across_parts() {
        let body: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]}}]}"#,
        )
        .unwrap();

        let text = body
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("\n");

        assert_eq!(text, "{\"a\":\n1}");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("金额金额", 2), "金额");
    }
}
