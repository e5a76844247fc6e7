use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::config::{AppConfig, ALLOWED_IMAGE_EXTENSIONS, ALLOWED_STATEMENT_EXTENSIONS};
use crate::models::{BatchSummary, EntryVerification, ExtractionRecord, MatchResult};
use crate::service::parser::ParseStatsSnapshot;
use crate::service::{error_results, evaluate, evaluate_batch, GeminiExtractor, ParseStats};

/// 共享状态: 提取服务 (未配置 API key 时为 None) + 解析策略计数
pub struct AppState {
    pub extractor: Option<Arc<GeminiExtractor>>,
    pub stats: Arc<ParseStats>,
    pub config: AppConfig,
}

/// 错误响应体
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// 单对校验响应体: 两侧记录 + 顶层平铺的匹配结果
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub claimant: ExtractionRecord,
    pub observed: ExtractionRecord,
    #[serde(flatten)]
    pub verification: MatchResult,
}

/// 批量校验响应体
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub entry_count: usize,
    pub results: Vec<EntryVerification>,
    pub summary: BatchSummary,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: &'static str,
    pub model_name: String,
    pub parsing: ParseStatsSnapshot,
}

struct Upload {
    filename: String,
    bytes: Bytes,
}

/// 健康检查: 模型连通状态 + 解析策略使用统计
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model: if state.extractor.is_some() {
            "connected"
        } else {
            "disconnected"
        },
        model_name: state.config.gemini.model.clone(),
        parsing: state.stats.snapshot(),
    })
}

/// 单对校验: 申报方截图 + 银行流水, 两次顺序模型调用后本地比对
pub async fn verify(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let Some(extractor) = state.extractor.clone() else {
        return model_unavailable();
    };

    let mut claim: Option<Upload> = None;
    let mut statement: Option<Upload> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field.name().unwrap_or_default().to_string();
                if name != "claim_file" && name != "statement_file" {
                    continue;
                }
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = match field.bytes().await {
                    Ok(b) => b,
                    Err(e) => return client_error(&format!("failed to read upload: {}", e)),
                };
                let upload = Upload { filename, bytes };
                if name == "claim_file" {
                    claim = Some(upload);
                } else {
                    statement = Some(upload);
                }
            }
            Ok(None) => break,
            Err(e) => return client_error(&format!("invalid multipart body: {}", e)),
        }
    }

    let (Some(claim), Some(statement)) = (claim, statement) else {
        return client_error("claim_file and statement_file are both required");
    };

    // 扩展名校验在任何网络调用之前完成
    let Some(claim_mime) = mime_for_upload(&claim.filename, ALLOWED_IMAGE_EXTENSIONS) else {
        return client_error("claim_file must be PNG, JPG, JPEG, WEBP or HEIC");
    };
    let Some(statement_mime) = mime_for_upload(&statement.filename, ALLOWED_STATEMENT_EXTENSIONS)
    else {
        return client_error("statement_file must be PNG, JPG, JPEG, WEBP, HEIC or PDF");
    };

    // 上传先落盘, NamedTempFile 离开作用域即清理, 错误路径也不例外
    let (_claim_spool, claim_bytes) = match spool(&claim.bytes) {
        Ok(pair) => pair,
        Err(e) => return server_error(&format!("failed to spool upload: {}", e)),
    };
    let (_statement_spool, statement_bytes) = match spool(&statement.bytes) {
        Ok(pair) => pair,
        Err(e) => return server_error(&format!("failed to spool upload: {}", e)),
    };

    info!(
        "Verifying claim {} against statement {}",
        claim.filename, statement.filename
    );

    // 第一步: 申报方截图
    let claimed = extractor.extract_claim(&claim_bytes, claim_mime).await;
    if let Some(err) = claimed.error.as_deref() {
        warn!("Claim extraction failed: {}", err);
        return unprocessable(&format!("claim screenshot extraction failed: {}", err));
    }

    // 第二步: 以申报数据为条件检索银行流水
    let observed = extractor
        .extract_statement(&statement_bytes, statement_mime, &claimed)
        .await;
    if let Some(err) = observed.error.as_deref() {
        warn!("Statement extraction failed: {}", err);
        return unprocessable(&format!("bank statement extraction failed: {}", err));
    }

    let verification = evaluate(&claimed, &observed);
    info!(
        "Verification complete: status={:?} confidence={}",
        verification.status, verification.overall_confidence
    );

    Json(VerifyResponse {
        success: true,
        claimant: claimed,
        observed,
        verification,
    })
    .into_response()
}

/// 批量校验: 一份银行流水 + 预提取的申报记录数组, 单次模型调用
pub async fn verify_batch(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let Some(extractor) = state.extractor.clone() else {
        return model_unavailable();
    };

    let mut statement: Option<Upload> = None;
    let mut claims_json: Option<String> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field.name().unwrap_or_default().to_string();
                if name == "statement_file" {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let bytes = match field.bytes().await {
                        Ok(b) => b,
                        Err(e) => {
                            return client_error(&format!("failed to read upload: {}", e))
                        }
                    };
                    statement = Some(Upload { filename, bytes });
                } else if name == "claims" {
                    claims_json = match field.text().await {
                        Ok(t) => Some(t),
                        Err(e) => {
                            return client_error(&format!("failed to read claims field: {}", e))
                        }
                    };
                }
            }
            Ok(None) => break,
            Err(e) => return client_error(&format!("invalid multipart body: {}", e)),
        }
    }

    let Some(statement) = statement else {
        return client_error("statement_file is required");
    };
    let Some(claims_json) = claims_json else {
        return client_error("claims field is required");
    };

    let value: Value = match serde_json::from_str(&claims_json) {
        Ok(v) => v,
        Err(e) => return client_error(&format!("invalid claims payload: {}", e)),
    };
    let Some(items) = value.as_array() else {
        return client_error("claims must be a JSON array");
    };
    if items.is_empty() {
        return client_error("claims array cannot be empty");
    }
    // 客户端提交的记录走同一条规整路径 (补默认值 + 置信度收敛)
    let claims: Vec<ExtractionRecord> = items.iter().map(ExtractionRecord::from_value).collect();

    let Some(statement_mime) = mime_for_upload(&statement.filename, ALLOWED_STATEMENT_EXTENSIONS)
    else {
        return client_error("statement_file must be PNG, JPG, JPEG, WEBP, HEIC or PDF");
    };

    let (_statement_spool, statement_bytes) = match spool(&statement.bytes) {
        Ok(pair) => pair,
        Err(e) => return server_error(&format!("failed to spool upload: {}", e)),
    };

    info!(
        "Batch verification: {} claims against statement {}",
        claims.len(),
        statement.filename
    );

    let results = match extractor
        .extract_statement_multi(&statement_bytes, statement_mime, &claims)
        .await
    {
        Ok(observed) => evaluate_batch(&claims, &observed),
        Err(e) => {
            warn!("Batch statement extraction failed: {}", e);
            error_results(claims.len(), &e.to_string())
        }
    };

    let summary = BatchSummary::from_entries(&results);
    info!(
        "Batch verification complete: total={} verified={} partial={} no_match={} errors={}",
        summary.total, summary.verified, summary.partial, summary.no_match, summary.errors
    );

    Json(BatchResponse {
        success: true,
        entry_count: results.len(),
        results,
        summary,
    })
    .into_response()
}

/// 扩展名 -> MIME, 不在白名单内返回 None
fn mime_for_upload(filename: &str, allowed: &[&str]) -> Option<&'static str> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    if !allowed.iter().any(|a| *a == ext) {
        return None;
    }
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

/// 上传内容写入命名临时文件再读回, 文件随句柄 Drop 删除
fn spool(bytes: &[u8]) -> std::io::Result<(NamedTempFile, Vec<u8>)> {
    let mut file = NamedTempFile::new()?;
    file.write_all(bytes)?;
    file.flush()?;
    let contents = std::fs::read(file.path())?;
    Ok((file, contents))
}

fn model_unavailable() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            success: false,
            error: "model not initialized, set GEMINI_API_KEY".to_string(),
        }),
    )
        .into_response()
}

fn client_error(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            success: false,
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn unprocessable(message: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse {
            success: false,
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn server_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            success: false,
            error: message.to_string(),
        }),
    )
        .into_response()
}
