use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;
use upi_verify_rust::{api, AppConfig, AppState, GeminiExtractor, ParseStats};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::from_env();
    info!("Starting server with config: {:?}", config);

    // 解析策略计数器, 注入提取服务和健康检查共享
    let stats = Arc::new(ParseStats::default());

    // 未配置 API key 时服务照常启动, 提取请求快速失败
    let extractor = if config.model_configured() {
        let extractor = GeminiExtractor::new(config.gemini.clone(), stats.clone())?;
        info!("Model endpoint configured: {}", config.gemini.model);
        Some(Arc::new(extractor))
    } else {
        warn!("GEMINI_API_KEY not set - extraction endpoints will fail fast");
        None
    };

    let state = Arc::new(AppState {
        extractor,
        stats,
        config: config.clone(),
    });

    // 构建路由
    let app = Router::new()
        .route("/health", get(api::health))
        .route("/api/verify", post(api::verify))
        .route("/api/verify/batch", post(api::verify_batch))
        .layer(DefaultBodyLimit::max(config.upload.max_file_size))
        .with_state(state);

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/verify        - claim screenshot vs bank statement");
    info!("  POST /api/verify/batch  - multiple claims vs one statement");
    info!("  GET  /health            - model status + parsing stats");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
