use regex::Regex;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;

use serde::Serialize;

/// 解析策略, 按置信度从高到低排列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    Direct, // 整体直接解析
    Fenced, // 围栏代码块内部
    Brace,  // 首个 { 到最后一个 } 的子串
    Failed,
}

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[a-zA-Z]*\s*\n?(.*?)```").unwrap());

/// 模型自由文本 -> 结构化 JSON 的恢复函数, 三种策略按序尝试, 先成功者生效。
/// 纯文本变换, 不触网不重试。
pub fn normalize_response(raw: &str) -> (Option<Value>, ParseStrategy) {
    let text = raw.trim();

    // 策略1: 整体直接解析
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return (Some(value), ParseStrategy::Direct);
    }

    // 策略2: 提取围栏代码块内部 (可带语言标记)
    if let Some(caps) = FENCED_BLOCK.captures(text) {
        if let Ok(value) = serde_json::from_str::<Value>(caps[1].trim()) {
            return (Some(value), ParseStrategy::Fenced);
        }
    }

    // 策略3: 首个 { 到最后一个 } 之间的子串 (含边界)
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            if let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) {
                return (Some(value), ParseStrategy::Brace);
            }
        }
    }

    (None, ParseStrategy::Failed)
}

/// 策略使用计数, 注入到应用状态共享。只做观测, 允许竞争。
#[derive(Debug, Default)]
pub struct ParseStats {
    direct: AtomicU64,
    fenced: AtomicU64,
    brace: AtomicU64,
    failed: AtomicU64,
}

impl ParseStats {
    pub fn record(&self, strategy: ParseStrategy) {
        let counter = match strategy {
            ParseStrategy::Direct => &self.direct,
            ParseStrategy::Fenced => &self.fenced,
            ParseStrategy::Brace => &self.brace,
            ParseStrategy::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ParseStatsSnapshot {
        let direct = self.direct.load(Ordering::Relaxed);
        let fenced = self.fenced.load(Ordering::Relaxed);
        let brace = self.brace.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let total = direct + fenced + brace + failed;

        ParseStatsSnapshot {
            total,
            direct,
            fenced,
            brace,
            failed,
            direct_success_rate: format!(
                "{:.1}%",
                direct as f64 / total.max(1) as f64 * 100.0
            ),
        }
    }
}

/// 健康检查里暴露的统计快照
#[derive(Debug, Clone, Serialize)]
pub struct ParseStatsSnapshot {
    pub total: u64,
    pub direct: u64,
    pub fenced: u64,
    pub brace: u64,
    pub failed: u64,
    pub direct_success_rate: String,
}
