use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ExtractionRecord;

/// 匹配状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Verified, // 参考号与金额都匹配
    Partial,  // 参考号与金额恰好一项匹配
    NoMatch,
    Error, // 仅用于批量校验自身失败
}

/// 单对记录的匹配结果, 生成后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub reference_match: bool,
    pub amount_match: bool,
    pub date_match: bool,
    pub overall_confidence: f64, // [0,1], 保留两位小数
    pub status: MatchStatus,
}

/// 批量校验中单个条目的完整结果
#[derive(Debug, Clone, Serialize)]
pub struct EntryVerification {
    pub entry_id: usize, // 1-based, 与请求条目顺序一致
    pub reference_match: bool,
    pub amount_match: bool,
    pub date_match: bool,
    pub overall_confidence: f64,
    pub status: MatchStatus,
    pub claimed_reference: String,
    pub observed_reference: String,
    pub claimed_amount: String,
    pub observed_amount: String,
    pub claimed_date: String,
    pub observed_date: String,
    pub observed_notes: String,
    pub summary: String,
    pub matched_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EntryVerification {
    pub fn new(
        entry_id: usize,
        claimed: &ExtractionRecord,
        observed: &ExtractionRecord,
        result: MatchResult,
    ) -> Self {
        let summary = format!(
            "UTR: {}, Amount: {}, Date: {}",
            mark(result.reference_match),
            mark(result.amount_match),
            mark(result.date_match),
        );

        Self {
            entry_id,
            reference_match: result.reference_match,
            amount_match: result.amount_match,
            date_match: result.date_match,
            overall_confidence: result.overall_confidence,
            status: result.status,
            claimed_reference: claimed.reference_number.trim().to_string(),
            observed_reference: observed.reference_number.trim().to_string(),
            claimed_amount: claimed.amount.trim().to_string(),
            observed_amount: observed.amount.trim().to_string(),
            claimed_date: claimed.date.trim().to_string(),
            observed_date: observed.date.trim().to_string(),
            observed_notes: observed.notes.clone(),
            summary,
            matched_at: Utc::now(),
            error: observed.error.clone(),
        }
    }

    /// 批量校验自身失败时的零置信度 ERROR 条目
    pub fn failed(entry_id: usize, message: &str) -> Self {
        Self {
            entry_id,
            reference_match: false,
            amount_match: false,
            date_match: false,
            overall_confidence: 0.0,
            status: MatchStatus::Error,
            claimed_reference: String::new(),
            observed_reference: String::new(),
            claimed_amount: String::new(),
            observed_amount: String::new(),
            claimed_date: String::new(),
            observed_date: String::new(),
            observed_notes: String::new(),
            summary: "verification failed".to_string(),
            matched_at: Utc::now(),
            error: Some(message.to_string()),
        }
    }
}

fn mark(matched: bool) -> &'static str {
    if matched {
        "✅"
    } else {
        "❌"
    }
}

/// 批量结果按状态汇总
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub verified: usize,
    pub partial: usize,
    pub no_match: usize,
    pub errors: usize,
}

impl BatchSummary {
    pub fn from_entries(entries: &[EntryVerification]) -> Self {
        let count = |status: MatchStatus| entries.iter().filter(|e| e.status == status).count();

        Self {
            total: entries.len(),
            verified: count(MatchStatus::Verified),
            partial: count(MatchStatus::Partial),
            no_match: count(MatchStatus::NoMatch),
            errors: count(MatchStatus::Error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_screaming_snake_case() {
        assert_eq!(
            serde_json::to_value(MatchStatus::NoMatch).unwrap(),
            serde_json::json!("NO_MATCH")
        );
        assert_eq!(
            serde_json::to_value(MatchStatus::Verified).unwrap(),
            serde_json::json!("VERIFIED")
        );
    }

    #[test]
    fn summary_counts_per_status() {
        let entries = vec![
            EntryVerification::failed(1, "boom"),
            EntryVerification::failed(2, "boom"),
        ];
        let summary = BatchSummary::from_entries(&entries);

        assert_eq!(summary.total, 2);
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.verified, 0);
    }
}
