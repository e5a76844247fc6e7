use crate::models::{EntryVerification, ExtractionRecord, MatchResult, MatchStatus};

/// 逐字段比对一对记录, 纯函数, 重复执行结果一致
pub fn evaluate(claimed: &ExtractionRecord, observed: &ExtractionRecord) -> MatchResult {
    let claimed_ref = claimed.reference_number.trim();
    let observed_ref = observed.reference_number.trim();
    // 两侧都是合法 UTR 且字符串相等才算匹配
    let reference_match = is_valid_reference(claimed_ref)
        && is_valid_reference(observed_ref)
        && claimed_ref == observed_ref;

    let claimed_amount = claimed.amount.trim();
    let observed_amount = observed.amount.trim();
    let both_amounts_present = !claimed_amount.is_empty() && !observed_amount.is_empty();
    let amount_match = both_amounts_present && amounts_match(claimed_amount, observed_amount);

    let claimed_date = claimed.date.trim();
    let observed_date = observed.date.trim();
    let date_match =
        !claimed_date.is_empty() && !observed_date.is_empty() && claimed_date == observed_date;

    // 两侧置信度取均值, 参考号不匹配打五折, 金额都在但不匹配再打七折
    let mut confidence = (claimed.confidence + observed.confidence) / 2.0;
    if !reference_match {
        confidence *= 0.5;
    }
    if !amount_match && both_amounts_present {
        confidence *= 0.7;
    }
    let overall_confidence = round2(confidence.clamp(0.0, 1.0));

    let status = match (reference_match, amount_match) {
        (true, true) => MatchStatus::Verified,
        (true, false) | (false, true) => MatchStatus::Partial,
        (false, false) => MatchStatus::NoMatch,
    };

    MatchResult {
        reference_match,
        amount_match,
        date_match,
        overall_confidence,
        status,
    }
}

/// 批量比对: 长度不一致时按较长侧遍历, 缺位用空记录顶替而不是报错
pub fn evaluate_batch(
    claimed: &[ExtractionRecord],
    observed: &[ExtractionRecord],
) -> Vec<EntryVerification> {
    let len = claimed.len().max(observed.len());
    let default = ExtractionRecord::default();

    (0..len)
        .map(|i| {
            let c = claimed.get(i).unwrap_or(&default);
            let o = observed.get(i).unwrap_or(&default);
            let result = evaluate(c, o);
            EntryVerification::new(i + 1, c, o, result)
        })
        .collect()
}

/// 批量校验整体失败时, 每个条目替换成携带失败原因的 ERROR 记录
pub fn error_results(count: usize, message: &str) -> Vec<EntryVerification> {
    (1..=count)
        .map(|entry_id| EntryVerification::failed(entry_id, message))
        .collect()
}

/// UTR 合法性: 全数字且至少 10 位
pub fn is_valid_reference(value: &str) -> bool {
    value.len() >= 10 && value.bytes().all(|b| b.is_ascii_digit())
}

/// 去掉货币符号等杂质后按数值容差比较, 两侧任一解析失败则退回
/// 大小写不敏感的字符串相等
fn amounts_match(a: &str, b: &str) -> bool {
    match (normalize_amount(a), normalize_amount(b)) {
        (Some(x), Some(y)) => (x - y).abs() < 0.01,
        _ => a.eq_ignore_ascii_case(b),
    }
}

fn normalize_amount(value: &str) -> Option<f64> {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(reference: &str, amount: &str, date: &str, confidence: f64) -> ExtractionRecord {
        ExtractionRecord {
            reference_number: reference.to_string(),
            amount: amount.to_string(),
            date: date.to_string(),
            confidence,
            ..ExtractionRecord::default()
        }
    }

    #[test]
    fn tolerance_amount_still_verifies() {
        let claimed = record("240115123456", "15000", "2024-01-15", 0.9);
        let observed = record("240115123456", "15000.00", "2024-01-15", 0.8);

        let result = evaluate(&claimed, &observed);
        assert!(result.reference_match);
        assert!(result.amount_match);
        assert!(result.date_match);
        assert_eq!(result.status, MatchStatus::Verified);
        assert_eq!(result.overall_confidence, 0.85);
    }

    #[test]
    fn currency_symbols_are_stripped_before_comparing() {
        let claimed = record("240115123456", "₹15,000", "2024-01-15", 1.0);
        let observed = record("240115123456", "15000.00", "2024-01-15", 1.0);

        assert!(evaluate(&claimed, &observed).amount_match);
    }

    #[test]
    fn equal_but_non_digit_references_do_not_match() {
        let claimed = record("abc123abc1", "100", "2024-01-15", 1.0);
        let observed = record("abc123abc1", "100", "2024-01-15", 1.0);

        let result = evaluate(&claimed, &observed);
        assert!(!result.reference_match);
        assert!(result.amount_match);
        assert_eq!(result.status, MatchStatus::Partial);
    }

    #[test]
    fn short_reference_is_rejected() {
        let claimed = record("123456789", "100", "", 1.0);
        let observed = record("123456789", "100", "", 1.0);

        assert!(!evaluate(&claimed, &observed).reference_match);
    }

    #[test]
    fn non_numeric_amounts_fall_back_to_string_equality() {
        let claimed = record("240115123456", "abc", "", 1.0);
        let observed = record("240115123456", "ABC", "", 1.0);

        assert!(evaluate(&claimed, &observed).amount_match);
    }

    #[test]
    fn reference_mismatch_halves_confidence() {
        let claimed = record("240115123456", "100", "", 0.9);
        let observed = record("240199999999", "100", "", 0.9);

        let result = evaluate(&claimed, &observed);
        assert!(!result.reference_match);
        assert!(result.amount_match);
        assert_eq!(result.overall_confidence, 0.45);
    }

    #[test]
    fn amount_penalty_skipped_when_one_side_empty() {
        let claimed = record("240115123456", "", "2024-01-15", 1.0);
        let observed = record("240115123456", "15000", "2024-01-15", 1.0);

        let result = evaluate(&claimed, &observed);
        assert!(!result.amount_match);
        // 金额缺失不追加 0.7 惩罚
        assert_eq!(result.overall_confidence, 1.0);
        assert_eq!(result.status, MatchStatus::Partial);
    }

    #[test]
    fn both_penalties_stack() {
        let claimed = record("240115123456", "100", "", 1.0);
        let observed = record("240199999999", "200", "", 1.0);

        let result = evaluate(&claimed, &observed);
        assert_eq!(result.status, MatchStatus::NoMatch);
        assert_eq!(result.overall_confidence, 0.35);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let claimed = record("240115123456", "15000", "2024-01-15", 0.9);
        let observed = record("240115123456", "15000.00", "2024-01-16", 0.7);

        let first = evaluate(&claimed, &observed);
        let second = evaluate(&claimed, &observed);
        assert_eq!(first, second);
    }

    #[test]
    fn batch_pads_missing_observed_positions() {
        let claimed = vec![
            record("240115123456", "15000", "2024-01-15", 0.9),
            record("240116789012", "12000", "2024-01-16", 0.8),
            record("240117345678", "18000", "2024-01-17", 0.8),
        ];
        let observed = vec![
            record("240115123456", "15000", "2024-01-15", 0.9),
            record("240116789012", "12000", "2024-01-16", 0.8),
        ];

        let entries = evaluate_batch(&claimed, &observed);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].status, MatchStatus::Verified);
        assert_eq!(entries[1].status, MatchStatus::Verified);
        assert_eq!(entries[2].status, MatchStatus::NoMatch);
        assert_eq!(entries[2].entry_id, 3);
        assert_eq!(entries[2].observed_reference, "");
    }

    #[test]
    fn batch_iterates_to_longer_observed_side() {
        let claimed = vec![record("240115123456", "15000", "2024-01-15", 0.9)];
        let observed = vec![
            record("240115123456", "15000", "2024-01-15", 0.9),
            record("240116789012", "12000", "2024-01-16", 0.8),
        ];

        let entries = evaluate_batch(&claimed, &observed);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].claimed_reference, "");
    }

    #[test]
    fn error_results_carry_message_for_every_entry() {
        let entries = error_results(3, "model call failed");
        assert_eq!(entries.len(), 3);
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.entry_id, i + 1);
            assert_eq!(entry.status, MatchStatus::Error);
            assert_eq!(entry.overall_confidence, 0.0);
            assert_eq!(entry.error.as_deref(), Some("model call failed"));
        }
    }
}
