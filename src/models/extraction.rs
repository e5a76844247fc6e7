use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 单笔交易提取结果 (模型从截图/银行流水中识别)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionRecord {
    pub reference_number: String, // UTR/交易参考号, 期望全数字且 >= 10 位
    pub amount: String,           // 金额 (保留原始文本)
    pub date: String,             // YYYY-MM-DD 自由文本, 不做日历校验
    pub confidence: f64,          // 模型自报置信度, 始终收敛到 [0,1]
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionRecord {
    /// 从模型返回的 JSON 构造记录: 缺失字段补默认值, 置信度收敛到 [0,1],
    /// 字符串字段里出现的数字统一转成字符串
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::error("model response entry is not a JSON object");
        };

        Self {
            reference_number: string_field(obj, "reference_number"),
            amount: string_field(obj, "amount"),
            date: string_field(obj, "date"),
            confidence: confidence_field(obj, "confidence"),
            notes: string_field(obj, "notes"),
            error: obj
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    /// 零置信度错误占位记录
    pub fn error(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::default()
        }
    }
}

/// 批量结果规整: 期望数组; 单个对象包一层; 结果不足 expected 时
/// 尾部补占位记录并在 notes 里带上 1-based 序号, 调用方按下标访问不会越界
pub fn sanitize_batch(value: &Value, expected: usize) -> Vec<ExtractionRecord> {
    let mut records: Vec<ExtractionRecord> = match value {
        Value::Array(items) => items.iter().map(ExtractionRecord::from_value).collect(),
        Value::Object(_) => vec![ExtractionRecord::from_value(value)],
        _ => Vec::new(),
    };

    while records.len() < expected {
        let entry_id = records.len() + 1;
        records.push(ExtractionRecord {
            notes: format!("no result returned for entry {}", entry_id),
            ..ExtractionRecord::default()
        });
    }

    records
}

fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn confidence_field(obj: &serde_json::Map<String, Value>, key: &str) -> f64 {
    let raw = match obj.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match raw {
        Some(score) if score.is_finite() => score.clamp(0.0, 1.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_get_defaults() {
        let record = ExtractionRecord::from_value(&json!({
            "reference_number": "240115123456"
        }));

        assert_eq!(record.reference_number, "240115123456");
        assert_eq!(record.amount, "");
        assert_eq!(record.date, "");
        assert_eq!(record.confidence, 0.0);
        assert_eq!(record.notes, "");
        assert!(record.error.is_none());
    }

    #[test]
    fn confidence_is_clamped() {
        let high = ExtractionRecord::from_value(&json!({ "confidence": 1.5 }));
        assert_eq!(high.confidence, 1.0);

        let low = ExtractionRecord::from_value(&json!({ "confidence": -3 }));
        assert_eq!(low.confidence, 0.0);
    }

    #[test]
    fn unparseable_confidence_becomes_zero() {
        let record = ExtractionRecord::from_value(&json!({ "confidence": "high" }));
        assert_eq!(record.confidence, 0.0);
    }

    #[test]
    fn numeric_confidence_in_string_form_parses() {
        let record = ExtractionRecord::from_value(&json!({ "confidence": "0.85" }));
        assert_eq!(record.confidence, 0.85);
    }

    #[test]
    fn numeric_fields_are_stringified() {
        let record = ExtractionRecord::from_value(&json!({
            "reference_number": 240115123456u64,
            "amount": 15000,
        }));

        assert_eq!(record.reference_number, "240115123456");
        assert_eq!(record.amount, "15000");
    }

    #[test]
    fn non_object_entry_becomes_error_record() {
        let record = ExtractionRecord::from_value(&json!("just a string"));
        assert!(record.error.is_some());
        assert_eq!(record.confidence, 0.0);
    }

    #[test]
    fn batch_wraps_single_object() {
        let records = sanitize_batch(&json!({ "reference_number": "240115123456" }), 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reference_number, "240115123456");
    }

    #[test]
    fn batch_pads_short_array_with_sequential_placeholders() {
        let records = sanitize_batch(
            &json!([
                { "reference_number": "240115123456" },
                { "reference_number": "240116789012" }
            ]),
            3,
        );

        assert_eq!(records.len(), 3);
        assert_eq!(records[2].reference_number, "");
        assert_eq!(records[2].confidence, 0.0);
        assert!(records[2].notes.contains("entry 3"));
    }

    #[test]
    fn batch_without_structure_yields_only_placeholders() {
        let records = sanitize_batch(&json!("no structure"), 2);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.reference_number.is_empty()));
    }
}
