use crate::models::ExtractionRecord;

/// 单条记录的期望 JSON 形状, 三个提示词共用
const RECORD_SHAPE: &str = r#"{
    "reference_number": "string",
    "amount": "string",
    "date": "string (YYYY-MM-DD)",
    "confidence": 0.8,
    "notes": "any important observations"
}"#;

/// 付款截图提取提示词
pub fn claim_prompt() -> String {
    format!(
        r#"Analyze this UPI payment screenshot and extract the following information.

REQUIRED FIELDS:
- reference_number: UTR/Reference number (look for labels like "UTR:", "Ref No:", "Transaction ID:")
- amount: transaction amount (numerical value only)
- date: transaction date (YYYY-MM-DD format)

INSTRUCTIONS:
1. Focus on finding the UTR number - it is typically a 12 digit number
2. If the UTR is not clearly visible, set confidence low (< 0.5)
3. Extract exact text as shown in the image
4. If a field is not visible, return an empty string ""

Return exactly this JSON structure:
{RECORD_SHAPE}"#
    )
}

/// 银行流水中检索单笔交易的提示词, 以申报方数据为检索条件
pub fn statement_prompt(claimed: &ExtractionRecord) -> String {
    format!(
        r#"You are analyzing a BANK STATEMENT document that lists MULTIPLE transactions.

FIND THE ONE TRANSACTION MATCHING THESE PAYMENT DETAILS:
- Amount: {amount} INR
- Date: {date}
- UTR/Reference number: {reference} (if provided)

SEARCH STRATEGY:
1. Scan every transaction row on every page
2. Match the amount exactly (ignore +/- signs)
3. Match the date exactly
4. Match the UTR/Reference number exactly if provided
5. Extract the UTR from that one matching row

INSTRUCTIONS:
- Only extract from the ONE transaction that matches the criteria
- If found, set confidence high (0.8-1.0)
- If no exact match is found, set confidence low (0.0-0.3), explain why in notes,
  and return empty strings for all fields
- If several transactions match, choose the one closest to the given date
- DO NOT extract from a random transaction

Return exactly this JSON structure:
{RECORD_SHAPE}"#,
        amount = claimed.amount.trim(),
        date = claimed.date.trim(),
        reference = claimed.reference_number.trim(),
    )
}

/// 一次性检索多条申报记录的提示词, 要求按原顺序返回 JSON 数组
pub fn statement_multi_prompt(claims: &[ExtractionRecord]) -> String {
    let entries: Vec<String> = claims
        .iter()
        .enumerate()
        .map(|(i, claim)| {
            format!(
                "ENTRY {id}:\n- Amount: {amount} INR\n- Date: {date}\n- UTR/Reference: {reference}",
                id = i + 1,
                amount = claim.amount.trim(),
                date = claim.date.trim(),
                reference = claim.reference_number.trim(),
            )
        })
        .collect();

    format!(
        r#"You are analyzing a BANK STATEMENT document that lists MULTIPLE transactions.

Find matches for the following {count} payment entries:

{entries}

SEARCH INSTRUCTIONS:
1. Look through ALL transactions in the statement, on every page
2. For each entry, find the transaction matching its amount, date and UTR exactly
3. If no exact match exists, try a partial match (amount + date only)
4. Set confidence by match quality:
   - 0.9-1.0: exact match (amount + date + UTR)
   - 0.7-0.8: strong match (amount + date, UTR found)
   - 0.4-0.6: partial match (amount matches, date close)
   - 0.0-0.3: no clear match
5. Return results for ALL {count} entries in the SAME ORDER as listed above
6. If an entry has no match, return empty strings for it but keep its position

Return a JSON ARRAY with exactly {count} elements, each shaped like:
{RECORD_SHAPE}"#,
        count = claims.len(),
        entries = entries.join("\n\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_prompt_embeds_claimed_details() {
        let claimed = ExtractionRecord {
            reference_number: "240115123456".to_string(),
            amount: "15000".to_string(),
            date: "2024-01-15".to_string(),
            ..ExtractionRecord::default()
        };

        let prompt = statement_prompt(&claimed);
        assert!(prompt.contains("240115123456"));
        assert!(prompt.contains("15000 INR"));
        assert!(prompt.contains("2024-01-15"));
    }

    #[test]
    fn multi_prompt_lists_every_entry_in_order() {
        let claims = vec![
            ExtractionRecord {
                reference_number: "240115123456".to_string(),
                ..ExtractionRecord::default()
            },
            ExtractionRecord {
                reference_number: "240116789012".to_string(),
                ..ExtractionRecord::default()
            },
        ];

        let prompt = statement_multi_prompt(&claims);
        assert!(prompt.contains("ENTRY 1:"));
        assert!(prompt.contains("ENTRY 2:"));
        assert!(prompt.contains("240115123456"));
        assert!(prompt.contains("exactly 2 elements"));
    }
}
