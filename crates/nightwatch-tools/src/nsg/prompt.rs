//! Analyst preview prompt over parsed flow records.

use nightwatch_core::error::Result;
use nightwatch_core::types::FlowRecord;

/// Records embedded in the preview.
pub const PREVIEW_RECORD_LIMIT: usize = 100;

/// Build the preview: the optional question, the first records as JSON and
/// the analyses the assistant can offer.
pub fn build_preview_prompt(question: Option<&str>, flows: &[FlowRecord]) -> Result<String> {
    let preview = &flows[..flows.len().min(PREVIEW_RECORD_LIMIT)];
    let records = serde_json::to_string_pretty(preview)?;

    let question = match question.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => format!("User question: \"{}\"\n\n", q),
        None => String::new(),
    };

    Ok(format!(
        "You are a security-operations assistant analysing Azure NSG (Network Security Group) flow logs.\n\
         \n\
         {question}Parsed flow records ({shown} of {total}, capped at {PREVIEW_RECORD_LIMIT} for context):\n\
         {records}\n\
         \n\
         You can help with:\n\
         - summary tables of traffic patterns\n\
         - the most frequent source and destination IPs or ports\n\
         - flows that look risky or unusual\n\
         - NSG rule changes suggested by the observed traffic\n\
         - markdown tables for documentation or reporting\n\
         \n\
         Wait for specific questions. Keep answers short and accurate, and drill down when asked.",
        shown = preview.len(),
        total = flows.len(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flows(n: usize) -> Vec<FlowRecord> {
        (0..n)
            .map(|i| {
                FlowRecord::from_tuple(&format!("1,10.0.0.{},52.1.1.1,{},443,T,O,A", i % 250, 1000 + i), None)
                    .unwrap()
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_preview_caps_records() {
        let prompt = build_preview_prompt(None, &flows(150)).unwrap();
        assert!(prompt.contains("(100 of 150"));
        assert_eq!(prompt.matches("\"srcIP\"").count(), 100);
        assert!(!prompt.contains("User question"));
    }

    #[test]
    fn test_preview_includes_question() {
        let prompt = build_preview_prompt(Some("which ports are denied?"), &flows(2)).unwrap();
        assert!(prompt.contains("User question: \"which ports are denied?\""));
        assert!(prompt.contains("\"destPort\": 443"));
    }

    #[test]
    fn test_preview_of_nothing() {
        let prompt = build_preview_prompt(None, &[]).unwrap();
        assert!(prompt.contains("(0 of 0"));
        assert!(prompt.contains("[]"));
    }
}
