//! Prompt for translating a question into KQL.

/// Time phrase shown to the model when the caller supplied none.
pub const DEFAULT_TIME_PHRASE: &str = "last 7 days";

const FEW_SHOT_EXAMPLES: &str = r#"Example 1. "What are the latest firewall logs on XXX?"
AzureDiagnostics
| where Category == "ApplicationGatewayAccessLog"

Application Gateway access logs expose these columns:
TimeGenerated (entry time, use for time filters), ResourceId, Category,
ResourceGroup, SubscriptionId, ResourceProvider, Resource, ResourceType,
OperationName, requestUri_s (request path), userAgent_s, ruleName_s,
httpMethod_s, instanceId_s, httpVersion_s, clientIP_s (caller address),
host_s, requestQuery_s, sslEnabled_s, clientPort_d.

Example 2. "Show failed API calls to /my_api in the last 3 days and show only relevant fields"
AzureDiagnostics
| where Category == "ApplicationGatewayAccessLog"
| where TimeGenerated >= ago(3d)
| extend URI=requestUri_s, status=httpStatus_d, method=httpMethod_s, sentBytes=sentBytes_d
| where status != 200
| where isempty(host_s)
| where requestUri_s == "/my_api"
| summarize count() by clientIP_s"#;

/// Build the one-shot translation prompt.
pub fn build_translation_prompt(question: &str, time_phrase: Option<&str>) -> String {
    let time_phrase = time_phrase
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_TIME_PHRASE);

    format!(
        "You are a security-operations assistant fluent in Azure Monitor and the Kusto Query Language (KQL).\n\
         Translate the question below into one KQL query that runs against a Log Analytics workspace.\n\
         \n\
         Question: \"{question}\"\n\
         Time range: \"{time_phrase}\"\n\
         \n\
         {FEW_SHOT_EXAMPLES}\n\
         \n\
         Rules:\n\
         - Pick the right table (AzureDiagnostics, SigninLogs, SecurityEvent, ...).\n\
         - Filter on TimeGenerated to honour the time range.\n\
         - If the question is already KQL, return it unchanged.\n\
         - No markdown fences and no explanation.\n\
         Reply with the KQL query only."
    )
}
