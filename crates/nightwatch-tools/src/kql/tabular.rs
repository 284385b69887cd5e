//! Textual query-shape heuristics.
//!
//! Both checks are plain substring tests on the lowercased query. Keywords
//! inside string literals or comments are misclassified.

/// Keywords that suggest the query yields a single value.
const SCALAR_KEYWORDS: &[&str] = &["count", "distinct", "toscalar", "summarize"];

/// Keywords that show the query already produces rows and columns.
const TABULAR_KEYWORDS: &[&str] = &["project", "extend", "| top", "order by"];

/// Root table that marks a question as already being KQL.
const ROOT_TABLE: &str = "azurediagnostics";

/// Wrap scalar-looking queries so the result is always a one-row,
/// one-column table. Other queries are returned trimmed and otherwise
/// unchanged.
pub fn ensure_tabular(kql: &str) -> String {
    let kql = kql.trim();
    let lowered = kql.to_lowercase();

    let has_tabular_shape = TABULAR_KEYWORDS.iter().any(|kw| lowered.contains(kw));
    let has_scalar_keyword = SCALAR_KEYWORDS.iter().any(|kw| lowered.contains(kw));

    if has_scalar_keyword && !has_tabular_shape {
        format!("datatable(dummy:int)[1] | extend result=({}) | project result", kql)
    } else {
        kql.to_string()
    }
}

/// Whether a question must be translated to KQL before execution.
///
/// Text starting with the root table or containing a pipe stage is taken as
/// KQL already.
pub fn needs_translation(query: &str) -> bool {
    let trimmed = query.trim();
    !trimmed.to_lowercase().starts_with(ROOT_TABLE) && !trimmed.contains(" | ")
}
