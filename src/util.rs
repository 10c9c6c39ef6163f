/// Small helpers shared by the watchers and the entry point.
///
/// IMPORTANT:
/// - No page-specific logic should live here.
/// - Keep this module deterministic.
///

/// Path of the logging route on the collector backend.
const LOG_ROUTE: &str = "/meet-bot/log";

/// Build the collector endpoint from a backend base URL.
///
/// Examples:
/// - "http://localhost:8000"    -> "http://localhost:8000/meet-bot/log"
/// - "http://10.0.0.5:8000/"    -> "http://10.0.0.5:8000/meet-bot/log"
///
pub fn collector_endpoint(base_url: &str) -> String {
    format!("{}{}", base_url.trim().trim_end_matches('/'), LOG_ROUTE)
}

/// Trim the visible text of each element, keeping document order.
///
/// Empty strings are kept: an entry whose name has not rendered yet
/// still counts as a roster member.
pub fn trimmed_texts<'a, I>(texts: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    texts.into_iter().map(|t| t.trim().to_string()).collect()
}
