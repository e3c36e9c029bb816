use std::collections::BTreeMap;

use crate::config::ChatApiConfig;

/// Builds the outgoing header map for one request.
///
/// Extra headers from the config are applied last and may override the
/// computed defaults.
pub fn build_headers(config: &ChatApiConfig, user_agent: Option<&str>) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();

    headers.insert("accept".to_string(), "text/event-stream".to_string());

    let api_key = config.api_key.trim();
    if !api_key.is_empty() {
        headers.insert("authorization".to_string(), format!("Bearer {api_key}"));
    }

    if let Some(user_agent) = user_agent
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        headers.insert("user-agent".to_string(), user_agent.to_string());
    }

    for (key, value) in &config.extra_headers {
        headers.insert(key.to_ascii_lowercase(), value.clone());
    }

    headers
}
