// crates/nods-providers/src/providers/code/browser.rs
// ============================================================================
// Module: User-Agent Parser
// Description: Browser, OS and device classification of user agents.
// Purpose: Serve the `browser` category of the `internal` source.
// Dependencies: nods-core, serde_json
// ============================================================================

//! ## Overview
//! Token matching over the user-agent string. Browser markers are checked in
//! an order that resolves the usual impersonation chain (Edge and Opera claim
//! Chrome, Chrome claims Safari).

use nods_core::Category;
use nods_core::DataInputs;
use nods_core::DataProvider;
use nods_core::NodsError;
use nods_core::QueryContext;
use serde_json::Value;
use serde_json::json;

use crate::providers::category_input;

/// Substrings marking automated clients.
const BOT_MARKERS: &[&str] =
    &["bot", "crawler", "spider", "slurp", "curl/", "wget/", "python-requests", "headless"];

/// Browser markers, most specific first: (token, name).
const BROWSERS: &[(&str, &str)] = &[
    ("Edg/", "Edge"),
    ("EdgA/", "Edge"),
    ("OPR/", "Opera"),
    ("SamsungBrowser/", "Samsung Internet"),
    ("Firefox/", "Firefox"),
    ("FxiOS/", "Firefox"),
    ("CriOS/", "Chrome"),
    ("Chrome/", "Chrome"),
    ("Version/", "Safari"),
    ("MSIE ", "Internet Explorer"),
    ("Trident/", "Internet Explorer"),
];

/// OS markers in match order: (token, name).
const SYSTEMS: &[(&str, &str)] = &[
    ("Windows NT", "Windows"),
    ("Android", "Android"),
    ("iPhone", "iOS"),
    ("iPad", "iOS"),
    ("CrOS", "ChromeOS"),
    ("Mac OS X", "macOS"),
    ("Linux", "Linux"),
];

/// User-agent parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserProvider;

impl DataProvider for BrowserProvider {
    fn category_info(
        &self,
        _ctx: &QueryContext,
        category: Category,
        inputs: &DataInputs,
    ) -> Result<Value, NodsError> {
        if category != Category::Browser {
            return Err(NodsError::not_implemented("browser", category));
        }
        Ok(parse_user_agent(category_input(inputs, category)?))
    }

    fn is_cached(&self) -> bool {
        false
    }
}

/// Parses a user-agent string.
#[must_use]
pub fn parse_user_agent(agent: &str) -> Value {
    let lowered = agent.to_lowercase();
    let bot = BOT_MARKERS.iter().any(|marker| lowered.contains(marker));
    let (browser, version) = BROWSERS
        .iter()
        .find(|(token, _)| agent.contains(token))
        .map_or(("Unknown", String::new()), |(token, name)| (*name, version_after(agent, token)));
    let browser = if browser == "Safari" && !agent.contains("Safari/") { "Unknown" } else { browser };
    let os = SYSTEMS.iter().find(|(token, _)| agent.contains(token)).map_or("Unknown", |(_, name)| *name);
    let device = if bot {
        "bot"
    } else if agent.contains("iPad") || agent.contains("Tablet") {
        "tablet"
    } else if agent.contains("Mobi") || agent.contains("iPhone") {
        "mobile"
    } else {
        "desktop"
    };
    json!({
        "browser": browser,
        "version": version,
        "os": os,
        "device": device,
        "bot": bot,
    })
}

/// Returns the dotted version following `token`.
fn version_after(agent: &str, token: &str) -> String {
    agent
        .split_once(token)
        .map(|(_, rest)| rest.chars().take_while(|ch| ch.is_ascii_digit() || *ch == '.').collect())
        .unwrap_or_default()
}
