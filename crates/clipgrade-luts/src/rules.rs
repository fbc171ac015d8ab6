//! Static auto-map rule catalog.
//!
//! Rules are `(gamma, color space, target, priority)` tuples evaluated by
//! substring containment on normalized strings. The built-in table covers the
//! common log profiles; a JSON file with the same shape can replace it.

use std::path::Path;

use tracing::info;

use clipgrade_models::AutoMapRule;

use crate::error::LutResult;

/// Built-in rules, most specific first.
pub fn default_rules() -> Vec<AutoMapRule> {
    const RULES: &[(&str, &str, &str, i32)] = &[
        // Sony
        ("slog3", "sgamut3cine", "sgamut3cine", 100),
        ("slog3", "sgamut3", "sgamut3", 90),
        ("slog3", "", "slog3", 50),
        ("slog2", "sgamut", "slog2", 60),
        ("slog2", "", "slog2", 40),
        // Panasonic
        ("vlog", "vgamut", "vlog", 80),
        ("vlog", "", "vlog", 40),
        // Canon
        ("clog3", "", "clog3", 80),
        ("clog2", "", "clog2", 80),
        ("clog", "", "clog", 40),
        // Fujifilm
        ("flog2", "", "flog2", 80),
        ("flog", "", "flog", 60),
        // DJI
        ("dlog", "", "dlog", 60),
        // Nikon
        ("nlog", "", "nlog", 60),
        // Apple
        ("applelog", "", "applelog", 60),
        // HDR broadcast gamma
        ("hlg", "", "hlg", 30),
    ];

    RULES
        .iter()
        .map(|&(gamma, color_space, target, priority)| AutoMapRule::new(gamma, color_space, target, priority))
        .collect()
}

/// Load rules from a JSON array of `{gamma, colorSpace, target, priority}`.
pub async fn load_rules(path: impl AsRef<Path>) -> LutResult<Vec<AutoMapRule>> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;
    let rules: Vec<AutoMapRule> = serde_json::from_slice(&bytes)?;
    info!(path = %path.display(), count = rules.len(), "Loaded auto-map rules");
    Ok(rules)
}
