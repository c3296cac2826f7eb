use std::time::Duration;

use crate::{blocker::projection::RuleTemplate, domain::SchemePolicy};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_SAFE_PAGE_URL: &str = "chrome://newtab";
pub const BLOCK_PAGE_PATH: &str = "block.html";

/// Runtime settings of the tracker and the blocker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// How often the running session is committed regardless of browser events. Bounds how much
    /// time can be lost when the process dies.
    pub tick_interval: Duration,
    pub rule_template: RuleTemplate,
    pub safe_page_url: String,
    pub scheme_policy: SchemePolicy,
}

impl Settings {
    pub fn new(block_page_url: impl Into<String>) -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            rule_template: RuleTemplate::new(block_page_url),
            safe_page_url: DEFAULT_SAFE_PAGE_URL.into(),
            scheme_policy: SchemePolicy::default(),
        }
    }

    pub fn block_page_url(&self) -> &str {
        &self.rule_template.redirect_url
    }
}

/// Block page packaged with the extension whose origin is `origin`, e.g.
/// `chrome-extension://<id>/`.
pub fn block_page_for_origin(origin: &str) -> String {
    format!("{}/{BLOCK_PAGE_PATH}", origin.trim_end_matches('/'))
}
