//! Contracts the browser has to fulfil for tracking and blocking to work.
//! Everything here is asynchronous, every call is a point where other work may interleave.

pub mod memory;
pub mod rules;

use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use rules::SessionRule;

pub type TabId = i64;
pub type WindowId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,
    pub window_id: WindowId,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub active: bool,
}

/// Flat key-value storage shared with the ui. Nothing is atomic across multiple keys.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns values for the keys that exist. Missing keys are left out of the map.
    async fn get(&self, keys: Vec<String>) -> Result<Map<String, Value>>;

    async fn get_all(&self) -> Result<Map<String, Value>>;

    async fn set(&self, items: Map<String, Value>) -> Result<()>;

    async fn remove(&self, keys: Vec<String>) -> Result<()>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TabsApi: Send + Sync {
    /// Active tab in the currently focused window.
    async fn active_tab(&self) -> Result<Option<Tab>>;

    async fn all_tabs(&self) -> Result<Vec<Tab>>;

    async fn tabs_with_url(&self, url: String) -> Result<Vec<Tab>>;

    async fn navigate(&self, tab: TabId, url: String) -> Result<()>;
}

/// Session scoped network rules. Rules live until browser restart.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RuleTable: Send + Sync {
    async fn session_rules(&self) -> Result<Vec<SessionRule>>;

    async fn update_session_rules(
        &self,
        remove_rule_ids: Vec<u32>,
        add_rules: Vec<SessionRule>,
    ) -> Result<()>;
}
