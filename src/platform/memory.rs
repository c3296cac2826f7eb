//! In-process implementations of the platform contracts. Used by tests and by anything that wants
//! to drive the core without a real browser.

use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::{extract_domain, matches_domain};

use super::{
    rules::SessionRule, KeyValueStore, RuleTable, Tab, TabId, TabsApi, WindowId,
};

#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Map<String, Value> {
        self.items().clone()
    }

    fn items(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: Vec<String>) -> Result<Map<String, Value>> {
        let items = self.items();
        Ok(keys
            .into_iter()
            .filter_map(|key| items.get(&key).cloned().map(|value| (key, value)))
            .collect())
    }

    async fn get_all(&self) -> Result<Map<String, Value>> {
        Ok(self.snapshot())
    }

    async fn set(&self, new_items: Map<String, Value>) -> Result<()> {
        self.items().extend(new_items);
        Ok(())
    }

    async fn remove(&self, keys: Vec<String>) -> Result<()> {
        let mut items = self.items();
        for key in keys {
            items.remove(&key);
        }
        Ok(())
    }
}

#[derive(Default)]
struct BrowserState {
    tabs: Vec<Tab>,
    focused_window: Option<WindowId>,
    rules: Vec<SessionRule>,
}

/// A browser with tabs, windows, and a session rule table kept in memory.
///
/// Navigations honor installed redirect rules the same way the network layer would: a top level
/// navigation to a host matched by a `||domain` filter lands on the redirect target instead.
#[derive(Default)]
pub struct MemoryBrowser {
    state: Mutex<BrowserState>,
}

impl MemoryBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BrowserState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens a tab. A tab opened as active deactivates other tabs in its window.
    pub fn open_tab(&self, id: TabId, window_id: WindowId, url: &str, active: bool) {
        let mut state = self.state();
        if active {
            for tab in state.tabs.iter_mut().filter(|tab| tab.window_id == window_id) {
                tab.active = false;
            }
        }
        state.tabs.retain(|tab| tab.id != id);
        state.tabs.push(Tab {
            id,
            window_id,
            url: Some(url.into()),
            active,
        });
    }

    pub fn activate_tab(&self, id: TabId) {
        let mut state = self.state();
        let Some(window_id) = state.tabs.iter().find(|tab| tab.id == id).map(|tab| tab.window_id)
        else {
            return;
        };
        for tab in state.tabs.iter_mut().filter(|tab| tab.window_id == window_id) {
            tab.active = tab.id == id;
        }
    }

    /// Changes the url of a tab the way a user typing into the address bar would, without
    /// recording it as a navigation issued through [TabsApi].
    pub fn set_url(&self, id: TabId, url: &str) {
        let mut state = self.state();
        let landing = redirect_for(&state.rules, url).unwrap_or_else(|| url.to_owned());
        if let Some(tab) = state.tabs.iter_mut().find(|tab| tab.id == id) {
            tab.url = Some(landing);
        }
    }

    pub fn focus_window(&self, window: Option<WindowId>) {
        self.state().focused_window = window;
    }

    pub fn install_rules(&self, rules: Vec<SessionRule>) {
        self.state().rules.extend(rules);
    }

    pub fn rules(&self) -> Vec<SessionRule> {
        self.state().rules.clone()
    }

    pub fn tab(&self, id: TabId) -> Option<Tab> {
        self.state().tabs.iter().find(|tab| tab.id == id).cloned()
    }

    pub fn tab_url(&self, id: TabId) -> Option<String> {
        self.tab(id).and_then(|tab| tab.url)
    }
}

fn redirect_for(rules: &[SessionRule], url: &str) -> Option<String> {
    let host = extract_domain(url)?;
    rules.iter().find_map(|rule| {
        let filter = rule.condition.url_filter.as_deref()?.strip_prefix("||")?;
        if matches_domain(&host, filter) {
            rule.redirect_target().map(str::to_owned)
        } else {
            None
        }
    })
}

#[async_trait]
impl TabsApi for MemoryBrowser {
    async fn active_tab(&self) -> Result<Option<Tab>> {
        let state = self.state();
        let Some(window) = state.focused_window else {
            return Ok(None);
        };
        Ok(state
            .tabs
            .iter()
            .find(|tab| tab.window_id == window && tab.active)
            .cloned())
    }

    async fn all_tabs(&self) -> Result<Vec<Tab>> {
        Ok(self.state().tabs.clone())
    }

    async fn tabs_with_url(&self, url: String) -> Result<Vec<Tab>> {
        Ok(self
            .state()
            .tabs
            .iter()
            .filter(|tab| tab.url.as_deref() == Some(url.as_str()))
            .cloned()
            .collect())
    }

    async fn navigate(&self, id: TabId, url: String) -> Result<()> {
        let mut state = self.state();
        let landing = redirect_for(&state.rules, &url).unwrap_or(url);
        let tab = state
            .tabs
            .iter_mut()
            .find(|tab| tab.id == id)
            .ok_or_else(|| anyhow!("No tab with id {id}"))?;
        tab.url = Some(landing);
        Ok(())
    }
}

#[async_trait]
impl RuleTable for MemoryBrowser {
    async fn session_rules(&self) -> Result<Vec<SessionRule>> {
        Ok(self.rules())
    }

    async fn update_session_rules(
        &self,
        remove_rule_ids: Vec<u32>,
        add_rules: Vec<SessionRule>,
    ) -> Result<()> {
        let mut state = self.state();
        state.rules.retain(|rule| !remove_rule_ids.contains(&rule.id));
        if let Some(duplicate) = add_rules
            .iter()
            .find(|new| state.rules.iter().any(|rule| rule.id == new.id))
        {
            return Err(anyhow!("Rule with id {} already exists", duplicate.id));
        }
        state.rules.extend(add_rules);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_memory_store_operations() -> Result<()> {
        let store = MemoryStore::new();
        let mut items = Map::new();
        items.insert("a.com".into(), json!(3));
        items.insert("b.com".into(), json!(4));
        store.set(items).await?;

        let found = store.get(vec!["a.com".into(), "missing".into()]).await?;
        assert_eq!(found.len(), 1);
        assert_eq!(found["a.com"], json!(3));

        store.remove(vec!["a.com".into()]).await?;
        assert_eq!(store.get_all().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_active_tab_requires_focus() -> Result<()> {
        let browser = MemoryBrowser::new();
        browser.open_tab(1, 10, "https://a.com", true);
        browser.open_tab(2, 10, "https://b.com", false);
        assert_eq!(browser.active_tab().await?, None);

        browser.focus_window(Some(10));
        assert_eq!(browser.active_tab().await?.map(|tab| tab.id), Some(1));

        browser.activate_tab(2);
        assert_eq!(browser.active_tab().await?.map(|tab| tab.id), Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn test_navigate_unknown_tab_fails() {
        let browser = MemoryBrowser::new();
        assert!(browser.navigate(5, "https://a.com".into()).await.is_err());
    }
}
