//! Session blocking. The persisted block list is the source of truth, the rule table and open
//! tabs are brought in line with it.

pub mod projection;

use std::sync::Arc;

use futures::future::join_all;
use serde_json::{json, Map};
use tracing::{debug, info, warn};

use crate::{
    domain::{matches_domain, SchemePolicy},
    error::{SessionError, SessionResult},
    platform::{KeyValueStore, RuleTable, Tab, TabsApi},
    storage::{block_list_value, BLOCK_LIST_KEY},
};

use projection::RuleTemplate;

pub struct BlockRuleManager {
    store: Arc<dyn KeyValueStore>,
    tabs: Arc<dyn TabsApi>,
    rules: Arc<dyn RuleTable>,
    template: RuleTemplate,
    safe_page_url: String,
    policy: SchemePolicy,
}

/// Trims and lowercases user input. Returns `None` when nothing is left.
pub fn normalize_domain(domain: &str) -> Option<String> {
    let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        None
    } else {
        Some(domain)
    }
}

impl BlockRuleManager {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        tabs: Arc<dyn TabsApi>,
        rules: Arc<dyn RuleTable>,
        template: RuleTemplate,
        safe_page_url: String,
        policy: SchemePolicy,
    ) -> Self {
        Self {
            store,
            tabs,
            rules,
            template,
            safe_page_url,
            policy,
        }
    }

    pub async fn blocked_domains(&self) -> SessionResult<Vec<String>> {
        let items = self
            .store
            .get(vec![BLOCK_LIST_KEY.to_owned()])
            .await
            .map_err(SessionError::Storage)?;
        Ok(block_list_value(items.get(BLOCK_LIST_KEY)))
    }

    /// Blocks `domain` and its subdomains for the rest of the session and sends open tabs on them
    /// to the block page. Returns the domain as it was stored.
    ///
    /// Nothing is rolled back on failure, the next change recomputes rules from the stored list.
    pub async fn add_block(&self, domain: &str) -> SessionResult<String> {
        let domain = normalize_domain(domain)
            .ok_or_else(|| SessionError::InvalidInput("No domain provided".into()))?;

        let mut blocked = self.blocked_domains().await?;
        if blocked.contains(&domain) {
            debug!("{domain} is already blocked");
            return Ok(domain);
        }
        blocked.push(domain.clone());

        self.persist(&blocked).await?;
        self.install_rules(&blocked).await?;
        let redirected = self.redirect_open_tabs(&domain).await?;
        info!("Blocked {domain}, redirected {redirected} open tabs");
        Ok(domain)
    }

    /// Lifts the block of a single domain. Tabs already on the block page stay there.
    pub async fn remove_block(&self, domain: &str) -> SessionResult<String> {
        let domain = normalize_domain(domain)
            .ok_or_else(|| SessionError::InvalidInput("No domain provided".into()))?;

        let mut blocked = self.blocked_domains().await?;
        let before = blocked.len();
        blocked.retain(|entry| *entry != domain);
        if blocked.len() == before {
            debug!("{domain} is not blocked");
            return Ok(domain);
        }

        self.persist(&blocked).await?;
        self.install_rules(&blocked).await?;
        info!("Unblocked {domain}");
        Ok(domain)
    }

    /// Removes every owned rule and the stored block list.
    pub async fn clear_blocking_rules(&self) -> SessionResult<()> {
        let installed = self
            .rules
            .session_rules()
            .await
            .map_err(SessionError::Platform)?;
        let owned = self.template.owned_ids(&installed);
        if !owned.is_empty() {
            self.rules
                .update_session_rules(owned, vec![])
                .await
                .map_err(SessionError::Platform)?;
        }
        self.store
            .remove(vec![BLOCK_LIST_KEY.to_owned()])
            .await
            .map_err(SessionError::Storage)?;
        info!("Session blocking rules and storage cleared");
        Ok(())
    }

    /// Sends every tab showing the block page to the neutral page. Going back in history could
    /// land on the blocked site again, so the tab is navigated explicitly.
    pub async fn unblock_all_tabs(&self) -> SessionResult<usize> {
        let blocked_tabs = self
            .tabs
            .tabs_with_url(self.template.redirect_url.clone())
            .await
            .map_err(SessionError::Platform)?;
        let count = self.navigate_all(&blocked_tabs, &self.safe_page_url).await;
        info!("Released {count} blocked tabs");
        Ok(count)
    }

    async fn persist(&self, blocked: &[String]) -> SessionResult<()> {
        let mut items = Map::new();
        items.insert(BLOCK_LIST_KEY.to_owned(), json!(blocked));
        self.store
            .set(items)
            .await
            .map_err(SessionError::Storage)
    }

    async fn install_rules(&self, blocked: &[String]) -> SessionResult<()> {
        let installed = self
            .rules
            .session_rules()
            .await
            .map_err(SessionError::Platform)?;
        let remove = self.template.owned_ids(&installed);
        let add = self.template.project(blocked);
        debug!("Replacing {} owned rules with {}", remove.len(), add.len());
        self.rules
            .update_session_rules(remove, add)
            .await
            .map_err(SessionError::Platform)
    }

    async fn redirect_open_tabs(&self, domain: &str) -> SessionResult<usize> {
        let tabs = self
            .tabs
            .all_tabs()
            .await
            .map_err(SessionError::Platform)?;
        let matching: Vec<Tab> = tabs
            .into_iter()
            .filter(|tab| {
                tab.url
                    .as_deref()
                    .and_then(|url| self.policy.extract(url))
                    .is_some_and(|host| matches_domain(&host, domain))
            })
            .collect();
        Ok(self
            .navigate_all(&matching, &self.template.redirect_url)
            .await)
    }

    /// Navigates tabs concurrently. Each tab is best effort, returns how many succeeded.
    async fn navigate_all(&self, tabs: &[Tab], url: &str) -> usize {
        let results = join_all(
            tabs.iter()
                .map(|tab| self.tabs.navigate(tab.id, url.to_owned())),
        )
        .await;
        results
            .into_iter()
            .zip(tabs)
            .filter(|(result, tab)| match result {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to navigate tab {} to {url}: {e:?}", tab.id);
                    false
                }
            })
            .count()
    }
}
