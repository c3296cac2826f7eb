use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::platform::{rules::SessionRule, RuleTable, Tab, TabId, TabsApi, WindowId};

use super::messages::Outbound;

#[derive(Default)]
struct MirrorState {
    tabs: Vec<Tab>,
    focused_window: Option<WindowId>,
    rules: Vec<SessionRule>,
}

/// Host side copy of the browser state the extension reports.
///
/// Reads are answered from the copy. Writes update the copy right away and are forwarded to the
/// extension, which performs them for real and reports the outcome through regular events.
pub struct MirrorBrowser {
    state: Mutex<MirrorState>,
    outbound: mpsc::Sender<Outbound>,
}

impl MirrorBrowser {
    pub fn new(outbound: mpsc::Sender<Outbound>) -> Self {
        Self {
            state: Mutex::new(MirrorState::default()),
            outbound,
        }
    }

    fn state(&self) -> MutexGuard<'_, MirrorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts over from a full snapshot. Returns whether any browser window has focus.
    pub fn replace_tabs(&self, tabs: Vec<Tab>, focused_window: Option<WindowId>) -> bool {
        self.state().tabs = tabs;
        self.focus_window(focused_window)
    }

    /// Stores the new version of a tab. Returns true when its url changed.
    pub fn update_tab(&self, tab: Tab) -> bool {
        let mut state = self.state();
        if tab.active {
            for other in state
                .tabs
                .iter_mut()
                .filter(|other| other.window_id == tab.window_id)
            {
                other.active = false;
            }
        }
        match state.tabs.iter_mut().find(|known| known.id == tab.id) {
            Some(known) => {
                let changed = tab.url.is_some() && known.url != tab.url;
                // Updates without a url carry no information about it.
                let url = tab.url.or_else(|| known.url.take());
                *known = Tab { url, ..tab };
                changed
            }
            None => {
                let changed = tab.url.is_some();
                state.tabs.push(tab);
                changed
            }
        }
    }

    pub fn activate_tab(&self, id: TabId, window_id: WindowId) {
        let mut state = self.state();
        for tab in state.tabs.iter_mut().filter(|tab| tab.window_id == window_id) {
            tab.active = tab.id == id;
        }
        if !state.tabs.iter().any(|tab| tab.id == id) {
            state.tabs.push(Tab {
                id,
                window_id,
                url: None,
                active: true,
            });
        }
    }

    pub fn remove_tab(&self, id: TabId) {
        self.state().tabs.retain(|tab| tab.id != id);
    }

    /// Returns whether any browser window has focus afterwards.
    pub fn focus_window(&self, window: Option<WindowId>) -> bool {
        let mut state = self.state();
        state.focused_window = window.filter(|id| *id >= 0);
        state.focused_window.is_some()
    }

    pub fn replace_rules(&self, rules: Vec<SessionRule>) {
        self.state().rules = rules;
    }

    async fn forward(&self, message: Outbound) -> Result<()> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| anyhow!("Connection to the extension is closed"))
    }
}

#[async_trait]
impl TabsApi for MirrorBrowser {
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

    async fn navigate(&self, tab: TabId, url: String) -> Result<()> {
        {
            let mut state = self.state();
            let known = state
                .tabs
                .iter_mut()
                .find(|known| known.id == tab)
                .ok_or_else(|| anyhow!("No tab with id {tab}"))?;
            known.url = Some(url.clone());
        }
        debug!("Navigating tab {tab} to {url}");
        self.forward(Outbound::Navigate { tab_id: tab, url }).await
    }
}

#[async_trait]
impl RuleTable for MirrorBrowser {
    async fn session_rules(&self) -> Result<Vec<SessionRule>> {
        Ok(self.state().rules.clone())
    }

    async fn update_session_rules(
        &self,
        remove_rule_ids: Vec<u32>,
        add_rules: Vec<SessionRule>,
    ) -> Result<()> {
        {
            let mut state = self.state();
            state.rules.retain(|rule| !remove_rule_ids.contains(&rule.id));
            state.rules.extend(add_rules.iter().cloned());
        }
        self.forward(Outbound::UpdateSessionRules {
            remove_rule_ids,
            add_rules,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use crate::{
        blocker::projection::RuleTemplate,
        host::messages::Outbound,
        platform::{RuleTable, Tab, TabsApi},
    };

    use super::MirrorBrowser;

    fn tab(id: i64, window_id: i64, url: &str, active: bool) -> Tab {
        Tab {
            id,
            window_id,
            url: Some(url.into()),
            active,
        }
    }

    #[tokio::test]
    async fn test_mirror_follows_events() -> anyhow::Result<()> {
        let (sender, _receiver) = mpsc::channel(4);
        let mirror = MirrorBrowser::new(sender);
        assert!(!mirror.replace_tabs(
            vec![
                tab(1, 1, "https://a.com/", true),
                tab(2, 1, "https://b.com/", false),
            ],
            Some(-1),
        ));
        assert_eq!(mirror.active_tab().await?, None);

        assert!(mirror.focus_window(Some(1)));
        assert_eq!(mirror.active_tab().await?.map(|t| t.id), Some(1));

        mirror.activate_tab(2, 1);
        assert_eq!(mirror.active_tab().await?.map(|t| t.id), Some(2));

        assert!(mirror.update_tab(tab(2, 1, "https://c.com/", true)));
        assert!(!mirror.update_tab(tab(2, 1, "https://c.com/", true)));
        assert!(!mirror.update_tab(Tab {
            url: None,
            ..tab(2, 1, "", true)
        }));
        assert_eq!(
            mirror.active_tab().await?.and_then(|t| t.url).as_deref(),
            Some("https://c.com/")
        );

        mirror.remove_tab(2);
        assert_eq!(mirror.active_tab().await?, None);
        assert!(!mirror.focus_window(Some(-1)));
        Ok(())
    }

    #[tokio::test]
    async fn test_writes_are_forwarded() -> anyhow::Result<()> {
        let (sender, mut receiver) = mpsc::channel(4);
        let mirror = MirrorBrowser::new(sender);
        mirror.replace_tabs(vec![tab(1, 1, "https://x.com/", true)], Some(1));

        let rules =
            RuleTemplate::new("chrome-extension://abc/block.html").project(&["x.com".to_owned()]);
        mirror.update_session_rules(vec![], rules.clone()).await?;
        assert_eq!(mirror.session_rules().await?, rules);
        assert_eq!(
            receiver.recv().await,
            Some(Outbound::UpdateSessionRules {
                remove_rule_ids: vec![],
                add_rules: rules
            })
        );

        mirror
            .navigate(1, "chrome-extension://abc/block.html".into())
            .await?;
        assert_eq!(
            mirror
                .tabs_with_url("chrome-extension://abc/block.html".into())
                .await?
                .len(),
            1
        );
        assert_eq!(
            receiver.recv().await,
            Some(Outbound::Navigate {
                tab_id: 1,
                url: "chrome-extension://abc/block.html".into()
            })
        );

        assert!(mirror.navigate(9, "https://a.com".into()).await.is_err());
        drop(receiver);
        assert!(mirror.navigate(1, "https://a.com".into()).await.is_err());
        Ok(())
    }
}
