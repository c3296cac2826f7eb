//! Accounting of time spent on the active tab. [ActiveSessionTracker] executes the effects
//! decided by the [state] machine against storage and the tabs api.

pub mod state;

use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Map};
use tracing::{debug, info, warn};

use crate::{
    domain::SchemePolicy,
    platform::{KeyValueStore, TabId, TabsApi},
    storage::{counter_value, BLOCK_LIST_KEY},
    utils::clock::Clock,
};

use state::{Effect, IdleState, TrackerEvent, TrackerState};

pub struct ActiveSessionTracker {
    state: TrackerState,
    store: Arc<dyn KeyValueStore>,
    tabs: Arc<dyn TabsApi>,
    clock: Arc<dyn Clock>,
    policy: SchemePolicy,
}

impl ActiveSessionTracker {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        tabs: Arc<dyn TabsApi>,
        clock: Arc<dyn Clock>,
        policy: SchemePolicy,
    ) -> Self {
        Self {
            state: TrackerState::default(),
            store,
            tabs,
            clock,
            policy,
        }
    }

    pub fn active_domain(&self) -> Option<&str> {
        self.state.active_domain()
    }

    pub async fn on_tab_activated(&mut self, tab: TabId) -> Result<()> {
        self.handle(TrackerEvent::TabActivated { tab }).await
    }

    pub async fn on_tab_navigated(&mut self, tab: TabId, url: String) -> Result<()> {
        self.handle(TrackerEvent::TabNavigated { tab, url }).await
    }

    pub async fn on_window_focus_changed(&mut self, focused: bool) -> Result<()> {
        self.handle(TrackerEvent::WindowFocusChanged { focused })
            .await
    }

    pub async fn on_idle_state_changed(&mut self, state: IdleState) -> Result<()> {
        self.handle(TrackerEvent::IdleStateChanged { state }).await
    }

    /// Credits time spent on the current session so far. Safe to call at any moment, redundant
    /// calls credit nothing.
    pub async fn commit(&mut self) -> Result<()> {
        self.handle(TrackerEvent::Tick).await
    }

    /// Removes every domain counter while keeping the block list. The running session is dropped
    /// without being credited, [Self::resume] starts it again.
    pub async fn clear_tracking_data(&mut self) -> Result<()> {
        self.state = self.state.discard();

        let items = self.store.get_all().await?;
        let keys: Vec<String> = items
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| key != BLOCK_LIST_KEY)
            .collect();
        if !keys.is_empty() {
            debug!("Removing {} counters", keys.len());
            self.store.remove(keys).await?;
        }
        info!("Time tracking data cleared");
        Ok(())
    }

    /// Reopens a session for the active tab, if the user is present to look at it.
    pub async fn resume(&mut self) -> Result<()> {
        if self.state.presence.allows_tracking() {
            self.rederive().await
        } else {
            Ok(())
        }
    }

    /// Credits the running session and derives a new one from the active tab. Needed after the
    /// active tab was moved by something the browser reports no event for.
    pub async fn refresh(&mut self) -> Result<()> {
        self.commit().await?;
        self.resume().await
    }

    async fn handle(&mut self, event: TrackerEvent) -> Result<()> {
        let now = self.clock.time();
        let (next, effects) = self.state.step(&event, now);
        if next.session != self.state.session {
            debug!("Session {:?} -> {:?} on {:?}", self.state.session, next.session, event);
        }
        self.state = next;

        // Every effect is attempted, a failed credit must not keep the session from reopening.
        let mut result = Ok(());
        for effect in effects {
            let outcome = match effect {
                Effect::Credit { domain, seconds } => self.credit(&domain, seconds).await,
                Effect::Rederive => self.rederive().await,
            };
            if let Err(e) = outcome {
                warn!("Failed to apply tracking effect: {e:?}");
                result = result.and(Err(e));
            }
        }
        result
    }

    async fn credit(&self, domain: &str, seconds: u64) -> Result<()> {
        let current = self.store.get(vec![domain.to_owned()]).await?;
        let total = counter_value(current.get(domain)) + seconds;

        let mut items = Map::new();
        items.insert(domain.to_owned(), json!(total));
        self.store.set(items).await?;
        debug!("Credited {seconds}s to {domain}, {total}s in total");
        Ok(())
    }

    async fn rederive(&mut self) -> Result<()> {
        let tab = self.tabs.active_tab().await?;
        let url = tab.and_then(|tab| tab.url);
        self.state = self
            .state
            .reopen(url.as_deref(), &self.policy, self.clock.time());
        if let Some(domain) = self.state.active_domain() {
            debug!("Tracking {domain}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Map, Value};

    use crate::{
        domain::SchemePolicy,
        platform::{
            memory::{MemoryBrowser, MemoryStore},
            KeyValueStore, MockKeyValueStore,
        },
        storage::BLOCK_LIST_KEY,
        utils::{clock::ManualClock, logging::TEST_LOGGING},
    };

    use super::{state::IdleState, ActiveSessionTracker};

    struct Fixture {
        store: Arc<MemoryStore>,
        browser: Arc<MemoryBrowser>,
        clock: Arc<ManualClock>,
        tracker: ActiveSessionTracker,
    }

    fn fixture() -> Fixture {
        *TEST_LOGGING;
        let store = Arc::new(MemoryStore::new());
        let browser = Arc::new(MemoryBrowser::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2018, 7, 4, 0, 0, 0).unwrap(),
        ));
        let tracker = ActiveSessionTracker::new(
            store.clone(),
            browser.clone(),
            clock.clone(),
            SchemePolicy::web_only(),
        );
        Fixture {
            store,
            browser,
            clock,
            tracker,
        }
    }

    fn counter(store: &MemoryStore, domain: &str) -> Option<Value> {
        store.snapshot().get(domain).cloned()
    }

    #[tokio::test]
    async fn test_switching_tabs_splits_time() -> Result<()> {
        let mut f = fixture();
        f.browser.open_tab(1, 1, "https://a.com/page", true);
        f.browser.open_tab(2, 1, "https://b.com/", false);
        f.browser.focus_window(Some(1));
        f.tracker.on_window_focus_changed(true).await?;
        assert_eq!(f.tracker.active_domain(), Some("a.com"));

        f.clock.advance_secs(10);
        f.browser.activate_tab(2);
        f.tracker.on_tab_activated(2).await?;
        assert_eq!(f.tracker.active_domain(), Some("b.com"));

        f.clock.advance_secs(5);
        f.tracker.commit().await?;

        assert_eq!(counter(&f.store, "a.com"), Some(json!(10)));
        assert_eq!(counter(&f.store, "b.com"), Some(json!(5)));
        Ok(())
    }

    #[tokio::test]
    async fn test_redundant_commits_credit_once() -> Result<()> {
        let mut f = fixture();
        f.browser.open_tab(1, 1, "https://a.com", true);
        f.browser.focus_window(Some(1));
        f.tracker.on_window_focus_changed(true).await?;

        f.clock.advance_secs(4);
        f.tracker.commit().await?;
        f.tracker.commit().await?;
        assert_eq!(counter(&f.store, "a.com"), Some(json!(4)));

        f.clock.advance_secs(3);
        f.tracker.commit().await?;
        assert_eq!(counter(&f.store, "a.com"), Some(json!(7)));
        Ok(())
    }

    #[tokio::test]
    async fn test_unfocused_and_idle_time_is_not_counted() -> Result<()> {
        let mut f = fixture();
        f.browser.open_tab(1, 1, "https://a.com", true);
        f.browser.focus_window(Some(1));
        f.tracker.on_window_focus_changed(true).await?;

        f.clock.advance_secs(2);
        f.browser.focus_window(None);
        f.tracker.on_window_focus_changed(false).await?;
        assert_eq!(f.tracker.active_domain(), None);

        f.clock.advance_secs(100);
        f.tracker.commit().await?;
        f.browser.focus_window(Some(1));
        f.tracker.on_window_focus_changed(true).await?;

        f.clock.advance_secs(3);
        f.tracker.on_idle_state_changed(IdleState::Locked).await?;
        f.clock.advance_secs(50);
        // A background navigation while locked must not reopen tracking.
        f.tracker
            .on_tab_navigated(1, "https://a.com/other".into())
            .await?;
        assert_eq!(f.tracker.active_domain(), None);
        f.clock.advance_secs(50);
        f.tracker.on_idle_state_changed(IdleState::Active).await?;
        assert_eq!(f.tracker.active_domain(), Some("a.com"));

        assert_eq!(counter(&f.store, "a.com"), Some(json!(5)));
        Ok(())
    }

    #[tokio::test]
    async fn test_unsupported_tab_is_not_tracked() -> Result<()> {
        let mut f = fixture();
        f.browser.open_tab(1, 1, "chrome://settings/", true);
        f.browser.focus_window(Some(1));
        f.tracker.on_window_focus_changed(true).await?;
        assert_eq!(f.tracker.active_domain(), None);

        f.clock.advance_secs(30);
        f.browser.set_url(1, "https://a.com/");
        f.tracker
            .on_tab_navigated(1, "https://a.com/".into())
            .await?;
        assert_eq!(f.tracker.active_domain(), Some("a.com"));
        assert!(f.store.snapshot().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_clear_keeps_block_list() -> Result<()> {
        let mut f = fixture();
        let mut items = Map::new();
        items.insert("a.com".into(), json!(10));
        items.insert(BLOCK_LIST_KEY.into(), json!(["x.com"]));
        f.store.set(items).await?;

        f.browser.open_tab(1, 1, "https://a.com", true);
        f.browser.focus_window(Some(1));
        f.tracker.on_window_focus_changed(true).await?;
        f.clock.advance_secs(8);

        f.tracker.clear_tracking_data().await?;
        assert_eq!(f.tracker.active_domain(), None);
        let snapshot = f.store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[BLOCK_LIST_KEY], json!(["x.com"]));

        // Time spent before the clear is gone for good.
        f.tracker.resume().await?;
        f.clock.advance_secs(2);
        f.tracker.commit().await?;
        assert_eq!(counter(&f.store, "a.com"), Some(json!(2)));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_credit_still_reopens() -> Result<()> {
        *TEST_LOGGING;
        let mut store = MockKeyValueStore::new();
        store
            .expect_get()
            .returning(|_| Err(anyhow!("storage unavailable")));
        let browser = Arc::new(MemoryBrowser::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2018, 7, 4, 0, 0, 0).unwrap(),
        ));
        let mut tracker = ActiveSessionTracker::new(
            Arc::new(store),
            browser.clone(),
            clock.clone(),
            SchemePolicy::web_only(),
        );
        browser.open_tab(1, 1, "https://a.com", true);
        browser.open_tab(2, 1, "https://b.com", false);
        browser.focus_window(Some(1));
        tracker.on_window_focus_changed(true).await?;

        clock.advance_secs(3);
        browser.activate_tab(2);
        assert!(tracker.on_tab_activated(2).await.is_err());
        assert_eq!(tracker.active_domain(), Some("b.com"));
        Ok(())
    }
}
