//! Single entry point of the core. Browser events, lifecycle signals, ui commands and ticks are
//! all processed one at a time by [SessionCoordinator::run], so at most one block list mutation
//! is ever in flight.

pub mod command;
pub mod handle;

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    blocker::BlockRuleManager,
    config::Settings,
    error::{SessionError, SessionResult},
    platform::{KeyValueStore, RuleTable, TabsApi},
    tracker::ActiveSessionTracker,
    utils::clock::Clock,
};

use command::{BrowserEvent, Command, Input, Lifecycle, Response};

/// Implementations of the platform contracts the core runs against.
#[derive(Clone)]
pub struct Platform {
    pub store: Arc<dyn KeyValueStore>,
    pub tabs: Arc<dyn TabsApi>,
    pub rules: Arc<dyn RuleTable>,
    pub clock: Arc<dyn Clock>,
}

pub struct SessionCoordinator {
    tracker: ActiveSessionTracker,
    blocker: BlockRuleManager,
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
}

impl SessionCoordinator {
    pub fn new(platform: Platform, settings: &Settings) -> Self {
        let tracker = ActiveSessionTracker::new(
            platform.store.clone(),
            platform.tabs.clone(),
            platform.clock.clone(),
            settings.scheme_policy,
        );
        let blocker = BlockRuleManager::new(
            platform.store,
            platform.tabs,
            platform.rules,
            settings.rule_template.clone(),
            settings.safe_page_url.clone(),
            settings.scheme_policy,
        );
        Self {
            tracker,
            blocker,
            clock: platform.clock,
            tick_interval: settings.tick_interval,
        }
    }

    pub async fn execute(&mut self, command: Command) -> Response {
        debug!("Executing {:?}", command);
        let response: Response = match command {
            Command::AddBlock { domain } => self.add_block(&domain).await.into(),
            Command::RemoveBlock { domain } => self.blocker.remove_block(&domain).await.into(),
            Command::ResetSession => self.reset_session().await.into(),
        };
        if let Some(e) = &response.error {
            error!("Command failed: {e}");
        }
        response
    }

    /// Blocks a domain. Open tabs on it were just sent to the block page, so the session is
    /// committed and derived again.
    pub async fn add_block(&mut self, domain: &str) -> SessionResult<String> {
        let domain = self.blocker.add_block(domain).await?;
        if let Err(e) = self.tracker.refresh().await {
            warn!("Couldn't refresh tracking after blocking {domain}: {e:?}");
        }
        Ok(domain)
    }

    /// Wipes counters, blocks and redirected tabs. Rules go before tabs, otherwise a released tab
    /// could be sent straight back to the block page by a rule that is still installed.
    pub async fn reset_session(&mut self) -> SessionResult<()> {
        self.tracker
            .clear_tracking_data()
            .await
            .map_err(SessionError::Storage)?;
        self.blocker.clear_blocking_rules().await?;
        self.blocker.unblock_all_tabs().await?;
        if let Err(e) = self.tracker.resume().await {
            warn!("Couldn't resume tracking after reset: {e:?}");
        }
        info!("Session reset");
        Ok(())
    }

    pub async fn handle_event(&mut self, event: BrowserEvent) {
        let result = match event {
            BrowserEvent::TabActivated { tab } => self.tracker.on_tab_activated(tab).await,
            BrowserEvent::TabNavigated { tab, url } => {
                self.tracker.on_tab_navigated(tab, url).await
            }
            BrowserEvent::WindowFocusChanged { focused } => {
                self.tracker.on_window_focus_changed(focused).await
            }
            BrowserEvent::IdleStateChanged { state } => {
                self.tracker.on_idle_state_changed(state).await
            }
        };
        if let Err(e) = result {
            error!("Failed to process browser event: {e:?}");
        }
    }

    /// Blocking is scoped to a single browser session, so it is dropped whenever the browser or
    /// the extension starts fresh.
    pub async fn handle_lifecycle(&mut self, lifecycle: Lifecycle) {
        info!("Clearing session blocks on {:?}", lifecycle);
        if let Err(e) = self.blocker.clear_blocking_rules().await {
            error!("Failed to clear blocking rules on {:?}: {e}", lifecycle);
        }
    }

    pub async fn tick(&mut self) {
        if let Err(e) = self.tracker.commit().await {
            error!("Periodic commit failed: {e:?}");
        }
    }

    async fn dispatch(&mut self, input: Input) {
        match input {
            Input::Browser(event) => self.handle_event(event).await,
            Input::Lifecycle(lifecycle) => self.handle_lifecycle(lifecycle).await,
            Input::Command { command, reply } => {
                let span = info_span!("Processing command");
                let response = self.execute(command).instrument(span).await;
                if reply.send(response).is_err() {
                    debug!("Requester went away before the response");
                }
            }
        }
    }

    /// Executes the coordinator event loop until shutdown or until every sender is gone. The
    /// running session is committed one last time before returning.
    pub async fn run(
        mut self,
        mut inputs: mpsc::Receiver<Input>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let clock = self.clock.clone();
        let mut tick_point = clock.instant() + self.tick_interval;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                input = inputs.recv() => match input {
                    Some(input) => self.dispatch(input).await,
                    None => break,
                },
                _ = clock.sleep_until(tick_point) => {
                    tick_point += self.tick_interval;
                    self.tick().await;
                }
            }
        }

        self.tick().await;
        inputs.close();
        info!("Session coordinator stopped");
        Ok(())
    }
}
