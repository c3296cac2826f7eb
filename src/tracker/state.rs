//! The tracking state machine. Transitions are pure: they take the current state, an event and
//! the current time, and return the next state together with the side effects the caller has to
//! perform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::SchemePolicy,
    platform::TabId,
    utils::time::elapsed_whole_seconds,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Tracking {
        domain: String,
        since: DateTime<Utc>,
    },
}

/// Whether the user is in a position to be looking at the active tab at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presence {
    pub window_focused: bool,
    pub user_active: bool,
}

impl Presence {
    pub fn allows_tracking(&self) -> bool {
        self.window_focused && self.user_active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleState {
    Active,
    Idle,
    Locked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    TabActivated { tab: TabId },
    TabNavigated { tab: TabId, url: String },
    WindowFocusChanged { focused: bool },
    IdleStateChanged { state: IdleState },
    Tick,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Add seconds to the counter of a domain.
    Credit { domain: String, seconds: u64 },
    /// Look up the active tab of the focused window and reopen a session with
    /// [TrackerState::reopen].
    Rederive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerState {
    pub session: SessionState,
    pub presence: Presence,
}

impl Default for TrackerState {
    /// Nothing is known about the browser yet, so the window is assumed unfocused until the first
    /// focus event arrives.
    fn default() -> Self {
        Self {
            session: SessionState::Idle,
            presence: Presence {
                window_focused: false,
                user_active: true,
            },
        }
    }
}

impl TrackerState {
    pub fn active_domain(&self) -> Option<&str> {
        match &self.session {
            SessionState::Tracking { domain, .. } => Some(domain),
            SessionState::Idle => None,
        }
    }

    /// Moves the session start to `now`, crediting whole seconds spent since the previous commit.
    /// Committing twice at the same moment credits nothing the second time.
    pub fn commit(&self, now: DateTime<Utc>) -> (TrackerState, Option<Effect>) {
        match &self.session {
            SessionState::Idle => (self.clone(), None),
            SessionState::Tracking { domain, since } => {
                let seconds = elapsed_whole_seconds(*since, now);
                let next = TrackerState {
                    session: SessionState::Tracking {
                        domain: domain.clone(),
                        since: now,
                    },
                    presence: self.presence,
                };
                let effect = (seconds > 0).then(|| Effect::Credit {
                    domain: domain.clone(),
                    seconds,
                });
                (next, effect)
            }
        }
    }

    pub fn step(&self, event: &TrackerEvent, now: DateTime<Utc>) -> (TrackerState, Vec<Effect>) {
        let (mut next, credit) = self.commit(now);
        let mut effects: Vec<Effect> = credit.into_iter().collect();

        match event {
            TrackerEvent::Tick => return (next, effects),
            TrackerEvent::WindowFocusChanged { focused } => {
                next.presence.window_focused = *focused;
            }
            TrackerEvent::IdleStateChanged { state } => {
                next.presence.user_active = *state == IdleState::Active;
            }
            TrackerEvent::TabActivated { .. } | TrackerEvent::TabNavigated { .. } => {}
        }

        next.session = SessionState::Idle;
        if next.presence.allows_tracking() {
            effects.push(Effect::Rederive);
        }
        (next, effects)
    }

    /// Opens a session for the url of the tab found by [Effect::Rederive]. Tabs without a url or
    /// with an unsupported one leave the tracker idle.
    pub fn reopen(
        &self,
        url: Option<&str>,
        policy: &SchemePolicy,
        now: DateTime<Utc>,
    ) -> TrackerState {
        let session = match url.and_then(|url| policy.extract(url)) {
            Some(domain) if self.presence.allows_tracking() => SessionState::Tracking {
                domain,
                since: now,
            },
            _ => SessionState::Idle,
        };
        TrackerState {
            session,
            presence: self.presence,
        }
    }

    /// Forgets the current session without crediting it.
    pub fn discard(&self) -> TrackerState {
        TrackerState {
            session: SessionState::Idle,
            presence: self.presence,
        }
    }
}
