use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::{
    error::SessionError,
    platform::TabId,
    tracker::state::IdleState,
};

/// Requests issued by the ui.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    AddBlock {
        #[serde(default)]
        domain: String,
    },
    RemoveBlock {
        #[serde(default)]
        domain: String,
    },
    ResetSession,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            domain: None,
            error: None,
        }
    }

    pub fn ok_with_domain(domain: String) -> Self {
        Self {
            domain: Some(domain),
            ..Self::ok()
        }
    }

    pub fn failure(error: impl ToString) -> Self {
        Self {
            success: false,
            domain: None,
            error: Some(error.to_string()),
        }
    }
}

impl From<Result<(), SessionError>> for Response {
    fn from(value: Result<(), SessionError>) -> Self {
        match value {
            Ok(()) => Response::ok(),
            Err(e) => Response::failure(e),
        }
    }
}

impl From<Result<String, SessionError>> for Response {
    fn from(value: Result<String, SessionError>) -> Self {
        match value {
            Ok(domain) => Response::ok_with_domain(domain),
            Err(e) => Response::failure(e),
        }
    }
}

/// The only browser signals the tracker listens to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
    TabActivated { tab: TabId },
    TabNavigated { tab: TabId, url: String },
    WindowFocusChanged { focused: bool },
    IdleStateChanged { state: IdleState },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// The browser started with the extension already installed.
    Startup,
    /// The extension was installed or updated.
    Installed,
}

/// Everything the coordinator reacts to, funneled through one queue.
#[derive(Debug)]
pub enum Input {
    Browser(BrowserEvent),
    Lifecycle(Lifecycle),
    Command {
        command: Command,
        reply: oneshot::Sender<Response>,
    },
}
