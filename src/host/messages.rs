use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    coordinator::command::Response,
    platform::{rules::SessionRule, Tab, TabId, WindowId},
    tracker::state::IdleState,
};

/// Messages sent by the extension.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Inbound {
    AddBlock {
        request_id: Value,
        #[serde(default)]
        domain: String,
    },
    RemoveBlock {
        request_id: Value,
        #[serde(default)]
        domain: String,
    },
    ResetSession {
        request_id: Value,
    },
    TabActivated {
        tab_id: TabId,
        window_id: WindowId,
    },
    TabUpdated {
        tab: Tab,
    },
    TabRemoved {
        tab_id: TabId,
    },
    /// `windowId` is missing or negative when no browser window has focus.
    WindowFocusChanged {
        #[serde(default)]
        window_id: Option<WindowId>,
    },
    IdleStateChanged {
        state: IdleState,
    },
    Startup {
        #[serde(default)]
        tabs: Vec<Tab>,
        #[serde(default)]
        focused_window_id: Option<WindowId>,
    },
    Installed {
        #[serde(default)]
        tabs: Vec<Tab>,
        #[serde(default)]
        focused_window_id: Option<WindowId>,
    },
    SessionRules {
        rules: Vec<SessionRule>,
    },
}

/// Messages sent to the extension.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Outbound {
    Response {
        request_id: Value,
        #[serde(flatten)]
        response: Response,
    },
    Navigate {
        tab_id: TabId,
        url: String,
    },
    UpdateSessionRules {
        remove_rule_ids: Vec<u32>,
        add_rules: Vec<SessionRule>,
    },
}

/// Request id of a message that could not be parsed, so it still gets its answer.
pub fn request_id_of(raw: &Value) -> Option<Value> {
    raw.get("requestId").cloned()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parsing() {
        let add: Inbound =
            serde_json::from_value(json!({"type": "addBlock", "requestId": 7, "domain": "x.com"}))
                .unwrap();
        assert_eq!(
            add,
            Inbound::AddBlock {
                request_id: json!(7),
                domain: "x.com".into()
            }
        );
        let reset: Inbound =
            serde_json::from_value(json!({"type": "resetSession", "requestId": "r"})).unwrap();
        assert_eq!(
            reset,
            Inbound::ResetSession {
                request_id: json!("r")
            }
        );

        let updated: Inbound = serde_json::from_value(json!({
            "type": "tabUpdated",
            "tab": {"id": 3, "windowId": 1, "url": "https://a.com/", "active": true}
        }))
        .unwrap();
        assert_eq!(
            updated,
            Inbound::TabUpdated {
                tab: Tab {
                    id: 3,
                    window_id: 1,
                    url: Some("https://a.com/".into()),
                    active: true
                }
            }
        );

        let unfocused: Inbound =
            serde_json::from_value(json!({"type": "windowFocusChanged"})).unwrap();
        assert_eq!(unfocused, Inbound::WindowFocusChanged { window_id: None });

        let idle: Inbound =
            serde_json::from_value(json!({"type": "idleStateChanged", "state": "locked"}))
                .unwrap();
        assert_eq!(
            idle,
            Inbound::IdleStateChanged {
                state: IdleState::Locked
            }
        );
        assert!(serde_json::from_value::<Inbound>(json!({"type": "tabMoved"})).is_err());
    }

    #[test]
    fn test_outbound_shape() {
        let response = Outbound::Response {
            request_id: json!("r1"),
            response: Response::ok_with_domain("x.com".into()),
        };
        assert_eq!(
            serde_json::to_value(response).unwrap(),
            json!({"type": "response", "requestId": "r1", "success": true, "domain": "x.com"})
        );
        assert_eq!(
            serde_json::to_value(Outbound::Navigate {
                tab_id: 4,
                url: "chrome://newtab".into()
            })
            .unwrap(),
            json!({"type": "navigate", "tabId": 4, "url": "chrome://newtab"})
        );
        assert_eq!(
            serde_json::to_value(Outbound::UpdateSessionRules {
                remove_rule_ids: vec![1000],
                add_rules: vec![]
            })
            .unwrap(),
            json!({"type": "updateSessionRules", "removeRuleIds": [1000], "addRules": []})
        );
    }

    #[test]
    fn test_request_id_of_broken_message() {
        let raw = json!({"type": "addBlock", "requestId": 9, "domain": 5});
        assert!(serde_json::from_value::<Inbound>(raw.clone()).is_err());
        assert_eq!(request_id_of(&raw), Some(json!(9)));
    }
}
