use serde::{Deserialize, Serialize};

/// A session scoped network rule, in the shape the browser's declarative rule api uses on the
/// wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRule {
    pub id: u32,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuleAction {
    Redirect { redirect: Redirect },
    Block,
    Allow,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_filter: Option<String>,
    #[serde(default)]
    pub resource_types: Vec<ResourceType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Script,
    Image,
    #[serde(other)]
    Other,
}

impl SessionRule {
    pub fn redirect_target(&self) -> Option<&str> {
        match &self.action {
            RuleAction::Redirect { redirect } => redirect.url.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_wire_shape() {
        let rule = SessionRule {
            id: 1000,
            priority: 1,
            action: RuleAction::Redirect {
                redirect: Redirect {
                    url: Some("chrome-extension://abc/block.html".into()),
                },
            },
            condition: RuleCondition {
                url_filter: Some("||x.com".into()),
                resource_types: vec![ResourceType::MainFrame],
            },
        };
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": 1000,
                "priority": 1,
                "action": {
                    "type": "redirect",
                    "redirect": { "url": "chrome-extension://abc/block.html" }
                },
                "condition": {
                    "urlFilter": "||x.com",
                    "resourceTypes": ["main_frame"]
                }
            })
        );
    }

    #[test]
    fn test_foreign_rule_parsing() {
        let raw = r#"{"id":7,"priority":2,"action":{"type":"block"},
            "condition":{"urlFilter":"ads","resourceTypes":["script","xmlhttprequest"]}}"#;
        let rule: SessionRule = serde_json::from_str(raw).unwrap();
        assert_eq!(rule.id, 7);
        assert_eq!(rule.action, RuleAction::Block);
        assert_eq!(
            rule.condition.resource_types,
            vec![ResourceType::Script, ResourceType::Other]
        );
        assert_eq!(rule.redirect_target(), None);
    }
}
