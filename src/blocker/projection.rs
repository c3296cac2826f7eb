//! The rule set is a pure function of the block list.

use crate::platform::rules::{
    Redirect, ResourceType, RuleAction, RuleCondition, SessionRule,
};

/// Rule ids below this value belong to someone else and are never touched.
pub const DEFAULT_RULE_ID_BASE: u32 = 1000;
pub const DEFAULT_RULE_PRIORITY: u32 = 1;

/// Everything about a redirect rule that doesn't depend on the blocked domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTemplate {
    pub id_base: u32,
    pub priority: u32,
    pub redirect_url: String,
}

impl RuleTemplate {
    pub fn new(redirect_url: impl Into<String>) -> Self {
        Self {
            id_base: DEFAULT_RULE_ID_BASE,
            priority: DEFAULT_RULE_PRIORITY,
            redirect_url: redirect_url.into(),
        }
    }

    pub fn is_owned(&self, rule_id: u32) -> bool {
        rule_id >= self.id_base
    }

    /// The complete rule set for a block list. Entry `i` of the list always becomes rule
    /// `id_base + i`, so the result only depends on the list.
    pub fn project(&self, blocked: &[String]) -> Vec<SessionRule> {
        blocked
            .iter()
            .zip(self.id_base..)
            .map(|(domain, id)| SessionRule {
                id,
                priority: self.priority,
                action: RuleAction::Redirect {
                    redirect: Redirect {
                        url: Some(self.redirect_url.clone()),
                    },
                },
                condition: RuleCondition {
                    url_filter: Some(format!("||{domain}")),
                    resource_types: vec![ResourceType::MainFrame],
                },
            })
            .collect()
    }

    pub fn owned_ids(&self, installed: &[SessionRule]) -> Vec<u32> {
        installed
            .iter()
            .map(|rule| rule.id)
            .filter(|id| self.is_owned(*id))
            .collect()
    }
}
