use serde::{Deserialize, Serialize};

use crate::UserId;

/// Request metadata attached to a permission-affecting mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    actor: UserId,
    source_address: Option<String>,
    user_agent: Option<String>,
}

impl AuditContext {
    /// Creates an audit context for the acting user.
    #[must_use]
    pub fn new(actor: UserId, source_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            actor,
            source_address,
            user_agent,
        }
    }

    /// Creates an audit context carrying only the actor.
    #[must_use]
    pub fn for_actor(actor: UserId) -> Self {
        Self::new(actor, None, None)
    }

    /// Returns the acting user.
    #[must_use]
    pub fn actor(&self) -> UserId {
        self.actor
    }

    /// Returns the client address, when the transport exposed one.
    #[must_use]
    pub fn source_address(&self) -> Option<&str> {
        self.source_address.as_deref()
    }

    /// Returns the client user agent, when the transport exposed one.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }
}
