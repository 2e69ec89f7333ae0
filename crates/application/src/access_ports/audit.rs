use async_trait::async_trait;
use retreat_access_core::{AppResult, AuditContext, RetreatId, UserId};
use retreat_access_domain::AuditAction;

/// Immutable audit event payload emitted by application services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Retreat scope, absent for global changes.
    pub retreat_id: Option<RetreatId>,
    /// User that performed the action, absent for scheduled maintenance.
    pub actor: Option<UserId>,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Resource type label.
    pub resource_type: String,
    /// Resource identifier.
    pub resource_id: String,
    /// Optional audit detail payload.
    pub detail: Option<String>,
    /// Client address captured by the transport, when known.
    pub source_address: Option<String>,
    /// Client user agent captured by the transport, when known.
    pub user_agent: Option<String>,
}

impl AuditEvent {
    /// Creates an event without actor, scope or detail.
    #[must_use]
    pub fn new(
        action: AuditAction,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            retreat_id: None,
            actor: None,
            action,
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            detail: None,
            source_address: None,
            user_agent: None,
        }
    }

    /// Scopes the event to a retreat.
    #[must_use]
    pub fn in_retreat(mut self, retreat_id: RetreatId) -> Self {
        self.retreat_id = Some(retreat_id);
        self
    }

    /// Attributes the event to the acting user and their transport details.
    #[must_use]
    pub fn by(mut self, context: &AuditContext) -> Self {
        self.actor = Some(context.actor());
        self.source_address = context.source_address().map(str::to_owned);
        self.user_agent = context.user_agent().map(str::to_owned);
        self
    }

    /// Attaches a human readable detail string.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}
