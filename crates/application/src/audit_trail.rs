use std::sync::Arc;

use tracing::warn;

use crate::{AuditEvent, AuditRepository};

/// Best-effort audit writer. A failed append never fails the mutation that
/// produced the event.
#[derive(Clone)]
pub(crate) struct AuditTrail {
    repository: Arc<dyn AuditRepository>,
}

impl AuditTrail {
    pub(crate) fn new(repository: Arc<dyn AuditRepository>) -> Self {
        Self { repository }
    }

    pub(crate) async fn record(&self, event: AuditEvent) {
        let action = event.action;
        let resource_id = event.resource_id.clone();
        if let Err(error) = self.repository.append_event(event).await {
            warn!(
                action = action.as_str(),
                resource_id = %resource_id,
                %error,
                "failed to append audit event"
            );
        }
    }
}
