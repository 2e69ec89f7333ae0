use std::sync::Arc;

use ipnet::IpNet;
use retreat_access_application::AccessControlService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub access_control: AccessControlService,
    pub trusted_proxies: Arc<Vec<IpNet>>,
    pub storage_backend: &'static str,
}
