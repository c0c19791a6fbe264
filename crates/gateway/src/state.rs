//! Shared application state for the gateway

use beacon_auth::Authenticator;
use beacon_hub::HubHandle;

/// Everything a request handler needs: the running hub and the token verifier.
#[derive(Clone)]
pub struct GatewayState {
    pub hub: HubHandle,
    pub authenticator: Authenticator,
}

impl GatewayState {
    pub fn new(hub: HubHandle, authenticator: Authenticator) -> Self {
        Self { hub, authenticator }
    }
}
