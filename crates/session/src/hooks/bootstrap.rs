//! Silent session restore on application start

use crate::auth::SessionStore;
use tracing::{debug, info};

/// Try once per store to restore an anonymous session from the refresh cookie.
///
/// Later calls, and calls on an already authenticated store, issue no request.
/// A failed restore is not an error for the caller: the store has already
/// been forced back to anonymous. Returns whether the session is authenticated.
pub async fn bootstrap(store: &SessionStore) -> bool {
    if !store.claim_bootstrap() || store.is_authenticated() {
        return store.is_authenticated();
    }

    match store.refresh_token().await {
        Ok(()) => {
            info!("session restored from refresh cookie");
            true
        }
        Err(err) => {
            debug!(error = %err, "no session to restore");
            false
        }
    }
}
