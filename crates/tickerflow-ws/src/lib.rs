//! WebSocket proxy for exchange connections.
//!
//! Provides the connection manager each exchange adapter owns:
//! - eager dial with channel-based bidirectional frame routing
//! - single immediate redial on unexpected close
//! - subscription replay in original order after a reconnect
//! - interrupt with a normal close frame

pub mod error;
pub mod proxy;
pub mod subscription_log;

pub use error::{WsError, WsResult};
pub use proxy::{Proxy, ProxyConfig, ProxyHandle, ProxyState};
pub use subscription_log::SubscriptionLog;

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
