//! Forwarding handler bound to a single origin.
//!
//! # Responsibilities
//! - Own the HTTP client (and its connection pool) used for one origin
//! - Apply the upstream timeout and TLS-verification settings
//!
//! The timeout bounds connecting and each silent stretch of the exchange
//! (waiting for headers, then between body chunks); see the forwarder.
//! - Build upstream URLs that can never escape the bound origin

use std::time::Duration;

use reqwest::redirect;
use url::Url;

use crate::config::UpstreamConfig;
use crate::dispatch::error::ProxyError;
use crate::dispatch::origin::{OriginKey, Target};

/// Something the registry can cache per origin and close on shutdown.
pub trait OriginHandler: Send + Sync + 'static {
    /// Origin this handler was created for.
    fn origin(&self) -> &OriginKey;

    /// Called once when the handler leaves the registry during drain.
    fn close(&self);
}

/// Relays requests to one origin through a dedicated client.
#[derive(Debug)]
pub struct ForwardingHandler {
    origin: OriginKey,
    base: Url,
    client: reqwest::Client,
    idle_timeout: Duration,
}

impl ForwardingHandler {
    /// Build a handler for `origin` using the upstream settings.
    pub fn new(origin: OriginKey, config: &UpstreamConfig) -> Result<Self, ProxyError> {
        let base = Url::parse(origin.as_str())
            .map_err(|e| ProxyError::invalid_target(origin.as_str(), e))?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout())
            .danger_accept_invalid_certs(!config.verify_tls)
            .redirect(redirect::Policy::none())
            .no_proxy()
            .build()
            .map_err(|source| ProxyError::HandlerConstruction {
                origin: origin.clone(),
                source,
            })?;

        Ok(Self {
            origin,
            base,
            client,
            idle_timeout: config.timeout(),
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Longest silence tolerated from the origin.
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Upstream URL for `target`: this handler's origin with the target's path
    /// and query.
    pub fn upstream_url(&self, target: &Target) -> Url {
        let mut url = self.base.clone();
        url.set_path(target.url().path());
        url.set_query(target.url().query());
        url
    }
}

impl OriginHandler for ForwardingHandler {
    fn origin(&self) -> &OriginKey {
        &self.origin
    }

    fn close(&self) {
        // Nothing to release eagerly: the client pool is dropped with the last
        // Arc, after in-flight requests holding one finish.
    }
}
