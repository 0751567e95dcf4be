//! Where geometry bytes come from.
//!
//! [`GeometrySource`] is the seam between the fetch cache and the network.
//! The cache's worker threads call it with blocking semantics; the HTTP
//! implementation talks to the generation service over `ureq`.

use super::{GeometryError, GeometryRequestKey};

/// Blocking access to the generation service contract.
///
/// Implementations are shared between worker threads, so they must be
/// `Send + Sync`. Both methods return raw response bodies; parsing and
/// validation happen in the cache so every source is held to the same
/// contract.
pub trait GeometrySource: Send + Sync {
    /// Fetch the metadata envelope for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Transport`] on network or HTTP failure.
    fn fetch_metadata(
        &self,
        key: &GeometryRequestKey,
    ) -> Result<Vec<u8>, GeometryError>;

    /// Fetch one mesh buffer from `models/{model_id}/{model}`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Transport`] on network or HTTP failure.
    fn fetch_mesh(
        &self,
        model_id: &str,
        model: &str,
    ) -> Result<Vec<u8>, GeometryError>;
}

#[cfg(feature = "http")]
pub use http::HttpGeometrySource;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use super::GeometrySource;
    use crate::geometry::{GeometryError, GeometryRequestKey};
    use crate::options::ServiceOptions;

    /// Upper bound on a single response body.
    const MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;

    /// [`GeometrySource`] backed by the HTTP generation service.
    pub struct HttpGeometrySource {
        agent: ureq::Agent,
        base_url: String,
    }

    impl HttpGeometrySource {
        /// Create a source for the service described by `options`.
        #[must_use]
        pub fn new(options: &ServiceOptions) -> Self {
            let config = ureq::Agent::config_builder()
                .timeout_global(Some(Duration::from_millis(options.timeout_ms)))
                .build();
            Self {
                agent: config.into(),
                base_url: options.base_url.trim_end_matches('/').to_owned(),
            }
        }

        /// Service base URL without a trailing slash.
        #[must_use]
        pub fn base_url(&self) -> &str {
            &self.base_url
        }

        fn get(&self, url: &str) -> Result<Vec<u8>, GeometryError> {
            log::debug!("GET {url}");
            let mut response = self
                .agent
                .get(url)
                .call()
                .map_err(|e| GeometryError::transport(url, e))?;
            response
                .body_mut()
                .with_config()
                .limit(MAX_BODY_BYTES)
                .read_to_vec()
                .map_err(|e| GeometryError::transport(url, e))
        }
    }

    impl GeometrySource for HttpGeometrySource {
        fn fetch_metadata(
            &self,
            key: &GeometryRequestKey,
        ) -> Result<Vec<u8>, GeometryError> {
            self.get(&format!("{}/{}", self.base_url, key.path()))
        }

        fn fetch_mesh(
            &self,
            model_id: &str,
            model: &str,
        ) -> Result<Vec<u8>, GeometryError> {
            self.get(&format!("{}/models/{model_id}/{model}", self.base_url))
        }
    }
}
