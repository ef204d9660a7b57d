//! # Core Configuration Module
//!
//! Provides configuration management for the player core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the injected bridges and the catalog settings. It
//! enforces fail-fast validation so a misconfigured host fails at startup,
//! not on the first click.
//!
//! ## Required Dependencies
//!
//! - `AudioOutputFactory` - Creates the live output handle and preload handles
//! - Catalog base URL
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - HTTP operations (desktop default: reqwest)
//! - `LoggerSink` - Host log forwarding
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .catalog_base_url("https://api.example.com")
//!     .output_factory(Arc::new(MyAudioFactory))
//!     .page_size(30)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Missing output factory and base URL
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{AudioOutputFactory, HttpClient, LoggerSink, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default number of tracks requested per catalog page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Default timeout for a single catalog request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Core configuration for the player.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Root of the catalog REST API
    pub catalog_base_url: Url,

    /// Tracks per catalog page
    pub page_size: u32,

    /// Timeout applied to each catalog request
    pub request_timeout: Duration,

    /// Retry policy for catalog requests
    pub retry_policy: RetryPolicy,

    /// Broadcast buffer for the event bus
    pub event_buffer_size: usize,

    /// HTTP client for catalog requests
    pub http_client: Arc<dyn HttpClient>,

    /// Audio output allocation (required)
    pub output_factory: Arc<dyn AudioOutputFactory>,

    /// Host logging sink (optional)
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("catalog_base_url", &self.catalog_base_url.as_str())
            .field("page_size", &self.page_size)
            .field("request_timeout", &self.request_timeout)
            .field("retry_policy", &self.retry_policy)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("http_client", &"HttpClient { ... }")
            .field("output_factory", &"AudioOutputFactory { ... }")
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The catalog URL is http(s) and can carry a path
    /// - Page size is within 1..=100
    /// - Request timeout is non-zero
    /// - Retry policy makes at least one attempt
    /// - Event buffer is non-empty
    pub fn validate(&self) -> Result<()> {
        match self.catalog_base_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::Config(format!(
                    "Catalog base URL must use http or https, got '{}'",
                    other
                )))
            }
        }

        if self.catalog_base_url.cannot_be_a_base() {
            return Err(Error::Config(
                "Catalog base URL cannot be used as a base for API paths".to_string(),
            ));
        }

        if self.page_size == 0 || self.page_size > 100 {
            return Err(Error::Config(format!(
                "Page size must be between 1 and 100, got {}",
                self.page_size
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if self.retry_policy.max_attempts == 0 {
            return Err(Error::Config(
                "Retry policy must allow at least one attempt".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn output_factory_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AudioOutputFactory".to_string(),
        message: "An AudioOutputFactory is required to create the live output handle. \
                 Web: wrap HtmlAudioElement. \
                 Native: wrap the platform media player."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::with_timeout(timeout));
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for catalog requests. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                 Web: inject a fetch-based client."
            .to_string(),
    })
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    catalog_base_url: Option<String>,
    page_size: Option<u32>,
    request_timeout: Option<Duration>,
    retry_policy: Option<RetryPolicy>,
    event_buffer_size: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
    output_factory: Option<Arc<dyn AudioOutputFactory>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
}

impl CoreConfigBuilder {
    /// Sets the root URL of the catalog API (required).
    pub fn catalog_base_url(mut self, url: impl Into<String>) -> Self {
        self.catalog_base_url = Some(url.into());
        self
    }

    /// Tracks per catalog page (default: 20).
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Sets the HTTP client. Optional when the `desktop-shims` feature is on.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the audio output factory (required).
    pub fn output_factory(mut self, factory: Arc<dyn AudioOutputFactory>) -> Self {
        self.output_factory = Some(factory);
        self
    }

    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if:
    /// - The output factory is missing
    /// - The catalog base URL is missing or malformed
    /// - No HTTP client was injected and no platform default exists
    /// - Any value fails [`CoreConfig::validate`]
    pub fn build(self) -> Result<CoreConfig> {
        let output_factory = self.output_factory.ok_or_else(output_factory_missing_error)?;

        let raw_url = self.catalog_base_url.ok_or_else(|| {
            Error::Config(
                "Catalog base URL is required. Use .catalog_base_url() to set it.".to_string(),
            )
        })?;
        let catalog_base_url = Url::parse(&raw_url)
            .map_err(|e| Error::Config(format!("Invalid catalog base URL '{}': {}", raw_url, e)))?;

        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let config = CoreConfig {
            catalog_base_url,
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            request_timeout,
            retry_policy: self.retry_policy.unwrap_or_default(),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            http_client,
            output_factory,
            logger_sink: self.logger_sink,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{
        AudioOutput, HttpRequest, HttpResponse, MediaError, OutputEventStream, ReadyState,
        StreamLocator,
    };

    struct NullOutput;

    #[async_trait]
    impl AudioOutput for NullOutput {
        fn load(&self, _locator: &StreamLocator) {}
        fn unload(&self) {}
        fn locator(&self) -> Option<StreamLocator> {
            None
        }
        async fn play(&self) -> std::result::Result<(), MediaError> {
            Ok(())
        }
        fn pause(&self) {}
        fn set_position(&self, _seconds: f64) {}
        fn position(&self) -> f64 {
            0.0
        }
        fn duration(&self) -> Option<f64> {
            None
        }
        fn ready_state(&self) -> ReadyState {
            ReadyState::HaveNothing
        }
        fn events(&self) -> OutputEventStream {
            Box::pin(futures::stream::empty())
        }
    }

    struct NullFactory;

    impl AudioOutputFactory for NullFactory {
        fn create_output(&self) -> Arc<dyn AudioOutput> {
            Arc::new(NullOutput)
        }
    }

    struct NullHttp;

    #[async_trait]
    impl HttpClient for NullHttp {
        async fn execute(&self, _request: HttpRequest) -> bridge_traits::error::Result<HttpResponse> {
            Err(bridge_traits::BridgeError::NotAvailable("offline".to_string()))
        }
    }

    fn complete_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .catalog_base_url("https://api.example.com/v1/")
            .output_factory(Arc::new(NullFactory))
            .http_client(Arc::new(NullHttp))
    }

    #[test]
    fn test_builder_with_required_fields() {
        let config = complete_builder().build().unwrap();

        assert_eq!(config.catalog_base_url.as_str(), "https://api.example.com/v1/");
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert_eq!(config.retry_policy, RetryPolicy::default());
        assert!(config.logger_sink.is_none());
    }

    #[test]
    fn test_builder_requires_output_factory() {
        let result = CoreConfig::builder()
            .catalog_base_url("https://api.example.com")
            .http_client(Arc::new(NullHttp))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "AudioOutputFactory")
            }
            other => panic!("expected CapabilityMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_requires_base_url() {
        let result = CoreConfig::builder()
            .output_factory(Arc::new(NullFactory))
            .http_client(Arc::new(NullHttp))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_rejects_malformed_url() {
        let result = complete_builder().catalog_base_url("not a url").build();
        assert!(matches!(result, Err(Error::Config(_))));

        let result = complete_builder().catalog_base_url("ftp://files.example.com").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_page_size() {
        assert!(complete_builder().page_size(0).build().is_err());
        assert!(complete_builder().page_size(101).build().is_err());
        assert_eq!(complete_builder().page_size(50).build().unwrap().page_size, 50);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        assert!(complete_builder()
            .request_timeout(Duration::ZERO)
            .build()
            .is_err());
        assert!(complete_builder().event_buffer_size(0).build().is_err());

        let no_attempts = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        assert!(complete_builder().retry_policy(no_attempts).build().is_err());
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_http_client_without_shims() {
        let result = CoreConfig::builder()
            .catalog_base_url("https://api.example.com")
            .output_factory(Arc::new(NullFactory))
            .build();
        assert!(matches!(result, Err(Error::CapabilityMissing { .. })));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_builder_uses_desktop_http_client() {
        let result = CoreConfig::builder()
            .catalog_base_url("https://api.example.com")
            .output_factory(Arc::new(NullFactory))
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_config_debug_hides_bridges() {
        let config = complete_builder().build().unwrap();
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("api.example.com"));
        assert!(rendered.contains("HttpClient { ... }"));
    }
}
