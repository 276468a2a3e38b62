//! Configuration for a document session and its HTTP backend.
//!
//! Everything tunable lives in [`SessionConfig`], built via
//! [`SessionConfigBuilder`]. Callers set only what they care about and rely
//! on the defaults for the rest.

use crate::error::SessionError;
use crate::observer::SharedObserver;
use std::fmt;
use std::time::Duration;

/// Configuration for a [`crate::SessionController`] and [`crate::HttpBackend`].
///
/// # Example
/// ```rust
/// use edgequake_pdfchat::SessionConfig;
///
/// let config = SessionConfig::builder()
///     .base_url("http://localhost:5001")
///     .content_timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct SessionConfig {
    /// Root of the document service, e.g. `http://localhost:5001`.
    /// Metadata, content and query endpoints hang off this URL.
    pub base_url: String,

    /// Full upload endpoint. Default: `{base_url}/api/documents/upload`.
    ///
    /// Some deployments host the upload service separately from the
    /// document/query service; set this to point at it.
    pub upload_url: Option<String>,

    /// Bounded wait for the content transfer step. Default: 30 s.
    ///
    /// Expiry fails the load with a timeout message; it is not retried.
    pub content_timeout: Duration,

    /// TCP connect timeout for every request, in seconds. Default: 10.
    pub connect_timeout_secs: u64,

    /// Upload request timeout in seconds. Default: 60.
    pub upload_timeout_secs: u64,

    /// Per-question timeout in seconds. Default: None (no limit).
    ///
    /// The session core imposes no timeout on questions; this only
    /// configures the HTTP transport.
    pub query_timeout_secs: Option<u64>,

    /// Largest PDF payload accepted while streaming content. Default: 100 MiB.
    pub max_content_bytes: u64,

    /// Longest edge of a rendered page image in pixels. Default: 2000.
    pub render_max_pixels: u32,

    /// Open each conversation with an assistant greeting. Default: true.
    pub greeting: bool,

    /// Receives every state change the controller applies.
    pub observer: Option<SharedObserver>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5001".to_string(),
            upload_url: None,
            content_timeout: Duration::from_secs(30),
            connect_timeout_secs: 10,
            upload_timeout_secs: 60,
            query_timeout_secs: None,
            max_content_bytes: 100 * 1024 * 1024,
            render_max_pixels: 2000,
            greeting: true,
            observer: None,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("base_url", &self.base_url)
            .field("upload_url", &self.upload_url)
            .field("content_timeout", &self.content_timeout)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("upload_timeout_secs", &self.upload_timeout_secs)
            .field("query_timeout_secs", &self.query_timeout_secs)
            .field("max_content_bytes", &self.max_content_bytes)
            .field("render_max_pixels", &self.render_max_pixels)
            .field("greeting", &self.greeting)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn SessionObserver>"))
            .finish()
    }
}

impl SessionConfig {
    /// Create a new builder for `SessionConfig`.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The upload endpoint, derived from `base_url` unless overridden.
    pub fn upload_endpoint(&self) -> String {
        match &self.upload_url {
            Some(url) => url.clone(),
            None => format!("{}/api/documents/upload", self.base_url.trim_end_matches('/')),
        }
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn upload_url(mut self, url: impl Into<String>) -> Self {
        self.config.upload_url = Some(url.into());
        self
    }

    pub fn content_timeout(mut self, timeout: Duration) -> Self {
        self.config.content_timeout = timeout;
        self
    }

    pub fn content_timeout_secs(mut self, secs: u64) -> Self {
        self.config.content_timeout = Duration::from_secs(secs);
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload_timeout_secs = secs;
        self
    }

    pub fn query_timeout_secs(mut self, secs: u64) -> Self {
        self.config.query_timeout_secs = Some(secs);
        self
    }

    pub fn max_content_bytes(mut self, n: u64) -> Self {
        self.config.max_content_bytes = n;
        self
    }

    pub fn render_max_pixels(mut self, px: u32) -> Self {
        self.config.render_max_pixels = px.max(100);
        self
    }

    pub fn greeting(mut self, v: bool) -> Self {
        self.config.greeting = v;
        self
    }

    pub fn observer(mut self, observer: SharedObserver) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SessionConfig, SessionError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(SessionError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.content_timeout.is_zero() {
            return Err(SessionError::InvalidConfig(
                "Content timeout must be > 0".into(),
            ));
        }
        if c.connect_timeout_secs == 0 {
            return Err(SessionError::InvalidConfig(
                "Connect timeout must be > 0".into(),
            ));
        }
        if c.max_content_bytes == 0 {
            return Err(SessionError::InvalidConfig(
                "Maximum content size must be > 0".into(),
            ));
        }
        Ok(self.config)
    }
}
