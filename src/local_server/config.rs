use std::time::Duration;

use crate::{AuthError, RequestOrigin};

use super::target::RedirectTarget;

pub(crate) const DEFAULT_SUCCESS_HTML: &str = r#"<!doctype html>
<html>
  <head><meta charset="utf-8" /><title>Signed in</title></head>
  <body>
    <p>GitHub sign-in received. You may close this window.</p>
  </body>
</html>
"#;

pub(crate) const DEFAULT_ERROR_HTML: &str = r#"<!doctype html>
<html>
  <head><meta charset="utf-8" /><title>Sign-in error</title></head>
  <body>
    <p>GitHub sign-in failed. You may close this window and try again.</p>
  </body>
</html>
"#;

#[derive(Debug, Clone)]
pub struct LocalServerConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub timeout: Option<Duration>,
    pub success_html: String,
    pub error_html: String,
}

impl LocalServerConfig {
    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            path: normalize_path(path.into()),
            timeout: None,
            success_html: DEFAULT_SUCCESS_HTML.to_string(),
            error_html: DEFAULT_ERROR_HTML.to_string(),
        }
    }

    pub fn from_redirect_uri(redirect_uri: &str) -> Result<Self, AuthError> {
        let target = RedirectTarget::parse(redirect_uri)?;
        Ok(Self::new(target.host, target.port, target.path))
    }

    pub fn redirect_uri(&self) -> String {
        self.origin().redirect_uri(&self.path)
    }

    /// The origin the handler should build its `redirect_uri` from.
    pub fn origin(&self) -> RequestOrigin {
        RequestOrigin::new("http", format!("{}:{}", self.host, self.port))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_success_html(mut self, html: impl Into<String>) -> Self {
        self.success_html = html.into();
        self
    }

    pub fn with_error_html(mut self, html: impl Into<String>) -> Self {
        self.error_html = html.into();
        self
    }
}

fn normalize_path(path: String) -> String {
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    }
}

#[cfg(test)]
mod tests {
    use super::LocalServerConfig;

    #[test]
    fn local_server_config_normalizes_path() {
        let config = LocalServerConfig::new("127.0.0.1", 8765, "signin-github");
        assert_eq!(config.path, "/signin-github");
        assert_eq!(config.redirect_uri(), "http://127.0.0.1:8765/signin-github");
    }

    #[test]
    fn from_redirect_uri_keeps_host_port_and_path() {
        let config = LocalServerConfig::from_redirect_uri("http://localhost:9000/cb").unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 9000);
        assert_eq!(config.origin().host, "localhost:9000");
    }
}
