use anyhow::{Context, Result, anyhow};
use tokio::net::TcpStream;
use url::Url;

use super::minecraft;
use crate::registry::Service;

/// Largest HTTP body read for content inspection; anything longer fails the check
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Checker trait for the different protocols a service can speak
///
/// Implementations return a short description of what they observed on
/// success and an error describing why the service is unreachable otherwise.
/// Deadlines are enforced by the caller.
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, service: &Service) -> Result<String>;
}

/// Plain TCP connect checker
#[derive(Debug, Default)]
pub struct TcpChecker;

#[async_trait::async_trait]
impl Checker for TcpChecker {
    async fn check(&self, service: &Service) -> Result<String> {
        let stream = TcpStream::connect((service.hostname.as_str(), service.port))
            .await
            .map_err(|e| anyhow!("TCP connection failed: {}", e))?;

        let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_default();
        Ok(format!("connected to {peer}"))
    }
}

/// HTTP checker with content assertions
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new() -> Result<Self> {
        // Probe the service itself, never whatever proxy the environment points at
        let client = reqwest::Client::builder()
            .user_agent(concat!("servertracker/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build()?;

        Ok(Self { client })
    }
}

/// URL for an HTTP service. A bare hostname becomes `http://host:port/`; a hostname that
/// already carries a scheme and path keeps them, with the configured port applied.
pub fn http_url(service: &Service) -> Result<Url> {
    let raw = if service.hostname.contains("://") {
        service.hostname.clone()
    } else {
        format!("http://{}/", service.hostname)
    };

    let mut url = Url::parse(&raw).with_context(|| format!("invalid HTTP target `{raw}`"))?;
    url.set_port(Some(service.port))
        .map_err(|_| anyhow!("cannot set port on `{}`", raw))?;
    Ok(url)
}

/// Decide whether a fetched body is acceptable for `service`
pub fn inspect_body(service: &Service, body: &str) -> Result<()> {
    if service.alert_on_blank_page && body.trim().is_empty() {
        return Err(anyhow!("HTTP response body is blank"));
    }

    if let Some(marker) = service.unexpected_content.iter().find(|m| body.contains(m.as_str())) {
        return Err(anyhow!("HTTP response contains unexpected content \"{}\"", marker));
    }

    Ok(())
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, service: &Service) -> Result<String> {
        let url = http_url(service)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

        let status_code = response.status().as_u16();
        let body = read_body(response).await?;

        inspect_body(service, &body)?;

        Ok(format!("HTTP {} with {} byte body", status_code, body.len()))
    }
}

async fn read_body(mut response: reqwest::Response) -> Result<String> {
    let mut body = Vec::new();

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| anyhow!("HTTP body could not be read: {}", e))?
    {
        if body.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(anyhow!("HTTP response body exceeds {} bytes", MAX_BODY_BYTES));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// Minecraft status ping checker
#[derive(Debug, Default)]
pub struct GameChecker;

#[async_trait::async_trait]
impl Checker for GameChecker {
    async fn check(&self, service: &Service) -> Result<String> {
        let mut stream = TcpStream::connect((service.hostname.as_str(), service.port))
            .await
            .map_err(|e| anyhow!("TCP connection failed: {}", e))?;

        let status = minecraft::query_status(&mut stream, &service.hostname, service.port)
            .await
            .map_err(|e| anyhow!("status ping failed: {}", e))?;

        Ok(status.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::Protocol;

    fn http_service(hostname: &str) -> Service {
        Service {
            name: "web".into(),
            hostname: hostname.into(),
            port: 8080,
            protocol: Protocol::Http,
            recipients: vec!["+15551234567".into()],
            unexpected_content: vec!["Database Error".into()],
            alert_on_blank_page: false,
        }
    }

    #[test]
    fn test_http_url() {
        assert_eq!(
            http_url(&http_service("example.com")).unwrap().as_str(),
            "http://example.com:8080/"
        );
        assert_eq!(
            http_url(&http_service("https://example.com/health")).unwrap().as_str(),
            "https://example.com:8080/health"
        );
        assert!(http_url(&http_service("http://")).is_err());
    }

    #[test]
    fn test_inspect_body_markers() {
        let service = http_service("example.com");
        assert!(inspect_body(&service, "<html>ok</html>").is_ok());

        let err = inspect_body(&service, "<h1>Database Error</h1>").unwrap_err();
        assert!(err.to_string().contains("Database Error"));
    }

    #[test]
    fn test_inspect_body_blank_page() {
        let mut service = http_service("example.com");
        assert!(inspect_body(&service, "").is_ok());

        service.alert_on_blank_page = true;
        assert!(inspect_body(&service, "").is_err());
        assert!(inspect_body(&service, "  \n").is_err());
        assert!(inspect_body(&service, "hello").is_ok());
    }
}
