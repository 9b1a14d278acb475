//! Mock JWKS endpoint for tests.
//!
//! Wraps a wiremock `MockServer` serving a JWK Set at [`JWKS_PATH`]. The
//! served document and failure mode can be swapped while tests run.

use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const JWKS_PATH: &str = "/.well-known/jwks.json";

pub struct MockJwksServer {
    server: MockServer,
}

impl MockJwksServer {
    /// Start a server serving `keys` as a JWK Set.
    pub async fn start(keys: &[serde_json::Value]) -> Self {
        let server = MockServer::start().await;
        let this = Self { server };
        this.mount(jwks_response(keys)).await;
        this
    }

    /// Start a server whose JWKS endpoint answers `status` with no body.
    pub async fn start_failing(status: u16) -> Self {
        let server = MockServer::start().await;
        let this = Self { server };
        this.mount(ResponseTemplate::new(status)).await;
        this
    }

    /// Full JWKS URL.
    pub fn url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Replace the served key set.
    ///
    /// Resetting also clears the recorded request history.
    pub async fn set_keys(&self, keys: &[serde_json::Value]) {
        self.server.reset().await;
        self.mount(jwks_response(keys)).await;
    }

    /// Make the endpoint answer `status` from now on.
    ///
    /// Resetting also clears the recorded request history.
    pub async fn fail_with(&self, status: u16) {
        self.server.reset().await;
        self.mount(ResponseTemplate::new(status)).await;
    }

    /// Serve `keys` after `delay`.
    pub async fn set_keys_delayed(&self, keys: &[serde_json::Value], delay: Duration) {
        self.server.reset().await;
        self.mount(jwks_response(keys).set_delay(delay)).await;
    }

    /// Number of JWKS requests received since start or the last reset.
    pub async fn fetch_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }

    async fn mount(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }
}

fn jwks_response(keys: &[serde_json::Value]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({ "keys": keys }))
}
