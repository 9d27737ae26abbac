use std::path::PathBuf;

use api_types::bank::{StatementPage, StatementQuery, TokenResponse};
use engine::{ApiError, BankApi};
use reqwest::{Client, Identity};

use crate::{ClientError, decode, join_url, network, status_error};

const TOKEN_PATH: &str = "/oauth/v2/token";
const STATEMENT_PATH: &str = "/banking/v2/extrato/completo";

pub const DEFAULT_BASE_URL: &str = "https://cdpj.partners.bancointer.com.br";
pub const DEFAULT_SCOPE: &str = "extrato.read";

/// Bank statement client.
///
/// Authenticates with the OAuth2 client-credentials grant over mutual TLS
/// and keeps the access token for the lifetime of the process.
#[derive(Clone, Debug)]
pub struct InterClient {
    http: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    access_token: Option<String>,
}

impl InterClient {
    pub fn builder() -> InterClientBuilder {
        InterClientBuilder::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

impl BankApi for InterClient {
    async fn authenticate(&mut self) -> Result<(), ApiError> {
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "client_credentials"),
            ("scope", self.scope.as_str()),
        ];
        let resp = self
            .http
            .post(join_url(&self.base_url, TOKEN_PATH))
            .form(&form)
            .send()
            .await
            .map_err(network)?;

        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }

        let token = resp.json::<TokenResponse>().await.map_err(decode)?;
        tracing::debug!(expires_in = ?token.expires_in, scope = ?token.scope, "access token obtained");
        self.access_token = Some(token.access_token);
        Ok(())
    }

    async fn statement_page(&self, query: &StatementQuery) -> Result<StatementPage, ApiError> {
        let Some(token) = self.access_token.as_deref() else {
            return Err(ApiError::Status {
                status: 401,
                message: "not authenticated".to_string(),
            });
        };

        let resp = self
            .http
            .get(join_url(&self.base_url, STATEMENT_PATH))
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(network)?;

        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }
        resp.json::<StatementPage>().await.map_err(decode)
    }
}

#[derive(Debug)]
pub struct InterClientBuilder {
    base_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    certificate: Option<(PathBuf, PathBuf)>,
}

impl Default for InterClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            scope: DEFAULT_SCOPE.to_string(),
            certificate: None,
        }
    }
}

impl InterClientBuilder {
    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn credentials(mut self, client_id: &str, client_secret: &str) -> Self {
        self.client_id = client_id.to_string();
        self.client_secret = client_secret.to_string();
        self
    }

    pub fn scope(mut self, scope: &str) -> Self {
        self.scope = scope.to_string();
        self
    }

    /// PEM certificate and private key presented for mutual TLS.
    pub fn certificate(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.certificate = Some((cert_path.into(), key_path.into()));
        self
    }

    pub fn build(self) -> Result<InterClient, ClientError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(ClientError::Config(
                "bank client id and secret are required".to_string(),
            ));
        }

        let mut builder = Client::builder();
        if let Some((cert_path, key_path)) = &self.certificate {
            let mut pem = std::fs::read(cert_path)?;
            pem.push(b'\n');
            pem.extend(std::fs::read(key_path)?);
            builder = builder.use_rustls_tls().identity(Identity::from_pem(&pem)?);
        }

        Ok(InterClient {
            http: builder.build()?,
            base_url: self.base_url,
            client_id: self.client_id,
            client_secret: self.client_secret,
            scope: self.scope,
            access_token: None,
        })
    }
}
