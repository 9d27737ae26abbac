use api_types::notion::{
    CreatePage, CreatedPage, Filter, PageProperties, Parent, QueryRequest, QueryResponse,
};
use engine::{ApiError, Destination};
use reqwest::{Client, header};

use crate::{ClientError, decode, join_url, network, status_error};

pub const DEFAULT_BASE_URL: &str = "https://api.notion.com";
pub const DEFAULT_VERSION: &str = "2022-06-28";

const PAGE_SIZE: u32 = 100;

/// Destination database client.
#[derive(Clone, Debug)]
pub struct NotionClient {
    http: Client,
    base_url: String,
}

impl NotionClient {
    pub fn builder() -> NotionClientBuilder {
        NotionClientBuilder::default()
    }
}

impl Destination for NotionClient {
    async fn query_database(
        &self,
        database_id: &str,
        filter: &Filter,
        start_cursor: Option<&str>,
    ) -> Result<QueryResponse, ApiError> {
        tracing::debug!(database_id, cursor = ?start_cursor, "querying database");
        let body = QueryRequest {
            filter,
            start_cursor,
            page_size: PAGE_SIZE,
        };
        let resp = self
            .http
            .post(join_url(
                &self.base_url,
                &format!("/v1/databases/{database_id}/query"),
            ))
            .json(&body)
            .send()
            .await
            .map_err(network)?;

        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }
        resp.json::<QueryResponse>().await.map_err(decode)
    }

    async fn create_page(
        &self,
        database_id: &str,
        properties: &PageProperties,
    ) -> Result<CreatedPage, ApiError> {
        let body = CreatePage {
            parent: Parent { database_id },
            properties,
        };
        let resp = self
            .http
            .post(join_url(&self.base_url, "/v1/pages"))
            .json(&body)
            .send()
            .await
            .map_err(network)?;

        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }
        resp.json::<CreatedPage>().await.map_err(decode)
    }
}

#[derive(Debug)]
pub struct NotionClientBuilder {
    base_url: String,
    token: String,
    version: String,
}

impl Default for NotionClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: String::new(),
            version: DEFAULT_VERSION.to_string(),
        }
    }
}

impl NotionClientBuilder {
    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn token(mut self, token: &str) -> Self {
        self.token = token.to_string();
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn build(self) -> Result<NotionClient, ClientError> {
        if self.token.is_empty() {
            return Err(ClientError::Config("notion token is required".to_string()));
        }

        let mut auth = header::HeaderValue::try_from(format!("Bearer {}", self.token))
            .map_err(|err| ClientError::Config(format!("invalid auth header value: {err}")))?;
        auth.set_sensitive(true);
        let version = header::HeaderValue::try_from(self.version.as_str())
            .map_err(|err| ClientError::Config(format!("invalid version header value: {err}")))?;

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert("notion-version", version);

        let http = Client::builder().default_headers(headers).build()?;
        Ok(NotionClient {
            http,
            base_url: self.base_url,
        })
    }
}
