//! Capabilities the engine needs from the outside world.
//!
//! The engine never talks HTTP itself: the binary plugs in real clients,
//! tests plug in in-memory fakes.

use api_types::{
    bank::{StatementPage, StatementQuery},
    notion::{CreatedPage, Filter, Page, PageProperties, QueryResponse},
};

use crate::ApiError;

/// Bank statement API.
#[allow(async_fn_in_trait)]
pub trait BankApi {
    /// Establish (or refresh) the authenticated session.
    async fn authenticate(&mut self) -> Result<(), ApiError>;

    async fn statement_page(&self, query: &StatementQuery) -> Result<StatementPage, ApiError>;
}

/// Destination database API.
#[allow(async_fn_in_trait)]
pub trait Destination {
    /// One page of a filtered database query.
    async fn query_database(
        &self,
        database_id: &str,
        filter: &Filter,
        start_cursor: Option<&str>,
    ) -> Result<QueryResponse, ApiError>;

    /// Create one record parented under `database_id`.
    async fn create_page(
        &self,
        database_id: &str,
        properties: &PageProperties,
    ) -> Result<CreatedPage, ApiError>;
}

/// Follow the query cursor until the destination reports no more results.
pub(crate) async fn query_all<D: Destination>(
    destination: &D,
    database_id: &str,
    filter: &Filter,
) -> Result<Vec<Page>, ApiError> {
    let mut pages = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let response = destination
            .query_database(database_id, filter, cursor.as_deref())
            .await?;
        tracing::debug!(
            database_id,
            results = response.results.len(),
            has_more = response.has_more,
            "query page received"
        );
        pages.extend(response.results);

        match (response.has_more, response.next_cursor) {
            (true, Some(next)) => cursor = Some(next),
            _ => break,
        }
    }
    Ok(pages)
}
