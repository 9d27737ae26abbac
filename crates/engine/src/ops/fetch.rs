use api_types::bank::StatementQuery;

use crate::{BankApi, DateWindow, EngineError, ResultEngine, Transaction};

/// Paginate the statement over `window`.
///
/// Pages are requested from index 0 until the bank flags the last one, then
/// every entry is validated. Returns `None` when the window holds no
/// transactions. Any failure discards everything fetched so far.
pub async fn fetch_transactions<B: BankApi>(
    bank: &B,
    window: &DateWindow,
) -> ResultEngine<Option<Vec<Transaction>>> {
    let mut raw = Vec::new();
    let mut page = 0u32;
    loop {
        let query = StatementQuery {
            start: window.start,
            end: window.end,
            page,
        };
        let response = bank
            .statement_page(&query)
            .await
            .map_err(EngineError::fetch)?;
        let batch = response.transactions.unwrap_or_default();
        tracing::debug!(page, count = batch.len(), "statement page received");
        raw.extend(batch);

        if response.last_page {
            break;
        }
        page += 1;
    }

    if raw.is_empty() {
        return Ok(None);
    }

    let transactions = raw
        .into_iter()
        .map(Transaction::from_value)
        .collect::<ResultEngine<Vec<_>>>()?;
    Ok(Some(transactions))
}
