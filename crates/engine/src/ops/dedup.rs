use api_types::notion::Filter;
use chrono::NaiveDate;

use super::{MAX_FILTER_CONDITIONS, transform::{DATE_PROPERTY, ID_PROPERTY}};
use crate::{Candidates, Destination, EngineError, ResultEngine, api::query_all};

/// Filter matching records dated on or after `horizon` whose transaction id
/// is one of `ids`.
///
/// One id yields a single equality condition, several yield an `or` of
/// them. Returns `None` for an empty id list.
pub fn dedup_filter(horizon: NaiveDate, ids: &[&str]) -> Option<Filter> {
    let mut conditions: Vec<Filter> = ids
        .iter()
        .map(|id| Filter::text_equals(ID_PROPERTY, id))
        .collect();

    let ids_filter = match conditions.len() {
        0 => return None,
        1 => conditions.remove(0),
        _ => Filter::Or { or: conditions },
    };

    Some(Filter::And {
        and: vec![Filter::date_on_or_after(DATE_PROPERTY, horizon), ids_filter],
    })
}

/// Transaction ids among `candidates` that already exist in the target
/// database.
pub async fn existing_ids<D: Destination>(
    destination: &D,
    database_id: &str,
    horizon: NaiveDate,
    candidates: &Candidates,
) -> ResultEngine<Vec<String>> {
    let ids: Vec<&str> = candidates.ids().collect();
    let mut existing = Vec::new();

    for chunk in ids.chunks(MAX_FILTER_CONDITIONS) {
        let Some(filter) = dedup_filter(horizon, chunk) else {
            continue;
        };
        let pages = query_all(destination, database_id, &filter)
            .await
            .map_err(EngineError::query)?;

        for page in pages {
            match page.plain_text(ID_PROPERTY) {
                Some(id) => existing.push(id.to_string()),
                None => tracing::warn!(page = %page.id, "existing record has no transaction id"),
            }
        }
    }

    Ok(existing)
}
