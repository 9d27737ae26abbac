use super::transform::Record;
use crate::{Destination, EngineError, ResultEngine};

/// Create one record per entry, in order, stopping at the first failure.
///
/// Records created before a failure stay in place; the next run skips them
/// through dedup.
pub async fn write_all<D: Destination>(
    destination: &D,
    database_id: &str,
    records: &[Record],
) -> ResultEngine<usize> {
    let mut created = 0usize;
    for record in records {
        let page = destination
            .create_page(database_id, &record.properties)
            .await
            .map_err(|err| EngineError::write(&record.transaction_id, err))?;
        tracing::debug!(transaction = %record.transaction_id, page = %page.id, "record created");
        created += 1;
    }
    Ok(created)
}
