//! Relation extraction and resolution.
//!
//! Extraction reads entity codes from payment references. Resolution looks
//! the codes up in each tag's entity database with one batched query per
//! tag and attaches the matching record to the transaction.

use std::collections::{BTreeMap, BTreeSet};

use api_types::notion::Filter;

use super::MAX_FILTER_CONDITIONS;
use crate::{
    Candidates, CompositeId, Destination, EngineError, EntityCode, EntityReferenceTable,
    EntityTag, Relation, RelationMap, ResultEngine, Transaction, api::query_all, match_reference,
};

/// A transaction together with what the resolver learned about it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Enriched {
    pub transaction: Transaction,
    pub composite: Option<CompositeId>,
    pub relation: Option<Relation>,
}

impl Enriched {
    pub fn new(transaction: Transaction) -> Self {
        Self {
            transaction,
            composite: None,
            relation: None,
        }
    }
}

/// Capture the composite identifier of every candidate whose payment
/// reference carries one.
pub fn extract(candidates: Candidates) -> Vec<Enriched> {
    candidates
        .into_transactions()
        .into_iter()
        .map(|transaction| {
            let composite = transaction
                .counterparty_reference()
                .and_then(match_reference);
            Enriched {
                composite,
                ..Enriched::new(transaction)
            }
        })
        .collect()
}

/// Captured numbers grouped by tag, de-duplicated and sorted.
pub fn codes_by_tag(enriched: &[Enriched]) -> BTreeMap<EntityTag, Vec<u64>> {
    let mut grouped: BTreeMap<EntityTag, BTreeSet<u64>> = BTreeMap::new();
    for code in enriched.iter().filter_map(|e| e.composite.as_ref()) {
        grouped
            .entry(code.code.tag)
            .or_default()
            .insert(code.code.number);
    }
    grouped
        .into_iter()
        .map(|(tag, numbers)| (tag, numbers.into_iter().collect()))
        .collect()
}

/// `or` of number equalities over the tag's unique-id field.
pub fn relation_filter(unique_field: &str, numbers: &[u64]) -> Filter {
    Filter::Or {
        or: numbers
            .iter()
            .map(|n| Filter::number_equals(unique_field, *n))
            .collect(),
    }
}

/// Look up every captured code in its entity database.
///
/// Tags without a configured database or unique field are skipped.
pub async fn resolve_relations<D: Destination>(
    destination: &D,
    entities: &EntityReferenceTable,
    enriched: &[Enriched],
) -> ResultEngine<RelationMap> {
    let mut relations = RelationMap::default();

    for (tag, numbers) in codes_by_tag(enriched) {
        let Some(reference) = entities.get(tag).filter(|r| r.is_resolvable()) else {
            tracing::warn!(%tag, codes = numbers.len(), "entity tag not configured, skipping");
            continue;
        };
        tracing::info!(
            %tag,
            codes = numbers.len(),
            column = %reference.column,
            "looking up related records"
        );

        let mut found = 0usize;
        for chunk in numbers.chunks(MAX_FILTER_CONDITIONS) {
            let filter = relation_filter(&reference.unique_field, chunk);
            let pages = query_all(destination, &reference.database_id, &filter)
                .await
                .map_err(EngineError::query)?;

            for page in pages {
                let Some((prefix, number)) = page
                    .unique_id(&reference.unique_field)
                    .and_then(|unique| Some((unique.prefix.as_deref(), unique.number?)))
                else {
                    tracing::warn!(page = %page.id, %tag, "related record has no unique number");
                    continue;
                };
                // A foreign or missing prefix never stands in for `tag`.
                let Some(record_tag) = prefix.and_then(EntityTag::from_prefix) else {
                    tracing::warn!(
                        page = %page.id,
                        %tag,
                        prefix = prefix.unwrap_or_default(),
                        number,
                        "related record prefix is not an entity tag, ignoring"
                    );
                    continue;
                };
                relations.insert(
                    EntityCode {
                        tag: record_tag,
                        number,
                    },
                    Relation {
                        column: reference.column.clone(),
                        page_id: page.id.clone(),
                    },
                );
                found += 1;
            }
        }
        tracing::info!(%tag, found, "related records found");
    }

    tracing::debug!(codes = relations.len(), "relation map built");
    Ok(relations)
}

/// Attach the resolved relation of each transaction, if any.
pub fn attach(enriched: Vec<Enriched>, relations: &RelationMap) -> Vec<Enriched> {
    enriched
        .into_iter()
        .map(|mut e| {
            e.relation = e
                .composite
                .as_ref()
                .and_then(|c| relations.get(&c.code))
                .cloned();
            e
        })
        .collect()
}
