//! Mapping from an enriched transaction to the target database schema.

use api_types::notion::{
    DateValue, PageProperties, PageRef, PropertyValue, SelectOption, TextInput,
};

use super::resolve::Enriched;
use crate::{Direction, Transaction};

pub const TITLE_PROPERTY: &str = "Descrição";
pub const DATE_PROPERTY: &str = "Data";
pub const BANK_PROPERTY: &str = "Banco";
pub const DIRECTION_PROPERTY: &str = "Tipo";
pub const AMOUNT_PROPERTY: &str = "Valor Extrato";
pub const ID_PROPERTY: &str = "idTransacao";

/// Select value naming the source institution.
pub const BANK_NAME: &str = "Banco Intermedium S/A";

/// A record ready to be created.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub transaction_id: String,
    pub properties: PageProperties,
}

pub fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Debit => "Saída",
        Direction::Credit => "Entrada",
    }
}

/// Record title: `"<pix description> -"`, title, description and
/// `"- <document number>"`, skipping missing parts.
pub fn title(tx: &Transaction) -> String {
    let pix = tx
        .pix
        .as_ref()
        .and_then(|pix| pix.description.as_deref())
        .filter(|d| !d.trim().is_empty())
        .map(|d| format!("{d} -"));
    let document = tx
        .document_number
        .as_deref()
        .filter(|d| !d.is_empty())
        .map(|d| format!("- {d}"));

    [
        pix.as_deref(),
        Some(tx.title.as_str()),
        Some(tx.description.as_str()),
        document.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|token| !token.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

pub fn transform(enriched: &Enriched) -> Record {
    let tx = &enriched.transaction;
    let mut properties = PageProperties::new();

    properties.insert(
        TITLE_PROPERTY.to_string(),
        PropertyValue::Title(vec![TextInput::plain(title(tx))]),
    );
    properties.insert(
        DATE_PROPERTY.to_string(),
        PropertyValue::Date(DateValue {
            start: tx.date,
            end: None,
        }),
    );
    properties.insert(
        BANK_PROPERTY.to_string(),
        PropertyValue::Select(SelectOption {
            name: BANK_NAME.to_string(),
        }),
    );
    properties.insert(
        DIRECTION_PROPERTY.to_string(),
        PropertyValue::Select(SelectOption {
            name: direction_label(tx.direction).to_string(),
        }),
    );
    properties.insert(
        AMOUNT_PROPERTY.to_string(),
        PropertyValue::Number(tx.signed_amount()),
    );
    properties.insert(
        ID_PROPERTY.to_string(),
        PropertyValue::RichText(vec![TextInput::plain(tx.id.clone())]),
    );

    if let Some(relation) = &enriched.relation {
        properties.insert(
            relation.column.clone(),
            PropertyValue::Relation(vec![PageRef {
                id: relation.page_id.clone(),
            }]),
        );
    }

    Record {
        transaction_id: tx.id.clone(),
        properties,
    }
}
