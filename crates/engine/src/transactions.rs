//! Transaction primitives.
//!
//! A `Transaction` is one statement line as reported by the bank, validated
//! and converted from its wire shape. It is never mutated after parsing;
//! enrichment happens on [`Enriched`](crate::Enriched).

use std::collections::{HashMap, HashSet};

use api_types::bank::{RawPixDetails, RawTransaction};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Operation direction of a statement line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "C")]
    Credit,
    #[serde(rename = "D")]
    Debit,
}

impl TryFrom<&str> for Direction {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "C" => Ok(Self::Credit),
            "D" => Ok(Self::Debit),
            other => Err(EngineError::Validation(format!(
                "invalid operation type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PixDetails {
    /// Counterparty transaction reference, where entity codes are embedded.
    pub tx_id: Option<String>,
    pub payer_name: Option<String>,
    pub payer_tax_id: Option<String>,
    pub payee_name: Option<String>,
    pub payee_tax_id: Option<String>,
    pub end_to_end_id: Option<String>,
    pub payee_key: Option<String>,
    pub description: Option<String>,
}

impl From<RawPixDetails> for PixDetails {
    fn from(raw: RawPixDetails) -> Self {
        Self {
            tx_id: raw.tx_id,
            payer_name: raw.payer_name,
            payer_tax_id: raw.payer_tax_id,
            payee_name: raw.payee_name,
            payee_tax_id: raw.payee_tax_id,
            end_to_end_id: raw.end_to_end_id,
            payee_key: raw.payee_key,
            description: raw.description,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub id: String,
    pub included_at: NaiveDateTime,
    pub date: NaiveDate,
    pub kind: String,
    pub direction: Direction,
    /// Non-negative magnitude; the sign comes from `direction`.
    pub amount: Decimal,
    pub title: String,
    pub description: String,
    pub document_number: Option<String>,
    pub pix: Option<PixDetails>,
}

impl Transaction {
    /// Validate one raw statement entry.
    pub fn from_value(value: serde_json::Value) -> ResultEngine<Self> {
        let raw: RawTransaction = serde_json::from_value(value)
            .map_err(|err| EngineError::Validation(err.to_string()))?;
        Self::try_from(raw)
    }

    /// Amount negated for debits.
    pub fn signed_amount(&self) -> Decimal {
        match self.direction {
            Direction::Debit => -self.amount,
            Direction::Credit => self.amount,
        }
    }

    /// Counterparty reference of an instant payment, if present.
    pub fn counterparty_reference(&self) -> Option<&str> {
        self.pix.as_ref()?.tx_id.as_deref()
    }
}

impl TryFrom<RawTransaction> for Transaction {
    type Error = EngineError;

    fn try_from(raw: RawTransaction) -> Result<Self, Self::Error> {
        if raw.id.trim().is_empty() {
            return Err(EngineError::Validation(
                "transaction id must not be empty".to_string(),
            ));
        }
        if raw.amount.is_sign_negative() && !raw.amount.is_zero() {
            return Err(EngineError::Validation(format!(
                "transaction {}: amount must not be negative",
                raw.id
            )));
        }
        let direction = Direction::try_from(raw.operation.as_str())?;
        let included_at = parse_inclusion(&raw.included_at).ok_or_else(|| {
            EngineError::Validation(format!(
                "transaction {}: invalid inclusion timestamp '{}'",
                raw.id, raw.included_at
            ))
        })?;

        Ok(Self {
            id: raw.id,
            included_at,
            date: raw.date,
            kind: raw.kind,
            direction,
            amount: raw.amount,
            title: raw.title,
            description: raw.description,
            document_number: raw.document_number,
            pix: raw.details.map(PixDetails::from),
        })
    }
}

fn parse_inclusion(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// Candidate transactions keyed by their external identifier, in statement
/// order.
#[derive(Clone, Debug, Default)]
pub struct Candidates {
    order: Vec<String>,
    by_id: HashMap<String, Transaction>,
}

impl Candidates {
    pub fn from_transactions(transactions: impl IntoIterator<Item = Transaction>) -> Self {
        let mut candidates = Self::default();
        for tx in transactions {
            candidates.insert(tx);
        }
        candidates
    }

    /// Insert a transaction. A repeated id replaces the previous value but
    /// keeps its position.
    pub fn insert(&mut self, tx: Transaction) {
        if !self.by_id.contains_key(&tx.id) {
            self.order.push(tx.id.clone());
        }
        self.by_id.insert(tx.id.clone(), tx);
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Drop every candidate whose id is listed. Returns how many were removed.
    pub fn remove_all<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        let ids: HashSet<&str> = ids.iter().map(AsRef::as_ref).collect();
        let before = self.order.len();
        self.order.retain(|id| !ids.contains(id.as_str()));
        self.by_id.retain(|id, _| !ids.contains(id.as_str()));
        before - self.order.len()
    }

    pub fn into_transactions(mut self) -> Vec<Transaction> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.remove(id))
            .collect()
    }
}
