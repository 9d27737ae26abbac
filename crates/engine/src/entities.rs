//! Business entities a bank transaction can be linked to.
//!
//! Entity codes travel inside the counterparty reference of instant
//! payments as a tag prefix followed by 3 or 4 digits (`OBRA0042`). The
//! [`EntityReferenceTable`] tells, per tag, which external database holds
//! the entity records and how to link them.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::LazyLock,
};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Recognized entity tags. Declaration order is match priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityTag {
    #[serde(rename = "OBRA", alias = "obra")]
    Obra,
    #[serde(rename = "ELEVARE", alias = "elevare")]
    Elevare,
}

impl EntityTag {
    pub const ALL: [EntityTag; 2] = [EntityTag::Obra, EntityTag::Elevare];

    /// Prefix used both in payment references and in record unique ids.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Obra => "OBRA",
            Self::Elevare => "ELEVARE",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.prefix() == prefix)
    }
}

impl TryFrom<&str> for EntityTag {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_prefix(value)
            .ok_or_else(|| EngineError::Config(format!("unknown entity tag: {value}")))
    }
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Where the records of one entity tag live.
///
/// An empty `database_id` or `unique_field` means the tag is never resolved.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityReference {
    pub database_id: String,
    /// Relation column of the target database that points at the record.
    pub column: String,
    /// Unique-id property of the entity database.
    pub unique_field: String,
}

impl EntityReference {
    pub fn new(database_id: &str, column: &str, unique_field: &str) -> Self {
        Self {
            database_id: database_id.to_string(),
            column: column.to_string(),
            unique_field: unique_field.to_string(),
        }
    }

    pub fn is_resolvable(&self) -> bool {
        !self.database_id.trim().is_empty() && !self.unique_field.trim().is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityReferenceTable {
    entries: BTreeMap<EntityTag, EntityReference>,
}

impl EntityReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tag: EntityTag, reference: EntityReference) -> Self {
        self.entries.insert(tag, reference);
        self
    }

    pub fn get(&self, tag: EntityTag) -> Option<&EntityReference> {
        self.entries.get(&tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityTag, &EntityReference)> {
        self.entries.iter().map(|(tag, reference)| (*tag, reference))
    }

    /// A resolvable entry must name the relation column it writes to.
    pub fn validate(&self) -> ResultEngine<()> {
        for (tag, reference) in &self.entries {
            if reference.is_resolvable() && reference.column.trim().is_empty() {
                return Err(EngineError::Config(format!(
                    "entity {tag}: column must not be empty"
                )));
            }
        }
        Ok(())
    }
}

impl From<BTreeMap<EntityTag, EntityReference>> for EntityReferenceTable {
    fn from(entries: BTreeMap<EntityTag, EntityReference>) -> Self {
        Self { entries }
    }
}

/// Structured (tag, number) pair identifying an entity record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityCode {
    pub tag: EntityTag,
    pub number: u64,
}

impl fmt::Display for EntityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.tag, self.number)
    }
}

/// Composite identifier captured from a payment reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositeId {
    /// Matched substring, verbatim.
    pub raw: String,
    pub code: EntityCode,
}

fn reference_pattern() -> &'static Regex {
    #[allow(clippy::expect_used)]
    static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
        let prefixes = EntityTag::ALL.map(EntityTag::prefix).join("|");
        Regex::new(&format!("^({prefixes})([0-9]{{3,4}})")).expect("valid reference pattern")
    });
    &PATTERN
}

/// Match a counterparty reference against the recognized tag prefixes.
///
/// The reference must start with a prefix immediately followed by 3 or 4
/// digits; anything after the digits is ignored.
pub fn match_reference(reference: &str) -> Option<CompositeId> {
    let captures = reference_pattern().captures(reference)?;
    let raw = captures.get(0)?.as_str();
    let tag = EntityTag::from_prefix(captures.get(1)?.as_str())?;
    let number = captures.get(2)?.as_str().parse().ok()?;
    Some(CompositeId {
        raw: raw.to_string(),
        code: EntityCode { tag, number },
    })
}

/// Resolved link to an entity record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    pub column: String,
    pub page_id: String,
}

/// Entity codes resolved to destination records during one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelationMap {
    entries: HashMap<EntityCode, Relation>,
}

impl RelationMap {
    pub fn get(&self, code: &EntityCode) -> Option<&Relation> {
        self.entries.get(code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn insert(&mut self, code: EntityCode, relation: Relation) {
        self.entries.insert(code, relation);
    }
}
