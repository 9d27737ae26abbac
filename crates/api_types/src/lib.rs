use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod bank {
    use super::*;

    /// Query string of the paginated statement endpoint.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize)]
    pub struct StatementQuery {
        #[serde(rename = "dataInicio")]
        pub start: NaiveDate,
        #[serde(rename = "dataFim")]
        pub end: NaiveDate,
        /// Zero-based page index.
        #[serde(rename = "pagina")]
        pub page: u32,
    }

    /// One page of the statement.
    ///
    /// Transactions are kept as raw JSON so that schema validation happens
    /// once, after every page has been collected.
    #[derive(Clone, Debug, Default, Deserialize, Serialize)]
    pub struct StatementPage {
        #[serde(rename = "transacoes", default)]
        pub transactions: Option<Vec<serde_json::Value>>,
        #[serde(rename = "ultimaPagina", default = "last_page_default")]
        pub last_page: bool,
        #[serde(rename = "totalPaginas", default)]
        pub total_pages: Option<u32>,
    }

    fn last_page_default() -> bool {
        true
    }

    #[derive(Clone, Debug, Deserialize, Serialize)]
    pub struct RawTransaction {
        #[serde(rename = "idTransacao")]
        pub id: String,
        #[serde(rename = "dataInclusao")]
        pub included_at: String,
        #[serde(rename = "dataTransacao")]
        pub date: NaiveDate,
        #[serde(rename = "tipoTransacao")]
        pub kind: String,
        #[serde(rename = "tipoOperacao")]
        pub operation: String,
        #[serde(rename = "valor")]
        pub amount: Decimal,
        #[serde(rename = "titulo")]
        pub title: String,
        #[serde(rename = "descricao")]
        pub description: String,
        #[serde(rename = "numeroDocumento", default)]
        pub document_number: Option<String>,
        #[serde(rename = "detalhes", default)]
        pub details: Option<RawPixDetails>,
    }

    /// Instant-payment details. Every field is optional on the wire.
    #[derive(Clone, Debug, Default, Deserialize, Serialize)]
    pub struct RawPixDetails {
        #[serde(rename = "txId", default)]
        pub tx_id: Option<String>,
        #[serde(rename = "nomePagador", default)]
        pub payer_name: Option<String>,
        #[serde(rename = "cpfCnpjPagador", default)]
        pub payer_tax_id: Option<String>,
        #[serde(rename = "nomeRecebedor", default)]
        pub payee_name: Option<String>,
        #[serde(rename = "cpfCnpjRecebedor", default)]
        pub payee_tax_id: Option<String>,
        #[serde(rename = "endToEndId", default)]
        pub end_to_end_id: Option<String>,
        #[serde(rename = "chavePixRecebedor", default)]
        pub payee_key: Option<String>,
        #[serde(rename = "descricaoPix", default)]
        pub description: Option<String>,
    }

    /// OAuth2 token endpoint response (client-credentials grant).
    #[derive(Clone, Debug, Deserialize)]
    pub struct TokenResponse {
        pub access_token: String,
        #[serde(default)]
        pub token_type: Option<String>,
        #[serde(default)]
        pub expires_in: Option<u64>,
        #[serde(default)]
        pub scope: Option<String>,
    }
}

pub mod notion {
    use std::collections::{BTreeMap, HashMap};

    use super::*;

    /// Database query filter.
    ///
    /// Serializes to the compound filter object accepted by the database
    /// query endpoint: `{"and": [...]}`, `{"or": [...]}` or a single
    /// property condition.
    #[derive(Clone, Debug, PartialEq, Serialize)]
    #[serde(untagged)]
    pub enum Filter {
        And { and: Vec<Filter> },
        Or { or: Vec<Filter> },
        Property(PropertyFilter),
    }

    impl Filter {
        pub fn date_on_or_after(property: &str, date: NaiveDate) -> Self {
            Self::Property(PropertyFilter {
                property: property.to_string(),
                condition: Condition::Date(DateCondition { on_or_after: date }),
            })
        }

        pub fn text_equals(property: &str, value: &str) -> Self {
            Self::Property(PropertyFilter {
                property: property.to_string(),
                condition: Condition::RichText(TextCondition::Equals(value.to_string())),
            })
        }

        pub fn text_contains(property: &str, value: &str) -> Self {
            Self::Property(PropertyFilter {
                property: property.to_string(),
                condition: Condition::RichText(TextCondition::Contains(value.to_string())),
            })
        }

        pub fn number_equals(property: &str, value: u64) -> Self {
            Self::Property(PropertyFilter {
                property: property.to_string(),
                condition: Condition::Number(NumberCondition { equals: value }),
            })
        }
    }

    #[derive(Clone, Debug, PartialEq, Serialize)]
    pub struct PropertyFilter {
        pub property: String,
        #[serde(flatten)]
        pub condition: Condition,
    }

    #[derive(Clone, Debug, PartialEq, Serialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Condition {
        Date(DateCondition),
        RichText(TextCondition),
        Number(NumberCondition),
    }

    #[derive(Clone, Debug, PartialEq, Serialize)]
    pub struct DateCondition {
        pub on_or_after: NaiveDate,
    }

    #[derive(Clone, Debug, PartialEq, Serialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TextCondition {
        Equals(String),
        Contains(String),
    }

    #[derive(Clone, Debug, PartialEq, Serialize)]
    pub struct NumberCondition {
        pub equals: u64,
    }

    #[derive(Debug, Serialize)]
    pub struct QueryRequest<'a> {
        pub filter: &'a Filter,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub start_cursor: Option<&'a str>,
        pub page_size: u32,
    }

    #[derive(Clone, Debug, Default, Deserialize, Serialize)]
    pub struct QueryResponse {
        #[serde(default)]
        pub results: Vec<Page>,
        #[serde(default)]
        pub has_more: bool,
        #[serde(default)]
        pub next_cursor: Option<String>,
    }

    /// A database row as returned by a query.
    #[derive(Clone, Debug, Default, Deserialize, Serialize)]
    pub struct Page {
        pub id: String,
        #[serde(default)]
        pub properties: HashMap<String, PropertyItem>,
    }

    impl Page {
        /// Plain text of the first rich-text fragment of `name`, if any.
        pub fn plain_text(&self, name: &str) -> Option<&str> {
            match self.properties.get(name)? {
                PropertyItem::RichText { rich_text } => {
                    rich_text.first()?.plain_text.as_deref()
                }
                _ => None,
            }
        }

        pub fn unique_id(&self, name: &str) -> Option<&UniqueIdValue> {
            match self.properties.get(name)? {
                PropertyItem::UniqueId { unique_id } => Some(unique_id),
                _ => None,
            }
        }
    }

    /// Property value as read back from the destination. Only the types the
    /// sync reads are modelled.
    #[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub enum PropertyItem {
        RichText { rich_text: Vec<RichTextItem> },
        UniqueId { unique_id: UniqueIdValue },
        #[serde(other)]
        Other,
    }

    #[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
    pub struct RichTextItem {
        #[serde(default)]
        pub plain_text: Option<String>,
    }

    #[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
    pub struct UniqueIdValue {
        #[serde(default)]
        pub prefix: Option<String>,
        #[serde(default)]
        pub number: Option<u64>,
    }

    /// Property value sent when creating a page.
    #[derive(Clone, Debug, PartialEq, Serialize)]
    #[serde(rename_all = "snake_case")]
    pub enum PropertyValue {
        Title(Vec<TextInput>),
        RichText(Vec<TextInput>),
        Date(DateValue),
        Select(SelectOption),
        Number(#[serde(with = "rust_decimal::serde::float")] Decimal),
        Relation(Vec<PageRef>),
    }

    #[derive(Clone, Debug, PartialEq, Serialize)]
    pub struct TextInput {
        pub text: TextContent,
    }

    impl TextInput {
        pub fn plain(content: impl Into<String>) -> Self {
            Self {
                text: TextContent {
                    content: content.into(),
                },
            }
        }
    }

    #[derive(Clone, Debug, PartialEq, Serialize)]
    pub struct TextContent {
        pub content: String,
    }

    #[derive(Clone, Debug, PartialEq, Serialize)]
    pub struct DateValue {
        pub start: NaiveDate,
        pub end: Option<NaiveDate>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize)]
    pub struct SelectOption {
        pub name: String,
    }

    #[derive(Clone, Debug, PartialEq, Serialize)]
    pub struct PageRef {
        pub id: String,
    }

    /// Properties of a page, keyed by column name.
    pub type PageProperties = BTreeMap<String, PropertyValue>;

    #[derive(Debug, Serialize)]
    pub struct CreatePage<'a> {
        pub parent: Parent<'a>,
        pub properties: &'a PageProperties,
    }

    #[derive(Debug, Serialize)]
    pub struct Parent<'a> {
        pub database_id: &'a str,
    }

    #[derive(Clone, Debug, Deserialize)]
    pub struct CreatedPage {
        pub id: String,
    }
}
