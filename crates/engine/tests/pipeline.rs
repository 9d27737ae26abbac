use std::sync::{Arc, Mutex};

use api_types::{
    bank::{StatementPage, StatementQuery},
    notion::{
        Condition, CreatedPage, Filter, Page, PageProperties, PageRef, PropertyItem,
        PropertyValue, QueryResponse, RichTextItem, TextCondition, TextInput, UniqueIdValue,
    },
};
use chrono::NaiveDate;
use serde_json::json;

use engine::{
    ApiError, BankApi, Destination, Engine, EngineError, EntityReference, EntityReferenceTable,
    EntityTag, ID_PROPERTY,
};

const TARGET_DB: &str = "target-db";
const OBRA_DB: &str = "obra-db";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    date(2025, 10, 15)
}

fn raw_tx(id: &str, operation: &str, amount: &str, reference: Option<&str>) -> serde_json::Value {
    let mut value = json!({
        "idTransacao": id,
        "dataInclusao": "2025-10-01 08:30:00",
        "dataTransacao": "2025-10-01",
        "tipoTransacao": "PIX",
        "tipoOperacao": operation,
        "valor": amount,
        "titulo": "Pix recebido",
        "descricao": "Cliente",
    });
    if let Some(reference) = reference {
        value["detalhes"] = json!({ "txId": reference, "descricaoPix": "Medição" });
    }
    value
}

fn page_of(transactions: Vec<serde_json::Value>, last_page: bool) -> StatementPage {
    StatementPage {
        transactions: Some(transactions),
        last_page,
        total_pages: None,
    }
}

// ============================================================================
// Fakes
// ============================================================================

#[derive(Debug, Default)]
struct BankState {
    pages: Vec<StatementPage>,
    queries: Vec<StatementQuery>,
    authenticated: bool,
    fail_auth: bool,
    fail_on_page: Option<u32>,
}

#[derive(Clone, Debug, Default)]
struct FakeBank(Arc<Mutex<BankState>>);

impl FakeBank {
    fn with_pages(pages: Vec<StatementPage>) -> Self {
        let bank = Self::default();
        bank.0.lock().unwrap().pages = pages;
        bank
    }

    fn queries(&self) -> Vec<StatementQuery> {
        self.0.lock().unwrap().queries.clone()
    }
}

impl BankApi for FakeBank {
    async fn authenticate(&mut self) -> Result<(), ApiError> {
        let mut state = self.0.lock().unwrap();
        if state.fail_auth {
            return Err(ApiError::Status {
                status: 401,
                message: "invalid client".to_string(),
            });
        }
        state.authenticated = true;
        Ok(())
    }

    async fn statement_page(&self, query: &StatementQuery) -> Result<StatementPage, ApiError> {
        let mut state = self.0.lock().unwrap();
        assert!(state.authenticated, "statement requested before authentication");
        state.queries.push(query.clone());
        if state.fail_on_page == Some(query.page) {
            return Err(ApiError::Status {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(state
            .pages
            .get(query.page as usize)
            .cloned()
            .unwrap_or_else(|| page_of(vec![], true)))
    }
}

#[derive(Debug, Default)]
struct DestinationState {
    databases: std::collections::HashMap<String, Vec<Page>>,
    created: Vec<PageProperties>,
    queries: Vec<(String, Filter)>,
    page_size: usize,
    fail_create_on: Option<usize>,
    fail_queries_on: Option<String>,
    next_id: usize,
}

#[derive(Clone, Debug)]
struct FakeDestination(Arc<Mutex<DestinationState>>);

impl FakeDestination {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(DestinationState {
            page_size: 2,
            ..DestinationState::default()
        })))
    }

    fn seed_transaction(&self, id: &str) {
        let mut state = self.0.lock().unwrap();
        let page = Page {
            id: format!("existing-{id}"),
            properties: [(
                ID_PROPERTY.to_string(),
                PropertyItem::RichText {
                    rich_text: vec![RichTextItem {
                        plain_text: Some(id.to_string()),
                    }],
                },
            )]
            .into_iter()
            .collect(),
        };
        state
            .databases
            .entry(TARGET_DB.to_string())
            .or_default()
            .push(page);
    }

    fn seed_entity(&self, database_id: &str, page_id: &str, prefix: &str, number: u64) {
        let mut state = self.0.lock().unwrap();
        let page = Page {
            id: page_id.to_string(),
            properties: [(
                "Identificador".to_string(),
                PropertyItem::UniqueId {
                    unique_id: UniqueIdValue {
                        prefix: Some(prefix.to_string()),
                        number: Some(number),
                    },
                },
            )]
            .into_iter()
            .collect(),
        };
        state
            .databases
            .entry(database_id.to_string())
            .or_default()
            .push(page);
    }

    fn created(&self) -> Vec<PageProperties> {
        self.0.lock().unwrap().created.clone()
    }

    fn created_ids(&self) -> Vec<String> {
        self.created()
            .iter()
            .map(|properties| match &properties[ID_PROPERTY] {
                PropertyValue::RichText(text) => text[0].text.content.clone(),
                other => panic!("unexpected id property {other:?}"),
            })
            .collect()
    }

    fn queries(&self) -> Vec<(String, Filter)> {
        self.0.lock().unwrap().queries.clone()
    }
}

fn matches(page: &Page, filter: &Filter) -> bool {
    match filter {
        Filter::And { and } => and.iter().all(|f| matches(page, f)),
        Filter::Or { or } => or.iter().any(|f| matches(page, f)),
        Filter::Property(property) => match &property.condition {
            // Records are seeded inside the horizon.
            Condition::Date(_) => true,
            Condition::RichText(TextCondition::Equals(value)) => {
                page.plain_text(&property.property) == Some(value.as_str())
            }
            Condition::RichText(TextCondition::Contains(value)) => page
                .plain_text(&property.property)
                .is_some_and(|text| text.contains(value.as_str())),
            Condition::Number(number) => page
                .unique_id(&property.property)
                .and_then(|unique| unique.number)
                == Some(number.equals),
        },
    }
}

impl Destination for FakeDestination {
    async fn query_database(
        &self,
        database_id: &str,
        filter: &Filter,
        start_cursor: Option<&str>,
    ) -> Result<QueryResponse, ApiError> {
        let mut state = self.0.lock().unwrap();
        state.queries.push((database_id.to_string(), filter.clone()));
        if state.fail_queries_on.as_deref() == Some(database_id) {
            return Err(ApiError::Network("connection reset".to_string()));
        }

        let hits: Vec<Page> = state
            .databases
            .get(database_id)
            .map(|pages| pages.iter().filter(|p| matches(p, filter)).cloned().collect())
            .unwrap_or_default();
        let offset: usize = start_cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
        let end = (offset + state.page_size).min(hits.len());
        let has_more = end < hits.len();

        Ok(QueryResponse {
            results: hits[offset..end].to_vec(),
            has_more,
            next_cursor: has_more.then(|| end.to_string()),
        })
    }

    async fn create_page(
        &self,
        database_id: &str,
        properties: &PageProperties,
    ) -> Result<CreatedPage, ApiError> {
        let mut state = self.0.lock().unwrap();
        if state.fail_create_on == Some(state.created.len()) {
            return Err(ApiError::Status {
                status: 400,
                message: "validation_error".to_string(),
            });
        }
        state.next_id += 1;
        let id = format!("created-{}", state.next_id);
        state.created.push(properties.clone());

        if let Some(PropertyValue::RichText(text)) = properties.get(ID_PROPERTY) {
            let tx_id = text[0].text.content.clone();
            let page = Page {
                id: id.clone(),
                properties: [(
                    ID_PROPERTY.to_string(),
                    PropertyItem::RichText {
                        rich_text: vec![RichTextItem {
                            plain_text: Some(tx_id),
                        }],
                    },
                )]
                .into_iter()
                .collect(),
            };
            state
                .databases
                .entry(database_id.to_string())
                .or_default()
                .push(page);
        }
        Ok(CreatedPage { id })
    }
}

fn entities() -> EntityReferenceTable {
    EntityReferenceTable::new()
        .with(
            EntityTag::Obra,
            EntityReference::new(OBRA_DB, "Controle Financeiro", "Identificador"),
        )
        .with(
            EntityTag::Elevare,
            EntityReference::new("", "Pagar e Receber", "Identificador"),
        )
}

fn engine(bank: FakeBank, destination: FakeDestination) -> Engine<FakeBank, FakeDestination> {
    Engine::builder()
        .bank(bank)
        .destination(destination)
        .database_id(TARGET_DB)
        .entities(entities())
        .build()
        .unwrap()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn creates_only_transactions_missing_from_destination() {
    let bank = FakeBank::with_pages(vec![page_of(
        vec![
            raw_tx("T1", "C", "10.00", None),
            raw_tx("T2", "D", "20.00", None),
            raw_tx("T3", "D", "30.00", None),
        ],
        true,
    )]);
    let destination = FakeDestination::new();
    destination.seed_transaction("T2");

    let mut engine = engine(bank, destination.clone());
    let report = engine.run_until(None, today()).await.unwrap();

    assert_eq!(report.fetched, 3);
    assert_eq!(report.existing, 1);
    assert_eq!(report.created, 2);
    assert_eq!(destination.created_ids(), vec!["T1", "T3"]);
}

#[tokio::test]
async fn rerun_over_overlapping_window_never_duplicates() {
    let bank = FakeBank::with_pages(vec![page_of(
        vec![raw_tx("T1", "C", "10.00", None), raw_tx("T2", "D", "5.00", None)],
        true,
    )]);
    let destination = FakeDestination::new();
    let mut engine = engine(bank.clone(), destination.clone());

    let first = engine.run_until(None, today()).await.unwrap();
    assert_eq!(first.created, 2);

    bank.0.lock().unwrap().pages = vec![page_of(
        vec![
            raw_tx("T1", "C", "10.00", None),
            raw_tx("T2", "D", "5.00", None),
            raw_tx("T4", "C", "1.00", None),
        ],
        true,
    )];
    let second = engine.run_until(None, today()).await.unwrap();
    assert_eq!(second.existing, 2);
    assert_eq!(second.created, 1);

    let third = engine.run_until(None, today()).await.unwrap();
    assert_eq!(third.created, 0);
    assert_eq!(destination.created_ids(), vec!["T1", "T2", "T4"]);
}

#[tokio::test]
async fn links_transaction_to_resolved_entity() {
    let bank = FakeBank::with_pages(vec![page_of(
        vec![raw_tx("T1", "C", "1500.00", Some("OBRA0042"))],
        true,
    )]);
    let destination = FakeDestination::new();
    destination.seed_entity(OBRA_DB, "obra-page-42", "OBRA", 42);
    destination.seed_entity(OBRA_DB, "obra-page-43", "OBRA", 43);

    let mut engine = engine(bank, destination.clone());
    engine.run_until(None, today()).await.unwrap();

    let created = destination.created();
    assert_eq!(created.len(), 1);
    assert_eq!(
        created[0]["Controle Financeiro"],
        PropertyValue::Relation(vec![PageRef {
            id: "obra-page-42".to_string()
        }])
    );
    assert_eq!(
        created[0]["Descrição"],
        PropertyValue::Title(vec![TextInput::plain("Medição - Pix recebido Cliente")])
    );

    let entity_queries: Vec<Filter> = destination
        .queries()
        .into_iter()
        .filter(|(db, _)| db == OBRA_DB)
        .map(|(_, filter)| filter)
        .collect();
    assert_eq!(
        entity_queries,
        vec![Filter::Or {
            or: vec![Filter::number_equals("Identificador", 42)]
        }]
    );
}

#[tokio::test]
async fn unconfigured_entity_tag_is_written_without_relation() {
    let bank = FakeBank::with_pages(vec![page_of(
        vec![
            raw_tx("T1", "D", "80.00", Some("ELEVARE17")),
            raw_tx("T2", "D", "90.00", Some("ELEVARE0017")),
        ],
        true,
    )]);
    let destination = FakeDestination::new();

    let mut engine = engine(bank, destination.clone());
    let report = engine.run_until(None, today()).await.unwrap();

    assert_eq!(report.created, 2);
    for properties in destination.created() {
        assert!(!properties.contains_key("Pagar e Receber"));
        assert_eq!(properties.len(), 6);
    }
    assert!(destination.queries().iter().all(|(db, _)| db == TARGET_DB));
}

#[tokio::test]
async fn missing_entity_record_leaves_relation_unset() {
    let bank = FakeBank::with_pages(vec![page_of(
        vec![raw_tx("T1", "C", "1.00", Some("OBRA0999"))],
        true,
    )]);
    let destination = FakeDestination::new();
    destination.seed_entity(OBRA_DB, "obra-page-42", "OBRA", 42);

    let mut engine = engine(bank, destination.clone());
    engine.run_until(None, today()).await.unwrap();

    assert!(!destination.created()[0].contains_key("Controle Financeiro"));
}

#[tokio::test]
async fn record_with_foreign_prefix_is_not_linked() {
    let bank = FakeBank::with_pages(vec![page_of(
        vec![
            raw_tx("T1", "C", "1.00", Some("OBRA0042")),
            raw_tx("T2", "C", "2.00", Some("OBRA0043")),
        ],
        true,
    )]);
    let destination = FakeDestination::new();
    destination.seed_entity(OBRA_DB, "foreign", "CF-", 42);
    destination.seed_entity(OBRA_DB, "obra-page-43", "OBRA", 43);

    let mut engine = engine(bank, destination.clone());
    engine.run_until(None, today()).await.unwrap();

    let created = destination.created();
    assert!(!created[0].contains_key("Controle Financeiro"));
    assert_eq!(
        created[1]["Controle Financeiro"],
        PropertyValue::Relation(vec![PageRef {
            id: "obra-page-43".to_string()
        }])
    );
}

fn conditions_on(filter: &Filter, property: &str) -> usize {
    match filter {
        Filter::And { and } => and.iter().map(|f| conditions_on(f, property)).sum(),
        Filter::Or { or } => or.iter().map(|f| conditions_on(f, property)).sum(),
        Filter::Property(filter) => usize::from(filter.property == property),
    }
}

#[tokio::test]
async fn dedup_splits_large_batches_at_chunk_edges() {
    let ids: Vec<String> = (0..205).map(|n| format!("T{n}")).collect();
    let bank = FakeBank::with_pages(vec![page_of(
        ids.iter().map(|id| raw_tx(id, "C", "1.00", None)).collect(),
        true,
    )]);
    let destination = FakeDestination::new();
    let seeded = ["T99", "T100", "T204"];
    for id in seeded {
        destination.seed_transaction(id);
    }

    let mut engine = engine(bank, destination.clone());
    let report = engine.run_until(None, today()).await.unwrap();

    assert_eq!(report.existing, 3);
    assert_eq!(report.created, 202);
    let created = destination.created_ids();
    assert!(created.iter().all(|id| !seeded.contains(&id.as_str())));
    assert_eq!(created.first().map(String::as_str), Some("T0"));
    assert_eq!(created.last().map(String::as_str), Some("T203"));

    let sizes: Vec<usize> = destination
        .queries()
        .iter()
        .filter(|(db, _)| db == TARGET_DB)
        .map(|(_, filter)| conditions_on(filter, ID_PROPERTY))
        .collect();
    assert_eq!(sizes, vec![100, 100, 5]);

    let rerun = engine.run_until(None, today()).await.unwrap();
    assert_eq!(rerun.existing, 205);
    assert_eq!(rerun.created, 0);
}

#[tokio::test]
async fn relation_lookup_splits_codes_at_chunk_edges() {
    let bank = FakeBank::with_pages(vec![page_of(
        (1..=150u64)
            .map(|n| {
                raw_tx(
                    &format!("T{n}"),
                    "C",
                    "1.00",
                    Some(&format!("OBRA{n:04}")),
                )
            })
            .collect(),
        true,
    )]);
    let destination = FakeDestination::new();
    for number in [100, 101, 150] {
        destination.seed_entity(OBRA_DB, &format!("obra-page-{number}"), "OBRA", number);
    }

    let mut engine = engine(bank, destination.clone());
    let report = engine.run_until(None, today()).await.unwrap();
    assert_eq!(report.created, 150);

    let linked: Vec<(String, String)> = destination
        .created_ids()
        .into_iter()
        .zip(destination.created())
        .filter_map(|(id, properties)| match properties.get("Controle Financeiro") {
            Some(PropertyValue::Relation(refs)) => Some((id, refs[0].id.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        linked,
        vec![
            ("T100".to_string(), "obra-page-100".to_string()),
            ("T101".to_string(), "obra-page-101".to_string()),
            ("T150".to_string(), "obra-page-150".to_string()),
        ]
    );

    let sizes: Vec<usize> = destination
        .queries()
        .iter()
        .filter(|(db, _)| db == OBRA_DB)
        .map(|(_, filter)| conditions_on(filter, "Identificador"))
        .collect();
    assert_eq!(sizes, vec![100, 50]);
}

#[tokio::test]
async fn paginates_statement_with_clamped_window() {
    let bank = FakeBank::with_pages(vec![
        page_of(vec![raw_tx("T1", "C", "1.00", None)], false),
        page_of(vec![], false),
        page_of(vec![raw_tx("T2", "C", "2.00", None)], true),
    ]);
    let destination = FakeDestination::new();

    let mut engine = engine(bank.clone(), destination.clone());
    let report = engine
        .run_until(Some(date(2024, 1, 1)), today())
        .await
        .unwrap();

    assert_eq!(report.window.start, date(2025, 8, 1));
    assert_eq!(report.created, 2);
    let queries = bank.queries();
    assert_eq!(
        queries.iter().map(|q| q.page).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert!(queries.iter().all(|q| q.start == date(2025, 8, 1) && q.end == today()));
}

#[tokio::test]
async fn dedup_follows_destination_cursor() {
    let ids = ["T1", "T2", "T3", "T4", "T5"];
    let bank = FakeBank::with_pages(vec![page_of(
        ids.iter().map(|id| raw_tx(id, "C", "1.00", None)).collect(),
        true,
    )]);
    let destination = FakeDestination::new();
    for id in &ids[..4] {
        destination.seed_transaction(id);
    }

    let mut engine = engine(bank, destination.clone());
    let report = engine.run_until(None, today()).await.unwrap();

    assert_eq!(report.existing, 4);
    assert_eq!(destination.created_ids(), vec!["T5"]);
}

#[tokio::test]
async fn empty_statement_touches_nothing() {
    let bank = FakeBank::with_pages(vec![page_of(vec![], true)]);
    let destination = FakeDestination::new();

    let mut engine = engine(bank, destination.clone());
    let report = engine.run_until(None, today()).await.unwrap();

    assert_eq!(report.fetched, 0);
    assert_eq!(report.created, 0);
    assert!(destination.queries().is_empty());
}

#[tokio::test]
async fn fetch_failure_aborts_before_destination() {
    let bank = FakeBank::with_pages(vec![
        page_of(vec![raw_tx("T1", "C", "1.00", None)], false),
        page_of(vec![raw_tx("T2", "C", "1.00", None)], true),
    ]);
    bank.0.lock().unwrap().fail_on_page = Some(1);
    let destination = FakeDestination::new();

    let mut engine = engine(bank, destination.clone());
    let err = engine.run_until(None, today()).await.unwrap_err();

    assert_eq!(err, EngineError::Fetch("503: unavailable".to_string()));
    assert!(destination.queries().is_empty());
    assert!(destination.created().is_empty());
}

#[tokio::test]
async fn auth_failure_aborts_before_fetch() {
    let bank = FakeBank::with_pages(vec![page_of(vec![raw_tx("T1", "C", "1.00", None)], true)]);
    bank.0.lock().unwrap().fail_auth = true;
    let destination = FakeDestination::new();

    let mut engine = engine(bank.clone(), destination.clone());
    let err = engine.run_until(None, today()).await.unwrap_err();

    assert!(matches!(err, EngineError::Auth(_)));
    assert!(bank.queries().is_empty());
}

#[tokio::test]
async fn invalid_transaction_aborts_whole_batch() {
    let mut broken = raw_tx("T2", "C", "1.00", None);
    broken["tipoOperacao"] = json!("?");
    let bank = FakeBank::with_pages(vec![page_of(
        vec![raw_tx("T1", "C", "1.00", None), broken],
        true,
    )]);
    let destination = FakeDestination::new();

    let mut engine = engine(bank, destination.clone());
    let err = engine.run_until(None, today()).await.unwrap_err();

    assert!(matches!(err, EngineError::Validation(_)));
    assert!(destination.created().is_empty());
}

#[tokio::test]
async fn resolution_query_failure_aborts_before_writes() {
    let bank = FakeBank::with_pages(vec![page_of(
        vec![raw_tx("T1", "C", "1.00", Some("OBRA0042"))],
        true,
    )]);
    let destination = FakeDestination::new();
    destination.0.lock().unwrap().fail_queries_on = Some(OBRA_DB.to_string());

    let mut engine = engine(bank, destination.clone());
    let err = engine.run_until(None, today()).await.unwrap_err();

    assert_eq!(
        err,
        EngineError::Query("network error: connection reset".to_string())
    );
    assert!(destination.created().is_empty());
}

#[tokio::test]
async fn write_failure_stops_remaining_and_rerun_recovers() {
    let bank = FakeBank::with_pages(vec![page_of(
        vec![
            raw_tx("T1", "C", "1.00", None),
            raw_tx("T2", "C", "2.00", None),
            raw_tx("T3", "C", "3.00", None),
        ],
        true,
    )]);
    let destination = FakeDestination::new();
    destination.0.lock().unwrap().fail_create_on = Some(1);

    let mut engine = engine(bank, destination.clone());
    let err = engine.run_until(None, today()).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::Write {
            id: "T2".to_string(),
            reason: "400: validation_error".to_string()
        }
    );
    assert_eq!(destination.created_ids(), vec!["T1"]);

    destination.0.lock().unwrap().fail_create_on = None;
    let report = engine.run_until(None, today()).await.unwrap();
    assert_eq!(report.existing, 1);
    assert_eq!(destination.created_ids(), vec!["T1", "T2", "T3"]);
}

#[tokio::test]
async fn builder_requires_target_database() {
    let err = Engine::builder()
        .bank(FakeBank::default())
        .destination(FakeDestination::new())
        .build()
        .unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
}
