//! Bank statement reconciliation engine.
//!
//! One run fetches the statement for a date window, drops transactions the
//! target database already holds, links the rest to related entity records
//! and creates one record per new transaction. The target database is the
//! only durable state: rerunning over an overlapping window never creates a
//! transaction twice.

use chrono::{Local, NaiveDate};

pub use api::{BankApi, Destination};
pub use entities::{
    CompositeId, EntityCode, EntityReference, EntityReferenceTable, EntityTag, Relation,
    RelationMap, match_reference,
};
pub use error::{ApiError, EngineError};
pub use ops::{
    MAX_FILTER_CONDITIONS,
    dedup::{dedup_filter, existing_ids},
    fetch::fetch_transactions,
    resolve::{Enriched, attach, codes_by_tag, extract, relation_filter, resolve_relations},
    transform::{
        AMOUNT_PROPERTY, BANK_NAME, BANK_PROPERTY, DATE_PROPERTY, DIRECTION_PROPERTY,
        ID_PROPERTY, Record, TITLE_PROPERTY, direction_label, title, transform,
    },
    write::write_all,
};
pub use transactions::{Candidates, Direction, PixDetails, Transaction};
pub use window::{DEFAULT_WINDOW_DAYS, DateWindow, default_floor_date};

mod api;
mod entities;
mod error;
mod ops;
mod transactions;
mod window;

type ResultEngine<T> = Result<T, EngineError>;

/// Outcome of a successful run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncReport {
    pub window: DateWindow,
    /// Transactions returned by the bank.
    pub fetched: usize,
    /// Of those, already present in the target database.
    pub existing: usize,
    pub created: usize,
}

#[derive(Debug)]
pub struct Engine<B, D> {
    bank: B,
    destination: D,
    database_id: String,
    entities: EntityReferenceTable,
    floor: NaiveDate,
    window_days: u32,
}

impl<B: BankApi, D: Destination> Engine<B, D> {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder<B, D> {
        EngineBuilder::default()
    }

    /// Window of a run ending on `today`.
    pub fn window(&self, since: Option<NaiveDate>, today: NaiveDate) -> ResultEngine<DateWindow> {
        DateWindow::resolve(since, today, self.floor, self.window_days)
    }

    /// Sync the window ending today.
    pub async fn run(&mut self, since: Option<NaiveDate>) -> ResultEngine<SyncReport> {
        let today = Local::now().date_naive();
        self.run_until(since, today).await
    }

    /// Sync the window ending on `today`.
    ///
    /// Stages run strictly in order: authenticate, fetch, dedup, resolve,
    /// transform, write. Any error stops the run; records already created
    /// are kept.
    pub async fn run_until(
        &mut self,
        since: Option<NaiveDate>,
        today: NaiveDate,
    ) -> ResultEngine<SyncReport> {
        let window = self.window(since, today)?;
        let mut report = SyncReport {
            window,
            fetched: 0,
            existing: 0,
            created: 0,
        };

        tracing::info!("Authenticating with the bank...");
        self.bank
            .authenticate()
            .await
            .map_err(|err| EngineError::Auth(err.to_string()))?;

        tracing::info!(start = %window.start, end = %window.end, "Fetching statement...");
        let Some(transactions) = fetch_transactions(&self.bank, &window).await? else {
            tracing::info!("No transactions in the statement for this window");
            return Ok(report);
        };
        report.fetched = transactions.len();
        tracing::info!(count = report.fetched, "Statement fetched");

        let mut candidates = Candidates::from_transactions(transactions);
        let existing = existing_ids(&self.destination, &self.database_id, self.floor, &candidates)
            .await?;
        report.existing = candidates.remove_all(&existing);
        tracing::info!(existing = report.existing, "Existing transactions filtered out");

        if candidates.is_empty() {
            tracing::info!("No new transactions, everything up to date");
            return Ok(report);
        }
        tracing::info!(count = candidates.len(), "New transactions to add");

        let enriched = extract(candidates);
        let relations = resolve_relations(&self.destination, &self.entities, &enriched).await?;
        let enriched = attach(enriched, &relations);

        let records: Vec<Record> = enriched.iter().map(transform).collect();
        tracing::info!(count = records.len(), "Creating records...");
        report.created = write_all(&self.destination, &self.database_id, &records).await?;
        tracing::info!(created = report.created, "Sync completed");

        Ok(report)
    }
}

/// The builder for `Engine`
pub struct EngineBuilder<B, D> {
    bank: Option<B>,
    destination: Option<D>,
    database_id: String,
    entities: EntityReferenceTable,
    floor: NaiveDate,
    window_days: u32,
}

impl<B, D> Default for EngineBuilder<B, D> {
    fn default() -> Self {
        Self {
            bank: None,
            destination: None,
            database_id: String::new(),
            entities: EntityReferenceTable::default(),
            floor: default_floor_date(),
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }
}

impl<B: BankApi, D: Destination> EngineBuilder<B, D> {
    /// Pass the bank statement client
    pub fn bank(mut self, bank: B) -> Self {
        self.bank = Some(bank);
        self
    }

    /// Pass the destination database client
    pub fn destination(mut self, destination: D) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Database new records are created in
    pub fn database_id(mut self, database_id: &str) -> Self {
        self.database_id = database_id.to_string();
        self
    }

    pub fn entities(mut self, entities: EntityReferenceTable) -> Self {
        self.entities = entities;
        self
    }

    /// Earliest date ever fetched or deduplicated against
    pub fn floor_date(mut self, floor: NaiveDate) -> Self {
        self.floor = floor;
        self
    }

    pub fn window_days(mut self, days: u32) -> Self {
        self.window_days = days;
        self
    }

    /// Construct `Engine`
    pub fn build(self) -> ResultEngine<Engine<B, D>> {
        let bank = self
            .bank
            .ok_or_else(|| EngineError::Config("missing bank client".to_string()))?;
        let destination = self
            .destination
            .ok_or_else(|| EngineError::Config("missing destination client".to_string()))?;
        if self.database_id.trim().is_empty() {
            return Err(EngineError::Config(
                "target database id must not be empty".to_string(),
            ));
        }
        self.entities.validate()?;

        Ok(Engine {
            bank,
            destination,
            database_id: self.database_id,
            entities: self.entities,
            floor: self.floor,
            window_days: self.window_days,
        })
    }
}
