//! In-memory and file-backed adapters
//!
//! Implementations of the billing and exemption ports that keep their data
//! in process memory, plus loaders for the JSON documents the CLI reads.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

use core_kernel::{BillId, ConceptId, DomainPort, Money, PatientId, PortError};
use domain_billing::{AuditLedger, AuditRepository, Bill, BillAudit, BillRepository, BillingError, PriceLookup};
use domain_exemption::{
    BillExemption, ExemptionCategory, ExemptionConfigSource, ExemptionDocument, ExemptionRecordSource,
};

/// Bill repository backed by a map
#[derive(Debug, Default)]
pub struct InMemoryBillRepository {
    bills: RwLock<HashMap<BillId, Bill>>,
}

impl InMemoryBillRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bills.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bills.read().is_empty()
    }
}

impl DomainPort for InMemoryBillRepository {}

impl BillRepository for InMemoryBillRepository {
    fn get(&self, id: BillId) -> Result<Bill, PortError> {
        self.bills
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Bill", id))
    }

    fn save(&self, bill: &Bill) -> Result<(), PortError> {
        let mut bills = self.bills.write();
        if let Some(stored) = bills.get(&bill.id()) {
            if stored.version() > bill.version() {
                return Err(PortError::conflict(format!(
                    "bill {} is at version {}, refusing version {}",
                    bill.id(),
                    stored.version(),
                    bill.version()
                )));
            }
        }
        bills.insert(bill.id(), bill.clone());
        Ok(())
    }

    fn find_by_patient(&self, patient_id: PatientId) -> Result<Vec<Bill>, PortError> {
        let mut bills: Vec<Bill> = self
            .bills
            .read()
            .values()
            .filter(|b| b.patient_id() == patient_id)
            .cloned()
            .collect();
        bills.sort_by_key(|b| b.created_at());
        Ok(bills)
    }
}

/// Audit repository over an in-process `AuditLedger`
#[derive(Debug, Default)]
pub struct InMemoryAuditRepository {
    ledger: Mutex<AuditLedger>,
}

impl InMemoryAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DomainPort for InMemoryAuditRepository {}

impl AuditRepository for InMemoryAuditRepository {
    fn register_bill(&self, bill_id: BillId) -> Result<(), PortError> {
        self.ledger.lock().register_bill(bill_id);
        Ok(())
    }

    fn append(&self, entries: Vec<BillAudit>) -> Result<(), PortError> {
        self.ledger
            .lock()
            .append_all(entries)
            .map(|_| ())
            .map_err(|e| match e {
                BillingError::BillNotFound(id) => PortError::not_found("Bill", id),
                other => PortError::internal(other.to_string()),
            })
    }

    fn history(&self, bill_id: BillId) -> Result<Vec<BillAudit>, PortError> {
        Ok(self.ledger.lock().history(&bill_id))
    }

    fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize, PortError> {
        Ok(self.ledger.lock().purge_before(cutoff))
    }
}

/// Unit prices keyed by concept
#[derive(Debug, Clone, Default)]
pub struct PriceList {
    prices: HashMap<ConceptId, Money>,
}

impl PriceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, concept: ConceptId, price: Money) -> Self {
        self.prices.insert(concept, price);
        self
    }

    /// Parses a JSON object of concept id to unit price
    ///
    /// Keys may carry the `CPT-` prefix; prices may be numbers or strings.
    /// Numbers are read from their literal text so no precision is lost.
    pub fn from_json_str(json: &str) -> Result<Self, PortError> {
        let raw: HashMap<String, Value> =
            serde_json::from_str(json).map_err(|e| PortError::transformation(e.to_string()))?;

        let mut prices = HashMap::with_capacity(raw.len());
        for (key, value) in raw {
            let concept: ConceptId = key
                .parse()
                .map_err(|_| PortError::validation_field(format!("invalid concept id '{}'", key), "price_list"))?;
            let amount = parse_price(&value)
                .ok_or_else(|| PortError::validation_field(format!("invalid price for {}", concept), "price_list"))?;
            if amount.is_sign_negative() && !amount.is_zero() {
                return Err(PortError::validation_field(
                    format!("negative price for {}", concept),
                    "price_list",
                ));
            }
            prices.insert(concept, Money::new(amount));
        }

        Ok(Self { prices })
    }

    pub fn from_path(path: &Path) -> Result<Self, PortError> {
        let json = read_file(path)?;
        Self::from_json_str(&json)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl DomainPort for PriceList {}

impl PriceLookup for PriceList {
    fn unit_price(&self, concept: ConceptId) -> Result<Option<Money>, PortError> {
        Ok(self.prices.get(&concept).copied())
    }
}

/// Script-authored exemptions held in memory
#[derive(Debug, Default)]
pub struct InMemoryExemptionRecords {
    records: RwLock<Vec<BillExemption>>,
}

impl InMemoryExemptionRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, exemption: BillExemption) {
        self.records.write().push(exemption);
    }

    /// Parses a JSON array of exemption records
    pub fn from_json_str(json: &str) -> Result<Self, PortError> {
        let records: Vec<BillExemption> =
            serde_json::from_str(json).map_err(|e| PortError::transformation(e.to_string()))?;
        debug!(count = records.len(), "Exemption records loaded");
        Ok(Self {
            records: RwLock::new(records),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, PortError> {
        let json = read_file(path)?;
        Self::from_json_str(&json)
    }
}

impl DomainPort for InMemoryExemptionRecords {}

impl ExemptionRecordSource for InMemoryExemptionRecords {
    fn exemptions_for(
        &self,
        category: ExemptionCategory,
        concept: ConceptId,
    ) -> Result<Vec<BillExemption>, PortError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|e| e.category == category && e.concept == concept)
            .cloned()
            .collect())
    }
}

/// Exemption scope document read from a JSON file on each load
#[derive(Debug, Clone)]
pub struct FileExemptionConfig {
    path: PathBuf,
}

impl FileExemptionConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DomainPort for FileExemptionConfig {}

impl ExemptionConfigSource for FileExemptionConfig {
    fn load_document(&self) -> Result<ExemptionDocument, PortError> {
        let json = read_file(&self.path)?;
        ExemptionDocument::from_json_str(&json).map_err(|e| PortError::transformation(e.to_string()))
    }
}

fn parse_price(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn read_file(path: &Path) -> Result<String, PortError> {
    std::fs::read_to_string(path)
        .map_err(|e| PortError::connection(format!("cannot read {}: {}", path.display(), e)))
}
