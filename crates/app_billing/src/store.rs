//! Per-bill serialized access to bills
//!
//! Each bill sits behind its own mutex, so mutations of one bill run one at a
//! time while different bills proceed in parallel. A mutation works on a copy:
//! the copy is reconciled and saved, its audit entries are appended, and the
//! copy replaces the cached bill. If the mutation or the save fails, nothing
//! is cached and nothing reaches the audit repository.
//!
//! Bills stay cached for the life of the store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error};

use core_kernel::BillId;
use domain_billing::{AuditRepository, Bill, BillRepository, BillingError};

use crate::error::ServiceError;

/// Bills cached behind per-bill locks
pub struct BillStore {
    bills: RwLock<HashMap<BillId, Arc<Mutex<Bill>>>>,
    repository: Arc<dyn BillRepository>,
    audit: Arc<dyn AuditRepository>,
}

impl BillStore {
    pub fn new(repository: Arc<dyn BillRepository>, audit: Arc<dyn AuditRepository>) -> Self {
        Self {
            bills: RwLock::new(HashMap::new()),
            repository,
            audit,
        }
    }

    /// Stores a freshly created bill together with its creation entries
    pub fn insert(&self, mut bill: Bill) -> Result<BillId, ServiceError> {
        let id = bill.id();
        let entries = bill.take_audit_entries();
        self.repository.save(&bill)?;
        self.audit.register_bill(id)?;
        self.audit.append(entries)?;

        self.bills.write().insert(id, Arc::new(Mutex::new(bill)));
        debug!(bill_id = %id, "Bill stored");
        Ok(id)
    }

    /// Current state of a bill
    pub fn get(&self, id: BillId) -> Result<Bill, ServiceError> {
        let slot = self.slot(id)?;
        let bill = slot.lock().clone();
        Ok(bill)
    }

    /// Runs `f` against the bill while holding its lock
    ///
    /// The bill is reconciled after `f` returns, whatever `f` did.
    pub fn with_bill<T, F>(&self, id: BillId, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut Bill) -> Result<T, BillingError>,
    {
        self.mutate(id, |bill| f(bill).map_err(ServiceError::from))
    }

    /// Runs `f`, which closes the bill and returns the bill replacing it
    ///
    /// The replacement is stored before the closed bill is saved, so a
    /// failure to store it leaves the original open.
    pub fn replace_bill<F>(&self, id: BillId, f: F) -> Result<BillId, ServiceError>
    where
        F: FnOnce(&mut Bill) -> Result<Bill, BillingError>,
    {
        self.mutate(id, |bill| {
            let replacement = f(bill)?;
            self.insert(replacement)
        })
    }

    fn mutate<T, F>(&self, id: BillId, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut Bill) -> Result<T, ServiceError>,
    {
        let slot = self.slot(id)?;
        let mut guard = slot.lock();

        let mut working = guard.clone();
        let value = f(&mut working)?;
        working.synchronize_status()?;

        let entries = working.take_audit_entries();
        self.repository.save(&working)?;

        let appended = if entries.is_empty() {
            Ok(())
        } else {
            self.audit.append(entries)
        };

        // The saved copy is authoritative from here on.
        *guard = working;
        if let Err(e) = appended {
            error!(bill_id = %id, error = %e, "Audit append failed after bill save");
            return Err(e.into());
        }
        Ok(value)
    }

    fn slot(&self, id: BillId) -> Result<Arc<Mutex<Bill>>, ServiceError> {
        if let Some(slot) = self.bills.read().get(&id) {
            return Ok(Arc::clone(slot));
        }

        let loaded = self.repository.get(id)?;
        let mut bills = self.bills.write();
        let slot = bills
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(loaded)));
        Ok(Arc::clone(slot))
    }
}

impl std::fmt::Debug for BillStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillStore")
            .field("cached", &self.bills.read().len())
            .finish()
    }
}
