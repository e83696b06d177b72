//! Billing application service
//!
//! Entry point for order interception and the cashier workflow. The service
//! resolves exemptions, prices charges and routes every bill mutation through
//! the [`BillStore`], which serializes work per bill and feeds the audit
//! ledger.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use core_kernel::{BillId, CashPointId, LineItemId, Money, PatientId, PaymentId, ProviderId};
use domain_billing::{
    Actor, AuditRepository, Bill, BillAudit, BillLineItem, BillRepository, ChargeRef, DiscountType, PaymentMode,
    PriceLookup,
};
use domain_exemption::{
    ChargeRequest, ExemptionConfigSource, ExemptionDecision, ExemptionResolver, ExemptionTableHandle,
};

use crate::error::ServiceError;
use crate::store::BillStore;

/// Exemption decision plus the unit price to bill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeQuote {
    #[serde(flatten)]
    pub decision: ExemptionDecision,
    /// Zero when exempt or when no price is known
    pub unit_price: Money,
}

impl ChargeQuote {
    pub fn is_exempt(&self) -> bool {
        self.decision.exempt
    }
}

/// Billing application service
pub struct BillingService {
    resolver: ExemptionResolver,
    table: ExemptionTableHandle,
    prices: Arc<dyn PriceLookup>,
    audit: Arc<dyn AuditRepository>,
    store: BillStore,
}

impl BillingService {
    pub fn new(
        resolver: ExemptionResolver,
        table: ExemptionTableHandle,
        prices: Arc<dyn PriceLookup>,
        bills: Arc<dyn BillRepository>,
        audit: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            resolver,
            table,
            prices,
            store: BillStore::new(bills, Arc::clone(&audit)),
            audit,
        }
    }

    /// Opens an empty bill at a cash point
    pub fn open_bill(
        &self,
        patient_id: PatientId,
        cashier_id: ProviderId,
        cash_point_id: CashPointId,
    ) -> Result<BillId, ServiceError> {
        let bill = Bill::new(patient_id, cashier_id, cash_point_id);
        info!(bill_id = %bill.id(), patient_id = %patient_id, receipt = bill.receipt_number(), "Bill opened");
        self.store.insert(bill)
    }

    /// Decides whether a charge is exempt and what it costs
    ///
    /// A charge with no known price is quoted at zero.
    pub fn quote(&self, request: &ChargeRequest) -> Result<ChargeQuote, ServiceError> {
        let decision = self.resolver.resolve(request)?;
        if decision.exempt {
            return Ok(ChargeQuote {
                decision,
                unit_price: Money::zero(),
            });
        }

        let unit_price = self.prices.price_or_zero(request.concept)?;
        Ok(ChargeQuote { decision, unit_price })
    }

    /// Intercepts a newly created order and bills it
    ///
    /// The order's quantity becomes the line quantity. Exempt charges become
    /// exempted line items.
    pub fn on_order_created(
        &self,
        bill_id: BillId,
        item: ChargeRef,
        request: &ChargeRequest,
        actor: Actor,
    ) -> Result<LineItemId, ServiceError> {
        let quote = self.quote(request)?;
        let quantity = request.order.quantity;

        let line = if quote.is_exempt() {
            BillLineItem::exempted(item, quantity)?
        } else {
            BillLineItem::new(item, quote.unit_price, quantity)?
        };

        let line_id = self.store.with_bill(bill_id, |bill| bill.add_line_item(line, actor))?;
        info!(
            bill_id = %bill_id,
            line_item_id = %line_id,
            order_id = %request.order.id,
            exempt = quote.is_exempt(),
            "Order billed"
        );
        Ok(line_id)
    }

    pub fn record_payment(
        &self,
        bill_id: BillId,
        amount: Money,
        mode: PaymentMode,
        actor: Actor,
    ) -> Result<PaymentId, ServiceError> {
        self.store
            .with_bill(bill_id, |bill| bill.record_payment(amount, mode, actor))
    }

    pub fn void_line_item(
        &self,
        bill_id: BillId,
        line_item_id: LineItemId,
        reason: &str,
        actor: Actor,
    ) -> Result<(), ServiceError> {
        self.store
            .with_bill(bill_id, |bill| bill.void_line_item(line_item_id, reason, actor))
    }

    pub fn void_payment(
        &self,
        bill_id: BillId,
        payment_id: PaymentId,
        reason: &str,
        actor: Actor,
    ) -> Result<(), ServiceError> {
        self.store
            .with_bill(bill_id, |bill| bill.void_payment(payment_id, reason, actor))
    }

    pub fn initiate_discount(
        &self,
        bill_id: BillId,
        discount_type: DiscountType,
        value: Decimal,
        reason: &str,
        actor: Actor,
    ) -> Result<(), ServiceError> {
        self.store.with_bill(bill_id, |bill| {
            bill.initiate_discount(discount_type, value, reason, actor)
        })
    }

    pub fn approve_discount(&self, bill_id: BillId, actor: Actor) -> Result<(), ServiceError> {
        self.store.with_bill(bill_id, |bill| bill.approve_discount(actor))
    }

    pub fn reject_discount(&self, bill_id: BillId, actor: Actor) -> Result<(), ServiceError> {
        self.store.with_bill(bill_id, |bill| bill.reject_discount(actor))
    }

    pub fn cancel(&self, bill_id: BillId, reason: &str, actor: Actor) -> Result<(), ServiceError> {
        self.store.with_bill(bill_id, |bill| bill.cancel(reason, actor))
    }

    /// Closes the bill as adjusted and stores its corrective bill
    ///
    /// Returns the id of the corrective bill. The original stays open if the
    /// corrective bill cannot be stored.
    pub fn adjust(&self, bill_id: BillId, reason: &str, actor: Actor) -> Result<BillId, ServiceError> {
        self.store.replace_bill(bill_id, |bill| bill.adjust(reason, actor))
    }

    /// Current state of a bill
    pub fn bill(&self, bill_id: BillId) -> Result<Bill, ServiceError> {
        self.store.get(bill_id)
    }

    /// Audit trail of a bill, newest first
    pub fn history(&self, bill_id: BillId) -> Result<Vec<BillAudit>, ServiceError> {
        Ok(self.audit.history(bill_id)?)
    }

    /// Replaces the static exemption table from a configuration source
    ///
    /// On failure the previous table stays in place.
    pub fn reload_exemptions(&self, source: &dyn ExemptionConfigSource) -> Result<(), ServiceError> {
        self.table.reload_from(source)?;
        Ok(())
    }
}

impl std::fmt::Debug for BillingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingService")
            .field("resolver", &self.resolver)
            .field("store", &self.store)
            .finish()
    }
}
