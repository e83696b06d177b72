//! Test Data Builders
//!
//! Provides builder patterns for constructing test data with sensible defaults.
//! These builders allow tests to specify only the relevant fields while using
//! defaults for everything else.

use core_kernel::{
    BillableServiceId, CashPointId, ConceptId, Money, OrderId, PatientId, ProviderId,
};
use domain_billing::{Actor, Bill, BillLineItem, ChargeRef, PaymentMode};
use domain_exemption::{ChargeRequest, ExemptionCategory, OrderRef, PatientSnapshot};
use serde_json::Value;

use crate::fixtures::{ConceptFixtures, IdFixtures};

/// Builder for bills with line items and payments
///
/// Line items are added as services with fresh ids. Payments are cash.
pub struct TestBillBuilder {
    patient_id: PatientId,
    cashier_id: ProviderId,
    cash_point_id: CashPointId,
    lines: Vec<(Money, u32)>,
    exempted_lines: Vec<u32>,
    payments: Vec<Money>,
}

impl Default for TestBillBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestBillBuilder {
    pub fn new() -> Self {
        Self {
            patient_id: IdFixtures::patient_id(),
            cashier_id: IdFixtures::cashier_id(),
            cash_point_id: IdFixtures::cash_point_id(),
            lines: Vec::new(),
            exempted_lines: Vec::new(),
            payments: Vec::new(),
        }
    }

    pub fn with_patient(mut self, patient_id: PatientId) -> Self {
        self.patient_id = patient_id;
        self
    }

    pub fn with_cashier(mut self, cashier_id: ProviderId) -> Self {
        self.cashier_id = cashier_id;
        self
    }

    /// Adds a priced service line
    pub fn with_line(mut self, price: Money, quantity: u32) -> Self {
        self.lines.push((price, quantity));
        self
    }

    /// Adds an exempted service line
    pub fn with_exempted_line(mut self, quantity: u32) -> Self {
        self.exempted_lines.push(quantity);
        self
    }

    /// Adds a cash payment
    pub fn with_payment(mut self, amount: Money) -> Self {
        self.payments.push(amount);
        self
    }

    /// Builds the bill, recording every step as the cashier
    ///
    /// # Panics
    ///
    /// Panics if any line item or payment is rejected by the bill.
    pub fn build(self) -> Bill {
        let actor = Actor::Provider(self.cashier_id);
        let mut bill = Bill::new(self.patient_id, self.cashier_id, self.cash_point_id);

        for (price, quantity) in self.lines {
            let line = BillLineItem::new(service(), price, quantity).expect("valid line item");
            bill.add_line_item(line, actor).expect("line item accepted");
        }
        for quantity in self.exempted_lines {
            let line = BillLineItem::exempted(service(), quantity).expect("valid exempted line item");
            bill.add_line_item(line, actor).expect("exempted line item accepted");
        }
        for amount in self.payments {
            bill.record_payment(amount, PaymentMode::Cash, actor)
                .expect("payment accepted");
        }

        bill
    }
}

fn service() -> ChargeRef {
    ChargeRef::Service(BillableServiceId::new_v7())
}

/// Builder for charge requests handed to the exemption resolver
pub struct ChargeRequestBuilder {
    category: ExemptionCategory,
    concept: ConceptId,
    patient: PatientSnapshot,
    order_id: OrderId,
    quantity: u32,
    attributes: Vec<(String, Value)>,
}

impl Default for ChargeRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChargeRequestBuilder {
    /// A single paid service for an adult with no programs
    pub fn new() -> Self {
        Self {
            category: ExemptionCategory::Service,
            concept: ConceptFixtures::paid_service(),
            patient: PatientSnapshot::new(IdFixtures::patient_id()).with_age(35),
            order_id: IdFixtures::order_id(),
            quantity: 1,
            attributes: Vec::new(),
        }
    }

    pub fn service(mut self, concept: ConceptId) -> Self {
        self.category = ExemptionCategory::Service;
        self.concept = concept;
        self
    }

    pub fn commodity(mut self, concept: ConceptId) -> Self {
        self.category = ExemptionCategory::Commodity;
        self.concept = concept;
        self
    }

    pub fn with_patient(mut self, patient: PatientSnapshot) -> Self {
        self.patient = patient;
        self
    }

    pub fn aged(mut self, age: i64) -> Self {
        self.patient.age = Some(age);
        self
    }

    pub fn age_unknown(mut self) -> Self {
        self.patient.age = None;
        self
    }

    pub fn enrolled_in(mut self, program: impl Into<String>) -> Self {
        self.patient.active_programs.push(program.into());
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn build(self) -> ChargeRequest {
        let order = OrderRef::new(self.order_id, self.quantity);
        self.attributes.into_iter().fold(
            ChargeRequest::new(self.category, self.concept, self.patient, order),
            |request, (name, value)| request.with_attribute(name, value),
        )
    }
}
