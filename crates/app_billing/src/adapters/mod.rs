//! Port adapters for the billing application

pub mod memory;

pub use memory::{
    FileExemptionConfig, InMemoryAuditRepository, InMemoryBillRepository, InMemoryExemptionRecords, PriceList,
};
