//! Billing CLI
//!
//! Reads one JSON charge request from stdin, resolves its exemption and
//! prints the decision with the unit price to bill.
//!
//! # Usage
//!
//! ```bash
//! echo '{"category":"service","concept":1001,"patient":{...},"order":{...}}' | billing-cli
//!
//! # Point at other documents
//! BILLING_EXEMPTION_CONFIG_PATH=conf/exemptions.json \
//! BILLING_PRICE_LIST_PATH=conf/prices.json billing-cli < request.json
//! ```
//!
//! # Environment Variables
//!
//! * `BILLING_CONFIG_FILE` - Settings file (default: billing.toml)
//! * `BILLING_EXEMPTION_CONFIG_PATH` - Static exemption scopes (default: exemptions.json)
//! * `BILLING_EXEMPTION_RULES_PATH` - Script-authored exemptions
//! * `BILLING_PRICE_LIST_PATH` - Unit prices by concept id
//! * `BILLING_LOG_LEVEL` - trace, debug, info, warn, error (default: info)
//! * `BILLING_LOG_FORMAT` - pretty or json (default: pretty)

use std::io::Read;
use std::sync::Arc;

use anyhow::Context;

use app_billing::adapters::{
    FileExemptionConfig, InMemoryAuditRepository, InMemoryBillRepository, InMemoryExemptionRecords, PriceList,
};
use app_billing::{init_tracing, BillingService, BillingSettings};
use domain_exemption::{
    ChargeRequest, ExemptionRecordSource, ExemptionResolver, ExemptionRuleEngine, ExemptionTableHandle,
};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = BillingSettings::load().context("loading settings")?;
    init_tracing(&settings.log_level, settings.log_format).context("installing log subscriber")?;

    tracing::info!(
        exemption_config = %settings.exemption_config_path.display(),
        "Starting billing CLI"
    );

    let table = ExemptionTableHandle::default();
    table
        .reload_from(&FileExemptionConfig::new(&settings.exemption_config_path))
        .context("loading exemption configuration")?;

    let records: Arc<dyn ExemptionRecordSource> = match &settings.exemption_rules_path {
        Some(path) => Arc::new(InMemoryExemptionRecords::from_path(path).context("loading exemption rules")?),
        None => Arc::new(InMemoryExemptionRecords::new()),
    };

    let prices = match &settings.price_list_path {
        Some(path) => PriceList::from_path(path).context("loading price list")?,
        None => PriceList::new(),
    };

    let engine = Arc::new(ExemptionRuleEngine::with_sandbox(settings.sandbox_limits()));
    let resolver = ExemptionResolver::standard(table.clone(), engine, records);
    let service = BillingService::new(
        resolver,
        table,
        Arc::new(prices),
        Arc::new(InMemoryBillRepository::new()),
        Arc::new(InMemoryAuditRepository::new()),
    );

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("reading charge request from stdin")?;
    let request: ChargeRequest = serde_json::from_str(&input).context("parsing charge request")?;

    let quote = service.quote(&request)?;
    println!("{}", serde_json::to_string_pretty(&quote)?);

    Ok(())
}
