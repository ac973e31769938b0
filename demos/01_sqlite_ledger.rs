/// sqlite walk-through - seed clients, run a loan to settlement, print reports
///
/// RUST_LOG=debug cargo run --example 01_sqlite_ledger
use chrono::{Duration, TimeZone, Utc};
use microfinance_ledger_rs::{
    Ledger, LedgerConfig, LoanTerms, Money, Rate, SafeTimeProvider, SqliteStore, TimeSource,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::temp_dir().join("microfinance-ledger-demo.db");
    let _ = std::fs::remove_file(&path);

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap()
    ));
    let controller = time.test_control().unwrap();
    let mut ledger = Ledger::new(SqliteStore::open(&path)?, LedgerConfig::standard())?;

    let clients = ledger.seed_sample_clients(&time)?;
    let terms = LoanTerms::new(Money::from_major(12_000), Rate::from_percentage(12), 12)?;

    // one loan per sample client; lower scores are refused or auto-rejected
    let mut approved = Vec::new();
    for client in &clients {
        match ledger.apply_for_loan(client.id, terms, &time) {
            Ok(loan) => {
                let outcome = ledger.approve_loan(loan.id, &time)?;
                if outcome.is_approved() {
                    approved.push(loan.id);
                }
            }
            Err(err) => println!("application for {} refused: {err}", client.name),
        }
    }

    // pay the first approved loan to settlement
    if let Some(&loan_id) = approved.first() {
        let installment = ledger.loan_figures(loan_id)?.monthly_payment.round_dp(2);
        loop {
            controller.advance(Duration::days(30));
            let amount = installment.min(ledger.payoff_amount(loan_id)?);
            let receipt = ledger.record_payment(loan_id, amount, &time)?;
            if receipt.settled {
                break;
            }
        }
    }

    println!("{}", ledger.portfolio_summary()?.to_json()?);
    println!("{}", ledger.collection_report()?.to_json()?);
    println!("{}", ledger.client_loan_report()?.to_json()?);
    println!("{} events recorded", ledger.events().len());

    Ok(())
}
