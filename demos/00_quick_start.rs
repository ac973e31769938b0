/// quick start - register a client, take a loan and pay it down
use microfinance_ledger_rs::{
    CreditScore, Ledger, LoanTerms, MemoryStore, Money, NewClient, Rate, SafeTimeProvider,
    TimeSource,
};
use rust_decimal_macros::dec;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::System);
    let mut ledger = Ledger::with_store(MemoryStore::new());

    let client = ledger.register_client(
        NewClient::new("Ana Reyes", "0917-555-0199", "Cebu City", CreditScore::new(dec!(78))?)?,
        &time,
    )?;

    // 12,000 at 12% over a year
    let terms = LoanTerms::new(Money::from_major(12_000), Rate::from_percentage(12), 12)?;
    let loan = ledger.apply_for_loan(client.id, terms, &time)?;
    let outcome = ledger.approve_loan(loan.id, &time)?;
    println!("approved: {}", outcome.is_approved());

    let figures = ledger.loan_figures(loan.id)?;
    println!("monthly payment: {}", figures.monthly_payment.round_dp(2));

    let receipt = ledger.record_payment(loan.id, figures.monthly_payment.round_dp(2), &time)?;
    println!("{}", serde_json::to_string_pretty(&receipt)?);

    println!("{}", ledger.payment_history(loan.id)?.to_json()?);

    Ok(())
}
