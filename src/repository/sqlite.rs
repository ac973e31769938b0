//! SQLite backend.
//!
//! Decimal columns are TEXT so amounts survive exactly; the interest rate is
//! stored as a percentage. Dates are ISO `YYYY-MM-DD`. Foreign keys are
//! enforced with `ON DELETE RESTRICT`.

use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use tracing::debug;

use crate::decimal::{Money, Rate};
use crate::model::{Client, Loan, NewClient, NewLoan, NewPayment, Payment};
use crate::repository::{Store, StoreError, StoreResult};
use crate::types::{ClientId, CreditScore, LoanId, LoanStatus, LoanTerms, PaymentId};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS clients (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        phone TEXT NOT NULL,
        address TEXT NOT NULL,
        credit_score TEXT NOT NULL DEFAULT '75.0'
    );

    CREATE TABLE IF NOT EXISTS loans (
        loan_id INTEGER PRIMARY KEY AUTOINCREMENT,
        client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE RESTRICT,
        amount TEXT NOT NULL,
        interest_rate TEXT NOT NULL,
        duration_months INTEGER NOT NULL CHECK (duration_months > 0),
        status TEXT NOT NULL CHECK (status IN ('PENDING', 'APPROVED', 'REJECT', 'PAID')),
        issue_date TEXT NOT NULL,
        paid_amount TEXT NOT NULL DEFAULT '0'
    );
    CREATE INDEX IF NOT EXISTS idx_loans_client_id ON loans(client_id);

    CREATE TABLE IF NOT EXISTS payments (
        payment_id INTEGER PRIMARY KEY AUTOINCREMENT,
        loan_id INTEGER NOT NULL REFERENCES loans(loan_id) ON DELETE RESTRICT,
        amount TEXT NOT NULL,
        payment_date TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_payments_loan_id ON payments(loan_id);
";

const LOAN_COLUMNS: &str =
    "loan_id, client_id, amount, interest_rate, duration_months, status, issue_date, paid_amount";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// open (or create) a database file and apply the schema
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening sqlite ledger");
        Self::with_connection(Connection::open(path)?)
    }

    /// private in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn query_loans(&self, sql: &str, params: impl rusqlite::Params) -> StoreResult<Vec<Loan>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, LoanRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(LoanRow::into_loan).collect()
    }

    fn query_payments(&self, sql: &str, params: impl rusqlite::Params) -> StoreResult<Vec<Payment>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, PaymentRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(PaymentRow::into_payment).collect()
    }
}

// raw rows: TEXT columns are parsed after the rusqlite read so parse
// failures surface as `StoreError::Corrupt`

struct ClientRow {
    id: i64,
    name: String,
    phone: String,
    address: String,
    credit_score: String,
}

impl ClientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            phone: row.get(2)?,
            address: row.get(3)?,
            credit_score: row.get(4)?,
        })
    }

    fn into_client(self) -> StoreResult<Client> {
        let score = CreditScore::new(parse_decimal("credit_score", &self.credit_score)?)
            .map_err(|e| corrupt(format!("client {}: {e}", self.id)))?;
        Ok(Client {
            id: ClientId(self.id),
            name: self.name,
            phone: self.phone,
            address: self.address,
            credit_score: score,
        })
    }
}

struct LoanRow {
    id: i64,
    client_id: i64,
    amount: String,
    interest_rate: String,
    duration_months: u32,
    status: String,
    issue_date: String,
    paid_amount: String,
}

impl LoanRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            client_id: row.get(1)?,
            amount: row.get(2)?,
            interest_rate: row.get(3)?,
            duration_months: row.get(4)?,
            status: row.get(5)?,
            issue_date: row.get(6)?,
            paid_amount: row.get(7)?,
        })
    }

    fn into_loan(self) -> StoreResult<Loan> {
        let terms = LoanTerms::new(
            Money::from_decimal(parse_decimal("amount", &self.amount)?),
            Rate::from_percent(parse_decimal("interest_rate", &self.interest_rate)?),
            self.duration_months,
        )
        .map_err(|e| corrupt(format!("loan {}: {e}", self.id)))?;

        let status = LoanStatus::from_str(&self.status)
            .map_err(|e| corrupt(format!("loan {}: {e}", self.id)))?;

        Ok(Loan {
            id: LoanId(self.id),
            client_id: ClientId(self.client_id),
            terms,
            status,
            issue_date: parse_date("issue_date", &self.issue_date)?,
            paid_amount: Money::from_decimal(parse_decimal("paid_amount", &self.paid_amount)?),
        })
    }
}

struct PaymentRow {
    id: i64,
    loan_id: i64,
    amount: String,
    payment_date: String,
}

impl PaymentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            loan_id: row.get(1)?,
            amount: row.get(2)?,
            payment_date: row.get(3)?,
        })
    }

    fn into_payment(self) -> StoreResult<Payment> {
        Ok(Payment {
            id: PaymentId(self.id),
            loan_id: LoanId(self.loan_id),
            amount: Money::from_decimal(parse_decimal("amount", &self.amount)?),
            payment_date: parse_date("payment_date", &self.payment_date)?,
        })
    }
}

fn corrupt(message: String) -> StoreError {
    StoreError::Corrupt { message }
}

fn parse_decimal(column: &str, value: &str) -> StoreResult<Decimal> {
    Decimal::from_str(value).map_err(|e| corrupt(format!("{column} '{value}': {e}")))
}

fn parse_date(column: &str, value: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| corrupt(format!("{column} '{value}': {e}")))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn rate_column(rate: Rate) -> String {
    rate.as_percentage().normalize().to_string()
}

impl Store for SqliteStore {
    fn insert_client(&mut self, client: NewClient) -> StoreResult<Client> {
        self.conn.execute(
            "INSERT INTO clients (name, phone, address, credit_score) VALUES (?1, ?2, ?3, ?4)",
            params![
                client.name,
                client.phone,
                client.address,
                client.credit_score.as_decimal().to_string()
            ],
        )?;
        Ok(Client::from_new(ClientId(self.conn.last_insert_rowid()), client))
    }

    fn client(&self, id: ClientId) -> StoreResult<Option<Client>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, phone, address, credit_score FROM clients WHERE id = ?1",
                params![id.0],
                ClientRow::from_row,
            )
            .optional()?;
        row.map(ClientRow::into_client).transpose()
    }

    fn clients(&self) -> StoreResult<Vec<Client>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, phone, address, credit_score FROM clients ORDER BY id")?;
        let rows = stmt
            .query_map([], ClientRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(ClientRow::into_client).collect()
    }

    fn update_client(&mut self, client: &Client) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "UPDATE clients SET name = ?1, phone = ?2, address = ?3, credit_score = ?4 WHERE id = ?5",
            params![
                client.name,
                client.phone,
                client.address,
                client.credit_score.as_decimal().to_string(),
                client.id.0
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_client(&mut self, id: ClientId) -> StoreResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM clients WHERE id = ?1", params![id.0])?;
        Ok(changed > 0)
    }

    fn insert_loan(&mut self, loan: NewLoan) -> StoreResult<Loan> {
        self.conn.execute(
            "INSERT INTO loans (client_id, amount, interest_rate, duration_months, status, issue_date, paid_amount)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                loan.client_id.0,
                loan.terms.principal.to_string(),
                rate_column(loan.terms.annual_rate),
                loan.terms.duration_months,
                loan.status.as_str(),
                format_date(loan.issue_date),
                loan.paid_amount.to_string()
            ],
        )?;
        Ok(Loan::from_new(LoanId(self.conn.last_insert_rowid()), loan))
    }

    fn loan(&self, id: LoanId) -> StoreResult<Option<Loan>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {LOAN_COLUMNS} FROM loans WHERE loan_id = ?1"),
                params![id.0],
                LoanRow::from_row,
            )
            .optional()?;
        row.map(LoanRow::into_loan).transpose()
    }

    fn loans(&self) -> StoreResult<Vec<Loan>> {
        self.query_loans(&format!("SELECT {LOAN_COLUMNS} FROM loans ORDER BY loan_id"), [])
    }

    fn loans_for_client(&self, client_id: ClientId) -> StoreResult<Vec<Loan>> {
        self.query_loans(
            &format!("SELECT {LOAN_COLUMNS} FROM loans WHERE client_id = ?1 ORDER BY loan_id"),
            params![client_id.0],
        )
    }

    fn update_loan(&mut self, loan: &Loan) -> StoreResult<bool> {
        // client_id is immutable and not part of the update
        let changed = self.conn.execute(
            "UPDATE loans SET amount = ?1, interest_rate = ?2, duration_months = ?3, status = ?4, paid_amount = ?5
             WHERE loan_id = ?6",
            params![
                loan.terms.principal.to_string(),
                rate_column(loan.terms.annual_rate),
                loan.terms.duration_months,
                loan.status.as_str(),
                loan.paid_amount.to_string(),
                loan.id.0
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_loan(&mut self, id: LoanId) -> StoreResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM loans WHERE loan_id = ?1", params![id.0])?;
        Ok(changed > 0)
    }

    fn insert_payment(&mut self, payment: NewPayment) -> StoreResult<Payment> {
        self.conn.execute(
            "INSERT INTO payments (loan_id, amount, payment_date) VALUES (?1, ?2, ?3)",
            params![
                payment.loan_id.0,
                payment.amount.to_string(),
                format_date(payment.payment_date)
            ],
        )?;
        Ok(Payment::from_new(PaymentId(self.conn.last_insert_rowid()), payment))
    }

    fn payment(&self, id: PaymentId) -> StoreResult<Option<Payment>> {
        let row = self
            .conn
            .query_row(
                "SELECT payment_id, loan_id, amount, payment_date FROM payments WHERE payment_id = ?1",
                params![id.0],
                PaymentRow::from_row,
            )
            .optional()?;
        row.map(PaymentRow::into_payment).transpose()
    }

    fn payments(&self) -> StoreResult<Vec<Payment>> {
        self.query_payments(
            "SELECT payment_id, loan_id, amount, payment_date FROM payments ORDER BY payment_id",
            [],
        )
    }

    fn payments_for_loan(&self, loan_id: LoanId) -> StoreResult<Vec<Payment>> {
        self.query_payments(
            "SELECT payment_id, loan_id, amount, payment_date FROM payments WHERE loan_id = ?1 ORDER BY payment_id",
            params![loan_id.0],
        )
    }

    fn begin(&mut self) -> StoreResult<()> {
        if !self.conn.is_autocommit() {
            return Err(StoreError::TransactionActive);
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        if self.conn.is_autocommit() {
            return Err(StoreError::NoTransaction);
        }
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        if self.conn.is_autocommit() {
            return Err(StoreError::NoTransaction);
        }
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}
