//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! ## Architecture
//!
//! Every resource lives in an in-memory [`Store`] that is authoritative for
//! reads. When a database pool is configured, each mutation is written
//! through to Postgres and the stores are hydrated from it on startup.
//!
//! Disbursement runs read a consistent snapshot of salaries, loans,
//! adjustments and accounts. [`AppState::payroll_lock`] serializes runs
//! against each other and against edits of anything a receipt can
//! reference. It is held until the database write completes, so a failed
//! write can be rolled back before anyone else observes it.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use nomina_core::{AccountKind, Curp, Money, Rfc, ValidityWindow};
use nomina_payroll::{
    AccountFact, AdjustmentFact, EmployeeFact, LineKind, LoanFact, PayrollSnapshot, SalaryFact,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::Mutex;
use zeroize::Zeroizing;

use crate::auth::{JwtSecret, MAX_TOKEN_TTL_MINUTES};
use crate::error::AppError;

// -- Generic In-Memory Store --------------------------------------------------

#[derive(Debug)]
struct StoreInner<T> {
    rows: BTreeMap<i64, T>,
    next_id: i64,
}

/// Thread-safe, cloneable in-memory table keyed by sequential `i64` ids.
///
/// All operations are synchronous (the RwLock is `parking_lot`, not `tokio::sync`)
/// because the lock is never held across `.await` points. Iteration order is
/// id order. Closures passed to the `try_*` methods run under the write lock
/// and must not touch other stores.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<StoreInner<T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    /// Create an empty store whose first id is 1.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(StoreInner {
                rows: BTreeMap::new(),
                next_id: 1,
            })),
        }
    }

    /// Allocate the next id and insert the record built for it.
    ///
    /// The builder sees the current rows, so uniqueness checks and the
    /// insert happen under one write lock. The id is consumed only when
    /// the builder succeeds.
    pub fn try_insert_with<E>(
        &self,
        build: impl FnOnce(&BTreeMap<i64, T>, i64) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut guard = self.data.write();
        let id = guard.next_id;
        let record = build(&guard.rows, id)?;
        guard.rows.insert(id, record.clone());
        guard.next_id = id + 1;
        Ok(record)
    }

    /// Allocate the next id and insert the record built for it.
    pub fn insert_with(&self, build: impl FnOnce(i64) -> T) -> T {
        let result: Result<T, std::convert::Infallible> =
            self.try_insert_with(|_, id| Ok(build(id)));
        match result {
            Ok(record) => record,
            Err(never) => match never {},
        }
    }

    /// Put back a record loaded from storage, keeping ids ahead of it.
    pub fn restore(&self, id: i64, value: T) {
        let mut guard = self.data.write();
        guard.rows.insert(id, value);
        if guard.next_id <= id {
            guard.next_id = id + 1;
        }
    }

    /// Retrieve a record by id.
    pub fn get(&self, id: i64) -> Option<T> {
        self.data.read().rows.get(&id).cloned()
    }

    /// All records in id order.
    pub fn list(&self) -> Vec<T> {
        self.data.read().rows.values().cloned().collect()
    }

    /// Records matching `pred`, in id order.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data
            .read()
            .rows
            .values()
            .filter(|v| pred(v))
            .cloned()
            .collect()
    }

    /// Whether any record matches `pred`.
    pub fn any(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.data.read().rows.values().any(pred)
    }

    /// Atomically read-validate-update a record.
    ///
    /// The closure sees every row (for uniqueness checks) and the id of the
    /// row to change. Returns `None` if the record doesn't exist.
    pub fn try_update<R, E>(
        &self,
        id: i64,
        f: impl FnOnce(&BTreeMap<i64, T>, &mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        let mut guard = self.data.write();
        let mut current = guard.rows.get(&id)?.clone();
        let result = f(&guard.rows, &mut current);
        if result.is_ok() {
            guard.rows.insert(id, current);
        }
        Some(result)
    }

    /// Apply `f` to every record, returning those it changed.
    pub fn update_where(&self, mut f: impl FnMut(&mut T) -> bool) -> Vec<T> {
        let mut guard = self.data.write();
        guard
            .rows
            .values_mut()
            .filter_map(|v| f(v).then(|| v.clone()))
            .collect()
    }

    /// Remove a record if `check` accepts it. Returns `None` if it doesn't exist.
    pub fn try_remove<E>(
        &self,
        id: i64,
        check: impl FnOnce(&T) -> Result<(), E>,
    ) -> Option<Result<T, E>> {
        let mut guard = self.data.write();
        let current = guard.rows.get(&id)?;
        if let Err(e) = check(current) {
            return Some(Err(e));
        }
        guard.rows.remove(&id).map(Ok)
    }

    /// Remove a record by id.
    pub fn remove(&self, id: i64) -> Option<T> {
        self.data.write().rows.remove(&id)
    }

    /// Remove every record matching `pred`, returning them.
    pub fn remove_where(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        let mut guard = self.data.write();
        let ids: Vec<i64> = guard
            .rows
            .iter()
            .filter(|(_, v)| pred(v))
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter()
            .filter_map(|id| guard.rows.remove(&id))
            .collect()
    }

    /// Check if a record exists.
    pub fn contains(&self, id: i64) -> bool {
        self.data.read().rows.contains_key(&id)
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().rows.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Records ------------------------------------------------------------------

/// A user allowed to call the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub name: String,
    /// Argon2 PHC string. Never serialized into responses.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub scopes: Vec<String>,
    pub active: bool,
    pub created_on: DateTime<Utc>,
}

/// A neighborhood (colonia) employees live in.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NeighborhoodRecord {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

/// A bank accounts are held at.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct BankRecord {
    pub id: i64,
    pub name: String,
    pub active: bool,
}

/// An employee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub id: i64,
    pub name: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub rfc: Rfc,
    pub curp: Curp,
    pub street: String,
    pub exterior_number: String,
    pub interior_number: Option<String>,
    pub neighborhood_id: i64,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub active: bool,
    pub created_on: DateTime<Utc>,
}

impl EmployeeRecord {
    /// "name paternal maternal".
    pub fn full_name(&self) -> String {
        [&self.name, &self.paternal_surname, &self.maternal_surname]
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A bank account owned by an employee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: i64,
    pub number: String,
    pub kind: AccountKind,
    pub active: bool,
    pub bank_id: i64,
    pub employee_id: i64,
    pub created_on: DateTime<Utc>,
    pub created_by: i64,
}

/// A salary, paid per period from `valid_from` until a later salary applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalaryRecord {
    pub id: i64,
    pub employee_id: i64,
    pub valid_from: NaiveDate,
    pub amount: Money,
    pub created_on: DateTime<Utc>,
    pub created_by: i64,
}

/// A loan deducted in per-period installments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRecord {
    pub id: i64,
    pub employee_id: i64,
    pub start_date: NaiveDate,
    pub amount: Money,
    pub installment: Money,
    pub comment: Option<String>,
    pub created_on: DateTime<Utc>,
    pub created_by: i64,
}

/// A signed adjustment applied to every period its window overlaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentRecord {
    pub id: i64,
    pub employee_id: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub reason: String,
    pub amount: Money,
    pub created_on: DateTime<Utc>,
    pub created_by: i64,
}

/// One payment into an account, as recorded at disbursement time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailRecord {
    pub account_id: i64,
    pub employee_id: i64,
    pub employee_name: String,
    pub bank_name: String,
    pub account_number: String,
    pub account_kind: AccountKind,
    pub amount: Money,
}

/// A stored payroll run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisbursementRecord {
    pub id: i64,
    pub period_number: u32,
    pub period_date: NaiveDate,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total: Money,
    pub digest: String,
    pub created_on: DateTime<Utc>,
    pub created_by: i64,
    pub details: Vec<DetailRecord>,
}

/// One line of a stored receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptLineRecord {
    pub kind: LineKind,
    pub source_id: i64,
    pub text: String,
    pub amount: Money,
    /// Set on payment lines only.
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_kind: Option<AccountKind>,
}

/// An employee's receipt for one disbursement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptRecord {
    pub id: i64,
    pub disbursement_id: i64,
    pub employee_id: i64,
    pub employee_name: String,
    pub amount: Money,
    pub period_number: u32,
    pub period_date: NaiveDate,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub created_on: DateTime<Utc>,
    pub lines: Vec<ReceiptLineRecord>,
}

// -- Configuration ------------------------------------------------------------

/// Application configuration, read from the environment.
///
/// Custom `Debug` redacts secrets to prevent credential leakage in logs.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// HS256 secret for access tokens. `None` means an ephemeral random secret.
    pub jwt_secret: Option<Zeroizing<String>>,
    /// Access token lifetime in minutes.
    pub token_ttl_minutes: i64,
    /// Bootstrap admin username.
    pub admin_username: Option<String>,
    /// Bootstrap admin password.
    pub admin_password: Option<Zeroizing<String>>,
    /// Emit JSON log lines.
    pub log_json: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .field("admin_username", &self.admin_username)
            .field(
                "admin_password",
                &self.admin_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("log_json", &self.log_json)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            jwt_secret: None,
            token_ttl_minutes: 20,
            admin_username: None,
            admin_password: None,
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Build configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            port: non_empty("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            jwt_secret: non_empty("NOMINA_JWT_SECRET").map(Zeroizing::new),
            token_ttl_minutes: non_empty("NOMINA_TOKEN_TTL_MINUTES")
                .and_then(|v| v.trim().parse().ok())
                .filter(|m: &i64| (1..=MAX_TOKEN_TTL_MINUTES).contains(m))
                .unwrap_or(defaults.token_ttl_minutes),
            admin_username: non_empty("NOMINA_ADMIN_USERNAME").map(|u| u.trim().to_string()),
            admin_password: non_empty("NOMINA_ADMIN_PASSWORD").map(Zeroizing::new),
            log_json: non_empty("NOMINA_LOG_JSON")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.log_json),
        }
    }
}

// -- Application State --------------------------------------------------------

/// Shared application state accessible to all route handlers.
///
/// Clone-friendly via `Arc` internals in each `Store`.
#[derive(Debug, Clone)]
pub struct AppState {
    pub users: Store<UserRecord>,
    pub neighborhoods: Store<NeighborhoodRecord>,
    pub banks: Store<BankRecord>,
    pub employees: Store<EmployeeRecord>,
    pub accounts: Store<AccountRecord>,
    pub salaries: Store<SalaryRecord>,
    pub loans: Store<LoanRecord>,
    pub adjustments: Store<AdjustmentRecord>,
    pub disbursements: Store<DisbursementRecord>,
    pub receipts: Store<ReceiptRecord>,

    /// Held while computing or deleting a disbursement and while editing
    /// anything a receipt can reference, through the database write.
    pub payroll_lock: Arc<Mutex<()>>,

    /// PostgreSQL pool. `None` runs in in-memory-only mode.
    pub db_pool: Option<PgPool>,

    /// Token signing secret.
    pub jwt: Arc<JwtSecret>,

    pub config: AppConfig,
}

impl AppState {
    /// In-memory state with default configuration and a random token secret.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None)
    }

    /// State for the given configuration and optional database pool.
    pub fn with_config(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        let jwt = match &config.jwt_secret {
            Some(secret) => JwtSecret::new(secret.as_bytes().to_vec()),
            None => {
                tracing::warn!(
                    "NOMINA_JWT_SECRET not set, generating ephemeral secret. \
                     Issued tokens will not survive a restart."
                );
                JwtSecret::generate()
            }
        };
        Self {
            users: Store::new(),
            neighborhoods: Store::new(),
            banks: Store::new(),
            employees: Store::new(),
            accounts: Store::new(),
            salaries: Store::new(),
            loans: Store::new(),
            adjustments: Store::new(),
            disbursements: Store::new(),
            receipts: Store::new(),
            payroll_lock: Arc::new(Mutex::new(())),
            db_pool,
            jwt: Arc::new(jwt),
            config,
        }
    }

    /// Hydrate in-memory stores from the database.
    ///
    /// Called once on startup when a database pool is available.
    pub async fn hydrate_from_db(&self) -> Result<(), sqlx::Error> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        for r in crate::db::users::load_all(pool).await? {
            self.users.restore(r.id, r);
        }
        for r in crate::db::catalog::load_all_neighborhoods(pool).await? {
            self.neighborhoods.restore(r.id, r);
        }
        for r in crate::db::catalog::load_all_banks(pool).await? {
            self.banks.restore(r.id, r);
        }
        for r in crate::db::staff::load_all_employees(pool).await? {
            self.employees.restore(r.id, r);
        }
        for r in crate::db::staff::load_all_accounts(pool).await? {
            self.accounts.restore(r.id, r);
        }
        for r in crate::db::compensation::load_all_salaries(pool).await? {
            self.salaries.restore(r.id, r);
        }
        for r in crate::db::compensation::load_all_loans(pool).await? {
            self.loans.restore(r.id, r);
        }
        for r in crate::db::compensation::load_all_adjustments(pool).await? {
            self.adjustments.restore(r.id, r);
        }
        for r in crate::db::disbursements::load_all_disbursements(pool).await? {
            self.disbursements.restore(r.id, r);
        }
        for r in crate::db::disbursements::load_all_receipts(pool).await? {
            self.receipts.restore(r.id, r);
        }

        tracing::info!(
            users = self.users.len(),
            employees = self.employees.len(),
            accounts = self.accounts.len(),
            salaries = self.salaries.len(),
            loans = self.loans.len(),
            adjustments = self.adjustments.len(),
            disbursements = self.disbursements.len(),
            receipts = self.receipts.len(),
            "Hydrated in-memory stores from database"
        );
        Ok(())
    }

    // -- Receipt references ---------------------------------------------------

    /// Whether any receipt has a line of `kind` pointing at `source_id`.
    pub fn is_applied(&self, kind: LineKind, source_id: i64) -> bool {
        self.receipts.any(|r| {
            r.lines
                .iter()
                .any(|l| l.kind == kind && l.source_id == source_id)
        })
    }

    /// Start of the latest period in which the line source was applied.
    pub fn last_applied_period_start(&self, kind: LineKind, source_id: i64) -> Option<NaiveDate> {
        self.receipts
            .filter(|r| {
                r.lines
                    .iter()
                    .any(|l| l.kind == kind && l.source_id == source_id)
            })
            .into_iter()
            .map(|r| r.period_start)
            .max()
    }

    /// Installments already deducted for every loan.
    pub fn loan_repayments(&self) -> Result<BTreeMap<i64, Money>, AppError> {
        let mut repaid: BTreeMap<i64, Money> = BTreeMap::new();
        for receipt in self.receipts.list() {
            for line in receipt.lines.iter().filter(|l| l.kind == LineKind::Loan) {
                let entry = repaid.entry(line.source_id).or_default();
                *entry = line
                    .amount
                    .checked_neg()
                    .and_then(|paid| entry.checked_add(paid))
                    .ok_or_else(|| AppError::Internal("loan repayment sum overflow".into()))?;
            }
        }
        Ok(repaid)
    }

    /// Installments already deducted for one loan.
    pub fn loan_repaid(&self, loan_id: i64) -> Result<Money, AppError> {
        Ok(self
            .loan_repayments()?
            .get(&loan_id)
            .copied()
            .unwrap_or_default())
    }

    /// The most recent disbursement.
    pub fn latest_disbursement(&self) -> Option<DisbursementRecord> {
        self.disbursements
            .list()
            .into_iter()
            .max_by_key(|d| (d.period_end, d.id))
    }

    /// End of the latest disbursed period. New loans and adjustments must
    /// start after it.
    pub fn disbursed_through(&self) -> Option<NaiveDate> {
        self.latest_disbursement().map(|d| d.period_end)
    }

    // -- Payroll snapshot -----------------------------------------------------

    /// Collect the facts the disbursement engine needs.
    pub fn payroll_snapshot(&self) -> Result<PayrollSnapshot, AppError> {
        let repaid = self.loan_repayments()?;
        let banks: BTreeMap<i64, BankRecord> =
            self.banks.list().into_iter().map(|b| (b.id, b)).collect();

        let employees = self
            .employees
            .list()
            .into_iter()
            .map(|e| EmployeeFact {
                id: e.id,
                full_name: e.full_name(),
                active: e.active,
            })
            .collect();

        let salaries = self
            .salaries
            .list()
            .into_iter()
            .map(|s| SalaryFact {
                id: s.id,
                employee_id: s.employee_id,
                valid_from: s.valid_from,
                amount: s.amount,
            })
            .collect();

        let adjustments = self
            .adjustments
            .list()
            .into_iter()
            .map(|a| {
                Ok(AdjustmentFact {
                    id: a.id,
                    employee_id: a.employee_id,
                    window: ValidityWindow::new(a.start_date, a.end_date)?,
                    amount: a.amount,
                    reason: a.reason,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        let loans = self
            .loans
            .list()
            .into_iter()
            .map(|l| LoanFact {
                id: l.id,
                employee_id: l.employee_id,
                start_date: l.start_date,
                amount: l.amount,
                installment: l.installment,
                repaid: repaid.get(&l.id).copied().unwrap_or_default(),
                comment: l.comment,
            })
            .collect();

        let accounts = self
            .accounts
            .list()
            .into_iter()
            .map(|a| {
                let bank = banks.get(&a.bank_id);
                AccountFact {
                    id: a.id,
                    employee_id: a.employee_id,
                    number: a.number,
                    kind: a.kind,
                    active: a.active,
                    bank_name: bank.map(|b| b.name.clone()).unwrap_or_default(),
                    bank_active: bank.map_or(false, |b| b.active),
                }
            })
            .collect();

        Ok(PayrollSnapshot {
            employees,
            salaries,
            adjustments,
            loans,
            accounts,
        })
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
