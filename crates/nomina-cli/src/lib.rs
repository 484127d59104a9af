//! # nomina-cli — Operator CLI for the Payroll Backend
//!
//! ## Subcommands
//!
//! - `nomina hash-password` — argon2 PHC string for a user row.
//! - `nomina token` — mint a bearer token with the API's claim layout.
//! - `nomina preview` — compute a disbursement plan from a JSON snapshot.
//!
//! ```bash
//! nomina hash-password 's3cret'
//! nomina token --secret "$NOMINA_JWT_SECRET" --username admin --user-id 1 --scope Admin
//! nomina preview --snapshot snapshot.json --period 2 --date 2024-01-20
//! ```

pub mod credentials;
pub mod preview;
