//! # Preview Subcommand
//!
//! Computes a disbursement plan offline from a JSON [`PayrollSnapshot`],
//! the same computation `POST /v1/disbursements` runs against live data.
//! Loan `repaid` sums must be filled in by whoever exports the snapshot.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, ValueEnum};

use nomina_core::PayPeriod;
use nomina_payroll::{compute, DisbursementPlan, LineKind, PayrollSnapshot};

/// Output format for the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    Text,
    /// The full plan as pretty JSON.
    Json,
}

/// Arguments for `nomina preview`.
#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// JSON snapshot of employees, salaries, adjustments, loans and accounts.
    #[arg(long, value_name = "FILE")]
    pub snapshot: PathBuf,
    /// Quincena number (1..=24).
    #[arg(long)]
    pub period: u32,
    /// Any date inside the period.
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: NaiveDate,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Execute `nomina preview`.
pub fn run_preview(args: &PreviewArgs) -> Result<u8> {
    let plan = plan_from_file(&args.snapshot, args.period, args.date)?;
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Text => print!("{}", render(&plan)),
    }
    Ok(0)
}

/// Load a snapshot and compute the plan for the given period.
pub fn plan_from_file(path: &Path, period: u32, date: NaiveDate) -> Result<DisbursementPlan> {
    if !path.exists() {
        bail!("snapshot file not found: {}", path.display());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot: {}", path.display()))?;
    let snapshot: PayrollSnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("invalid snapshot: {}", path.display()))?;
    let period = PayPeriod::new(period, date)?;

    tracing::info!(
        employees = snapshot.employees.len(),
        accounts = snapshot.accounts.len(),
        period = %period,
        "computing plan"
    );
    Ok(compute(&snapshot, &period)?)
}

/// Plain-text summary: one block per receipt, then omissions and totals.
pub fn render(plan: &DisbursementPlan) -> String {
    let mut out = format!("Period {}\n", plan.period);
    for receipt in &plan.receipts {
        out.push_str(&format!(
            "\n#{} {}  net {}\n",
            receipt.employee_id, receipt.employee_name, receipt.net
        ));
        for line in &receipt.lines {
            let tag = match line.kind {
                LineKind::Payment => "  ->",
                _ => "    ",
            };
            out.push_str(&format!("{tag} {:<40} {:>12}\n", line.text, line.amount.to_string()));
        }
    }
    if !plan.omissions.is_empty() {
        out.push_str("\nOmitted:\n");
        for omission in &plan.omissions {
            let reason = serde_json::to_value(&omission.reason)
                .ok()
                .and_then(|v| v.get("reason").and_then(|r| r.as_str()).map(str::to_string))
                .unwrap_or_default();
            out.push_str(&format!(
                "  #{} {} ({reason})\n",
                omission.employee_id, omission.employee_name
            ));
        }
    }
    out.push_str(&format!(
        "\nReceipts: {}  Total: {}\nDigest: {}\n",
        plan.receipts.len(),
        plan.total,
        plan.digest
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "employees": [
            {"id": 1, "full_name": "Ana Gómez", "active": true},
            {"id": 2, "full_name": "Luis Pérez", "active": true},
            {"id": 3, "full_name": "Eva Ruiz", "active": false}
        ],
        "salaries": [
            {"id": 10, "employee_id": 1, "valid_from": "2024-01-01", "amount": "8000.00"}
        ],
        "adjustments": [
            {"id": 20, "employee_id": 1, "window": {"start": "2024-01-01"}, "amount": "500.00", "reason": "Bono"}
        ],
        "loans": [
            {"id": 30, "employee_id": 1, "start_date": "2024-01-01", "amount": "1000.00",
             "installment": "400.00", "repaid": "800.00"}
        ],
        "accounts": [
            {"id": 40, "employee_id": 1, "number": "0011", "kind": "payroll", "active": true,
             "bank_name": "Banorte", "bank_active": true}
        ]
    }"#;

    fn write_snapshot(contents: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), contents).unwrap();
        file
    }

    fn jan_20() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 20).unwrap()
    }

    #[test]
    fn computes_plan_from_snapshot() {
        let file = write_snapshot(SNAPSHOT);
        let plan = plan_from_file(file.path(), 2, jan_20()).unwrap();
        assert_eq!(plan.receipts.len(), 1);
        // 8000 + 500 bonus - 200 remaining on the loan.
        assert_eq!(plan.total.to_string(), "8300.00");
        assert_eq!(plan.omissions.len(), 1);
        assert_eq!(plan.omissions[0].employee_id, 2);

        let text = render(&plan);
        assert!(text.contains("Ana Gómez"));
        assert!(text.contains("Total: 8300.00"));
        assert!(text.contains("no_salary"));
        assert!(!text.contains("Eva Ruiz"));
    }

    #[test]
    fn mismatched_period_is_rejected() {
        let file = write_snapshot(SNAPSHOT);
        assert!(plan_from_file(file.path(), 1, jan_20()).is_err());
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = plan_from_file(&dir.path().join("none.json"), 2, jan_20()).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn malformed_snapshot_is_reported() {
        let file = write_snapshot("{\"employees\": 3}");
        let err = plan_from_file(file.path(), 2, jan_20()).unwrap_err();
        assert!(err.to_string().contains("invalid snapshot"));
    }
}
