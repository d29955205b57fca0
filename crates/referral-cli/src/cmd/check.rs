use crate::output::{print_json, print_table};
use crate::SheetArgs;
use referral_core::{records::TableKind, tables};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct SheetStatus {
    table: TableKind,
    path: String,
    rows: usize,
    missing_columns: Vec<String>,
    error: Option<String>,
}

impl SheetStatus {
    fn ok(&self) -> bool {
        self.error.is_none() && self.missing_columns.is_empty()
    }
}

pub fn run(sheets: &SheetArgs, json: bool) -> anyhow::Result<()> {
    let supplied = [
        (TableKind::Demographics, sheets.dem.as_deref()),
        (TableKind::Referral, sheets.referral.as_deref()),
        (TableKind::Appointments, sheets.app.as_deref()),
    ];

    let statuses: Vec<SheetStatus> = supplied
        .iter()
        .filter_map(|(kind, path)| path.map(|p| check_sheet(*kind, p)))
        .collect();

    if statuses.is_empty() {
        anyhow::bail!("no sheets supplied: pass --dem, --ref and/or --app");
    }

    if json {
        print_json(&statuses)?;
    } else {
        let rows: Vec<Vec<String>> = statuses
            .iter()
            .map(|s| {
                let status = match (&s.error, s.missing_columns.is_empty()) {
                    (Some(e), _) => format!("error: {e}"),
                    (None, true) => "ok".to_string(),
                    (None, false) => format!("missing: {}", s.missing_columns.join(", ")),
                };
                vec![
                    s.table.label().to_string(),
                    s.path.clone(),
                    s.rows.to_string(),
                    status,
                ]
            })
            .collect();
        print_table(&["SHEET", "PATH", "ROWS", "STATUS"], &rows);
    }

    let failed: Vec<&str> = statuses
        .iter()
        .filter(|s| !s.ok())
        .map(|s| s.table.label())
        .collect();
    if !failed.is_empty() {
        anyhow::bail!("invalid sheets: {}", failed.join(", "));
    }
    if statuses.len() == TableKind::all().len() {
        tracing::info!("all sheets loaded; ready to process");
    }
    Ok(())
}

fn check_sheet(kind: TableKind, path: &Path) -> SheetStatus {
    let mut status = SheetStatus {
        table: kind,
        path: path.display().to_string(),
        rows: 0,
        missing_columns: Vec::new(),
        error: None,
    };
    match tables::load_table(path) {
        Ok(table) => {
            status.rows = table.len();
            status.missing_columns = table.missing_columns(kind);
            if !status.missing_columns.is_empty() {
                tracing::error!(
                    "{} file is missing expected columns: {}",
                    kind.label(),
                    status.missing_columns.join(", ")
                );
            }
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "could not load sheet");
            status.error = Some(e.to_string());
        }
    }
    status
}
