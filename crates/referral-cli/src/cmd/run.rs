use crate::output::{print_json, print_table};
use crate::SheetArgs;
use anyhow::Context;
use referral_core::{
    cache::ProcessedCache,
    config::Config,
    pipeline::{Pipeline, PipelineInputs, PipelineSettings, RunReport, TracingObserver},
    records::TableKind,
    render::LetterRenderer,
    tables,
};
use serde::de::DeserializeOwned;
use std::path::Path;

pub struct RunOptions {
    pub code: Option<String>,
    pub dry_run: bool,
    pub open: bool,
}

pub fn run(root: &Path, sheets: &SheetArgs, opts: RunOptions, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    config.ensure_valid().context("config is invalid")?;

    let mut settings = PipelineSettings::from(&config);
    settings.dry_run = opts.dry_run;
    if let Some(code) = opts.code {
        anyhow::ensure!(!code.trim().is_empty(), "--code must not be empty");
        if code != config.procedure_code {
            tracing::warn!(
                configured = %config.procedure_code,
                requested = %code,
                "the processed-client cache is shared across procedure codes; clients notified under another code will be skipped"
            );
        }
        settings.procedure_code = code;
    }

    let inputs = PipelineInputs {
        clients: load_sheet(sheets.dem.as_deref(), TableKind::Demographics)?,
        referrals: load_sheet(sheets.referral.as_deref(), TableKind::Referral)?,
        appointments: load_sheet(sheets.app.as_deref(), TableKind::Appointments)?,
    };

    let cache = ProcessedCache::new(config.cache_path(root));
    let output_dir = config.output_path(root);
    let mut renderer = LetterRenderer::new(
        &output_dir,
        &config.logo_path(root),
        config.organization.clone(),
    );
    let run_id = uuid::Uuid::new_v4().to_string();
    let mut observer = TracingObserver::new(run_id.clone());

    let now = chrono::Local::now().naive_local();
    let report = Pipeline::new(settings, &cache, &mut renderer, &mut observer)
        .with_run_id(run_id)
        .run(inputs, now)
        .context("processing failed")?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report, &output_dir);
    }

    if opts.open && !report.dry_run && !report.rendered_groups.is_empty() {
        if let Err(e) = open::that(&output_dir) {
            tracing::warn!(path = %output_dir.display(), error = %e, "could not open output folder");
        }
    }

    Ok(())
}

fn load_sheet<T: DeserializeOwned>(path: Option<&Path>, kind: TableKind) -> anyhow::Result<Option<Vec<T>>> {
    let Some(path) = path else {
        tracing::error!(table = %kind, "no {} sheet supplied", kind.label().to_lowercase());
        return Ok(None);
    };
    let records = tables::load_records(path, kind)
        .with_context(|| format!("failed to load {} sheet {}", kind.label().to_lowercase(), path.display()))?;
    Ok(Some(records))
}

fn print_report(report: &RunReport, output_dir: &Path) {
    if report.cache_degraded {
        println!("WARNING: the processed-client list could not be read; every match was treated as new.");
    }
    for id in &report.skipped_appointments {
        println!("skipped appointment {id}: client not found in demographics");
    }

    println!(
        "Matched {} appointment(s) with code '{}'; {} new.",
        report.matched_count, report.procedure_code, report.new_count
    );

    if report.new_clients.is_empty() {
        println!("No new clients found.");
        return;
    }

    let rows: Vec<Vec<String>> = report
        .new_clients
        .iter()
        .map(|c| {
            vec![
                c.client_id.clone(),
                c.display_name.clone(),
                c.appointment_time.clone(),
                c.referral_source.clone(),
            ]
        })
        .collect();
    println!();
    print_table(&["ID", "CLIENT", "APPOINTMENT", "REFERRAL SOURCE"], &rows);
    println!();

    if report.excluded_count > 0 {
        println!("{} client(s) have no notifiable referral source.", report.excluded_count);
    }

    if report.dry_run {
        for group in &report.rendered_groups {
            println!("would notify {} ({} client(s))", group.recipient, group.clients);
        }
        println!("Dry run: no letters written, processed-client list unchanged.");
        return;
    }

    for group in &report.rendered_groups {
        println!("created: {} ({} client(s))", group.artifact, group.clients);
    }
    println!(
        "Done! Found {} new client(s) with '{}' appointments. Check {} for new referral letters.",
        report.new_count,
        report.procedure_code,
        output_dir.display()
    );
}
