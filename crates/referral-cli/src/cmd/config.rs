use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use referral_core::config::{Config, WarnLevel};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the effective configuration
    Show,

    /// Validate the config for common mistakes
    Validate,

    /// Change where notification letters are written
    SetOutputDir { dir: PathBuf },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
        ConfigSubcommand::SetOutputDir { dir } => set_output_dir(root, dir, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    if json {
        return print_json(&config);
    }
    println!("root:             {}", root.display());
    println!("procedure_code:   {}", config.procedure_code);
    println!("cache_file:       {}", config.cache_path(root).display());
    println!("output_dir:       {}", config.output_path(root).display());
    println!("logo_file:        {}", config.logo_path(root).display());
    println!("organization:     {}", config.organization);
    println!(
        "excluded_sources: {}",
        config
            .excluded_sources
            .iter()
            .map(|s| format!("{s:?}"))
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("unknown_client:   {:?}", config.unknown_client);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// set-output-dir
// ---------------------------------------------------------------------------

fn set_output_dir(root: &Path, dir: PathBuf, json: bool) -> anyhow::Result<()> {
    anyhow::ensure!(
        !dir.as_os_str().is_empty(),
        "output directory must not be empty"
    );
    let mut config = Config::load(root).context("failed to load config")?;
    config.output_dir = dir;
    config.save(root).context("failed to write config.yaml")?;

    let resolved = config.output_path(root);
    if json {
        print_json(&serde_json::json!({
            "output_dir": resolved.display().to_string(),
        }))?;
    } else {
        println!("Current output directory: {}", resolved.display());
    }
    Ok(())
}
