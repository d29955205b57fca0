use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use referral_core::{cache::ProcessedCache, config::Config};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum CacheSubcommand {
    /// List client ids that have already been notified
    Show,

    /// Mark client ids as already notified
    Add {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Forget client ids so the next run notifies them again
    Remove {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Forget every client id
    Clear {
        /// Required; clearing means every future match is notified again
        #[arg(long)]
        yes: bool,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: CacheSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let cache = ProcessedCache::new(config.cache_path(root));

    match subcmd {
        CacheSubcommand::Show => show(&cache, json),
        CacheSubcommand::Add { ids } => {
            let added = cache.add(ids).context("failed to update cache")?;
            report_change(&cache, "added", added, json)
        }
        CacheSubcommand::Remove { ids } => {
            let removed = cache.remove(ids.as_slice()).context("failed to update cache")?;
            report_change(&cache, "removed", removed, json)
        }
        CacheSubcommand::Clear { yes } => {
            anyhow::ensure!(yes, "refusing to clear the processed-client list without --yes");
            cache.clear().context("failed to clear cache")?;
            report_change(&cache, "cleared", 0, json)
        }
    }
}

fn show(cache: &ProcessedCache, json: bool) -> anyhow::Result<()> {
    let ids = cache
        .try_load()
        .with_context(|| format!("failed to read {}", cache.path().display()))?;
    if json {
        print_json(&serde_json::json!({
            "path": cache.path().display().to_string(),
            "count": ids.len(),
            "ids": ids,
        }))?;
    } else if ids.is_empty() {
        println!("No clients recorded in {}.", cache.path().display());
    } else {
        println!("{} client(s) in {}:", ids.len(), cache.path().display());
        for id in &ids {
            println!("  {id}");
        }
    }
    Ok(())
}

fn report_change(cache: &ProcessedCache, action: &str, count: usize, json: bool) -> anyhow::Result<()> {
    let total = cache.try_load().map(|ids| ids.len()).unwrap_or(0);
    if json {
        print_json(&serde_json::json!({
            "action": action,
            "changed": count,
            "total": total,
        }))?;
    } else if action == "cleared" {
        println!("Cleared {}.", cache.path().display());
    } else {
        println!("{action} {count} client(s); {total} recorded.");
    }
    Ok(())
}
