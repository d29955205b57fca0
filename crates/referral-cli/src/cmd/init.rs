use anyhow::Context;
use referral_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing psychref in: {}", root.display());

    let dir = paths::psychref_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let data = serde_yaml::to_string(&Config::default()).context("failed to serialize config")?;
    let created = io::write_if_missing(&paths::config_path(root), data.as_bytes())
        .context("failed to write config.yaml")?;
    if created {
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
    }

    let cfg = Config::load(root).context("failed to load config")?;
    let output = cfg.output_path(root);
    io::ensure_dir(&output).with_context(|| format!("failed to create {}", output.display()))?;
    println!("  letters: {}", output.display());
    println!("  cache:   {}", cfg.cache_path(root).display());

    Ok(())
}
