use crate::error::{ReferralError, Result};
use crate::grouper;
use crate::matcher::UnknownClientPolicy;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Procedure code this deployment notifies referrers about.
pub const DEFAULT_PROCEDURE_CODE: &str = "96136";

pub const DEFAULT_ORGANIZATION: &str = "Driftwood Evaluation Center";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_procedure_code")]
    pub procedure_code: String,
    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_logo_file")]
    pub logo_file: PathBuf,
    #[serde(default = "default_organization")]
    pub organization: String,
    #[serde(default = "default_excluded_sources")]
    pub excluded_sources: Vec<String>,
    #[serde(default)]
    pub unknown_client: UnknownClientPolicy,
}

fn default_procedure_code() -> String {
    DEFAULT_PROCEDURE_CODE.to_string()
}

fn default_cache_file() -> PathBuf {
    PathBuf::from(paths::DEFAULT_CACHE_FILE)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_OUTPUT_DIR)
}

fn default_logo_file() -> PathBuf {
    PathBuf::from(paths::DEFAULT_LOGO_FILE)
}

fn default_organization() -> String {
    DEFAULT_ORGANIZATION.to_string()
}

fn default_excluded_sources() -> Vec<String> {
    grouper::default_excluded()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            procedure_code: default_procedure_code(),
            cache_file: default_cache_file(),
            output_dir: default_output_dir(),
            logo_file: default_logo_file(),
            organization: default_organization(),
            excluded_sources: default_excluded_sources(),
            unknown_client: UnknownClientPolicy::default(),
        }
    }
}

impl Config {
    /// Load `.psychref/config.yaml` under `root`, or defaults if it does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn cache_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.cache_file)
    }

    pub fn output_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.output_dir)
    }

    pub fn logo_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.logo_file)
    }

    /// Fail on the first error-level warning.
    pub fn ensure_valid(&self) -> Result<()> {
        match self
            .validate()
            .into_iter()
            .find(|w| w.level == WarnLevel::Error)
        {
            Some(w) => Err(ReferralError::InvalidConfig(w.message)),
            None => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        // 1. An empty code would match every labelled appointment.
        if self.procedure_code.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "procedure_code must not be empty".to_string(),
            });
        } else if self.procedure_code.trim() != self.procedure_code {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "procedure_code '{}' has surrounding whitespace; matching is exact",
                    self.procedure_code
                ),
            });
        }

        // 2. Unmatched clients are labelled "Unknown"; without this entry they
        //    would be grouped into a letter addressed to nobody.
        if !self
            .excluded_sources
            .iter()
            .any(|s| s.eq_ignore_ascii_case(crate::matcher::UNKNOWN_SOURCE))
        {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "excluded_sources does not contain 'unknown'; unmatched clients will be notified as 'Unknown'".to_string(),
            });
        }

        // 3. Cache path is required.
        if self.cache_file.as_os_str().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "cache_file must not be empty".to_string(),
            });
        }

        if self.organization.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "organization is empty; letters will have no header or signature"
                    .to_string(),
            });
        }

        warnings
    }
}
