use anyhow::{Context, Result, anyhow, bail};
use schemars::{Schema, schema_for};
use serde_valid::Validate;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use super::models::{BackendConfig, Profile};

/// Load a run profile from a string slice.
pub fn load_from_str(s: &str) -> Result<Profile> {
    let profile: Profile =
        serde_json::from_str(s).context("Failed to parse JSON profile string into Profile")?;
    validate_profile(&profile)?;
    Ok(profile)
}

/// Load a run profile from any reader (e.g., a file).
pub fn load_from_reader<R: Read>(reader: R) -> Result<Profile> {
    let profile: Profile =
        serde_json::from_reader(reader).context("Failed to parse JSON profile from reader")?;
    validate_profile(&profile)?;
    Ok(profile)
}

/// Load a run profile from a file path synchronously.
///
/// A relative `store` path is rebased onto the profile's directory.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Profile> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open profile {}", path_ref.display()))?;
    let mut profile = load_from_reader(file)?;
    rebase_store_path(&mut profile, path_ref);
    debug!("Loaded profile from {}", path_ref.display());
    Ok(profile)
}

/// Load a run profile from a file path asynchronously (Tokio).
pub async fn load_from_path_async<P: AsRef<Path>>(path: P) -> Result<Profile> {
    use tokio::fs;
    let path_ref = path.as_ref();
    let bytes = fs::read(path_ref)
        .await
        .with_context(|| format!("Failed to read profile {}", path_ref.display()))?;
    let mut profile: Profile = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse JSON profile from {}", path_ref.display()))?;
    validate_profile(&profile)?;
    rebase_store_path(&mut profile, path_ref);
    debug!("Loaded profile from {}", path_ref.display());
    Ok(profile)
}

/// Generate the JSON Schema for the Profile model (for editors and external tooling).
pub fn generate_schema() -> Schema {
    schema_for!(Profile)
}

/// Write the JSON Schema for the Profile model to any writer (pretty-printed).
pub fn write_schema_to_writer<W: Write>(mut writer: W) -> Result<()> {
    let schema = generate_schema();
    let json = serde_json::to_string_pretty(&schema).context("Failed to serialize schema")?;
    writer
        .write_all(json.as_bytes())
        .context("Failed to write schema to writer")?;
    Ok(())
}

/// Field-level validation (ranges, lengths) followed by cross-field checks.
/// - Backend settings nested in the tagged enum are validated explicitly.
/// - Run keys must be non-blank and unique.
pub fn validate_profile(profile: &Profile) -> Result<()> {
    profile
        .validate()
        .map_err(|e| anyhow!("Invalid profile: {e}"))?;

    if let BackendConfig::WebDriver(settings) = &profile.backend {
        settings
            .validate()
            .map_err(|e| anyhow!("Invalid webdriver settings: {e}"))?;
    }

    let mut seen = std::collections::BTreeSet::new();
    for (idx, run) in profile.runs.iter().enumerate() {
        if run.trim().is_empty() {
            bail!("Run {} has an empty action list key", idx);
        }
        if !seen.insert(run.to_lowercase()) {
            bail!("Run '{}' is listed more than once", run);
        }
    }

    trace!("Profile validation passed");
    Ok(())
}

fn rebase_store_path(profile: &mut Profile, profile_path: &Path) {
    let store = PathBuf::from(&profile.store);
    if store.is_relative()
        && let Some(dir) = profile_path.parent()
        && !dir.as_os_str().is_empty()
    {
        profile.store = dir.join(store).to_string_lossy().into_owned();
    }
}
