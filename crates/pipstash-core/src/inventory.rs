//! Local package enumeration.
//!
//! Two sources produce the same manifest shape: `Metadata` reads
//! `*.dist-info` directory names out of the interpreter's site-packages,
//! `PipFreeze` asks pip for its frozen listing. Enumeration never fails the
//! caller; a broken source logs a diagnostic and yields an empty manifest.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use pipstash_domain::{Manifest, PackageEntry};
use tracing::{debug, warn};

use crate::config::ToolConfig;
use crate::process;

const DIST_INFO_SUFFIX: &str = ".dist-info";
const PURELIB_QUERY: &str = "import sysconfig; print(sysconfig.get_paths()['purelib'])";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventorySource {
    /// Introspect installed-distribution metadata directly.
    Metadata,
    /// Shell out to `pip list --format=freeze`.
    PipFreeze,
}

impl InventorySource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::PipFreeze => "pip-freeze",
        }
    }
}

impl fmt::Display for InventorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InventorySource {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "metadata" => Ok(Self::Metadata),
            "pip-freeze" => Ok(Self::PipFreeze),
            other => Err(format!("unknown inventory source '{other}'")),
        }
    }
}

/// Enumerates locally installed packages through the chosen source.
///
/// Degrades to an empty manifest when the source fails, logging the cause.
#[must_use]
pub fn list_installed(tools: &ToolConfig, source: InventorySource) -> Manifest {
    let result = match source {
        InventorySource::Metadata => metadata_manifest(tools),
        InventorySource::PipFreeze => pip_freeze_manifest(tools),
    };
    match result {
        Ok(manifest) => {
            debug!(source = %source, count = manifest.len(), "enumerated local packages");
            manifest
        }
        Err(err) => {
            warn!(source = %source, "package enumeration failed: {err:#}");
            Manifest::default()
        }
    }
}

fn pip_freeze_manifest(tools: &ToolConfig) -> Result<Manifest> {
    let args = ["list".to_string(), "--format=freeze".to_string()];
    let output = process::run_command(&tools.pip, &args)?;
    if output.code != 0 {
        bail!(
            "{} exited with status {}: {}",
            tools.pip,
            output.code,
            output.stderr.trim()
        );
    }
    Ok(Manifest::parse(&output.stdout))
}

fn metadata_manifest(tools: &ToolConfig) -> Result<Manifest> {
    let purelib = site_packages_dir(tools)?;
    scan_dist_info(&purelib)
}

fn site_packages_dir(tools: &ToolConfig) -> Result<PathBuf> {
    let args = ["-c".to_string(), PURELIB_QUERY.to_string()];
    let output = process::run_command(&tools.python, &args)?;
    if output.code != 0 {
        bail!(
            "{} exited with status {}: {}",
            tools.python,
            output.code,
            output.stderr.trim()
        );
    }
    let path = output.stdout.trim();
    if path.is_empty() {
        bail!("{} reported no site-packages path", tools.python);
    }
    Ok(PathBuf::from(path))
}

/// Collects `name-version.dist-info` directory names under `dir`, sorted
/// lexicographically by package name. Entries that don't carry both a name
/// and a version are skipped.
fn scan_dist_info(dir: &Path) -> Result<Manifest> {
    let mut entries = Vec::new();
    let listing =
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for item in listing {
        let item = item.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let file_name = item.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(stem) = name.strip_suffix(DIST_INFO_SUFFIX) else {
            continue;
        };
        let Some((package, version)) = stem.rsplit_once('-') else {
            continue;
        };
        if package.is_empty() || version.is_empty() {
            continue;
        }
        entries.push(PackageEntry::new(package, Some(version.to_string())));
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Manifest::new(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools(pip: &str, python: &str) -> ToolConfig {
        ToolConfig {
            pip: pip.to_string(),
            python: python.to_string(),
        }
    }

    #[cfg(unix)]
    fn fake_tool(dir: &Path, name: &str, script: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn missing_tool_degrades_to_empty_manifest() {
        let tools = tools("/nonexistent/pipstash-pip", "/nonexistent/pipstash-python");
        assert!(list_installed(&tools, InventorySource::PipFreeze).is_empty());
        assert!(list_installed(&tools, InventorySource::Metadata).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn pip_freeze_output_parses_into_entries() {
        let temp = tempfile::tempdir().unwrap();
        let pip = fake_tool(
            temp.path(),
            "pip",
            "printf 'flask==3.0.0\\nrequests==2.31.0\\n'",
        );
        let manifest = list_installed(&tools(&pip, "python3"), InventorySource::PipFreeze);
        assert_eq!(manifest.render(), "flask==3.0.0\nrequests==2.31.0");
    }

    #[cfg(unix)]
    #[test]
    fn pip_nonzero_exit_degrades_to_empty_manifest() {
        let temp = tempfile::tempdir().unwrap();
        let pip = fake_tool(temp.path(), "pip", "echo broken >&2; exit 3");
        let manifest = list_installed(&tools(&pip, "python3"), InventorySource::PipFreeze);
        assert!(manifest.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn metadata_source_scans_dist_info_directories() {
        let temp = tempfile::tempdir().unwrap();
        let site = temp.path().join("site-packages");
        fs::create_dir_all(site.join("requests-2.31.0.dist-info")).unwrap();
        fs::create_dir_all(site.join("flask-3.0.0.dist-info")).unwrap();
        fs::create_dir_all(site.join("flask")).unwrap();
        fs::create_dir_all(site.join("odd.dist-info")).unwrap();

        let python = fake_tool(temp.path(), "python", &format!("echo {}", site.display()));
        let manifest = list_installed(&tools("pip3", &python), InventorySource::Metadata);
        assert_eq!(manifest.render(), "flask==3.0.0\nrequests==2.31.0");
    }

    #[test]
    fn dist_info_scan_sorts_and_skips_unparseable_names() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("zzz-9.0.dist-info")).unwrap();
        fs::create_dir_all(temp.path().join("aaa-1.0.dist-info")).unwrap();
        fs::create_dir_all(temp.path().join("-1.0.dist-info")).unwrap();

        let manifest = scan_dist_info(temp.path()).unwrap();
        assert_eq!(manifest.render(), "aaa==1.0\nzzz==9.0");
    }
}
