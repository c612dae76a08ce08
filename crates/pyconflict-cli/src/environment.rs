//! Inspection of a real Python interpreter
//!
//! The interpreter is run once to report its version, platform and
//! site-packages directories. Installed distributions are then read straight
//! from the `*.dist-info/METADATA` and `*.egg-info/PKG-INFO` files in those
//! directories, without importing anything.

use std::collections::BTreeMap;
use std::fs;
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use pyconflict_core::utils::normalize_name;
use pyconflict_core::{EnvironmentSource, PycError, PycResult, Version};

const PROBE_SCRIPT: &str = r#"
import json, platform, site, sys, sysconfig
paths = []
for key in ("purelib", "platlib"):
    path = sysconfig.get_paths().get(key)
    if path and path not in paths:
        paths.append(path)
try:
    if site.ENABLE_USER_SITE:
        user = site.getusersitepackages()
        if user not in paths:
            paths.append(user)
except Exception:
    pass
print(json.dumps({
    "version": platform.python_version(),
    "platform": sys.platform,
    "machine": platform.machine(),
    "implementation": sys.implementation.name,
    "site_packages": paths,
}))
"#;

/// What the probe script prints
#[derive(Debug, Clone, Deserialize)]
struct InterpreterProbe {
    version: String,
    platform: String,
    machine: Option<String>,
    implementation: Option<String>,
    #[serde(default)]
    site_packages: Vec<String>,
}

/// [`EnvironmentSource`] backed by an interpreter and its site-packages
#[derive(Debug, Clone)]
pub struct InterpreterEnvironment {
    python_version: Version,
    platform: String,
    machine: Option<String>,
    implementation: Option<String>,
    site_packages: Vec<Utf8PathBuf>,
}

impl InterpreterEnvironment {
    /// Run `python` and record what it reports
    pub fn inspect(python: &str) -> PycResult<Self> {
        debug!(python, "probing interpreter");
        let output = Command::new(python)
            .args(["-c", PROBE_SCRIPT])
            .output()
            .map_err(|e| PycError::Environment {
                message: format!("Failed to run '{}': {}", python, e),
            })?;

        if !output.status.success() {
            return Err(PycError::Environment {
                message: format!(
                    "'{}' exited with {}: {}",
                    python,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Self::from_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    fn from_probe_output(stdout: &str) -> PycResult<Self> {
        let probe: InterpreterProbe =
            serde_json::from_str(stdout.trim()).map_err(|e| PycError::Environment {
                message: format!("Unexpected interpreter probe output: {}", e),
            })?;

        Ok(Self {
            python_version: Version::parse(&probe.version)?,
            platform: probe.platform,
            machine: probe.machine.filter(|m| !m.is_empty()),
            implementation: probe.implementation,
            site_packages: probe.site_packages.into_iter().map(Utf8PathBuf::from).collect(),
        })
    }
}

impl EnvironmentSource for InterpreterEnvironment {
    fn get_installed_packages(&self) -> PycResult<BTreeMap<String, Version>> {
        let mut packages = BTreeMap::new();
        let mut seen = std::collections::HashSet::new();

        for dir in &self.site_packages {
            for (name, version) in scan_site_packages(dir) {
                // Earlier directories shadow later ones, as on sys.path
                if seen.insert(normalize_name(&name)) {
                    packages.insert(name, version);
                }
            }
        }

        debug!(count = packages.len(), "installed distributions found");
        Ok(packages)
    }

    fn get_interpreter_version(&self) -> PycResult<Version> {
        Ok(self.python_version.clone())
    }

    fn get_platform(&self) -> PycResult<String> {
        Ok(self.platform.clone())
    }

    fn get_machine(&self) -> PycResult<Option<String>> {
        Ok(self.machine.clone())
    }

    fn get_implementation(&self) -> PycResult<Option<String>> {
        Ok(self.implementation.clone())
    }
}

/// Distributions installed directly under `dir`. A missing directory is empty.
fn scan_site_packages(dir: &Utf8Path) -> Vec<(String, Version)> {
    let mut found = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        let Some(file_name) = entry.file_name().to_str() else {
            continue;
        };

        let metadata_path = if file_name.ends_with(".dist-info") {
            entry.path().join("METADATA")
        } else if file_name.ends_with(".egg-info") {
            if entry.file_type().is_dir() {
                entry.path().join("PKG-INFO")
            } else {
                entry.path().to_path_buf()
            }
        } else {
            continue;
        };

        let Ok(content) = fs::read_to_string(&metadata_path) else {
            debug!(path = %metadata_path.display(), "no readable metadata");
            continue;
        };

        match parse_metadata(&content) {
            Some((name, raw_version)) => match Version::parse(&raw_version) {
                Ok(version) => found.push((name, version)),
                Err(err) => warn!(
                    package = %name,
                    version = %raw_version,
                    error = %err,
                    "skipping installed package with invalid version"
                ),
            },
            None => warn!(path = %metadata_path.display(), "metadata has no Name or Version"),
        }
    }

    found
}

/// `Name` and `Version` from the RFC 822 style header block
fn parse_metadata(content: &str) -> Option<(String, String)> {
    let mut name = None;
    let mut version = None;

    for line in content.lines() {
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            match key.trim() {
                "Name" if name.is_none() => name = Some(value.trim().to_string()),
                "Version" if version.is_none() => version = Some(value.trim().to_string()),
                _ => {},
            }
        }
    }

    Some((name.filter(|n| !n.is_empty())?, version.filter(|v| !v.is_empty())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_dist_info(root: &Utf8Path, dir: &str, name: &str, version: &str) {
        let path = root.join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(
            path.join("METADATA"),
            format!("Metadata-Version: 2.1\nName: {name}\nVersion: {version}\nSummary: test\n\nLong description\nVersion: 9.9\n"),
        )
        .unwrap();
    }

    fn site_dir() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    fn environment(site_packages: Vec<Utf8PathBuf>) -> InterpreterEnvironment {
        InterpreterEnvironment {
            python_version: Version::parse("3.11.4").unwrap(),
            platform: "linux".to_string(),
            machine: Some("x86_64".to_string()),
            implementation: Some("cpython".to_string()),
            site_packages,
        }
    }

    #[test]
    fn test_from_probe_output() {
        let output = r#"{"version": "3.11.4", "platform": "linux", "machine": "x86_64", "implementation": "cpython", "site_packages": ["/venv/lib/python3.11/site-packages"]}"#;
        let env = InterpreterEnvironment::from_probe_output(output).unwrap();

        assert_eq!(env.get_interpreter_version().unwrap(), Version::parse("3.11.4").unwrap());
        assert_eq!(env.get_platform().unwrap(), "linux");
        assert_eq!(env.get_machine().unwrap().as_deref(), Some("x86_64"));
        assert_eq!(env.get_implementation().unwrap().as_deref(), Some("cpython"));
        assert_eq!(env.site_packages, vec![Utf8PathBuf::from("/venv/lib/python3.11/site-packages")]);
    }

    #[test]
    fn test_bad_probe_output() {
        let err = InterpreterEnvironment::from_probe_output("Python 2.7.18").unwrap_err();
        assert!(matches!(err, PycError::Environment { .. }));
    }

    #[test]
    fn test_scan_site_packages() {
        let (_dir, site) = site_dir();
        write_dist_info(&site, "Django-3.2.0.dist-info", "Django", "3.2.0");
        write_dist_info(&site, "sqlparse-0.4.4.dist-info", "sqlparse", "0.4.4");
        write_dist_info(&site, "broken-1.dist-info", "broken", "not a version");
        fs::create_dir_all(site.join("django")).unwrap();

        // Legacy single-file egg-info
        fs::write(site.join("pytz-2021.1-py3.8.egg-info"), "Name: pytz\nVersion: 2021.1\n").unwrap();
        // Directory egg-info
        fs::create_dir_all(site.join("six.egg-info")).unwrap();
        fs::write(site.join("six.egg-info").join("PKG-INFO"), "Name: six\nVersion: 1.16.0\n").unwrap();
        // dist-info without METADATA
        fs::create_dir_all(site.join("empty-1.0.dist-info")).unwrap();

        let packages = environment(vec![site]).get_installed_packages().unwrap();

        assert_eq!(packages.len(), 4);
        assert_eq!(packages["Django"], Version::parse("3.2.0").unwrap());
        assert_eq!(packages["sqlparse"], Version::parse("0.4.4").unwrap());
        assert_eq!(packages["pytz"], Version::parse("2021.1").unwrap());
        assert_eq!(packages["six"], Version::parse("1.16.0").unwrap());
        assert!(!packages.contains_key("broken"));
    }

    #[test]
    fn test_earlier_site_dir_shadows_later() {
        let (_first_dir, first) = site_dir();
        let (_second_dir, second) = site_dir();
        write_dist_info(&first, "requests-2.31.0.dist-info", "requests", "2.31.0");
        write_dist_info(&second, "Requests-2.20.0.dist-info", "Requests", "2.20.0");

        let packages = environment(vec![first, second, Utf8PathBuf::from("/does/not/exist")])
            .get_installed_packages()
            .unwrap();

        assert_eq!(packages.len(), 1);
        assert_eq!(packages["requests"], Version::parse("2.31.0").unwrap());
    }

    #[test]
    fn test_parse_metadata_stops_at_body() {
        let content = "Name: demo\nSummary: x\n\nVersion: 1.0\n";
        assert_eq!(parse_metadata(content), None);

        let content = "Metadata-Version: 2.1\nName: demo\nVersion: 1.0\n";
        assert_eq!(
            parse_metadata(content),
            Some(("demo".to_string(), "1.0".to_string()))
        );
    }
}
