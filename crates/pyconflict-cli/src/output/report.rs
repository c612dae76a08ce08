//! Rendering of command results, for people and for machines.

use serde_json::json;

use pyconflict_core::{Conflict, PycError, PycResult};
use pyconflict_registry::CacheStats;
use pyconflict_resolver::{CheckAddResponse, LatestStableResponse};

use super::colors::ColorSupport;

/// Terminal rendering of a check-add result
pub fn check_add_human(response: &CheckAddResponse, colors: &ColorSupport) -> String {
    let mut lines = Vec::new();
    let package = format!("{}=={}", response.package.name, response.package.version);

    if response.safe_to_add {
        lines.push(format!("{} Safe to add {}", colors.green("✓"), package));
        lines.push(format!("  Confidence: {:.0}%", response.confidence * 100.0));
    } else {
        lines.push(format!("{} Cannot add {}", colors.red("✗"), package));
        lines.push(String::new());
        lines.push(colors.bold("Conflicts detected:"));

        for conflict in &response.conflicts {
            lines.push(format!("  {} {}", colors.red("•"), conflict.dependency_name));
            lines.push(format!("    Required: {}", required(conflict)));
            if let Some(installed) = &conflict.installed_version {
                lines.push(format!("    Installed: {}", installed));
            }
        }

        if !response.suggestions.is_empty() {
            lines.push(String::new());
            lines.push(colors.bold("Suggestions:"));
            for suggestion in &response.suggestions {
                lines.push(format!("  {} {}", colors.yellow("→"), suggestion));
            }
        }
    }

    if !response.caveats.is_empty() {
        lines.push(String::new());
        lines.push(colors.dim("Caveats:"));
        for caveat in &response.caveats {
            lines.push(format!("  {}", colors.dim(&format!("ℹ {}", caveat))));
        }
    }

    lines.join("\n")
}

/// JSON report of a check-add result
pub fn check_add_json(response: &CheckAddResponse) -> PycResult<String> {
    let conflicts: Vec<serde_json::Value> = response
        .conflicts
        .iter()
        .map(|conflict| {
            json!({
                "dependency": conflict.dependency_name,
                "required": conflict.required_constraint.to_string(),
                "installed": conflict.installed_version.as_ref().map(ToString::to_string),
                "required_by": conflict.required_by,
                "severity": conflict.severity.as_str(),
            })
        })
        .collect();

    let value = json!({
        "status": if response.safe_to_add { "safe" } else { "conflict" },
        "exit_code": if response.safe_to_add { 0 } else { 1 },
        "package": {
            "name": response.package.name,
            "version": response.package.version.to_string(),
        },
        "conflicts": conflicts,
        "suggestions": response.suggestions,
        "confidence": response.confidence,
        "caveats": response.caveats,
    });
    to_pretty(&value)
}

/// Terminal rendering of a latest-stable result
pub fn stable_human(response: &LatestStableResponse, colors: &ColorSupport) -> String {
    let mut output = format!("{}=={}", response.package_name, response.version);
    if response.is_filtered_by_python {
        output.push(' ');
        output.push_str(&colors.dim("(filtered by Python version)"));
    }
    output
}

/// JSON report of a latest-stable result
pub fn stable_json(response: &LatestStableResponse) -> PycResult<String> {
    to_pretty(&json!({
        "package": response.package_name,
        "version": response.version.to_string(),
        "is_filtered_by_python": response.is_filtered_by_python,
    }))
}

/// Terminal rendering of `cache info`
pub fn cache_info_human(path: &str, enabled: bool, stats: &CacheStats) -> String {
    [
        format!("Location: {}", path),
        format!("Enabled:  {}", if enabled { "yes" } else { "no" }),
        format!("Entries:  {} ({} expired)", stats.total_entries, stats.expired_entries),
        format!("Size:     {}", human_bytes(stats.total_bytes)),
    ]
    .join("\n")
}

fn required(conflict: &Conflict) -> String {
    if conflict.required_constraint.is_empty() {
        "any version".to_string()
    } else {
        conflict.required_constraint.to_string()
    }
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

fn to_pretty(value: &serde_json::Value) -> PycResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| PycError::Io {
        message: "Failed to render JSON output".to_string(),
        source: e.into(),
    })
}
