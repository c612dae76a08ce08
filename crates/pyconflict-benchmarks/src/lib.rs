//! PyConflict benchmarking suite
//!
//! Shared criterion configuration and synthetic inputs for the version,
//! specifier and conflict-detection benchmarks.

use std::time::Duration;

use criterion::Criterion;
use pprof::criterion::{Output, PProfProfiler};

use pyconflict_core::{Dependency, Environment, Package, SpecifierSet, Version};

/// Configure criterion with flamegraph profiling support
pub fn criterion_config() -> Criterion {
    Criterion::default()
        .warm_up_time(Duration::from_secs(3))
        .measurement_time(Duration::from_secs(10))
        .sample_size(100)
        .with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)))
}

/// Version strings covering every PEP 440 component
pub fn version_strings(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| match i % 6 {
            0 => format!("{}.{}.{}", i % 7, i % 13, i % 29),
            1 => format!("{}.{}rc{}", i % 5, i % 11, i % 3),
            2 => format!("{}.{}.post{}", i % 9, i % 4, i % 6),
            3 => format!("{}!{}.{}.dev{}", i % 2, i % 8, i % 10, i % 4),
            4 => format!("v{}.{}-alpha.{}", i % 3, i % 12, i % 5),
            _ => format!("{}.{}+local.{}", i % 6, i % 15, i % 7),
        })
        .collect()
}

/// Parsed form of [`version_strings`]
pub fn versions(count: usize) -> Vec<Version> {
    version_strings(count)
        .iter()
        .filter_map(|s| Version::parse(s).ok())
        .collect()
}

/// A package with `count` direct dependencies, every third one
/// marker-gated
pub fn package_with_dependencies(count: usize) -> Package {
    (0..count).fold(Package::new("bench-target", Version::new([1, 0, 0])), |package, i| {
        let mut line = format!("dep-{}>={}.0,<{}", i, i % 5, i % 5 + 2);
        if i % 3 == 0 {
            line.push_str(" ; python_version >= \"3.8\" and sys_platform == \"linux\"");
        }
        match Dependency::parse(&line) {
            Ok(dependency) => package.with_dependency(dependency),
            Err(_) => package,
        }
    })
}

/// An environment with `count` installed packages, one per dependency of
/// [`package_with_dependencies`], a quarter of them out of range
pub fn environment_with_packages(count: usize) -> Environment {
    let installed = (0..count).map(|i| {
        let major = if i % 4 == 0 { i % 5 + 3 } else { i % 5 } as u64;
        (format!("dep-{}", i), Version::new([major, 1]))
    });
    Environment::new(installed, Version::new([3, 11, 4]), "linux")
}

/// A representative mix of specifier sets
pub fn specifier_sets() -> Vec<SpecifierSet> {
    [">=1.0,<2.0", "~=2.2", "==1.4.*", "!=1.5.0,>=1.0", "===1.0", "<3.1rc2", ""]
        .iter()
        .filter_map(|s| SpecifierSet::parse(s).ok())
        .collect()
}
