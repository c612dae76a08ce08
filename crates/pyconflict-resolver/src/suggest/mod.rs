//! Remediation hints for detected conflicts
//!
//! Hints are picked from the shape of the unmet constraint. They never name
//! a concrete compatible version.

use pyconflict_core::{Conflict, Environment, Package};

use crate::version::VersionResolver;

/// Turns conflicts into human-readable suggestions
#[derive(Debug, Clone, Copy)]
pub struct SuggestionGenerator<'r> {
    resolver: &'r VersionResolver,
}

impl<'r> SuggestionGenerator<'r> {
    pub fn new(resolver: &'r VersionResolver) -> Self {
        Self { resolver }
    }

    /// One hint per conflict, plus a general hint when there are several.
    /// A conflict the installed version already satisfies gets no hint.
    pub fn generate(
        &self,
        package: &Package,
        conflicts: &[Conflict],
        _environment: &Environment,
    ) -> Vec<String> {
        if conflicts.is_empty() {
            return Vec::new();
        }

        let mut suggestions: Vec<String> = conflicts
            .iter()
            .filter(|conflict| !self.is_satisfied(conflict))
            .map(|conflict| Self::suggest(conflict, package))
            .collect();

        if conflicts.len() > 1 {
            suggestions.push(format!(
                "Consider upgrading {} to a newer version that may have more compatible dependencies",
                package.name
            ));
        }

        suggestions
    }

    fn is_satisfied(&self, conflict: &Conflict) -> bool {
        conflict
            .installed_version
            .as_ref()
            .is_some_and(|installed| self.resolver.is_compatible(installed, &conflict.required_constraint))
    }

    fn suggest(conflict: &Conflict, package: &Package) -> String {
        let dependency = &conflict.dependency_name;
        let Some(installed) = conflict.installed_version.as_ref() else {
            return format!("Resolve '{}' version conflict manually", dependency);
        };
        if conflict.required_constraint.is_empty() {
            return format!("Resolve '{}' version conflict manually", dependency);
        }

        let required = conflict.required_constraint.to_string();
        if required.starts_with('>') {
            format!(
                "Upgrade '{}' from {} to satisfy {}'s requirement ({})",
                dependency, installed, package.name, required
            )
        } else if required.starts_with('<') {
            format!(
                "'{}' version {} is too new for {} (requires {}). Consider using an older version of {}",
                dependency, installed, package.name, required, package.name
            )
        } else {
            format!(
                "'{}' version {} doesn't satisfy {}'s requirement ({}). Check for compatible versions",
                dependency, installed, package.name, required
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyconflict_core::{SpecifierSet, Version};

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn conflict(dep: &str, required: &str, installed: Option<&str>) -> Conflict {
        Conflict::new(
            dep,
            "django==3.2.0",
            SpecifierSet::parse(required).unwrap(),
            installed.map(v),
        )
    }

    fn setup() -> (Package, Environment) {
        (
            Package::new("django", v("3.2.0")),
            Environment::new(Vec::<(String, Version)>::new(), v("3.11"), "linux"),
        )
    }

    #[test]
    fn test_no_conflicts_no_suggestions() {
        let (package, env) = setup();
        assert!(SuggestionGenerator::new(&VersionResolver::new()).generate(&package, &[], &env).is_empty());
    }

    #[test]
    fn test_lower_bound_suggests_upgrade() {
        let (package, env) = setup();
        let suggestions = SuggestionGenerator::new(&VersionResolver::new()).generate(
            &package,
            &[conflict("sqlparse", ">=0.2.2", Some("0.2.0"))],
            &env,
        );
        assert_eq!(
            suggestions,
            vec!["Upgrade 'sqlparse' from 0.2.0 to satisfy django's requirement (>=0.2.2)"]
        );
    }

    #[test]
    fn test_upper_bound_suggests_older_package() {
        let (package, env) = setup();
        let suggestions = SuggestionGenerator::new(&VersionResolver::new()).generate(
            &package,
            &[conflict("asgiref", ">=3.3.2,<4", Some("4.0.0"))],
            &env,
        );
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].contains("too new for django (requires <4,>=3.3.2)"));
        assert!(suggestions[0].contains("older version of django"));
    }

    #[test]
    fn test_other_shapes_are_generic() {
        let (package, env) = setup();
        let suggestions = SuggestionGenerator::new(&VersionResolver::new()).generate(
            &package,
            &[conflict("pytz", "==2021.1", Some("2023.3"))],
            &env,
        );
        assert!(suggestions[0].ends_with("Check for compatible versions"));

        let suggestions = SuggestionGenerator::new(&VersionResolver::new()).generate(
            &package,
            &[conflict("pytz", "==2021.1", None)],
            &env,
        );
        assert_eq!(suggestions, vec!["Resolve 'pytz' version conflict manually"]);
    }

    #[test]
    fn test_satisfied_conflict_gets_no_hint() {
        let (package, env) = setup();
        let resolver = VersionResolver::new();
        let suggestions = SuggestionGenerator::new(&resolver).generate(
            &package,
            &[conflict("sqlparse", ">=0.2.2", Some("0.4.4"))],
            &env,
        );
        assert!(suggestions.is_empty());
    }

    #[test]
    fn test_several_conflicts_add_general_hint() {
        let (package, env) = setup();
        let suggestions = SuggestionGenerator::new(&VersionResolver::new()).generate(
            &package,
            &[
                conflict("asgiref", "<4", Some("4.0.0")),
                conflict("sqlparse", ">=0.2.2", Some("0.2.0")),
            ],
            &env,
        );
        assert_eq!(suggestions.len(), 3);
        assert_eq!(
            suggestions[2],
            "Consider upgrading django to a newer version that may have more compatible dependencies"
        );
    }
}
