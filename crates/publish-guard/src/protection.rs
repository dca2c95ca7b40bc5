//! Package protection rules.
//!
//! A project may protect package names from being pushed by actors below a
//! given access level. Every matching rule is consulted: one unmet rule is
//! enough to deny, regardless of the order rules were defined in.

use globset::{GlobBuilder, GlobMatcher};
use publish_protocol::PackageType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from building protection rules.
#[derive(Debug, Error)]
pub enum ProtectionError {
    #[error("invalid package name pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("package name pattern is empty")]
    EmptyPattern,
}

/// Project access levels, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Authenticated but not a project member.
    NoAccess,
    Guest,
    Reporter,
    Developer,
    Maintainer,
    Owner,
    /// Instance administrator.
    Admin,
}

/// A compiled protection rule.
#[derive(Debug, Clone)]
pub struct ProtectionRule {
    package_name_pattern: String,
    package_type: PackageType,
    minimum_access_level_for_push: AccessLevel,
    matcher: GlobMatcher,
}

impl ProtectionRule {
    /// Compile a rule.
    ///
    /// `*` is the only wildcard and matches any run of characters, `/`
    /// included. Every other character matches itself.
    pub fn new(
        package_name_pattern: impl Into<String>,
        package_type: PackageType,
        minimum_access_level_for_push: AccessLevel,
    ) -> Result<Self, ProtectionError> {
        let package_name_pattern = package_name_pattern.into();
        if package_name_pattern.is_empty() {
            return Err(ProtectionError::EmptyPattern);
        }

        let glob = package_name_pattern
            .split('*')
            .map(globset::escape)
            .collect::<Vec<_>>()
            .join("*");

        let matcher = GlobBuilder::new(&glob)
            .literal_separator(false)
            .case_insensitive(false)
            .build()
            .map_err(|source| ProtectionError::InvalidPattern {
                pattern: package_name_pattern.clone(),
                source,
            })?
            .compile_matcher();

        Ok(Self {
            package_name_pattern,
            package_type,
            minimum_access_level_for_push,
            matcher,
        })
    }

    /// The pattern as written.
    pub fn package_name_pattern(&self) -> &str {
        &self.package_name_pattern
    }

    /// Registry kind the rule applies to.
    pub fn package_type(&self) -> PackageType {
        self.package_type
    }

    /// Lowest access level allowed to push matching packages.
    pub fn minimum_access_level_for_push(&self) -> AccessLevel {
        self.minimum_access_level_for_push
    }

    /// Check if the rule applies to a package.
    pub fn matches(&self, package_type: PackageType, name: &str) -> bool {
        self.package_type == package_type && self.matcher.is_match(name)
    }
}

/// A rule that denied a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeniedBy {
    pub package_name_pattern: String,
    pub minimum_access_level_for_push: AccessLevel,
}

/// Result of evaluating protection rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Allowed,
    Denied { rules: Vec<DeniedBy> },
}

impl Authorization {
    /// Check if the push may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Evaluates protection rules, subject to a global kill-switch.
#[derive(Debug, Clone, Copy)]
pub struct ProtectionEngine {
    enabled: bool,
}

impl Default for ProtectionEngine {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl ProtectionEngine {
    /// Create an engine. A disabled engine allows every push.
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Check if rules are being enforced.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Decide whether an actor may push `name`.
    pub fn authorize(
        &self,
        rules: &[ProtectionRule],
        package_type: PackageType,
        name: &str,
        actor: AccessLevel,
    ) -> Authorization {
        if !self.enabled {
            return Authorization::Allowed;
        }

        // Fold over every rule; never stop at the first match.
        let denied = rules.iter().fold(Vec::new(), |mut denied, rule| {
            if rule.matches(package_type, name) && actor < rule.minimum_access_level_for_push {
                denied.push(DeniedBy {
                    package_name_pattern: rule.package_name_pattern.clone(),
                    minimum_access_level_for_push: rule.minimum_access_level_for_push,
                });
            }
            denied
        });

        if denied.is_empty() {
            Authorization::Allowed
        } else {
            Authorization::Denied { rules: denied }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, level: AccessLevel) -> ProtectionRule {
        ProtectionRule::new(pattern, PackageType::Npm, level).unwrap()
    }

    #[test]
    fn test_access_level_ordering() {
        assert!(AccessLevel::NoAccess < AccessLevel::Guest);
        assert!(AccessLevel::Guest < AccessLevel::Reporter);
        assert!(AccessLevel::Reporter < AccessLevel::Developer);
        assert!(AccessLevel::Developer < AccessLevel::Maintainer);
        assert!(AccessLevel::Maintainer < AccessLevel::Owner);
        assert!(AccessLevel::Owner < AccessLevel::Admin);
    }

    #[test]
    fn test_no_rules_allows() {
        let engine = ProtectionEngine::default();
        let auth = engine.authorize(&[], PackageType::Npm, "@scope/x", AccessLevel::Guest);
        assert!(auth.is_allowed());
    }

    #[test]
    fn test_scope_wildcard_rule() {
        let engine = ProtectionEngine::default();
        let rules = vec![rule("@scope/*", AccessLevel::Developer)];

        let denied = engine.authorize(&rules, PackageType::Npm, "@scope/x", AccessLevel::Reporter);
        assert_eq!(
            denied,
            Authorization::Denied {
                rules: vec![DeniedBy {
                    package_name_pattern: "@scope/*".to_string(),
                    minimum_access_level_for_push: AccessLevel::Developer,
                }]
            }
        );

        assert!(engine.authorize(&rules, PackageType::Npm, "y", AccessLevel::Reporter).is_allowed());
        assert!(engine.authorize(&rules, PackageType::Npm, "@scope/x", AccessLevel::Developer).is_allowed());
        assert!(engine.authorize(&rules, PackageType::Npm, "@other/x", AccessLevel::Reporter).is_allowed());
    }

    #[test]
    fn test_exact_name_rule() {
        let engine = ProtectionEngine::default();
        let rules = vec![rule("@scope/my-app", AccessLevel::Owner)];

        assert!(!engine.authorize(&rules, PackageType::Npm, "@scope/my-app", AccessLevel::Maintainer).is_allowed());
        assert!(engine.authorize(&rules, PackageType::Npm, "@scope/my-app", AccessLevel::Owner).is_allowed());
        assert!(engine.authorize(&rules, PackageType::Npm, "@scope/my-app_no_match", AccessLevel::Guest).is_allowed());
    }

    #[test]
    fn test_any_matching_rule_denies_regardless_of_order() {
        let engine = ProtectionEngine::default();
        let lenient = rule("@scope/*", AccessLevel::Developer);
        let strict = rule("@scope/core-*", AccessLevel::Owner);

        for rules in [vec![lenient.clone(), strict.clone()], vec![strict, lenient]] {
            let auth = engine.authorize(&rules, PackageType::Npm, "@scope/core-lib", AccessLevel::Maintainer);
            match auth {
                Authorization::Denied { rules: denied } => {
                    assert_eq!(denied.len(), 1);
                    assert_eq!(denied[0].package_name_pattern, "@scope/core-*");
                }
                Authorization::Allowed => panic!("strict rule should deny"),
            }
        }
    }

    #[test]
    fn test_denial_lists_every_denying_rule() {
        let engine = ProtectionEngine::default();
        let rules = vec![rule("@scope/*", AccessLevel::Maintainer), rule("*", AccessLevel::Developer)];

        match engine.authorize(&rules, PackageType::Npm, "@scope/x", AccessLevel::Reporter) {
            Authorization::Denied { rules } => assert_eq!(rules.len(), 2),
            Authorization::Allowed => panic!("expected denial"),
        }
    }

    #[test]
    fn test_wildcard_spans_slash() {
        let engine = ProtectionEngine::default();
        let rules = vec![rule("@sco*", AccessLevel::Owner)];
        assert!(!engine.authorize(&rules, PackageType::Npm, "@scope/pkg", AccessLevel::Maintainer).is_allowed());
    }

    #[test]
    fn test_glob_metacharacters_are_literal() {
        let r = rule("pkg?[ab]", AccessLevel::Owner);
        assert!(r.matches(PackageType::Npm, "pkg?[ab]"));
        assert!(!r.matches(PackageType::Npm, "pkgxa"));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let r = rule("@Scope/*", AccessLevel::Owner);
        assert!(!r.matches(PackageType::Npm, "@scope/pkg"));
    }

    #[test]
    fn test_disabled_engine_allows_everything() {
        let engine = ProtectionEngine::new(false);
        let rules = vec![rule("*", AccessLevel::Admin)];
        assert!(!engine.is_enabled());
        assert!(engine.authorize(&rules, PackageType::Npm, "@scope/x", AccessLevel::NoAccess).is_allowed());
    }

    #[test]
    fn test_empty_pattern_is_rejected() {
        let err = ProtectionRule::new("", PackageType::Npm, AccessLevel::Owner).unwrap_err();
        assert!(matches!(err, ProtectionError::EmptyPattern));
    }
}
