//! Semantic manifest validation (spec §4.6): label format, version and
//! platform formats, duplicate labels, and the empty-document case. Every
//! violation found is collected rather than returned on first failure, so
//! callers see the full picture in one diagnostic.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::model::{ModuleManifest, ProviderManifest};

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+(-[A-Za-z0-9.]+)?(\+[A-Za-z0-9.]+)?$").unwrap()
});

static PLATFORM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9]+_[a-z0-9]+$").unwrap());

static PROVIDER_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]*/[a-z0-9][a-z0-9-]*$").unwrap());

static MODULE_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]*/[a-z0-9][a-z0-9-]*/[a-z0-9][a-z0-9-]*$").unwrap());

pub fn validate_provider_manifest(manifest: &ProviderManifest) -> Vec<String> {
    let mut diagnostics = Vec::new();

    if manifest.entries.is_empty() {
        diagnostics.push("manifest contains no provider blocks".to_string());
        return diagnostics;
    }

    let mut seen = HashSet::new();
    for entry in &manifest.entries {
        let label = entry.label();

        if !PROVIDER_LABEL_RE.is_match(&label) {
            diagnostics.push(format!("provider label \"{label}\" does not match <namespace>/<type>"));
        }
        if !seen.insert(label.clone()) {
            diagnostics.push(format!("duplicate provider label \"{label}\""));
        }
        if entry.versions.is_empty() {
            diagnostics.push(format!("provider \"{label}\" has no versions"));
        }
        for version in &entry.versions {
            if !VERSION_RE.is_match(version) {
                diagnostics.push(format!("provider \"{label}\" has malformed version \"{version}\""));
            }
        }
        for platform in &entry.platforms {
            if !PLATFORM_RE.is_match(platform) {
                diagnostics.push(format!("provider \"{label}\" has malformed platform \"{platform}\""));
            }
        }
    }

    diagnostics
}

pub fn validate_module_manifest(manifest: &ModuleManifest) -> Vec<String> {
    let mut diagnostics = Vec::new();

    if manifest.entries.is_empty() {
        diagnostics.push("manifest contains no module blocks".to_string());
        return diagnostics;
    }

    let mut seen = HashSet::new();
    for entry in &manifest.entries {
        let label = entry.label();

        if !MODULE_LABEL_RE.is_match(&label) {
            diagnostics.push(format!("module label \"{label}\" does not match <namespace>/<name>/<system>"));
        }
        if !seen.insert(label.clone()) {
            diagnostics.push(format!("duplicate module label \"{label}\""));
        }
        if entry.versions.is_empty() {
            diagnostics.push(format!("module \"{label}\" has no versions"));
        }
        for version in &entry.versions {
            if !VERSION_RE.is_match(version) {
                diagnostics.push(format!("module \"{label}\" has malformed version \"{version}\""));
            }
        }
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::model::{ModuleEntry, ProviderEntry};

    #[test]
    fn accepts_well_formed_provider_entry() {
        let manifest = ProviderManifest {
            entries: vec![ProviderEntry {
                namespace: "hashicorp".to_string(),
                provider_type: "random".to_string(),
                versions: vec!["3.5.1".to_string(), "3.6.0-beta.1".to_string()],
                platforms: vec!["linux_amd64".to_string()],
            }],
        };
        assert!(validate_provider_manifest(&manifest).is_empty());
    }

    #[test]
    fn flags_empty_versions() {
        let manifest = ProviderManifest {
            entries: vec![ProviderEntry {
                namespace: "hashicorp".to_string(),
                provider_type: "random".to_string(),
                versions: vec![],
                platforms: vec!["linux_amd64".to_string()],
            }],
        };
        let diagnostics = validate_provider_manifest(&manifest);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].contains("no versions"));
    }

    #[test]
    fn flags_duplicate_module_labels() {
        let entry = ModuleEntry {
            namespace: "hashicorp".to_string(),
            name: "consul".to_string(),
            system: "aws".to_string(),
            versions: vec!["1.0.0".to_string()],
        };
        let manifest = ModuleManifest { entries: vec![entry.clone(), entry] };
        let diagnostics = validate_module_manifest(&manifest);
        assert!(diagnostics.iter().any(|d| d.contains("duplicate")));
    }
}
