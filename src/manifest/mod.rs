//! Declarative manifest parsing (spec §4.6): provider and module manifests,
//! each a small HCL document, parsed with `hcl-rs`'s serde-oriented AST
//! (manifests are consumed, not edited, so there's no formatting to
//! preserve — unlike the Module Rewriter, which needs `hcl-edit`).

mod model;
mod parse;
mod validate;

pub use model::{ModuleEntry, ModuleManifest, ProviderEntry, ProviderManifest};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest is invalid: {}", diagnostics.join("; "))]
    Invalid { diagnostics: Vec<String> },
}

impl From<ManifestError> for crate::Error {
    fn from(err: ManifestError) -> Self {
        crate::Error::InvalidInput(err.to_string())
    }
}

impl ManifestError {
    /// Combines the parser's structural diagnostics with the validator's
    /// semantic ones into the single aggregated list spec §4.6 asks for —
    /// a document with both a missing label and a malformed version should
    /// report both in one `ManifestError::Invalid`, not whichever stage
    /// happened to run first.
    fn merge(parse: Vec<String>, validate: Vec<String>) -> Vec<String> {
        parse.into_iter().chain(validate).collect()
    }
}

/// Parses and validates a provider manifest document. Structural problems
/// (bad labels, non-string array entries) come from the parser; semantic
/// problems (duplicate labels, malformed versions/platforms, empty
/// document) come from the validator. Diagnostics from both stages are
/// merged into a single `ManifestError::Invalid`.
pub fn parse_provider_manifest(text: &str) -> Result<ProviderManifest, ManifestError> {
    let (manifest, parse_diagnostics) = parse::parse_provider_manifest(text)?;
    let validate_diagnostics = validate::validate_provider_manifest(&manifest);
    let diagnostics = ManifestError::merge(parse_diagnostics, validate_diagnostics);
    if !diagnostics.is_empty() {
        return Err(ManifestError::Invalid { diagnostics });
    }
    Ok(manifest)
}

pub fn parse_module_manifest(text: &str) -> Result<ModuleManifest, ManifestError> {
    let (manifest, parse_diagnostics) = parse::parse_module_manifest(text)?;
    let validate_diagnostics = validate::validate_module_manifest(&manifest);
    let diagnostics = ManifestError::merge(parse_diagnostics, validate_diagnostics);
    if !diagnostics.is_empty() {
        return Err(ManifestError::Invalid { diagnostics });
    }
    Ok(manifest)
}

/// Renders a provider manifest back to HCL text. Used by the admin upload
/// handler's round-trip property test and by nothing in production code —
/// manifests are write-once, administrator-authored documents.
pub fn render_provider_manifest(manifest: &ProviderManifest) -> String {
    let mut out = String::new();
    for entry in &manifest.entries {
        out.push_str(&format!(
            "provider \"{}\" {{\n  versions = [{}]\n  platforms = [{}]\n}}\n",
            entry.label(),
            render_string_array(&entry.versions),
            render_string_array(&entry.platforms),
        ));
    }
    out
}

pub fn render_module_manifest(manifest: &ModuleManifest) -> String {
    let mut out = String::new();
    for entry in &manifest.entries {
        out.push_str(&format!(
            "module \"{}\" {{\n  versions = [{}]\n}}\n",
            entry.label(),
            render_string_array(&entry.versions),
        ));
    }
    out
}

fn render_string_array(items: &[String]) -> String {
    items.iter().map(|item| format!("\"{item}\"")).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_valid_provider_manifest() {
        let text = r#"
provider "hashicorp/random" {
  versions = ["3.5.1", "3.6.0"]
  platforms = ["linux_amd64", "darwin_arm64"]
}
"#;
        let parsed = parse_provider_manifest(text).unwrap();
        let rendered = render_provider_manifest(&parsed);
        let reparsed = parse_provider_manifest(&rendered).unwrap();
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn round_trips_a_valid_module_manifest() {
        let text = r#"
module "hashicorp/consul/aws" {
  versions = ["0.1.0"]
}
"#;
        let parsed = parse_module_manifest(text).unwrap();
        let rendered = render_module_manifest(&parsed);
        let reparsed = parse_module_manifest(&rendered).unwrap();
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn empty_document_is_invalid() {
        let result = parse_provider_manifest("");
        assert!(matches!(result, Err(ManifestError::Invalid { .. })));
    }

    #[test]
    fn duplicate_labels_are_invalid() {
        let text = r#"
provider "hashicorp/random" { versions = ["1.0.0"] platforms = ["linux_amd64"] }
provider "hashicorp/random" { versions = ["1.0.1"] platforms = ["linux_amd64"] }
"#;
        let result = parse_provider_manifest(text);
        assert!(matches!(result, Err(ManifestError::Invalid { .. })));
    }

    #[test]
    fn malformed_version_is_invalid() {
        let text = r#"
provider "hashicorp/random" { versions = ["not-a-version"] platforms = ["linux_amd64"] }
"#;
        assert!(parse_provider_manifest(text).is_err());
    }

    #[test]
    fn malformed_platform_is_invalid() {
        let text = r#"
provider "hashicorp/random" { versions = ["1.0.0"] platforms = ["LinuxAmd64"] }
"#;
        assert!(parse_provider_manifest(text).is_err());
    }

    /// A structural problem (the parser's stage) and a semantic one (the
    /// validator's stage) in the same document must both surface in one
    /// `ManifestError::Invalid`, not just whichever stage runs first.
    #[test]
    fn aggregates_diagnostics_from_both_parse_and_validate_stages() {
        let text = r#"
provider "hashicorp/random" { versions = [1] platforms = ["linux_amd64"] }
provider "hashicorp/consul" { versions = ["not-a-version"] platforms = ["linux_amd64"] }
"#;
        let Err(ManifestError::Invalid { diagnostics }) = parse_provider_manifest(text) else {
            panic!("expected an aggregated validation error");
        };

        assert!(diagnostics.iter().any(|d| d.contains("non-string entry")), "missing parse-stage diagnostic: {diagnostics:?}");
        assert!(diagnostics.iter().any(|d| d.contains("malformed version")), "missing validate-stage diagnostic: {diagnostics:?}");
    }
}
