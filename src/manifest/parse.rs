use hcl::{Body, Expression};

use super::model::{ModuleEntry, ModuleManifest, ProviderEntry, ProviderManifest};
use super::ManifestError;

/// Parses a provider manifest document (zero or more `provider "ns/type" {
/// versions = [...]; platforms = [...] }` blocks) using `hcl-rs`'s generic
/// AST — manifests are consumed, not edited, so there is no formatting to
/// preserve and no need for the structure-preserving editor used by the
/// rewriter.
/// Structural parse only: collects per-block diagnostics (missing label,
/// malformed label shape, non-string array entries) without failing early,
/// so `mod.rs` can merge them with the validator's semantic diagnostics into
/// one aggregated error. Only a document that isn't HCL at all (the
/// `hcl::from_str` call itself) fails immediately — there's no partial
/// manifest to validate in that case.
pub fn parse_provider_manifest(text: &str) -> Result<(ProviderManifest, Vec<String>), ManifestError> {
    let body: Body = hcl::from_str(text).map_err(|err| ManifestError::Invalid { diagnostics: vec![err.to_string()] })?;

    let mut entries = Vec::new();
    let mut diagnostics = Vec::new();

    for block in body.blocks().filter(|block| block.identifier() == "provider") {
        let Some(label) = block.labels().first().map(|label| label.as_str()) else {
            diagnostics.push("provider block is missing its label".to_string());
            continue;
        };

        let Some((namespace, provider_type)) = label.split_once('/') else {
            diagnostics.push(format!("provider label \"{label}\" must be of the form <namespace>/<type>"));
            continue;
        };

        let versions = string_array_attribute(block.body(), "versions", &mut diagnostics, label);
        let platforms = string_array_attribute(block.body(), "platforms", &mut diagnostics, label);

        entries.push(ProviderEntry {
            namespace: namespace.to_string(),
            provider_type: provider_type.to_string(),
            versions,
            platforms,
        });
    }

    Ok((ProviderManifest { entries }, diagnostics))
}

/// Parses a module manifest document (`module "ns/name/system" { versions =
/// [...] }` blocks). See `parse_provider_manifest` for why diagnostics are
/// returned rather than failing early.
pub fn parse_module_manifest(text: &str) -> Result<(ModuleManifest, Vec<String>), ManifestError> {
    let body: Body = hcl::from_str(text).map_err(|err| ManifestError::Invalid { diagnostics: vec![err.to_string()] })?;

    let mut entries = Vec::new();
    let mut diagnostics = Vec::new();

    for block in body.blocks().filter(|block| block.identifier() == "module") {
        let Some(label) = block.labels().first().map(|label| label.as_str()) else {
            diagnostics.push("module block is missing its label".to_string());
            continue;
        };

        let parts: Vec<&str> = label.splitn(3, '/').collect();
        let [namespace, name, system] = parts.as_slice() else {
            diagnostics.push(format!("module label \"{label}\" must be of the form <namespace>/<name>/<system>"));
            continue;
        };

        let versions = string_array_attribute(block.body(), "versions", &mut diagnostics, label);

        entries.push(ModuleEntry {
            namespace: namespace.to_string(),
            name: name.to_string(),
            system: system.to_string(),
            versions,
        });
    }

    Ok((ModuleManifest { entries }, diagnostics))
}

fn string_array_attribute(body: &Body, key: &str, diagnostics: &mut Vec<String>, label: &str) -> Vec<String> {
    let Some(attribute) = body.attributes().find(|attribute| attribute.key() == key) else {
        return Vec::new();
    };

    match attribute.expr() {
        Expression::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Expression::String(value) => Some(value.clone()),
                other => {
                    diagnostics.push(format!("{label}.{key} contains a non-string entry: {other:?}"));
                    None
                }
            })
            .collect(),
        other => {
            diagnostics.push(format!("{label}.{key} must be an array of strings, got {other:?}"));
            Vec::new()
        }
    }
}
