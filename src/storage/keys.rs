//! Centralized storage key construction (spec §4.1, normative layout).
//!
//! No other module builds a storage key string directly.

/// `providers/{hostname}/{namespace}/{type}/{version}/{os}_{arch}/{filename}`
pub fn provider_key(
    upstream_hostname: &str,
    namespace: &str,
    provider_type: &str,
    version: &str,
    os: &str,
    arch: &str,
    filename: &str,
) -> String {
    format!(
        "providers/{upstream_hostname}/{namespace}/{provider_type}/{version}/{os}_{arch}/{filename}"
    )
}

/// `modules/{namespace}/{name}/{system}/{version}/{filename}`
pub fn module_key(namespace: &str, name: &str, system: &str, version: &str, filename: &str) -> String {
    format!("modules/{namespace}/{name}/{system}/{version}/{filename}")
}

/// Checksum sidecar key: `<key>_SHA256SUMS`.
pub fn sidecar_checksum_key(base_key: &str) -> String {
    format!("{base_key}_SHA256SUMS")
}

/// Signature sidecar key: `<key>_SHA256SUMS.sig`.
pub fn sidecar_signature_key(base_key: &str) -> String {
    format!("{base_key}_SHA256SUMS.sig")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_key_matches_layout() {
        let key = provider_key(
            "registry.terraform.io",
            "hashicorp",
            "random",
            "3.5.1",
            "linux",
            "amd64",
            "terraform-provider-random_3.5.1_linux_amd64.zip",
        );
        assert_eq!(
            key,
            "providers/registry.terraform.io/hashicorp/random/3.5.1/linux_amd64/terraform-provider-random_3.5.1_linux_amd64.zip"
        );
    }

    #[test]
    fn module_key_matches_layout() {
        let key = module_key("foo", "bar", "baz", "1.0.0", "module.tar.gz");
        assert_eq!(key, "modules/foo/bar/baz/1.0.0/module.tar.gz");
    }

    #[test]
    fn sidecar_keys_append_suffixes() {
        assert_eq!(sidecar_checksum_key("k"), "k_SHA256SUMS");
        assert_eq!(sidecar_signature_key("k"), "k_SHA256SUMS.sig");
    }
}
