//! Source-string classification for the Module Rewriter (spec §4.5 step 3).

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceClass {
    /// `./...` or `../...` — a local path, never rewritten.
    Relative,
    /// Any address naming an explicit scheme (`https://`, `git::...`,
    /// `s3::...`, ...), never rewritten.
    UrlScheme,
    /// `user@host:path` ssh-style git remote, never rewritten.
    SshGit,
    /// Already targeted at the configured mirror hostname.
    AlreadyMirror,
    /// `namespace/name/system` (public) or `hostname/namespace/name/system`
    /// (private) — rewritten to `mirror_hostname/namespace/name/system`.
    Registry { namespace: String, name: String, system: String },
    /// Anything else: left untouched (conservative default).
    Other,
}

pub fn classify_source(source: &str, mirror_hostname: &str) -> SourceClass {
    if source.starts_with("./") || source.starts_with("../") {
        return SourceClass::Relative;
    }
    if source.contains("://") {
        return SourceClass::UrlScheme;
    }
    if !mirror_hostname.is_empty() && (source == mirror_hostname || source.starts_with(&format!("{mirror_hostname}/")))
    {
        return SourceClass::AlreadyMirror;
    }
    if is_ssh_style(source) {
        return SourceClass::SshGit;
    }

    let parts: Vec<&str> = source.split('/').collect();
    match parts.as_slice() {
        [namespace, name, system] => SourceClass::Registry {
            namespace: namespace.to_string(),
            name: name.to_string(),
            system: system.to_string(),
        },
        [_hostname, namespace, name, system] => SourceClass::Registry {
            namespace: namespace.to_string(),
            name: name.to_string(),
            system: system.to_string(),
        },
        _ => SourceClass::Other,
    }
}

/// `user@host:path` — an `@` before the first `:` and no `://` anywhere
/// (already ruled out above).
fn is_ssh_style(source: &str) -> bool {
    match (source.find('@'), source.find(':')) {
        (Some(at), Some(colon)) => at < colon,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_public_registry_source() {
        assert_eq!(
            classify_source("hashicorp/consul/aws", "m.example"),
            SourceClass::Registry {
                namespace: "hashicorp".to_string(),
                name: "consul".to_string(),
                system: "aws".to_string(),
            }
        );
    }

    #[test]
    fn classifies_private_registry_source() {
        assert_eq!(
            classify_source("registry.example.com/hashicorp/consul/aws", "m.example"),
            SourceClass::Registry {
                namespace: "hashicorp".to_string(),
                name: "consul".to_string(),
                system: "aws".to_string(),
            }
        );
    }

    #[test]
    fn classifies_relative_and_url_and_ssh() {
        assert_eq!(classify_source("./local", "m.example"), SourceClass::Relative);
        assert_eq!(classify_source("../local", "m.example"), SourceClass::Relative);
        assert_eq!(classify_source("https://example.com/x.zip", "m.example"), SourceClass::UrlScheme);
        assert_eq!(classify_source("git::https://example.com/x.git", "m.example"), SourceClass::UrlScheme);
        assert_eq!(classify_source("git@github.com:org/repo.git", "m.example"), SourceClass::SshGit);
    }

    #[test]
    fn already_mirrored_source_is_untouched() {
        assert_eq!(
            classify_source("m.example/hashicorp/consul/aws", "m.example"),
            SourceClass::AlreadyMirror
        );
    }
}
