//! Namespace allow/block list evaluation (spec §4.9).

use std::collections::HashSet;

use crate::config::AutoDownloadConfig;

pub struct Decision {
    pub allow: bool,
    pub reason: Option<String>,
}

pub fn evaluate(config: &AutoDownloadConfig, namespace: &str) -> Decision {
    let blocked: HashSet<&str> = config.blocked_namespaces.iter().map(String::as_str).collect();
    if blocked.contains(namespace) {
        return Decision { allow: false, reason: Some(format!("namespace \"{namespace}\" is blocked")) };
    }

    if !config.allowed_namespaces.is_empty() {
        let allowed: HashSet<&str> = config.allowed_namespaces.iter().map(String::as_str).collect();
        if !allowed.contains(namespace) {
            return Decision {
                allow: false,
                reason: Some(format!("namespace \"{namespace}\" is not in the allow list")),
            };
        }
    }

    Decision { allow: true, reason: None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_namespace_is_denied_even_if_also_allowed() {
        let config = AutoDownloadConfig {
            allowed_namespaces: vec!["hashicorp".to_string()],
            blocked_namespaces: vec!["hashicorp".to_string()],
            ..AutoDownloadConfig::default()
        };
        assert!(!evaluate(&config, "hashicorp").allow);
    }

    #[test]
    fn empty_allow_list_permits_anything_not_blocked() {
        let config = AutoDownloadConfig::default();
        assert!(evaluate(&config, "anyone").allow);
    }

    #[test]
    fn nonempty_allow_list_excludes_everything_else() {
        let config = AutoDownloadConfig { allowed_namespaces: vec!["hashicorp".to_string()], ..AutoDownloadConfig::default() };
        assert!(evaluate(&config, "hashicorp").allow);
        assert!(!evaluate(&config, "someone-else").allow);
    }
}
