/// One `provider "<namespace>/<type>" { versions = [...]; platforms = [...] }`
/// block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEntry {
    pub namespace: String,
    pub provider_type: String,
    pub versions: Vec<String>,
    pub platforms: Vec<String>,
}

impl ProviderEntry {
    pub fn label(&self) -> String {
        format!("{}/{}", self.namespace, self.provider_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderManifest {
    pub entries: Vec<ProviderEntry>,
}

/// One `module "<namespace>/<name>/<system>" { versions = [...] }` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEntry {
    pub namespace: String,
    pub name: String,
    pub system: String,
    pub versions: Vec<String>,
}

impl ModuleEntry {
    pub fn label(&self) -> String {
        format!("{}/{}/{}", self.namespace, self.name, self.system)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleManifest {
    pub entries: Vec<ModuleEntry>,
}
