//! Manifest-to-job expansion: turns a parsed provider/module manifest into
//! a `pending` job with its items already inserted (spec §4.6 + §4.8).

use crate::db::{Db, Identity, Job, JobKind};
use crate::manifest::{self, ModuleManifest, ProviderManifest};
use crate::Result;

pub async fn submit_job(db: &Db, kind: JobKind, manifest_text: &str) -> Result<Job> {
    let identities = match kind {
        JobKind::Provider => {
            let manifest = manifest::parse_provider_manifest(manifest_text)?;
            provider_identities(&manifest)
        }
        JobKind::Module => {
            let manifest = manifest::parse_module_manifest(manifest_text)?;
            module_identities(&manifest)
        }
    };

    let job = db.create_job(kind, manifest_text).await?;
    db.insert_job_items(&job.id, &identities).await?;
    db.get_job(&job.id).await?.ok_or_else(|| crate::Error::Fatal("job vanished after item insert".into()))
}

fn provider_identities(manifest: &ProviderManifest) -> Vec<Identity> {
    let mut identities = Vec::new();
    for entry in &manifest.entries {
        for version in &entry.versions {
            for platform in &entry.platforms {
                let (os, arch) = platform.split_once('_').unwrap_or((platform.as_str(), ""));
                identities.push(Identity::Provider {
                    namespace: entry.namespace.clone(),
                    r#type: entry.provider_type.clone(),
                    version: version.clone(),
                    os: os.to_string(),
                    arch: arch.to_string(),
                });
            }
        }
    }
    identities
}

fn module_identities(manifest: &ModuleManifest) -> Vec<Identity> {
    let mut identities = Vec::new();
    for entry in &manifest.entries {
        for version in &entry.versions {
            identities.push(Identity::Module {
                namespace: entry.namespace.clone(),
                name: entry.name.clone(),
                system: entry.system.clone(),
                version: version.clone(),
            });
        }
    }
    identities
}
