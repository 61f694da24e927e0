//! Manifest loading
//!
//! ```yaml
//! resources:
//!   - kind: compute
//!     key: web-1
//!     config:
//!       name: web-1
//!       rg_id: 42
//! ```

use anyhow::{Context, bail};
use gridform_cloud::{Attributes, resource_key};
use gridform_provider::Registry;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

pub const DEFAULT_MANIFEST: &str = "gridform-manifest.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub resources: Vec<ManifestResource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestResource {
    pub kind: String,
    pub key: String,
    #[serde(default)]
    pub config: Attributes,
}

impl ManifestResource {
    /// Key in the state file
    pub fn state_key(&self) -> String {
        resource_key(&self.kind, &self.key)
    }

    /// `kind.key`
    pub fn address(&self) -> String {
        format!("{}.{}", self.kind, self.key)
    }

    /// Declared config with schema defaults filled in, validated
    pub fn resolved_config(&self, registry: &Registry) -> anyhow::Result<Attributes> {
        let schema = registry.schema(&self.kind)?;
        let mut config = self.config.clone();
        schema.apply_defaults(&mut config);
        schema
            .validate(&config)
            .with_context(|| format!("invalid config for {}", self.address()))?;
        Ok(config)
    }
}

impl Manifest {
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(content)?;
        manifest.check()?;
        Ok(manifest)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read manifest {}", path.display()))?;
        let manifest = Self::parse(&content)
            .with_context(|| format!("invalid manifest {}", path.display()))?;
        tracing::debug!(path = %path.display(), resources = manifest.resources.len(), "Loaded manifest");
        Ok(manifest)
    }

    fn check(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for res in &self.resources {
            if res.kind.is_empty() || res.key.is_empty() {
                bail!("every resource needs a kind and a key");
            }
            if res.key.contains(':') {
                bail!("resource key '{}' must not contain ':'", res.key);
            }
            if !seen.insert(res.state_key()) {
                bail!("{} is declared twice", res.address());
            }
        }
        Ok(())
    }

    pub fn get(&self, state_key: &str) -> Option<&ManifestResource> {
        self.resources.iter().find(|r| r.state_key() == state_key)
    }
}
