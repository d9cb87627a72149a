use crate::config::MetadataSourceConfig;
use crate::document::MetadataDocument;
use crate::readiness::CheckFailure;
use crate::resources::ConfigMapLister;

/// Location of the discovery document every replica is expected to serve.
#[derive(Clone, Debug)]
pub struct ReferenceSource {
    namespace: String,
    name: String,
    key: String,
}

impl ReferenceSource {
    pub fn new(config: &MetadataSourceConfig) -> Self {
        Self {
            namespace: config.namespace.clone(),
            name: config.name.clone(),
            key: config.key.clone(),
        }
    }

    pub fn fetch(&self, config_maps: &dyn ConfigMapLister) -> Result<MetadataDocument, CheckFailure> {
        let config_map = config_maps
            .config_map(&self.namespace, &self.name)
            .ok_or_else(|| CheckFailure::MissingResource {
                namespace: self.namespace.clone(),
                name: self.name.clone(),
            })?;

        let raw = config_map
            .data
            .as_ref()
            .and_then(|data| data.get(&self.key))
            .filter(|value| !value.is_empty())
            .ok_or_else(|| CheckFailure::MissingKey {
                namespace: self.namespace.clone(),
                name: self.name.clone(),
                key: self.key.clone(),
            })?;

        MetadataDocument::parse(raw.as_bytes()).map_err(|err| CheckFailure::MalformedDocument {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            key: self.key.clone(),
            reason: err.to_string(),
        })
    }
}
