use crate::answer::DEFAULT_COMPLETION_MODEL;
use crate::embeddings::EmbeddingModel;
use crate::endpoint::parse_http_url;
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::info;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub embedding_model: String,
    #[serde(alias = "qdrant_cloud_url")]
    pub vector_store_url: String,
    #[serde(default, alias = "qdrant_api_key")]
    pub vector_store_key: String,
    #[serde(default, alias = "groq_api_key")]
    pub completion_model_key: String,
    #[serde(default = "default_completion_model", alias = "llm_model")]
    pub completion_model: String,
}

fn default_completion_model() -> String {
    DEFAULT_COMPLETION_MODEL.to_string()
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("embedding_model", &self.embedding_model)
            .field("vector_store_url", &self.vector_store_url)
            .field("vector_store_key", &redact(&self.vector_store_key))
            .field("completion_model_key", &redact(&self.completion_model_key))
            .field("completion_model", &self.completion_model)
            .finish()
    }
}

impl Settings {
    pub fn validate_for_ingestion(&self) -> Result<EmbeddingModel, ConfigurationError> {
        let model = EmbeddingModel::parse(&self.embedding_model)?;
        if self.vector_store_url.trim().is_empty() {
            return Err(ConfigurationError::Missing("vector_store_url"));
        }
        parse_http_url(&self.vector_store_url).map_err(|details| ConfigurationError::InvalidUrl {
            url: self.vector_store_url.clone(),
            details,
        })?;
        Ok(model)
    }

    pub fn validate_for_query(&self) -> Result<EmbeddingModel, ConfigurationError> {
        let model = self.validate_for_ingestion()?;
        if self.completion_model_key.trim().is_empty() {
            return Err(ConfigurationError::Missing("completion_model_key"));
        }
        if self.completion_model.trim().is_empty() {
            return Err(ConfigurationError::Missing("completion_model"));
        }
        Ok(model)
    }

    pub fn vector_store_key(&self) -> Option<String> {
        let key = self.vector_store_key.trim();
        (!key.is_empty()).then(|| key.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VersionedSettings {
    pub version: u64,
    pub settings: Arc<Settings>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingsUpdate {
    pub version: u64,
    pub previous: Option<VersionedSettings>,
}

#[derive(Debug, Default)]
pub struct SettingsStore {
    current: RwLock<Option<VersionedSettings>>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, settings: Settings) -> Result<SettingsUpdate, ConfigurationError> {
        settings.validate_for_ingestion()?;

        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let version = current.as_ref().map_or(1, |previous| previous.version + 1);
        info!(version, embedding_model = %settings.embedding_model, "settings updated");

        let previous = current.replace(VersionedSettings {
            version,
            settings: Arc::new(settings),
        });
        Ok(SettingsUpdate { version, previous })
    }

    pub fn snapshot(&self) -> Result<VersionedSettings, ConfigurationError> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or(ConfigurationError::NotConfigured)
    }
}

#[cfg(test)]
pub(crate) fn test_settings(embedding_model: &str) -> Settings {
    Settings {
        embedding_model: embedding_model.to_string(),
        vector_store_url: "http://localhost:6333".to_string(),
        vector_store_key: "store-key".to_string(),
        completion_model_key: "llm-key".to_string(),
        completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_store_is_a_configuration_error() {
        let store = SettingsStore::new();
        assert!(matches!(
            store.snapshot(),
            Err(ConfigurationError::NotConfigured)
        ));
    }

    #[test]
    fn update_returns_new_version_and_previous_record() -> Result<(), ConfigurationError> {
        let store = SettingsStore::new();
        let first = store.update(test_settings("ngram-hash"))?;
        assert_eq!(first.version, 1);
        assert!(first.previous.is_none());

        let second = store.update(test_settings("all-MiniLM-L6-v2"))?;
        assert_eq!(second.version, 2);
        let previous = second.previous.ok_or(ConfigurationError::NotConfigured)?;
        assert_eq!(previous.version, 1);
        assert_eq!(previous.settings.embedding_model, "ngram-hash");

        let current = store.snapshot()?;
        assert_eq!(current.version, 2);
        assert_eq!(current.settings.embedding_model, "all-MiniLM-L6-v2");
        Ok(())
    }

    #[test]
    fn concurrent_writers_each_get_their_own_version() -> Result<(), ConfigurationError> {
        let store = Arc::new(SettingsStore::new());
        let writers: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.update(test_settings("ngram-hash")))
            })
            .collect();

        let mut versions = Vec::new();
        for writer in writers {
            let update = writer
                .join()
                .map_err(|_| ConfigurationError::NotConfigured)??;
            assert_eq!(
                update.previous.map(|previous| previous.version + 1).unwrap_or(1),
                update.version
            );
            versions.push(update.version);
        }
        versions.sort_unstable();
        assert_eq!(versions, (1..=8).collect::<Vec<u64>>());
        assert_eq!(store.snapshot()?.version, 8);
        Ok(())
    }

    #[test]
    fn empty_vector_store_key_is_optional() -> Result<(), ConfigurationError> {
        let mut settings = test_settings("ngram-hash");
        settings.vector_store_key = "  ".to_string();
        settings.validate_for_query()?;
        assert_eq!(settings.vector_store_key(), None);
        Ok(())
    }

    #[test]
    fn snapshots_are_unaffected_by_later_writes() -> Result<(), ConfigurationError> {
        let store = SettingsStore::new();
        store.update(test_settings("ngram-hash"))?;
        let snapshot = store.snapshot()?;
        store.update(test_settings("ngram-hash:64"))?;
        assert_eq!(snapshot.settings.embedding_model, "ngram-hash");
        Ok(())
    }

    #[test]
    fn invalid_url_is_rejected_and_keeps_old_value() -> Result<(), ConfigurationError> {
        let store = SettingsStore::new();
        store.update(test_settings("ngram-hash"))?;

        let mut broken = test_settings("ngram-hash");
        broken.vector_store_url = "qdrant without scheme".to_string();
        assert!(matches!(
            store.update(broken),
            Err(ConfigurationError::InvalidUrl { .. })
        ));
        assert_eq!(store.snapshot()?.version, 1);
        Ok(())
    }

    #[test]
    fn query_needs_completion_key() {
        let mut settings = test_settings("ngram-hash");
        settings.completion_model_key.clear();
        assert!(settings.validate_for_ingestion().is_ok());
        assert!(matches!(
            settings.validate_for_query(),
            Err(ConfigurationError::Missing("completion_model_key"))
        ));
    }

    #[test]
    fn legacy_field_names_are_accepted() -> Result<(), serde_json::Error> {
        let settings: Settings = serde_json::from_str(
            r#"{
                "qdrant_api_key": "k",
                "qdrant_cloud_url": "https://cloud.qdrant.io",
                "embedding_model": "all-MiniLM-L6-v2",
                "groq_api_key": "g"
            }"#,
        )?;
        assert_eq!(settings.vector_store_url, "https://cloud.qdrant.io");
        assert_eq!(settings.completion_model_key, "g");
        assert_eq!(settings.completion_model, DEFAULT_COMPLETION_MODEL);
        Ok(())
    }

    #[test]
    fn debug_output_hides_keys() {
        let rendered = format!("{:?}", test_settings("ngram-hash"));
        assert!(!rendered.contains("store-key"));
        assert!(!rendered.contains("llm-key"));
    }
}
