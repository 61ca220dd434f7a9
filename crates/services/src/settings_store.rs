//! Persisted panel settings.
//!
//! Old panel builds stored each setting under its own flat key. On first
//! load those are folded into one [`Settings`] document, written under
//! [`SETTINGS_KEY`], and the flat keys are deleted.

use crate::conversation_store::{SaveStatus, StoreError};
use crate::kv::KeyValueStore;
use crate::schema::SchemaLoader;
use serde_json::Value;
use shared::settings::{ProviderKind, Settings};
use std::sync::Arc;

pub const SETTINGS_KEY: &str = "letterblack_genai_api_settings";

const LEGACY_PROVIDER: &str = "ai_provider";
const LEGACY_MODEL: &str = "ai_model";
const LEGACY_API_KEY: &str = "api_key";
const LEGACY_TEMPERATURE: &str = "temperature";
const LEGACY_MAX_TOKENS: &str = "max_tokens";
const LEGACY_KEYS: [&str; 5] = [
    LEGACY_PROVIDER,
    LEGACY_MODEL,
    LEGACY_API_KEY,
    LEGACY_TEMPERATURE,
    LEGACY_MAX_TOKENS,
];

/// v0 → v1: an un-enveloped settings object is already the v1 shape.
fn upgrade_v0(value: Value) -> Result<Value, String> {
    if value.is_object() {
        Ok(value)
    } else {
        Err("settings document is not an object".into())
    }
}

fn settings_loader() -> SchemaLoader {
    SchemaLoader::new(vec![upgrade_v0])
}

pub struct SettingsStore {
    backend: Arc<dyn KeyValueStore>,
    loader: SchemaLoader,
    settings: Settings,
}

impl SettingsStore {
    pub fn open(backend: Arc<dyn KeyValueStore>) -> Result<Self, StoreError> {
        let loader = settings_loader();
        let mut store = Self {
            backend,
            loader,
            settings: Settings::default(),
        };

        if let Some(raw) = store.backend.get(SETTINGS_KEY)? {
            let loaded = store.loader.load(&raw)?;
            let migrated = loaded.migrated(store.loader.current_version());
            store.settings = serde_json::from_value(loaded.data)?;
            if migrated {
                let _ = store.persist();
            }
        } else if let Some(settings) = store.read_legacy_keys()? {
            tracing::info!(provider = %settings.provider, "migrated legacy flat settings");
            store.settings = settings;
            if store.persist().is_saved() {
                for key in LEGACY_KEYS {
                    if let Err(e) = store.backend.remove(key) {
                        tracing::warn!(key, error = %e, "could not remove legacy setting");
                    }
                }
            }
        }

        Ok(store)
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn save(&mut self, settings: Settings) -> SaveStatus {
        self.settings = settings;
        self.persist()
    }

    pub fn update(&mut self, f: impl FnOnce(&mut Settings)) -> SaveStatus {
        f(&mut self.settings);
        self.persist()
    }

    fn persist(&self) -> SaveStatus {
        let result = self
            .loader
            .wrap(&self.settings)
            .map_err(|e| e.to_string())
            .and_then(|raw| {
                self.backend
                    .set(SETTINGS_KEY, &raw)
                    .map_err(|e| e.to_string())
            });
        match result {
            Ok(()) => SaveStatus::Saved,
            Err(reason) => {
                tracing::warn!(%reason, "failed to persist settings");
                SaveStatus::Failed(reason)
            }
        }
    }

    fn read_legacy_keys(&self) -> Result<Option<Settings>, StoreError> {
        let mut found = false;
        let mut read = |key: &str| -> Result<Option<String>, StoreError> {
            let value = self.backend.get(key)?.map(|raw| unquote(&raw));
            found |= value.is_some();
            Ok(value.filter(|v| !v.is_empty()))
        };

        let provider = read(LEGACY_PROVIDER)?;
        let model = read(LEGACY_MODEL)?;
        let api_key = read(LEGACY_API_KEY)?;
        let temperature = read(LEGACY_TEMPERATURE)?;
        let max_tokens = read(LEGACY_MAX_TOKENS)?;
        if !found {
            return Ok(None);
        }

        let mut settings = Settings::default();
        if let Some(p) = provider {
            match p.parse::<ProviderKind>() {
                Ok(kind) => settings.provider = kind,
                Err(e) => tracing::warn!(error = %e, "ignoring legacy provider"),
            }
        }
        if let Some(m) = model {
            settings.model = m;
        }
        if let Some(k) = api_key {
            settings.set_api_key(settings.provider, k);
        }
        if let Some(t) = temperature.and_then(|t| t.parse::<f32>().ok()) {
            settings.temperature = t.clamp(0.0, 2.0);
        }
        if let Some(n) = max_tokens.and_then(|n| n.parse::<u32>().ok()) {
            settings.max_tokens = n;
        }
        Ok(Some(settings))
    }
}

/// Flat values may have been stored JSON-encoded (`"\"gemini\""`) or raw.
fn unquote(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::String(s)) => s.trim().to_string(),
        Ok(Value::Number(n)) => n.to_string(),
        _ => raw.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    #[test]
    fn test_defaults_when_empty() {
        let backend = Arc::new(MemoryStore::new());
        let store = SettingsStore::open(backend.clone()).unwrap();
        assert_eq!(store.get(), &Settings::default());
        assert_eq!(backend.get(SETTINGS_KEY).unwrap(), None);
    }

    #[test]
    fn test_save_and_reload() {
        let backend = Arc::new(MemoryStore::new());
        let mut store = SettingsStore::open(backend.clone()).unwrap();
        let status = store.update(|s| {
            s.provider = ProviderKind::Claude;
            s.set_api_key(ProviderKind::Claude, "ant-123");
            s.max_tokens = 512;
        });
        assert!(status.is_saved());

        let reopened = SettingsStore::open(backend).unwrap();
        assert_eq!(reopened.get().provider, ProviderKind::Claude);
        assert_eq!(reopened.get().max_tokens, 512);
        assert_eq!(
            reopened
                .get()
                .api_key_for(ProviderKind::Claude)
                .unwrap()
                .expose(),
            "ant-123"
        );
    }

    #[test]
    fn test_legacy_flat_keys_are_migrated_once() {
        let backend = Arc::new(MemoryStore::new());
        backend.set(LEGACY_PROVIDER, "\"openai\"").unwrap();
        backend.set(LEGACY_API_KEY, "sk-legacy").unwrap();
        backend.set(LEGACY_TEMPERATURE, "0.2").unwrap();
        backend.set(LEGACY_MAX_TOKENS, "1000").unwrap();

        let store = SettingsStore::open(backend.clone()).unwrap();
        let s = store.get();
        assert_eq!(s.provider, ProviderKind::OpenAi);
        assert_eq!(s.api_keys[&ProviderKind::OpenAi].expose(), "sk-legacy");
        assert!((s.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(s.max_tokens, 1000);

        for key in LEGACY_KEYS {
            assert_eq!(backend.get(key).unwrap(), None);
        }
        assert!(backend.get(SETTINGS_KEY).unwrap().is_some());
    }

    #[test]
    fn test_unversioned_document_is_upgraded() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .set(SETTINGS_KEY, r#"{"provider":"groq","max_tokens":64}"#)
            .unwrap();
        let store = SettingsStore::open(backend.clone()).unwrap();
        assert_eq!(store.get().provider, ProviderKind::Groq);
        assert_eq!(store.get().max_tokens, 64);
        let raw = backend.get(SETTINGS_KEY).unwrap().unwrap();
        assert!(raw.starts_with(r#"{"schema_version":1"#));
    }

    #[test]
    fn test_document_without_provider_loads() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .set(SETTINGS_KEY, r#"{"schema_version":1,"data":{"model":"gpt-4o"}}"#)
            .unwrap();
        let store = SettingsStore::open(backend).unwrap();
        assert_eq!(store.get().provider, ProviderKind::Gemini);
        assert_eq!(store.get().model, "gpt-4o");
    }
}
