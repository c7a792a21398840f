use super::openai::OpenAiImageProvider;
use super::pollinations::PollinationsProvider;
use super::seedream::SeedreamProvider;
use super::traits::ImageProvider;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Resolve API key for a provider from config and environment variables.
///
/// Resolution order:
/// 1. Explicitly provided `api_key` parameter (trimmed, filtered if empty)
/// 2. Provider-specific environment variable (e.g., `OPENAI_API_KEY`,
///    `ARK_API_KEY`)
/// 3. Generic fallback variables (`BESTSHOT_API_KEY`, `API_KEY`)
fn resolve_api_key(name: &str, explicit_api_key: Option<&str>) -> Option<String> {
    if let Some(key) = explicit_api_key.map(str::trim).filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }

    let provider_env_candidates: Vec<&str> = match name {
        "openai" | "dalle" => vec!["OPENAI_API_KEY"],
        "seedream" | "doubao" => vec!["ARK_API_KEY", "DOUBAO_API_KEY"],
        _ => vec![],
    };

    for env_var in provider_env_candidates {
        if let Ok(value) = std::env::var(env_var) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    for env_var in ["BESTSHOT_API_KEY", "API_KEY"] {
        if let Ok(value) = std::env::var(env_var) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    None
}

pub fn create_provider(
    name: &str,
    api_key: Option<&str>,
) -> anyhow::Result<Arc<dyn ImageProvider>> {
    let resolved_key = resolve_api_key(name, api_key);
    let api_key = resolved_key.as_deref();
    match name {
        "openai" | "dalle" => Ok(Arc::new(OpenAiImageProvider::new(api_key))),
        "seedream" | "doubao" => Ok(Arc::new(SeedreamProvider::new(api_key))),
        "pollinations" => Ok(Arc::new(PollinationsProvider::new())),
        _ => anyhow::bail!(
            "Unknown provider: {name}. Supported providers: openai, seedream, pollinations."
        ),
    }
}

/// Name-keyed adapter lookup. Adding a vendor means adding a factory arm and
/// registering it here; orchestrator logic never changes.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn ImageProvider>>,
}

/// Adapters the factory knows how to build.
pub const BUILTIN_PROVIDERS: [&str; 3] = ["openai", "seedream", "pollinations"];

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry over every built-in adapter.
    pub fn with_builtins(fallback_api_key: Option<&str>) -> Self {
        Self::from_names(BUILTIN_PROVIDERS, fallback_api_key)
    }

    /// Build adapters for every name in the list. Unknown names are skipped
    /// with a warning so one typo does not take down the whole registry.
    pub fn from_names<I, S>(names: I, fallback_api_key: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for name in names {
            let name = name.as_ref();
            match create_provider(name, fallback_api_key) {
                Ok(provider) => registry.register(name, provider),
                Err(error) => {
                    tracing::warn!(provider = name, "Ignoring unknown provider: {error}");
                }
            }
        }
        registry
    }

    pub fn register(&mut self, name: &str, provider: Arc<dyn ImageProvider>) {
        self.providers.insert(name.to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ImageProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_builds_known_providers() {
        for name in ["openai", "seedream", "pollinations"] {
            let provider = create_provider(name, Some("test-key")).unwrap();
            assert!(!provider.name().is_empty());
        }
    }

    #[test]
    fn factory_rejects_unknown_provider() {
        let err = match create_provider("midjourney", None) {
            Ok(_) => panic!("expected error for unknown provider"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn registry_skips_unknown_names() {
        let registry = ProviderRegistry::from_names(["pollinations", "not-a-vendor"], None);
        assert!(registry.get("pollinations").is_some());
        assert!(registry.get("not-a-vendor").is_none());
        assert_eq!(registry.names(), vec!["pollinations"]);
    }

    #[test]
    fn registry_aliases_resolve_to_same_adapter_kind() {
        let registry = ProviderRegistry::from_names(["dalle"], Some("key"));
        assert_eq!(registry.get("dalle").unwrap().name(), "openai");
    }
}
