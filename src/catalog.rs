//! The grammar/theme catalog: maps user-facing language names (through an
//! alias table) to grammar scope names, and theme identifiers or labels to
//! theme file locations. Built-in manifests can be merged with manifests
//! contributed by downloaded editor extensions, which are persisted through
//! a key-value cache for the lifetime of the process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::VermiglioResult;

/// One grammar as declared in a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarManifestEntry {
    /// TextMate scope name, e.g. `source.js`
    #[serde(rename = "scopeName")]
    pub scope_name: String,
    /// Primary language name users refer to
    pub language: String,
    /// Numeric id encoded into token metadata
    #[serde(rename = "languageId")]
    pub language_id: u32,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// One theme as declared in a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeManifestEntry {
    /// Stable identifier, e.g. `Default Dark+`
    pub id: String,
    /// Human-facing label, also accepted for lookup
    #[serde(default)]
    pub label: Option<String>,
    pub path: PathBuf,
}

/// Manifest contributed by a built-in table or a downloaded extension
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub grammars: Vec<GrammarManifestEntry>,
    #[serde(default)]
    pub themes: Vec<ThemeManifestEntry>,
}

/// Session-scoped key-value cache used to carry extension manifests across
/// calls within one process. Not persisted across runs.
pub trait KeyValueCache {
    fn get(&self, key: &str) -> Option<serde_json::Value>;
    fn set(&mut self, key: &str, value: serde_json::Value);
}

/// The in-memory default cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<String, serde_json::Value>,
}

impl KeyValueCache for MemoryCache {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: serde_json::Value) {
        self.entries.insert(key.to_string(), value);
    }
}

const MANIFEST_CACHE_KEY: &str = "vermiglio/extension-manifests";

#[derive(Debug, Clone)]
struct LanguageEntry {
    scope_name: String,
    language_id: u32,
}

/// Lookup tables merged from all known manifests
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    // language name or alias (lowercased) -> grammar
    languages: HashMap<String, LanguageEntry>,
    // theme id or label (lowercased) -> file path
    themes: HashMap<String, PathBuf>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_manifest(manifest: Manifest) -> Self {
        let mut catalog = Self::new();
        catalog.merge_manifest(manifest);
        catalog
    }

    /// Merges a manifest in. Later manifests win on name collisions, so
    /// extension manifests override built-in ones.
    pub fn merge_manifest(&mut self, manifest: Manifest) {
        for grammar in manifest.grammars {
            let entry = LanguageEntry {
                scope_name: grammar.scope_name,
                language_id: grammar.language_id,
            };
            for alias in &grammar.aliases {
                self.languages.insert(alias.to_lowercase(), entry.clone());
            }
            self.languages
                .insert(grammar.language.to_lowercase(), entry);
        }
        for theme in manifest.themes {
            if let Some(label) = &theme.label {
                self.themes.insert(label.to_lowercase(), theme.path.clone());
            }
            self.themes.insert(theme.id.to_lowercase(), theme.path);
        }
    }

    /// Merges every extension manifest previously stored in the cache
    pub fn merge_cached_manifests(&mut self, cache: &dyn KeyValueCache) -> VermiglioResult<()> {
        let Some(value) = cache.get(MANIFEST_CACHE_KEY) else {
            return Ok(());
        };
        let manifests: Vec<Manifest> = serde_json::from_value(value)?;
        for manifest in manifests {
            self.merge_manifest(manifest);
        }
        Ok(())
    }

    /// Appends an extension manifest to the cached list
    pub fn store_manifest(
        cache: &mut dyn KeyValueCache,
        manifest: &Manifest,
    ) -> VermiglioResult<()> {
        let mut manifests: Vec<Manifest> = match cache.get(MANIFEST_CACHE_KEY) {
            Some(value) => serde_json::from_value(value)?,
            None => Vec::new(),
        };
        manifests.push(manifest.clone());
        cache.set(MANIFEST_CACHE_KEY, serde_json::to_value(&manifests)?);
        Ok(())
    }

    /// Resolves a language name or alias to its grammar scope name and
    /// numeric language id
    pub fn scope_for_language(&self, language: &str) -> Option<(&str, u32)> {
        self.languages
            .get(&language.to_lowercase())
            .map(|entry| (entry.scope_name.as_str(), entry.language_id))
    }

    /// Resolves a theme identifier or label to its file path
    pub fn theme_path(&self, identifier: &str) -> Option<&Path> {
        self.themes
            .get(&identifier.to_lowercase())
            .map(|p| p.as_path())
    }
}
