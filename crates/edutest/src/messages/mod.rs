//! Localized message catalogs
//!
//! Catalogs are TOML documents whose nested tables flatten into dotted keys
//! (`[class] not_found = "..."` becomes `class.not_found`). Templates use
//! positional placeholders `{0}`, `{1}`, ... English and Finnish catalogs
//! are embedded; more can be registered at runtime. The active catalog
//! follows the process-wide [locale](crate::locale).

use crate::locale::{self, Locale};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Message keys used by the reflective layer
pub mod keys {
    #![allow(missing_docs)]

    pub const CLASS_NOT_FOUND: &str = "class.not_found";
    pub const CLASS_NOT_FOUND_PKG: &str = "class.not_found_pkg";
    pub const CLASS_WRONG_ACCESS: &str = "class.wrong_access";

    pub const CTOR_MISSING: &str = "ctor.missing";
    pub const CTOR_INACCESSIBLE: &str = "ctor.inaccessible";
    pub const CTOR_WRONG_ACCESS: &str = "ctor.wrong_access";
    pub const CTOR_INCORRECT_PARAMS: &str = "ctor.incorrect_params";
    pub const CTOR_ABSTRACT: &str = "ctor.abstract";

    pub const METHOD_MISSING: &str = "method.missing";
    pub const METHOD_INACCESSIBLE: &str = "method.inaccessible";
    pub const METHOD_WRONG_RETURN_TYPE: &str = "method.wrong_return_type";
    pub const METHOD_SHOULD_BE_STATIC: &str = "method.should_be_static";
    pub const METHOD_SHOULD_NOT_BE_STATIC: &str = "method.should_not_be_static";
    pub const METHOD_WRONG_ACCESS: &str = "method.wrong_access";
    pub const METHOD_SHOULD_BE_VOID: &str = "method.should_be_void";
    pub const METHOD_INCORRECT_PARAMS: &str = "method.incorrect_params";

    pub const EXCEPTION_WITHOUT_CUSTOM_MSG: &str = "exception.without_custom_msg";
    pub const EXCEPTION_WITH_CUSTOM_MSG: &str = "exception.with_custom_msg";
    pub const ARG_TO_STRING_FAILED: &str = "exception.arg_to_string_failed";
}

/// A set of message templates for one locale
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: FxHashMap<String, String>,
}

impl Catalog {
    /// Parse a TOML catalog
    pub fn from_toml_str(input: &str) -> Result<Self, toml::de::Error> {
        let table: toml::Table = toml::from_str(input)?;
        let mut entries = FxHashMap::default();
        flatten_table("", &table, &mut entries);
        Ok(Self { entries })
    }

    /// Add or replace a template
    pub fn insert(&mut self, key: impl Into<String>, template: impl Into<String>) {
        self.entries.insert(key.into(), template.into());
    }

    /// Raw template for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Whether `key` has a template
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys, in no particular order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Render `key` with positional arguments
    pub fn render(&self, key: &str, args: &[&str]) -> Option<String> {
        self.get(key).map(|template| format_template(template, args))
    }
}

fn flatten_table(prefix: &str, table: &toml::Table, entries: &mut FxHashMap<String, String>) {
    for (key, value) in table {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::String(s) => {
                entries.insert(full_key, s.clone());
            }
            toml::Value::Table(sub) => flatten_table(&full_key, sub, entries),
            _ => {}
        }
    }
}

/// Substitute `{N}` placeholders; unknown indices are left as written
pub fn format_template(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}');
        let arg = close
            .and_then(|close| after[..close].parse::<usize>().ok())
            .and_then(|index| args.get(index));
        match (arg, close) {
            (Some(arg), Some(close)) => {
                out.push_str(arg);
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn embedded(source: &str, name: &str) -> Arc<Catalog> {
    let catalog = Catalog::from_toml_str(source).unwrap_or_else(|e| {
        log::error!("embedded {} message catalog is invalid: {}", name, e);
        Catalog::default()
    });
    Arc::new(catalog)
}

static ENGLISH: Lazy<Arc<Catalog>> = Lazy::new(|| embedded(include_str!("en.toml"), "en"));

static CATALOGS: Lazy<RwLock<FxHashMap<String, Arc<Catalog>>>> = Lazy::new(|| {
    let mut catalogs = FxHashMap::default();
    catalogs.insert("en".to_string(), ENGLISH.clone());
    catalogs.insert("fi".to_string(), embedded(include_str!("fi.toml"), "fi"));
    RwLock::new(catalogs)
});

static ACTIVE: Lazy<RwLock<Arc<Catalog>>> = Lazy::new(|| {
    locale::add_listener(|locale| {
        let catalog = catalog_for(locale);
        log::debug!("switching message catalog to locale {}", locale);
        *ACTIVE.write() = catalog;
    });
    RwLock::new(catalog_for(&locale::get()))
});

/// The embedded English catalog
pub fn english() -> Arc<Catalog> {
    ENGLISH.clone()
}

/// Register `catalog` for `locale`, replacing any previous one
pub fn register_catalog(locale: &Locale, catalog: Catalog) {
    CATALOGS
        .write()
        .insert(locale.to_string(), Arc::new(catalog));
    let current = locale::get();
    *ACTIVE.write() = catalog_for(&current);
}

/// Best catalog for `locale`: exact tag, then language and country, then
/// language, then English
pub fn catalog_for(locale: &Locale) -> Arc<Catalog> {
    let catalogs = CATALOGS.read();
    let mut candidates = vec![locale.to_string()];
    if let Some(country) = locale.country() {
        candidates.push(format!("{}_{}", locale.language(), country));
    }
    candidates.push(locale.language().to_string());
    candidates
        .iter()
        .find_map(|tag| catalogs.get(tag).cloned())
        .unwrap_or_else(|| ENGLISH.clone())
}

/// Catalog for the current locale
pub fn active() -> Arc<Catalog> {
    ACTIVE.read().clone()
}

/// Render `key` in the current locale
///
/// Keys missing from the active catalog fall back to English and then to
/// the key itself.
pub fn tr(key: &str, args: &[&str]) -> String {
    if let Some(message) = active().render(key, args) {
        return message;
    }
    log::warn!("message '{}' missing for locale {}", key, locale::get());
    ENGLISH
        .render(key, args)
        .unwrap_or_else(|| key.to_string())
}
