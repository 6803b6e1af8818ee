//! Process-wide locale for diagnostic messages
//!
//! The locale starts out as whatever [`reset`] computes: the value of the
//! `EDUTEST_LOCALE` environment variable if it parses, otherwise the system
//! default from `LC_ALL`, `LC_MESSAGES` or `LANG`. Listeners registered with
//! [`add_listener`] are called synchronously, in registration order, every
//! time the locale is set. Concurrent calls to [`set`] are serialized, so the
//! last locale stored is also the last one listeners hear about.

use once_cell::sync::Lazy;
use parking_lot::{const_reentrant_mutex, ReentrantMutex, RwLock};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Environment variable overriding the system locale
pub const LOCALE_ENV: &str = "EDUTEST_LOCALE";

/// Invalid locale string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocaleError {
    /// Empty input
    #[error("empty locale")]
    Empty,

    /// Too many `_`-separated parts
    #[error("invalid locale '{0}': expected format LANG[_COUNTRY[_VARIANT]]")]
    Format(String),
}

/// A language with optional country and variant, e.g. `fi_FI`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale {
    language: String,
    country: Option<String>,
    variant: Option<String>,
}

impl Locale {
    /// Locale with only a language
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into().to_lowercase(),
            country: None,
            variant: None,
        }
    }

    /// Add a country
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into().to_uppercase());
        self
    }

    /// Add a variant
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// English, the fallback locale
    pub fn english() -> Self {
        Self::new("en")
    }

    /// Language code
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Country code
    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    /// Variant
    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }

    /// Parse a POSIX locale such as `fi_FI.UTF-8@euro`
    ///
    /// The encoding and modifier are dropped. `C` and `POSIX` are English.
    pub fn from_posix(value: &str) -> Result<Self, LocaleError> {
        let value = value.split(['.', '@']).next().unwrap_or_default();
        match value {
            "C" | "POSIX" => Ok(Self::english()),
            other => other.parse(),
        }
    }
}

impl FromStr for Locale {
    type Err = LocaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(LocaleError::Empty);
        }
        let parts: Vec<&str> = s.split('_').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(LocaleError::Format(s.to_string()));
        }
        match parts.as_slice() {
            [language] => Ok(Locale::new(*language)),
            [language, country] => Ok(Locale::new(*language).with_country(*country)),
            [language, country, variant] => Ok(Locale::new(*language)
                .with_country(*country)
                .with_variant(*variant)),
            _ => Err(LocaleError::Format(s.to_string())),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.language)?;
        if let Some(country) = &self.country {
            write!(f, "_{}", country)?;
        }
        if let Some(variant) = &self.variant {
            write!(f, "_{}", variant)?;
        }
        Ok(())
    }
}

/// Handle returned by [`add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&Locale) + Send + Sync>;

struct LocaleState {
    current: Locale,
    listeners: Vec<(ListenerId, Listener)>,
}

/// Held from the store until the last listener returns, so listeners see
/// changes in the order they were stored. Reentrant for listeners that set
/// the locale themselves.
static NOTIFY: ReentrantMutex<()> = const_reentrant_mutex(());

static STATE: Lazy<RwLock<LocaleState>> = Lazy::new(|| {
    RwLock::new(LocaleState {
        current: initial_locale(),
        listeners: Vec::new(),
    })
});

fn initial_locale() -> Locale {
    if let Ok(value) = std::env::var(LOCALE_ENV) {
        if !value.is_empty() {
            match value.parse() {
                Ok(locale) => return locale,
                Err(e) => log::warn!("ignoring invalid locale in {}: {}", LOCALE_ENV, e),
            }
        }
    }
    system_locale()
}

/// Locale taken from `LC_ALL`, `LC_MESSAGES` or `LANG`, English if unset
pub fn system_locale() -> Locale {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty())
        .and_then(|value| Locale::from_posix(&value).ok())
        .unwrap_or_else(Locale::english)
}

/// Current locale
pub fn get() -> Locale {
    STATE.read().current.clone()
}

/// Set the locale and notify listeners
pub fn set(locale: Locale) {
    let _notify = NOTIFY.lock();
    let listeners: Vec<Listener> = {
        let mut state = STATE.write();
        state.current = locale.clone();
        state.listeners.iter().map(|(_, l)| l.clone()).collect()
    };
    for listener in listeners {
        listener(&locale);
    }
}

/// Recompute the initial locale from the environment and set it
pub fn reset() {
    set(initial_locale());
}

/// Register a listener called with the new locale on every change
pub fn add_listener(listener: impl Fn(&Locale) + Send + Sync + 'static) -> ListenerId {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    let id = ListenerId(NEXT_ID.fetch_add(1, Ordering::Relaxed));
    STATE.write().listeners.push((id, Arc::new(listener)));
    id
}

/// Unregister a listener; returns `false` if it was not registered
pub fn remove_listener(id: ListenerId) -> bool {
    let mut state = STATE.write();
    let before = state.listeners.len();
    state.listeners.retain(|(lid, _)| *lid != id);
    state.listeners.len() != before
}
