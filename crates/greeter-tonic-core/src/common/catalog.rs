//! # Greeting Catalog
//!
//! The fixed set of supported locales and the greeting word for each. The
//! catalog is a `'static` ordered slice rather than a map: server streaming
//! replays it entry by entry and clients rely on that order being identical
//! across runs and builds.
//!
//! ## Resolution
//!
//! [`resolve`] never fails. An empty locale is treated as
//! [`DEFAULT_LOCALE`], and a locale missing from the catalog resolves to the
//! default locale's greeting. Matching is exact, so `"FR"` is unknown.
//!
//! ## Order
//!
//! Declaration order is the iteration order:
//!
//! | # | Locale | Greeting |
//! |---|--------|----------|
//! | 0 | `en` | Hello |
//! | 1 | `es` | Hola |
//! | 2 | `fr` | Bonjour |
//! | 3 | `de` | Hallo |
//! | 4 | `it` | Ciao |
//! | 5 | `ja` | こんにちは |
//! | 6 | `ko` | 안녕하세요 |
//! | 7 | `zh` | 你好 |

/// Locale used when a request carries no locale or an unknown one.
pub const DEFAULT_LOCALE: &str = "en";

/// A single locale to greeting mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Locale code, e.g. `"fr"`.
    pub locale: &'static str,
    /// Greeting word for the locale, e.g. `"Bonjour"`.
    pub greeting: &'static str,
}

impl CatalogEntry {
    const fn new(locale: &'static str, greeting: &'static str) -> Self {
        Self { locale, greeting }
    }
}

/// All supported greetings in their fixed iteration order.
///
/// The default locale must stay the first entry; [`resolve`] relies on it.
pub const CATALOG: &[CatalogEntry] = &[
    CatalogEntry::new("en", "Hello"),
    CatalogEntry::new("es", "Hola"),
    CatalogEntry::new("fr", "Bonjour"),
    CatalogEntry::new("de", "Hallo"),
    CatalogEntry::new("it", "Ciao"),
    CatalogEntry::new("ja", "こんにちは"),
    CatalogEntry::new("ko", "안녕하세요"),
    CatalogEntry::new("zh", "你好"),
];

/// Greeting for [`DEFAULT_LOCALE`].
pub const DEFAULT_GREETING: &str = CATALOG[0].greeting;

/// Number of entries in the catalog.
pub const fn len() -> usize {
    CATALOG.len()
}

/// Iterates the catalog in its fixed order.
pub fn entries() -> impl ExactSizeIterator<Item = &'static CatalogEntry> {
    CATALOG.iter()
}

/// Looks up the greeting for an exact locale code.
pub fn lookup(locale: &str) -> Option<&'static str> {
    CATALOG
        .iter()
        .find(|entry| entry.locale == locale)
        .map(|entry| entry.greeting)
}

/// Resolves a locale to its greeting, falling back to [`DEFAULT_GREETING`].
pub fn resolve(locale: &str) -> &'static str {
    let locale = if locale.is_empty() {
        DEFAULT_LOCALE
    } else {
        locale
    };
    lookup(locale).unwrap_or(DEFAULT_GREETING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn default_locale_is_first_entry() {
        assert_eq!(CATALOG[0].locale, DEFAULT_LOCALE);
        assert_eq!(lookup(DEFAULT_LOCALE), Some(DEFAULT_GREETING));
    }

    #[test]
    fn resolves_known_locales() {
        assert_eq!(resolve("fr"), "Bonjour");
        assert_eq!(resolve("ja"), "こんにちは");
        assert_eq!(resolve("zh"), "你好");
    }

    #[test]
    fn unknown_and_empty_locales_fall_back_to_default() {
        let expected = resolve(DEFAULT_LOCALE);
        for locale in ["", "xx", "FR", "en-US", " ", "pt"] {
            assert_eq!(resolve(locale), expected, "locale {locale:?}");
        }
    }

    #[test]
    fn locales_are_unique() {
        let locales: HashSet<_> = entries().map(|e| e.locale).collect();
        assert_eq!(locales.len(), len());
    }

    #[test]
    fn iteration_order_is_declaration_order() {
        let locales: Vec<_> = entries().map(|e| e.locale).collect();
        assert_eq!(locales, ["en", "es", "fr", "de", "it", "ja", "ko", "zh"]);
    }
}
