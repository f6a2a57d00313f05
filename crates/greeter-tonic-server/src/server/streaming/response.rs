//! Builds outbound [`HelloResponse`] values.
//!
//! Every response is stamped with the current UTC time in RFC 3339 form and
//! with the [`ExecutorTag`] of the task that built it, so clients can see
//! which execution unit served each message.

use crate::server::executor::tag::ExecutorTag;
use chrono::{SecondsFormat, Utc};
use greeter_tonic_core::{
    catalog::{self, CatalogEntry},
    proto::HelloResponse,
};

/// `"<greeting>, <name>!"` for the request's locale.
///
/// `name` is used as-is; an empty name yields `"Hello, !"`.
pub fn build(name: &str, locale: &str) -> HelloResponse {
    let greeting = catalog::resolve(locale);
    stamp(format!("{greeting}, {name}!"))
}

/// `"<greeting>, <name>! [<locale>]"` for one catalog entry.
pub fn build_catalog_entry(name: &str, entry: &CatalogEntry) -> HelloResponse {
    stamp(format!("{}, {}! [{}]", entry.greeting, name, entry.locale))
}

/// `"Hello to all <count> friends: <names>!"` with names joined by `", "`.
pub fn build_summary(names: &[String]) -> HelloResponse {
    stamp(format!(
        "Hello to all {} friends: {}!",
        names.len(),
        names.join(", ")
    ))
}

/// Current wall-clock time as an RFC 3339 UTC string with a `Z` suffix.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn stamp(message: String) -> HelloResponse {
    HelloResponse {
        message,
        timestamp: timestamp(),
        thread_info: ExecutorTag::current().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn greets_in_requested_locale() {
        assert_eq!(build("World", "fr").message, "Bonjour, World!");
        assert_eq!(build("World", "").message, "Hello, World!");
        assert_eq!(build("World", "tlh").message, "Hello, World!");
    }

    #[test]
    fn passes_empty_name_through() {
        assert_eq!(build("", "es").message, "Hola, !");
    }

    #[test]
    fn catalog_entry_embeds_locale() {
        let entry = catalog::entries().nth(5).unwrap();
        assert_eq!(build_catalog_entry("X", entry).message, "こんにちは, X! [ja]");
    }

    #[test]
    fn summary_reports_count_and_joined_names() {
        let names = ["A", "B", "C"].map(String::from);
        assert_eq!(
            build_summary(&names).message,
            "Hello to all 3 friends: A, B, C!"
        );
        assert_eq!(build_summary(&[]).message, "Hello to all 0 friends: !");
    }

    #[test]
    fn stamps_rfc3339_utc_timestamp() {
        let response = build("World", "en");
        assert!(response.timestamp.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(&response.timestamp).is_ok());
        assert!(!response.thread_info.is_empty());
    }
}
