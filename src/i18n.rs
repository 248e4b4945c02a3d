//! Message translation collaborator.
//!
//! The engine does not own translations. It asks an [`I18n`] implementation
//! for the text of a message key in the caller's locale and falls back to the
//! key itself whenever the answer is `None` or no translator is configured.

use std::collections::HashMap;

/// Maps `(locale, key, arguments)` to localized text.
///
/// `None` means "no translation", and the engine then shows `fallback`. A
/// panicking implementation is treated the same way.
pub trait I18n: Send + Sync {
    fn message(&self, locale: &str, key: &str, fallback: &str, args: &[String]) -> Option<String>;
}

/// In-memory bundle of message templates.
///
/// Templates use positional placeholders, `{0}`, `{1}`, ... A locale such as
/// `fr-CA` without its own entry falls back to `fr`.
///
/// ```rust
/// use wsengine::{I18n, StaticMessages};
///
/// let messages = StaticMessages::new()
///     .with("en", "bad.request.reason", "reason #{0}");
/// assert_eq!(
///     messages.message("en-GB", "bad.request.reason", "bad.request.reason", &["0".to_owned()]),
///     Some("reason #0".to_owned()),
/// );
/// ```
#[derive(Clone, Debug, Default)]
pub struct StaticMessages {
    bundles: HashMap<String, HashMap<String, String>>,
}

impl StaticMessages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, locale: &str, key: &str, template: &str) -> Self {
        self.bundles
            .entry(locale.to_owned())
            .or_default()
            .insert(key.to_owned(), template.to_owned());
        self
    }

    fn template(&self, locale: &str, key: &str) -> Option<&str> {
        let lookup = |tag: &str| self.bundles.get(tag)?.get(key).map(String::as_str);
        lookup(locale).or_else(|| {
            let language = locale.split(['-', '_']).next()?;
            lookup(language)
        })
    }
}

impl I18n for StaticMessages {
    fn message(&self, locale: &str, key: &str, _fallback: &str, args: &[String]) -> Option<String> {
        self.template(locale, key).map(|template| substitute(template, args))
    }
}

/// Replaces each `{i}` with `args[i]` in one pass. Inserted arguments are not
/// scanned again; placeholders without an argument stay as written.
fn substitute(template: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let arg = after.find('}').and_then(|close| {
            let index: usize = after[..close].parse().ok()?;
            Some((args.get(index)?, close))
        });
        match arg {
            Some((arg, close)) => {
                out.push_str(arg);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_positional_arguments() {
        let messages = StaticMessages::new().with("fr", "range", "entre {0} et {1}");
        let text = messages.message("fr", "range", "range", &["1".to_owned(), "9".to_owned()]);
        assert_eq!(text.as_deref(), Some("entre 1 et 9"));
    }

    #[test]
    fn arguments_are_not_substituted_twice() {
        let messages = StaticMessages::new().with("en", "pair", "value {0} and {1}");
        let text = messages.message("en", "pair", "pair", &["{1}".to_owned(), "x".to_owned()]);
        assert_eq!(text.as_deref(), Some("value {1} and x"));
    }

    #[test]
    fn unmatched_placeholders_are_kept() {
        let messages = StaticMessages::new().with("en", "odd", "{0} of {2} {name} {");
        let text = messages.message("en", "odd", "odd", &["1".to_owned()]);
        assert_eq!(text.as_deref(), Some("1 of {2} {name} {"));
    }

    #[test]
    fn unknown_key_has_no_translation() {
        let messages = StaticMessages::new().with("en", "a", "A");
        assert_eq!(messages.message("en", "b", "b", &[]), None);
        assert_eq!(messages.message("de", "a", "a", &[]), None);
    }
}
