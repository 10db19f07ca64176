//! Content-type matching.
//!
//! Media types are compared on their essence: the part before any `;`
//! parameters, trimmed and lower-cased. `application/json; charset=utf-8`
//! therefore matches `application/json`.
//!
//! A missing content type is reported as [`ContentTypeVerdict::Absent`],
//! separately from [`ContentTypeVerdict::Mismatch`], so callers can tell the
//! two apart in logs. The JSON decoder treats both as "skip".

use crate::error::ContentTypeError;

/// The canonical JSON media type.
pub const APPLICATION_JSON: &str = "application/json";

/// Result of comparing a message content type against a matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentTypeVerdict {
    /// The message carries no content type.
    Absent,
    /// The message carries a content type the matcher does not accept.
    Mismatch,
    /// The content type is accepted.
    Match,
}

impl ContentTypeVerdict {
    /// Returns `true` only for [`ContentTypeVerdict::Match`].
    #[must_use]
    pub const fn is_match(self) -> bool {
        matches!(self, Self::Match)
    }

    /// Returns a short label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Mismatch => "mismatch",
            Self::Match => "match",
        }
    }
}

/// A non-empty set of accepted media types.
///
/// Entries may use a `type/*` wildcard to accept every subtype of `type`.
///
/// # Example
///
/// ```
/// use conduit_middleware::{ContentTypeMatch, ContentTypeVerdict};
///
/// let matcher = ContentTypeMatch::json();
/// assert_eq!(matcher.check(Some("application/json")), ContentTypeVerdict::Match);
/// assert_eq!(matcher.check(Some("Application/JSON; charset=utf-8")), ContentTypeVerdict::Match);
/// assert_eq!(matcher.check(Some("application/text")), ContentTypeVerdict::Mismatch);
/// assert_eq!(matcher.check(None), ContentTypeVerdict::Absent);
///
/// let wide = ContentTypeMatch::new(["application/json", "text/*"]).unwrap();
/// assert!(wide.matches(Some("text/plain")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypeMatch {
    media_types: Vec<String>,
}

impl ContentTypeMatch {
    /// Creates a matcher accepting only `application/json`.
    #[must_use]
    pub fn json() -> Self {
        Self {
            media_types: vec![APPLICATION_JSON.to_string()],
        }
    }

    /// Creates a matcher from a list of media types.
    ///
    /// # Errors
    ///
    /// Returns [`ContentTypeError::Empty`] for an empty list and
    /// [`ContentTypeError::Invalid`] for an entry that is not `type/subtype`.
    pub fn new<I, S>(media_types: I) -> Result<Self, ContentTypeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized = Vec::new();
        for raw in media_types {
            let raw = raw.as_ref();
            let media_type = essence(raw);
            if !is_valid_media_type(&media_type) {
                return Err(ContentTypeError::Invalid {
                    value: raw.to_string(),
                });
            }
            if !normalized.contains(&media_type) {
                normalized.push(media_type);
            }
        }

        if normalized.is_empty() {
            return Err(ContentTypeError::Empty);
        }

        Ok(Self {
            media_types: normalized,
        })
    }

    /// Creates a matcher for a single media type.
    ///
    /// # Errors
    ///
    /// Returns [`ContentTypeError::Invalid`] if the value is not `type/subtype`.
    pub fn single(media_type: &str) -> Result<Self, ContentTypeError> {
        Self::new([media_type])
    }

    /// Compares a message content type against this matcher.
    #[must_use]
    pub fn check(&self, content_type: Option<&str>) -> ContentTypeVerdict {
        let Some(content_type) = content_type else {
            return ContentTypeVerdict::Absent;
        };

        let candidate = essence(content_type);
        if candidate.is_empty() {
            return ContentTypeVerdict::Absent;
        }

        if self
            .media_types
            .iter()
            .any(|accepted| media_type_matches(accepted, &candidate))
        {
            ContentTypeVerdict::Match
        } else {
            ContentTypeVerdict::Mismatch
        }
    }

    /// Returns `true` if the content type is accepted.
    #[must_use]
    pub fn matches(&self, content_type: Option<&str>) -> bool {
        self.check(content_type).is_match()
    }

    /// Returns the normalized accepted media types.
    #[must_use]
    pub fn media_types(&self) -> &[String] {
        &self.media_types
    }
}

impl Default for ContentTypeMatch {
    fn default() -> Self {
        Self::json()
    }
}

/// Returns the media-type essence: text before `;`, trimmed, lower-cased.
#[must_use]
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_valid_media_type(media_type: &str) -> bool {
    if media_type == "*/*" {
        return true;
    }
    match media_type.split_once('/') {
        Some((ty, subtype)) => {
            !ty.is_empty() && ty != "*" && !subtype.is_empty() && !subtype.contains('/')
        }
        None => false,
    }
}

fn media_type_matches(accepted: &str, candidate: &str) -> bool {
    if accepted == "*/*" {
        return true;
    }
    match accepted.strip_suffix("/*") {
        Some(ty) => candidate
            .split_once('/')
            .is_some_and(|(candidate_ty, _)| candidate_ty == ty),
        None => accepted == candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_default() {
        let matcher = ContentTypeMatch::default();
        assert_eq!(matcher.media_types(), ["application/json"]);
        assert!(matcher.matches(Some("application/json")));
    }

    #[test]
    fn test_absent_and_mismatch_are_distinct() {
        let matcher = ContentTypeMatch::json();
        assert_eq!(matcher.check(None), ContentTypeVerdict::Absent);
        assert_eq!(matcher.check(Some("")), ContentTypeVerdict::Absent);
        assert_eq!(matcher.check(Some("  ")), ContentTypeVerdict::Absent);
        assert_eq!(
            matcher.check(Some("application/text")),
            ContentTypeVerdict::Mismatch
        );
        assert!(!matcher.matches(None));
        assert!(!matcher.matches(Some("application/text")));
    }

    #[test]
    fn test_parameters_and_case_ignored() {
        let matcher = ContentTypeMatch::json();
        assert!(matcher.matches(Some("application/json; charset=utf-8")));
        assert!(matcher.matches(Some("  APPLICATION/Json ")));
    }

    #[test]
    fn test_no_prefix_matching() {
        let matcher = ContentTypeMatch::json();
        assert!(!matcher.matches(Some("application/jsonx")));
        assert!(!matcher.matches(Some("application/json-patch+json")));
    }

    #[test]
    fn test_multiple_types() {
        let matcher =
            ContentTypeMatch::new(["application/json", "application/vnd.api+json"]).unwrap();
        assert!(matcher.matches(Some("application/vnd.api+json")));
        assert!(matcher.matches(Some("application/json")));
        assert!(!matcher.matches(Some("text/plain")));
    }

    #[test]
    fn test_subtype_wildcard() {
        let matcher = ContentTypeMatch::single("application/*").unwrap();
        assert!(matcher.matches(Some("application/json")));
        assert!(matcher.matches(Some("application/text")));
        assert!(!matcher.matches(Some("text/plain")));
        assert_eq!(matcher.check(None), ContentTypeVerdict::Absent);
    }

    #[test]
    fn test_full_wildcard_still_needs_a_value() {
        let matcher = ContentTypeMatch::single("*/*").unwrap();
        assert!(matcher.matches(Some("anything/at-all")));
        assert_eq!(matcher.check(None), ContentTypeVerdict::Absent);
    }

    #[test]
    fn test_duplicates_collapsed() {
        let matcher =
            ContentTypeMatch::new(["application/json", "Application/JSON; charset=utf-8"]).unwrap();
        assert_eq!(matcher.media_types().len(), 1);
    }

    #[test]
    fn test_invalid_media_types() {
        assert_eq!(
            ContentTypeMatch::new(Vec::<String>::new()),
            Err(ContentTypeError::Empty)
        );
        assert!(matches!(
            ContentTypeMatch::single("json"),
            Err(ContentTypeError::Invalid { .. })
        ));
        assert!(matches!(
            ContentTypeMatch::single("application/"),
            Err(ContentTypeError::Invalid { .. })
        ));
        assert!(matches!(
            ContentTypeMatch::single("*/json"),
            Err(ContentTypeError::Invalid { .. })
        ));
        assert!(matches!(
            ContentTypeMatch::single("a/b/c"),
            Err(ContentTypeError::Invalid { .. })
        ));
    }

    #[test]
    fn test_essence() {
        assert_eq!(essence("Application/JSON; charset=UTF-8"), "application/json");
        assert_eq!(essence(""), "");
    }

    #[test]
    fn test_verdict_labels() {
        assert_eq!(ContentTypeVerdict::Absent.as_str(), "absent");
        assert!(ContentTypeVerdict::Match.is_match());
        assert!(!ContentTypeVerdict::Mismatch.is_match());
    }
}
