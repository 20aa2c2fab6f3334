//! Identity parsing and status decoration for parent labels.
//!
//! A parent label doubles as configuration input (the identity the user typed)
//! and status output (the decorated label written back after each fetch).
//! Parsing a decorated label must therefore yield the undecorated identity.

use crate::types::{Identity, ParentStatus};

/// Decoration used for parents whose last fetch did not succeed.
pub const DEFAULT_DECORATION: &str = "🔴";

/// First tokens shorter than this many characters are treated as a prefix
/// (status glyph or short tag) rather than the identity itself.
const PREFIX_MAX_CHARS: usize = 5;

/// Strategy for turning labels into identities and statuses into labels.
pub trait IdentityStrategy: Send + Sync {
    /// Parse the identity out of a parent label. `None` means the node does
    /// not name anything and is not tracked.
    fn parse(&self, label: &str) -> Option<Identity>;

    /// Label to display for `identity` given its fetch `status`.
    fn label_for(&self, identity: &Identity, status: ParentStatus) -> String;
}

/// Whitespace-token strategy.
///
/// - a leading decoration is stripped first
/// - one token: that token
/// - otherwise: the second token when the first is a short prefix, else the first
///
/// Non-ok parents are shown as `"<decoration> <identity>"`. The decoration may
/// be any string, including one with spaces or longer than a short prefix.
#[derive(Debug, Clone)]
pub struct LabelIdentity {
    decoration: String,
}

impl LabelIdentity {
    pub fn new(decoration: impl Into<String>) -> Self {
        Self {
            decoration: decoration.into(),
        }
    }

    /// `label` without a leading `"<decoration> "`. A label that is nothing
    /// but the decoration is left alone.
    fn strip_decoration<'a>(&self, label: &'a str) -> &'a str {
        let label = label.trim_start();
        let decoration = self.decoration.trim();
        if decoration.is_empty() {
            return label;
        }
        match label.strip_prefix(decoration) {
            Some(rest) if rest.starts_with(char::is_whitespace) && !rest.trim().is_empty() => {
                rest.trim_start()
            }
            _ => label,
        }
    }
}

impl Default for LabelIdentity {
    fn default() -> Self {
        Self::new(DEFAULT_DECORATION)
    }
}

impl IdentityStrategy for LabelIdentity {
    fn parse(&self, label: &str) -> Option<Identity> {
        let label = self.strip_decoration(label);
        let mut tokens = label.split_whitespace();
        let first = tokens.next()?;
        let identity = match tokens.next() {
            None => first,
            Some(second) if first.chars().count() < PREFIX_MAX_CHARS => second,
            Some(_) => first,
        };
        Some(Identity::from(identity))
    }

    fn label_for(&self, identity: &Identity, status: ParentStatus) -> String {
        match status {
            ParentStatus::Ok => identity.0.clone(),
            ParentStatus::Pending | ParentStatus::Error => {
                format!("{} {}", self.decoration.trim(), identity)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("db", Some("db"))]
    #[case("  https://svc.local/tldraw  ", Some("https://svc.local/tldraw"))]
    #[case("🔴 https://svc.local/tldraw", Some("https://svc.local/tldraw"))]
    #[case("prod https://svc.local", Some("https://svc.local"))]
    #[case("https://svc.local trailing notes", Some("https://svc.local"))]
    #[case("", None)]
    #[case("   ", None)]
    fn parses_identity_from_label(#[case] label: &str, #[case] expected: Option<&str>) {
        let strategy = LabelIdentity::default();
        assert_eq!(strategy.parse(label), expected.map(Identity::from));
    }

    #[rstest]
    #[case(ParentStatus::Ok)]
    #[case(ParentStatus::Error)]
    #[case(ParentStatus::Pending)]
    fn decorated_label_parses_back_to_identity(#[case] status: ParentStatus) {
        let strategy = LabelIdentity::default();
        let identity = Identity::from("https://hosts.example/apps");
        let label = strategy.label_for(&identity, status);
        assert_eq!(strategy.parse(&label), Some(identity));
    }

    #[rstest]
    #[case("ERROR")]
    #[case("FAILED:")]
    #[case("fetch failed")]
    #[case("!!")]
    #[case("🔴")]
    fn any_decoration_round_trips(#[case] decoration: &str) {
        let strategy = LabelIdentity::new(decoration);
        for identity in ["db", "https://hosts.example/apps"] {
            let identity = Identity::from(identity);
            let label = strategy.label_for(&identity, ParentStatus::Error);
            assert_eq!(strategy.parse(&label), Some(identity.clone()), "label {label:?}");
            // A second projection must not stack another decoration.
            let again = strategy.label_for(&strategy.parse(&label).expect("identity"), ParentStatus::Error);
            assert_eq!(again, label);
        }
    }

    #[test]
    fn label_that_is_only_the_decoration_is_its_own_identity() {
        let strategy = LabelIdentity::new("ERROR");
        assert_eq!(strategy.parse("ERROR"), Some(Identity::from("ERROR")));
        assert_eq!(strategy.parse("ERRORS db"), Some(Identity::from("ERRORS")));
    }

    #[test]
    fn ok_label_is_bare_identity() {
        let strategy = LabelIdentity::new("!!");
        let identity = Identity::from("web");
        assert_eq!(strategy.label_for(&identity, ParentStatus::Ok), "web");
        assert_eq!(strategy.label_for(&identity, ParentStatus::Error), "!! web");
    }
}
