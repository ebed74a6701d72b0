//! # Multi-Message Names
//!
//! A multi-message name encodes a family of concrete messages with a single
//! bracketed, comma-separated variant list:
//!
//! ```text
//! "key [up, down] event"  ->  "key up event", "key down event"
//! ```
//!
//! Only the first bracket pair is significant. A name without a (non-empty)
//! bracket list is a plain literal and expands to itself.

use std::collections::HashSet;

/// A parsed multi-message pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiName {
    prefix: String,
    labels: Vec<String>,
    suffix: String,
}

impl MultiName {
    /// Parse `name`, returning `None` for plain names
    pub fn parse(name: &str) -> Option<Self> {
        let open = name.find('[')?;
        let close = open + name[open..].find(']')?;

        let labels: Vec<String> = name[open + 1..close]
            .split(',')
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_string)
            .collect();

        if labels.is_empty() {
            return None;
        }

        Some(Self {
            prefix: name[..open].trim().to_string(),
            labels,
            suffix: name[close + 1..].trim().to_string(),
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The concrete message name for one label
    pub fn literal(&self, label: &str) -> String {
        [self.prefix.as_str(), label, self.suffix.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn expand(&self) -> Vec<String> {
        self.labels.iter().map(|label| self.literal(label)).collect()
    }

    /// Which label produced `literal`, if any
    pub fn label_of(&self, literal: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|label| self.literal(label) == literal)
            .map(String::as_str)
    }
}

/// Whether `name` is a multi-message pattern
pub fn is_multi(name: &str) -> bool {
    MultiName::parse(name).is_some()
}

/// Expand a name into its concrete message names, in label order
pub fn expand(name: &str) -> Vec<String> {
    match MultiName::parse(name) {
        Some(multi) => multi.expand(),
        None => vec![name.to_string()],
    }
}

/// The raw bracket labels of a multi name; empty for a plain name
pub fn variants(name: &str) -> Vec<String> {
    MultiName::parse(name)
        .map(|multi| multi.labels)
        .unwrap_or_default()
}

/// Recover the label of `pattern` that expands to `literal`
pub fn variant_of(pattern: &str, literal: &str) -> Option<String> {
    MultiName::parse(pattern)?.label_of(literal).map(str::to_string)
}

/// Whether two endpoint names can carry a common message.
///
/// Plain names overlap only when equal. A plain name overlaps a multi name
/// when it is one of the multi name's expansions. Two multi names overlap when
/// their label sets intersect.
pub fn overlap(a: &str, b: &str) -> bool {
    match (MultiName::parse(a), MultiName::parse(b)) {
        (None, None) => a == b,
        (Some(multi), None) => multi.expand().iter().any(|literal| literal == b),
        (None, Some(multi)) => multi.expand().iter().any(|literal| literal == a),
        (Some(left), Some(right)) => {
            let labels: HashSet<&str> = left.labels.iter().map(String::as_str).collect();
            right.labels.iter().any(|label| labels.contains(label.as_str()))
        }
    }
}

/// Overlap check applied only when at least one side is multi; two plain
/// endpoints are always compatible and left to the direction checks.
pub fn compatible(a: &str, b: &str) -> bool {
    if !is_multi(a) && !is_multi(b) {
        return true;
    }
    overlap(a, b)
}

/// The message a destination receives for one concrete source variant.
///
/// `source_multi` tells whether `variant` came from expanding a multi name;
/// a plain source delivers to any plain destination under the destination's
/// own name.
pub fn destination_variant(variant: &str, source_multi: bool, target: &str) -> Option<String> {
    match MultiName::parse(target) {
        Some(multi) => multi
            .expand()
            .into_iter()
            .find(|literal| literal == variant),
        None if source_multi => (target == variant).then(|| target.to_string()),
        None => Some(target.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_multi_name() {
        assert_eq!(expand("msg [a,b,c]"), vec!["msg a", "msg b", "msg c"]);
        assert_eq!(expand("plain"), vec!["plain"]);
    }

    #[test]
    fn test_expand_normalizes_whitespace() {
        assert_eq!(
            expand("key  [ up , down ]   event"),
            vec!["key up event", "key down event"]
        );
        assert_eq!(expand("[x,y] tail"), vec!["x tail", "y tail"]);
    }

    #[test]
    fn test_empty_bracket_list_is_plain() {
        assert!(!is_multi("odd []"));
        assert_eq!(expand("odd []"), vec!["odd []"]);
        assert!(!is_multi("unterminated [a,b"));
    }

    #[test]
    fn test_variants_returns_labels() {
        assert_eq!(variants("evt [a, b]"), vec!["a", "b"]);
        assert!(variants("evt").is_empty());
    }

    #[test]
    fn test_variant_recovery_follows_expansion_order() {
        let pattern = "cmd [open,close,save] now";
        let labels = variants(pattern);
        for (i, literal) in expand(pattern).iter().enumerate() {
            assert_eq!(variant_of(pattern, literal).as_deref(), Some(labels[i].as_str()));
        }
        assert_eq!(variant_of(pattern, "cmd quit now"), None);
    }

    #[test]
    fn test_overlap_rules() {
        assert!(overlap("go", "go"));
        assert!(!overlap("go", "stop"));
        assert!(overlap("evt [a,b]", "evt a"));
        assert!(!overlap("evt [a,b]", "evt c"));
        assert!(overlap("evt [a,b]", "evt [b,c]"));
        assert!(!overlap("evt [a,b]", "evt [c,d]"));
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let names = ["go", "stop", "evt a", "evt [a,b]", "evt [b,c]", "evt [x]", "[a] tail"];
        for a in names {
            for b in names {
                assert_eq!(overlap(a, b), overlap(b, a), "{} / {}", a, b);
            }
        }
    }

    #[test]
    fn test_compatible_ignores_plain_pairs() {
        assert!(compatible("go", "stop"));
        assert!(!compatible("evt [a]", "stop"));
    }

    #[test]
    fn test_destination_variant() {
        assert_eq!(destination_variant("evt a", true, "evt [a,c]").as_deref(), Some("evt a"));
        assert_eq!(destination_variant("evt b", true, "evt [a,c]"), None);
        assert_eq!(destination_variant("evt a", true, "evt a").as_deref(), Some("evt a"));
        assert_eq!(destination_variant("evt b", true, "evt a"), None);
        assert_eq!(destination_variant("go", false, "start").as_deref(), Some("start"));
    }
}
