use crate::ParseError;
use std::{collections::BTreeMap, fmt, str::FromStr};

pub type Map = BTreeMap<String, String>;

/// A set of node-label constraints, e.g. `infra=true,env=test`.
///
/// An empty selector imposes no constraint. Note that this is distinct from a selector string that
/// fails to parse, which is an error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Selector(Map);

// === impl Selector ===

impl Selector {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn into_map(self) -> Map {
        self.0
    }

    /// Returns true iff some key is constrained by both selectors with different values.
    ///
    /// Keys that appear in both selectors with the same value are not conflicts.
    pub fn conflicts(&self, other: &Self) -> bool {
        // Walk the smaller map and probe the larger one.
        let (small, large) = if self.0.len() <= other.0.len() {
            (&self.0, &other.0)
        } else {
            (&other.0, &self.0)
        };
        small
            .iter()
            .any(|(k, v)| large.get(k).map(|ov| ov != v).unwrap_or(false))
    }

    /// Returns the union of both selectors. When a key is set in both, `other`'s value wins.
    ///
    /// Callers on the admission path check [`Selector::conflicts`] first, so shared keys always
    /// hold equal values by the time they are merged.
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.0.clone();
        merged.extend(other.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self(merged)
    }
}

impl FromStr for Selector {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut map = Map::new();
        if s.trim().is_empty() {
            return Ok(Self(map));
        }

        for term in s.split(',') {
            let (k, v) = term
                .split_once('=')
                .ok_or_else(|| ParseError::MissingSeparator(term.to_string()))?;
            let k = k.trim();
            if k.is_empty() {
                return Err(ParseError::EmptyKey(term.to_string()));
            }
            map.insert(k.to_string(), v.trim().to_string());
        }

        Ok(Self(map))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in self.0.iter() {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

impl From<Map> for Selector {
    #[inline]
    fn from(map: Map) -> Self {
        Self(map)
    }
}

impl From<Selector> for Map {
    #[inline]
    fn from(Selector(map): Selector) -> Self {
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;

    fn sel(s: &str) -> Selector {
        s.parse().expect("selector must parse")
    }

    #[test]
    fn parse() {
        for (input, expected, msg) in [
            ("", btreemap! {}, "empty"),
            ("   ", btreemap! {}, "whitespace"),
            ("infra=false", btreemap! { "infra" => "false" }, "single term"),
            (
                " infra = false ",
                btreemap! { "infra" => "false" },
                "surrounding whitespace",
            ),
            (
                "infra=false, env = test",
                btreemap! { "infra" => "false", "env" => "test" },
                "multiple terms",
            ),
            ("a=b=c", btreemap! { "a" => "b=c" }, "split on first '='"),
            ("tier=", btreemap! { "tier" => "" }, "empty value"),
        ] {
            let expected = expected
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Map>();
            assert_eq!(sel(input).into_map(), expected, "{msg}");
        }
    }

    #[test]
    fn parse_rejects_malformed_terms() {
        assert!(matches!(
            "infra".parse::<Selector>(),
            Err(ParseError::MissingSeparator(_))
        ));
        assert!(matches!(
            "infra=true,".parse::<Selector>(),
            Err(ParseError::MissingSeparator(_))
        ));
        assert!(matches!(
            " =true".parse::<Selector>(),
            Err(ParseError::EmptyKey(_))
        ));
    }

    #[test]
    fn display_is_sorted() {
        assert_eq!(sel(" z = 1 , a=2").to_string(), "a=2,z=1");
        assert_eq!(Selector::default().to_string(), "");
    }

    #[test]
    fn disjoint_selectors_do_not_conflict() {
        let a = sel("infra=true");
        let b = sel("env=test,color=blue");
        assert!(!a.conflicts(&b));
        assert!(!b.conflicts(&a));

        let merged = a.merge(&b);
        assert_eq!(merged, sel("infra=true,env=test,color=blue"));
        assert_eq!(merged.len(), a.len() + b.len());
    }

    #[test]
    fn equal_shared_values_do_not_conflict() {
        let a = sel("infra=true,env=test");
        let b = sel("env=test");
        assert!(!a.conflicts(&b));
        assert_eq!(a.merge(&b), a);
    }

    #[test]
    fn differing_shared_values_conflict() {
        let a = sel("infra=false,env=test");
        let b = sel("env=dev,color=blue");
        assert!(a.conflicts(&b));
        assert!(b.conflicts(&a));
    }

    #[test]
    fn merge_prefers_right_hand_value() {
        let a = sel("infra=false");
        let b = sel("infra=true");
        assert_eq!(a.merge(&b).get("infra"), Some("true"));
        assert_eq!(b.merge(&a).get("infra"), Some("false"));
    }

    #[test]
    fn empty_selectors() {
        let empty = Selector::default();
        let a = sel("infra=true");
        assert!(!empty.conflicts(&a));
        assert_eq!(empty.merge(&a), a);
        assert_eq!(a.merge(&empty), a);
    }
}
