//! Fully qualified names.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// A fully qualified name: dot-separated segments from the declaration root.
///
/// Two synthesized forms exist alongside ordinary declared names:
/// - **private** names (`_12~`): unit-local identities for anonymous
///   declarations that never escape their translation unit, and
/// - **anonymous-unique** names (`ns.3f2a…~`): globally unique identities for
///   unnamed top-level composition expressions that still participate in
///   dependency tracking across units.
///
/// Both suffix a `~` so they can never collide with user-written names.
#[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fqn(SmolStr);

impl Fqn {
    /// Build from an already dot-separated string.
    pub fn new(fqn: impl Into<SmolStr>) -> Self {
        Self(fqn.into())
    }

    /// Build from a namespace and a trailing name.
    pub fn in_namespace(namespace: &[SmolStr], name: &str) -> Self {
        if namespace.is_empty() {
            return Self(SmolStr::new(name));
        }
        let mut out = String::new();
        for segment in namespace {
            out.push_str(segment);
            out.push('.');
        }
        out.push_str(name);
        Self(SmolStr::new(out))
    }

    /// Build from individual segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = String::new();
        for (i, segment) in segments.into_iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push_str(segment.as_ref());
        }
        Self(SmolStr::new(out))
    }

    /// Synthesize a unit-local private name from a counter.
    pub fn make_unique_private(counter: u32) -> Self {
        Self(SmolStr::new(format!("_{counter}~")))
    }

    /// Synthesize a globally unique anonymous name under `namespace`.
    pub fn make_unique(namespace: &[SmolStr]) -> Self {
        let tail = format!("{}~", uuid::Uuid::new_v4().simple());
        Self::in_namespace(namespace, &tail)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// The trailing segment.
    pub fn name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// All segments but the last.
    pub fn namespace(&self) -> Vec<SmolStr> {
        let mut segments: Vec<SmolStr> = self.segments().map(SmolStr::new).collect();
        segments.pop();
        segments
    }

    /// The enclosing name, if any.
    pub fn parent(&self) -> Option<Fqn> {
        self.0.rfind('.').map(|i| Self(SmolStr::new(&self.0[..i])))
    }

    /// Extend with a further segment.
    pub fn join(&self, name: &str) -> Fqn {
        Self(SmolStr::new(format!("{}.{}", self.0, name)))
    }

    /// Whether `other` is a strict descendant of `self`.
    pub fn contains(&self, other: &Fqn) -> bool {
        other.0.len() > self.0.len() + 1
            && other.0.starts_with(self.0.as_str())
            && other.0.as_bytes()[self.0.len()] == b'.'
    }

    /// Unit-local synthesized identity, removed when the map is closed.
    pub fn is_private(&self) -> bool {
        self.0.starts_with('_')
    }

    /// Either synthesized form (private or anonymous-unique).
    pub fn is_synthetic(&self) -> bool {
        self.0.ends_with('~')
    }
}

impl fmt::Debug for Fqn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fqn({})", self.0)
    }
}

impl fmt::Display for Fqn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fqn {
    fn from(s: &str) -> Self {
        Self(SmolStr::new(s))
    }
}

impl From<SmolStr> for Fqn {
    fn from(s: SmolStr) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Fqn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments() {
        let fqn = Fqn::new("a.b.c");
        assert_eq!(fqn.segments().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(fqn.name(), "c");
        assert_eq!(fqn.parent(), Some(Fqn::new("a.b")));
        assert_eq!(fqn.namespace(), vec![SmolStr::new("a"), SmolStr::new("b")]);
    }

    #[test]
    fn test_single_segment() {
        let fqn = Fqn::new("root");
        assert_eq!(fqn.name(), "root");
        assert_eq!(fqn.parent(), None);
        assert!(fqn.namespace().is_empty());
    }

    #[test]
    fn test_in_namespace() {
        let ns = vec![SmolStr::new("a"), SmolStr::new("b")];
        assert_eq!(Fqn::in_namespace(&ns, "c"), Fqn::new("a.b.c"));
        assert_eq!(Fqn::in_namespace(&[], "c"), Fqn::new("c"));
    }

    #[test]
    fn test_contains() {
        let root = Fqn::new("a.b");
        assert!(root.contains(&Fqn::new("a.b.c")));
        assert!(root.contains(&Fqn::new("a.b.c.d")));
        assert!(!root.contains(&Fqn::new("a.b")));
        assert!(!root.contains(&Fqn::new("a.bc.d")));
        assert!(!root.contains(&Fqn::new("a")));
    }

    #[test]
    fn test_private_form() {
        let fqn = Fqn::make_unique_private(7);
        assert_eq!(fqn.as_str(), "_7~");
        assert!(fqn.is_private());
        assert!(fqn.is_synthetic());
    }

    #[test]
    fn test_unique_form() {
        let ns = vec![SmolStr::new("comp")];
        let a = Fqn::make_unique(&ns);
        let b = Fqn::make_unique(&ns);
        assert_ne!(a, b);
        assert!(a.is_synthetic());
        assert!(!a.is_private());
        assert!(a.as_str().starts_with("comp."));
    }
}
