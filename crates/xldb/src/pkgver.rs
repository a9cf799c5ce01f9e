use std::fmt;
use std::sync::Arc;

/// A package name paired with its version, joined as `name-version`.
///
/// The split point is the *last* `-` in the string, so package names may
/// contain dashes but versions may not. Cloning is cheap: the joined string
/// is heap-allocated once and shared via `Arc`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Pkgver(Arc<str>);

impl Pkgver {
    /// Builds a `Pkgver` from an already-joined `name-version` string.
    ///
    /// Returns `None` if `joined` contains no `-`, since such a string can't
    /// be split back into a name and a version — this is a data-quality
    /// issue from a malformed record, not an invariant violation, so the
    /// caller is expected to log and skip rather than unwrap.
    pub fn from_joined(joined: impl Into<Arc<str>>) -> Option<Self> {
        let joined = joined.into();
        if joined.rfind('-').is_none() {
            return None;
        }
        Some(Pkgver(joined))
    }

    /// Joins a package name and version into a `Pkgver`.
    pub fn join(name: &str, version: &str) -> Self {
        Pkgver(Arc::from(format!("{name}-{version}")))
    }

    /// The full `name-version` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn split_at(&self) -> usize {
        self.0
            .rfind('-')
            .expect("Pkgver invariant: always contains a '-'")
    }

    /// Splits into `(name, version)`.
    pub fn split(&self) -> (&str, &str) {
        let dash = self.split_at();
        (&self.0[..dash], &self.0[dash + 1..])
    }

    pub fn name(&self) -> &str {
        self.split().0
    }

    pub fn version(&self) -> &str {
        self.split().1
    }
}

impl fmt::Debug for Pkgver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pkgver({:?})", self.0)
    }
}

impl fmt::Display for Pkgver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
