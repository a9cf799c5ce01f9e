use crate::index::ReadTxn;
use crate::owner::{OwnerType, OwnerTypeCounts};
use crate::pkgver::Pkgver;
use crate::tree::{NodeId, ROOT};

/// Default symlink-chase budget used by callers that don't need a custom
/// one (the `depth = 3` the original always passes at its one call site).
pub const DEFAULT_LINK_DEPTH: u32 = 3;

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl ReadTxn<'_> {
    /// `.` stays put, `..` goes to the parent (root's parent is root),
    /// anything else looks up a child by name.
    pub fn cd(&self, node: NodeId, name: &str) -> Option<NodeId> {
        match name {
            "." => Some(node),
            ".." => Some(self.guard.tree.parent(node)),
            _ => self.guard.tree.child(node, name),
        }
    }

    /// Resolves `path` starting at `start`, or at the root if `path` begins
    /// with `/` or `start` is `None`.
    pub fn follow_path(&self, start: Option<NodeId>, path: &str) -> Option<NodeId> {
        let mut node = if start.is_none() || path.starts_with('/') {
            ROOT
        } else {
            start.unwrap()
        };
        for name in split_path(path) {
            node = self.cd(node, name)?;
        }
        Some(node)
    }

    /// Empty for root; otherwise the unique name under which the parent
    /// references this node.
    pub fn get_name(&self, node: NodeId) -> String {
        self.guard.tree.name_of(node).to_string()
    }

    /// Absolute path from the root, e.g. `/usr/bin/foo`. The root's path is
    /// `/`.
    pub fn get_path(&self, node: NodeId) -> String {
        self.build_path(node, |s| s.to_string())
    }

    /// Same as [`Self::get_path`], but each segment is passed through
    /// `encode` before being joined — the core stays agnostic to *how*
    /// segments get escaped for a URL (that's the presentation
    /// collaborator's job).
    pub fn get_path_urlencoded(&self, node: NodeId, encode: impl Fn(&str) -> String) -> String {
        self.build_path(node, encode)
    }

    fn build_path(&self, mut node: NodeId, mut segment: impl FnMut(&str) -> String) -> String {
        let mut parts = Vec::new();
        loop {
            let name = self.guard.tree.name_of(node);
            if name.is_empty() {
                break;
            }
            parts.push(segment(name));
            node = self.guard.tree.parent(node);
        }
        parts.reverse();
        format!("/{}", parts.join("/"))
    }

    /// Counts of `Dir`/`File`/`Link` owners of `node`.
    pub fn get_types(&self, node: NodeId) -> OwnerTypeCounts {
        let mut counts = OwnerTypeCounts::default();
        for (_, ty) in self.guard.tree.owners(node) {
            match ty {
                OwnerType::Dir => counts.dir += 1,
                OwnerType::File => counts.file += 1,
                OwnerType::Link(_) => counts.link += 1,
            }
        }
        counts
    }

    /// The full owner map of `node`, as a read-only view.
    pub fn get_owners(&self, node: NodeId) -> &[(Pkgver, OwnerType)] {
        self.guard.tree.owners(node)
    }

    /// Lists `node`'s children as `(name, child)` pairs, unordered — the
    /// presentation collaborator sorts them however it needs to display
    /// them.
    pub fn children(&self, node: NodeId) -> Vec<(String, NodeId)> {
        self.guard
            .tree
            .children(node)
            .map(|(name, child)| (name.to_string(), child))
            .collect()
    }

    /// True if any owner contributes `Dir` directly; otherwise, while
    /// `depth > 0`, follows every `Link` owner's target and asks the same
    /// question one depth lower. `depth == 0` exhausting the budget (or no
    /// link resolving to anything) yields `false`.
    pub fn is_dir(&self, node: NodeId, depth: u32) -> bool {
        let mut link_targets = Vec::new();
        for (_, ty) in self.guard.tree.owners(node) {
            if ty.is_dir() {
                return true;
            }
            if depth > 0 {
                if let Some(target) = ty.link_target() {
                    link_targets.push(target);
                }
            }
        }
        if depth == 0 || link_targets.is_empty() {
            return false;
        }
        for target in link_targets {
            if let Some(resolved) = self.link_resolve_target(node, target) {
                if self.is_dir(resolved, depth - 1) {
                    return true;
                }
            }
        }
        false
    }

    /// Interprets `target` as a path relative to `node`'s *containing
    /// directory* (i.e. `parent(node)`), giving symlinks "relative to the
    /// directory that holds them" semantics. No cycle detection here; the
    /// recursion in [`Self::is_dir`] is what bounds chains.
    pub fn link_resolve_target(&self, node: NodeId, target: &str) -> Option<NodeId> {
        let parent = self.guard.tree.parent(node);
        self.follow_path(Some(parent), target)
    }

    /// `"/"` if `node` is a directory at the given depth budget, else `""`.
    pub fn get_dirslash(&self, node: NodeId, depth: u32) -> &'static str {
        if self.is_dir(node, depth) {
            "/"
        } else {
            ""
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Index;
    use crate::test_support::InMemorySource;

    #[test]
    fn cd_dot_and_dotdot() {
        let index = Index::new();
        index
            .load(&mut InMemorySource::new(
                "T1",
                ["foo-1.0,/usr/bin/foo"],
            ))
            .unwrap();
        let txn = index.read();
        let usr = txn.follow_path(None, "/usr").unwrap();
        assert_eq!(txn.cd(usr, ".").unwrap(), usr);
        assert_eq!(txn.cd(usr, "..").unwrap(), txn.root());
        assert_eq!(txn.cd(txn.root(), "..").unwrap(), txn.root());
    }

    #[test]
    fn get_path_roundtrips_through_follow_path() {
        let index = Index::new();
        index
            .load(&mut InMemorySource::new(
                "T1",
                [
                    "foo-1.0,/usr/bin/foo",
                    "foo-1.0,/usr/share/doc/foo/README",
                ],
            ))
            .unwrap();
        let txn = index.read();
        for path in ["/usr", "/usr/bin", "/usr/bin/foo", "/usr/share/doc/foo/README"] {
            let node = txn.follow_path(None, path).unwrap();
            assert_eq!(txn.get_path(node), path);
        }
    }

    #[test]
    fn get_path_urlencoded_applies_encoder() {
        let index = Index::new();
        index
            .load(&mut InMemorySource::new("T1", ["foo-1.0,/a b/c"]))
            .unwrap();
        let txn = index.read();
        let node = txn.follow_path(None, "/a b/c").unwrap();
        let encoded = txn.get_path_urlencoded(node, |s| s.replace(' ', "%20"));
        assert_eq!(encoded, "/a%20b/c");
    }
}
