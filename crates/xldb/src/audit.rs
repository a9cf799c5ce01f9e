use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::thread::Scope;

use crate::index::Index;
use crate::owner::OwnerTypeCounts;
use crate::pkgver::Pkgver;
use crate::tree::{NodeId, Tree, ROOT};

/// Result of one [`Index::vfsck`] run: a flat list of human-readable
/// consistency complaints. Never fatal — an audit finding a problem is
/// itself the intended outcome, not a crate error.
#[derive(Debug, Default)]
pub struct AuditReport {
    pub issues: Vec<String>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

fn record(issues: &Mutex<Vec<String>>, message: String) {
    tracing::warn!("vfsck: {message}");
    issues.lock().unwrap().push(message);
}

fn path_of(tree: &Tree, mut node: NodeId) -> String {
    let mut parts = Vec::new();
    loop {
        let name = tree.name_of(node);
        if name.is_empty() {
            break;
        }
        parts.push(name.to_string());
        node = tree.parent(node);
    }
    parts.reverse();
    format!("/{}", parts.join("/"))
}

/// Recursively sums up how many `Dir`/`File`/`Link` nodes `pkgver` owns
/// under `node`, only descending into children it owns as a `Dir`.
fn count_types_total(tree: &Tree, node: NodeId, pkgver: &Pkgver, total: &mut OwnerTypeCounts) {
    let Some(ty) = tree.owner(node, pkgver) else {
        return;
    };
    if ty.is_dir() {
        total.dir += 1;
        for (_, child) in tree.children(node) {
            if tree.owner(child, pkgver).is_some() {
                count_types_total(tree, child, pkgver, total);
            }
        }
    } else if ty.is_file() {
        total.file += 1;
    } else {
        total.link += 1;
    }
}

/// Per-node checks, then unbounded fan-out of the same checks over every
/// child — one thread per child, matching the one-goroutine-per-node shape
/// of the system this was ported from.
fn check_node<'scope>(
    tree: &'scope Tree,
    node: NodeId,
    pkgs: &'scope HashMap<String, String>,
    duplicate_version_allowlist: &'scope HashSet<String>,
    issues: &'scope Mutex<Vec<String>>,
    scope: &'scope Scope<'scope, '_>,
) {
    let path = path_of(tree, node);
    let owners = tree.owners(node);

    if owners.is_empty() {
        record(issues, format!("'{path}' has no owners"));
    }

    let is_root = node == ROOT;
    let is_self_parent = tree.parent(node) == node;
    if is_self_parent != is_root {
        if is_root {
            record(issues, "root is NOT its own parent".to_string());
        } else {
            record(issues, format!("non-root '{path}' is its own parent"));
        }
    }

    for (pkgver, ty) in owners {
        let (name, version) = pkgver.split();
        if pkgs.get(name).map(String::as_str) != Some(version)
            && !duplicate_version_allowlist.contains(name)
        {
            let have = pkgs.get(name).map(String::as_str).unwrap_or("<none>");
            record(
                issues,
                format!("'{path}' is owned by '{pkgver}' but pkgs has version '{have}'"),
            );
        }

        if !is_root {
            let parent = tree.parent(node);
            let parent_is_dir = tree.owner(parent, pkgver).is_some_and(|t| t.is_dir());
            if !parent_is_dir {
                record(
                    issues,
                    format!("parent of '{path}' owned by '{pkgver}' is not a dir in that package"),
                );
            }
        }

        let has_owned_child = tree
            .children(node)
            .any(|(_, child)| tree.owner(child, pkgver).is_some());
        if has_owned_child != ty.is_dir() {
            if ty.is_dir() {
                record(
                    issues,
                    format!("'{path}' is a dir in '{pkgver}' but has no children from that package"),
                );
            } else {
                record(
                    issues,
                    format!("'{path}' is NOT a dir in '{pkgver}' but has a child from that package"),
                );
            }
        }
    }

    for (_, child) in tree.children(node) {
        scope.spawn(move || {
            check_node(tree, child, pkgs, duplicate_version_allowlist, issues, scope)
        });
    }
}

impl Index {
    /// Walks the whole tree under a single read-lock acquisition, checking
    /// the invariants from the index's design (owners, parent linkage,
    /// version agreement with the package table, dir/child consistency),
    /// plus a one-time pass confirming every known package owns at least
    /// one directory and at least one file or link.
    ///
    /// `duplicate_version_allowlist` names packages (e.g. a package whose
    /// build produces entries under two versions in the same index) that
    /// are permitted to disagree with the published `pkgs` version without
    /// being flagged — this crate never special-cases a package name.
    pub fn vfsck(&self, duplicate_version_allowlist: &HashSet<String>) -> AuditReport {
        let txn = self.read();
        let tree = &txn.guard.tree;
        let pkgs = &txn.guard.pkgs;
        let issues = Mutex::new(Vec::new());

        tracing::info!("vfsck: doing one-time checks");
        std::thread::scope(|scope| {
            for (name, version) in pkgs {
                let pkgver = Pkgver::join(name, version);
                scope.spawn(move || {
                    let mut counts = OwnerTypeCounts::default();
                    count_types_total(tree, ROOT, &pkgver, &mut counts);
                    if counts.file == 0 && counts.link == 0 {
                        record(&issues, format!("'{pkgver}' doesn't own any files or links"));
                    }
                    if counts.dir == 0 {
                        record(&issues, format!("'{pkgver}' doesn't own any directories"));
                    }
                });
            }
        });

        tracing::info!("vfsck: checking tree");
        std::thread::scope(|scope| {
            check_node(tree, ROOT, pkgs, duplicate_version_allowlist, &issues, scope);
        });
        tracing::info!("vfsck: done");

        AuditReport {
            issues: issues.into_inner().unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemorySource;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn missing_owner_emits_a_warn_log() {
        let index = Index::new();
        index
            .load(&mut InMemorySource::new("T1", ["foo-1.0,/usr/bin/foo"]))
            .unwrap();
        {
            let mut state = index.state.write().unwrap();
            let usr = state.tree.get_or_create(ROOT, "usr");
            state.tree.get_or_create(usr, "orphan");
        }

        let report = index.vfsck(&HashSet::new());
        assert!(!report.is_clean());
        assert!(logs_contain("has no owners"));
    }

    #[test]
    fn clean_tree_has_no_issues() {
        let index = Index::new();
        index
            .load(&mut InMemorySource::new(
                "T1",
                ["foo-1.0,/usr/bin/foo", "bar-2.0,/opt/bar -> /usr/bin/bar"],
            ))
            .unwrap();

        let report = index.vfsck(&HashSet::new());
        assert!(report.is_clean(), "unexpected issues: {:?}", report.issues);
    }

    #[test]
    fn allowlisted_package_skips_version_mismatch() {
        let index = Index::new();
        index
            .load(&mut InMemorySource::new("T1", ["foo-1.0,/usr/bin/foo"]))
            .unwrap();

        // Simulate a stale owner entry under a different version than what
        // `pkgs` now reports, the way a duplicate-version package does.
        {
            let mut state = index.state.write().unwrap();
            let node = state.tree.get_or_create(ROOT, "usr");
            state.tree.set_owner(
                node,
                Pkgver::join("foo", "0.9"),
                crate::owner::OwnerType::Dir,
            );
        }

        let mut allowlist = HashSet::new();
        allowlist.insert("foo".to_string());
        let report = index.vfsck(&allowlist);
        assert!(
            !report
                .issues
                .iter()
                .any(|issue| issue.contains("pkgs has version")),
            "allowlisted mismatch was still flagged: {:?}",
            report.issues
        );
    }

    #[test]
    fn missing_owner_is_flagged() {
        let index = Index::new();
        index
            .load(&mut InMemorySource::new("T1", ["foo-1.0,/usr/bin/foo"]))
            .unwrap();
        {
            let mut state = index.state.write().unwrap();
            // Create a node with no owners at all.
            let usr = state.tree.get_or_create(ROOT, "usr");
            state.tree.get_or_create(usr, "orphan");
        }

        let report = index.vfsck(&HashSet::new());
        assert!(report.issues.iter().any(|issue| issue.contains("no owners")));
    }
}
