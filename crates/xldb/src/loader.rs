use std::collections::HashMap;

use crate::error::{LoadError, LoadResult};
use crate::index::Index;
use crate::owner::OwnerType;
use crate::pkgver::Pkgver;
use crate::tree::{Tree, ROOT};

/// The "line-oriented record producer plus snapshot timestamp probe" the
/// loader is built against. The core never depends on `git`, files, or any
/// particular transport — a concrete source (e.g. a `git log`/`git grep`
/// shell-out) lives outside this crate.
pub trait RecordSource {
    type Records: Iterator<Item = std::io::Result<String>>;

    /// An opaque, comparable tag for "what revision of the data is this".
    /// Two calls yielding an identical tag short-circuit the reload.
    fn snapshot_tag(&mut self) -> anyhow::Result<String>;

    /// Opens the record stream: one `pkgver,path[ -> target]` record per
    /// line, grouped by pkgver (the loader assumes and exploits grouping).
    fn records(&mut self) -> anyhow::Result<Self::Records>;
}

struct Record<'a> {
    pkgver: &'a str,
    path: &'a str,
    target: Option<&'a str>,
}

fn parse_record_line(line: &str) -> Option<Record<'_>> {
    let comma = line.find(',')?;
    let pkgver = &line[..comma];
    let mut path = &line[comma + 1..];
    let mut target = None;
    if let Some(arrow) = path.find(" -> ") {
        target = Some(&path[arrow + " -> ".len()..]);
        path = &path[..arrow];
    }
    Some(Record { pkgver, path, target })
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Applies one record's path to the tree: every component but the last
/// becomes (or stays) a `Dir` owned by `pkgver`; the last component is
/// `Dir` with no target, `Link(target)` with one, or `File` otherwise.
/// Existing owner entries for the same `(node, pkgver)` are overwritten,
/// so re-ingesting a record is idempotent.
fn ingest_path(tree: &mut Tree, pkgver: &Pkgver, path: &str, target: Option<&str>) {
    let components: Vec<&str> = split_path(path).collect();
    let Some(last) = components.len().checked_sub(1) else {
        return;
    };
    let mut node = ROOT;
    for (i, name) in components.iter().enumerate() {
        let child = tree.get_or_create(node, name);
        let ty = if i < last {
            OwnerType::Dir
        } else {
            match target {
                Some(t) => OwnerType::Link(t.to_string()),
                None => OwnerType::File,
            }
        };
        tree.set_owner(child, pkgver.clone(), ty);
        node = child;
    }
}

impl Index {
    /// Performs a reload: obtains a snapshot tag, and if it differs from
    /// the published one, streams records and diffs them against the
    /// previous package set (§4.3's unchanged/updated/added/removed
    /// protocol), eradicating stale owners and publishing the new tag only
    /// after every mutation has landed.
    ///
    /// A second concurrent call while one is in flight returns `Ok(())`
    /// immediately without touching the tree (overlap suppression).
    pub fn load(&self, source: &mut impl RecordSource) -> LoadResult<()> {
        let guard = self.begin_load();
        if guard.already_loading() {
            tracing::info!("xldb: already loading");
            return Ok(());
        }

        let snapshot_tag = source.snapshot_tag().map_err(LoadError::SnapshotTag)?;
        let previous_tag = self.last_modified();
        let updating = previous_tag.is_some();

        if let Some(prev) = &previous_tag {
            if *prev == snapshot_tag {
                tracing::info!("xldb: already up-to-date");
                return Ok(());
            }
            tracing::info!(from = %prev, to = %snapshot_tag, "xldb: reloading");
        }

        let records = source.records().map_err(LoadError::RecordStreamOpen)?;

        let old_pkgs = if updating {
            self.state.read().unwrap().pkgs.clone()
        } else {
            HashMap::new()
        };

        let mut new_pkgs: HashMap<String, String> = HashMap::new();
        let mut current: Option<Pkgver> = None;
        let mut skip = false;

        for line in records {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    tracing::warn!(error = %err, "xldb: record stream error, stopping early");
                    break;
                }
            };
            let Some(record) = parse_record_line(&line) else {
                tracing::warn!(line = %line, "xldb: malformed record, skipping");
                continue;
            };

            let same_group = current.as_ref().map(Pkgver::as_str) == Some(record.pkgver);
            if same_group {
                if skip {
                    continue;
                }
                let pkgver = current.clone().expect("same_group implies current is set");
                let mut state = self.state.write().unwrap();
                ingest_path(&mut state.tree, &pkgver, record.path, record.target);
                continue;
            }

            // First record of a new pkgver: decide skip / updated / added
            // inside the same critical section as this record's ingestion.
            let Some(pkgver) = Pkgver::from_joined(record.pkgver) else {
                tracing::warn!(
                    pkgver = %record.pkgver,
                    "xldb: malformed pkgver (no '-' separator), skipping record"
                );
                continue;
            };
            let (name, version) = pkgver.split();
            let (name, version) = (name.to_string(), version.to_string());
            new_pkgs.insert(name.clone(), version.clone());

            let mut state = self.state.write().unwrap();
            if updating {
                match old_pkgs.get(&name) {
                    Some(old_version) if *old_version == version => {
                        skip = true;
                    }
                    Some(old_version) => {
                        skip = false;
                        tracing::info!(package = %name, from = %old_version, to = %version, "xldb: updated package");
                        let old_pkgver = Pkgver::join(&name, old_version);
                        state.tree.eradicate(ROOT, &old_pkgver);
                    }
                    None => {
                        skip = false;
                        tracing::info!(package = %name, version = %version, "xldb: new package");
                    }
                }
            } else {
                skip = false;
            }

            current = Some(pkgver.clone());
            if skip {
                continue;
            }

            state.tree.set_owner(ROOT, pkgver.clone(), OwnerType::Dir);
            ingest_path(&mut state.tree, &pkgver, record.path, record.target);
        }

        if updating {
            let mut state = self.state.write().unwrap();
            for (name, version) in &old_pkgs {
                if !new_pkgs.contains_key(name) {
                    tracing::info!(package = %name, "xldb: removed package");
                    let old_pkgver = Pkgver::join(name, version);
                    state.tree.eradicate(ROOT, &old_pkgver);
                }
            }
        }

        self.state.write().unwrap().pkgs = new_pkgs;

        // Published last, and only after every write-lock acquisition for
        // this reload has been released, so a reader that observes this
        // tag and then traverses under one read-lock sees a tree
        // consistent with it.
        *self.last_modified.write().unwrap() = Some(snapshot_tag);

        Ok(())
    }
}
