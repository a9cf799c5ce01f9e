use std::io::{BufRead, BufReader, Lines};
use std::process::{Child, ChildStdout, Command, Stdio};

use xldb::RecordSource;

/// Reads `(pkgver, path[, target])` records out of a git-tracked `xlocate`
/// checkout by shelling out to `git`, the same commands `original_source`'s
/// `getLastModified`/`Load` ran.
pub struct GitRecordSource {
    repo: String,
}

impl GitRecordSource {
    pub fn new(repo: impl Into<String>) -> Self {
        GitRecordSource { repo: repo.into() }
    }
}

impl RecordSource for GitRecordSource {
    type Records = RecordLines;

    fn snapshot_tag(&mut self) -> anyhow::Result<String> {
        let output = Command::new("/bin/sh")
            .arg("-c")
            .arg(
                r#"
                set -e
                s=$(git -C "$VOIDFS_REPO" log -1 --format=%at)
                LC_ALL=C TZ=GMT date -d "@$s" +'%a, %d %b %Y %H:%M:%S %Z'
                "#,
            )
            .env("VOIDFS_REPO", &self.repo)
            .output()?;
        if !output.status.success() {
            anyhow::bail!(
                "failed to read date from xlocate repo: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }
        let tag = String::from_utf8(output.stdout)?;
        Ok(tag.trim_end_matches('\n').to_string())
    }

    fn records(&mut self) -> anyhow::Result<Self::Records> {
        // -z: null-delimited, since some package versions contain ':'.
        // tr/cut reassemble each record as "pkgver,path[ -> target]".
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(r#"git -C "$VOIDFS_REPO" grep -z '' @ | tr '\0' ',' | cut -b3- | uniq"#)
            .env("VOIDFS_REPO", &self.repo)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;
        let stdout = child.stdout.take().expect("child spawned with piped stdout");
        Ok(RecordLines {
            lines: BufReader::new(stdout).lines(),
            child,
        })
    }
}

pub struct RecordLines {
    lines: Lines<BufReader<ChildStdout>>,
    child: Child,
}

impl Iterator for RecordLines {
    type Item = std::io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines.next()
    }
}

impl Drop for RecordLines {
    fn drop(&mut self) {
        match self.child.wait() {
            Ok(status) if !status.success() => {
                tracing::warn!(%status, "xldb: git grep exited non-zero");
            }
            Err(err) => tracing::warn!(error = %err, "xldb: failed to wait on git grep"),
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_tag_errors_on_a_non_git_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = GitRecordSource::new(dir.path().to_string_lossy().to_string());
        assert!(source.snapshot_tag().is_err());
    }

    #[test]
    fn snapshot_tag_reads_the_last_commit_date() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path();
        let run = |args: &[&str]| {
            let status = Command::new("git")
                .args(args)
                .current_dir(repo)
                .status()
                .unwrap();
            assert!(status.success());
        };
        run(&["init", "-q"]);
        run(&["config", "user.email", "test@example.com"]);
        run(&["config", "user.name", "test"]);
        std::fs::write(repo.join("foo-1.0,/usr/bin/foo"), "").unwrap();
        run(&["add", "."]);
        run(&["commit", "-q", "-m", "seed"]);

        let mut source = GitRecordSource::new(repo.to_string_lossy().to_string());
        let tag = source.snapshot_tag().unwrap();
        assert!(!tag.is_empty());
    }
}
