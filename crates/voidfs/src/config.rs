use std::collections::HashSet;

/// Runtime configuration, resolved from environment variables the way
/// `protocol-s3`'s `EbpfGateway::init_gateway` resolves its own knobs —
/// direct `std::env::var` reads, no config-file crate.
pub struct Config {
    pub repo: String,
    pub addr: String,
    pub audit_allowlist: HashSet<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            repo: default_repo(),
            addr: std::env::var("VOIDFS_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            audit_allowlist: std::env::var("VOIDFS_AUDIT_ALLOWLIST")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Mirrors `getDefaultRepo`: `$VOIDFS_REPO`, else `$XLOCATE_GIT`, else
/// `$XDG_CACHE_HOME/xlocate.git` (falling back to `$HOME/.cache`, then `.`
/// if neither is set — the original falls back to `.` when it can't
/// determine a user cache directory at all).
fn default_repo() -> String {
    if let Ok(repo) = std::env::var("VOIDFS_REPO") {
        if !repo.is_empty() {
            return repo;
        }
    }
    if let Ok(xlocate_git) = std::env::var("XLOCATE_GIT") {
        if !xlocate_git.is_empty() {
            return xlocate_git;
        }
    }
    let cache_dir = std::env::var("XDG_CACHE_HOME")
        .ok()
        .or_else(|| std::env::var("HOME").ok().map(|home| format!("{home}/.cache")))
        .unwrap_or_else(|| ".".to_string());
    format!("{cache_dir}/xlocate.git")
}
