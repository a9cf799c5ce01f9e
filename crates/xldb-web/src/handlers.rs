use std::fmt::Write as _;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use xldb::{Index, NodeId, OwnerType, OwnerTypeCounts, ReadTxn, DEFAULT_LINK_DEPTH};

pub type AppState = Arc<Index>;

/// Matches Go's `url.PathEscape`: everything but unreserved characters.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/');

fn url_encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// Shell-quotes `s` for display in the `xbps-query` command line shown next
/// to a file's owners, matching `shellquote.go`'s "only bare if it's already
/// shell-safe" rule.
fn shell_quote(s: &str) -> String {
    let is_bare_safe =
        !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '/'));
    if is_bare_safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Builds a `301 Moved Permanently` to `location`. `location` is derived
/// from the (percent-decoded) request path, which spec.md only forbids `/`
/// and NUL in — a control byte elsewhere is a legitimate, resolvable path
/// that `HeaderValue::from_str` nonetheless rejects, so this falls back to
/// `500` rather than panicking the handler task the way `.parse().unwrap()`
/// would.
fn redirect_to(location: &str, mut headers: HeaderMap) -> Response {
    match axum::http::HeaderValue::from_str(location) {
        Ok(value) => {
            headers.insert("Location", value);
            (StatusCode::MOVED_PERMANENTLY, headers).into_response()
        }
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, headers).into_response(),
    }
}

pub async fn health_check() -> &'static str {
    "ok"
}

/// `GET`/`HEAD` on anything else: resolves `uri.path()` against the index
/// and renders a directory-listing or file-ownership page, mirroring
/// `main.go`'s single catch-all `http.HandleFunc("/", ...)`.
pub async fn browse(
    State(index): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let raw_path = uri.path().to_string();
    let decoded_path = percent_encoding::percent_decode_str(&raw_path)
        .decode_utf8_lossy()
        .into_owned();

    let txn = index.read();
    let last_modified = index.last_modified();

    let mut response_headers = HeaderMap::new();
    response_headers.insert("Content-Type", "text/html; charset=utf-8".parse().unwrap());
    response_headers.insert("Server", "voidfs".parse().unwrap());
    if let Some(tag) = &last_modified {
        if let Ok(value) = tag.parse() {
            response_headers.insert("Last-Modified", value);
        }
        if headers
            .get("If-Modified-Since")
            .and_then(|v| v.to_str().ok())
            == Some(tag.as_str())
        {
            return (StatusCode::NOT_MODIFIED, response_headers).into_response();
        }
    }

    let Some(node) = txn.follow_path(None, &decoded_path) else {
        if method == Method::HEAD {
            return (StatusCode::NOT_FOUND, response_headers).into_response();
        }
        let body = concat!(
            "<!doctype html>",
            "<title>voidfs:error</title>",
            r#"<pre style="cursor: default; margin: 0;">"#,
            "not found",
            "</pre>",
        );
        return (StatusCode::NOT_FOUND, response_headers, body).into_response();
    };

    let cwd_is_dir = txn.is_dir(node, DEFAULT_LINK_DEPTH);
    let url_is_dir = decoded_path.ends_with('/');
    if cwd_is_dir && !url_is_dir {
        return redirect_to(&format!("{decoded_path}/"), response_headers);
    }
    if url_is_dir && !cwd_is_dir {
        let trimmed = decoded_path.trim_end_matches('/');
        return redirect_to(trimmed, response_headers);
    }

    if method == Method::HEAD {
        return (StatusCode::OK, response_headers).into_response();
    }

    let real_path = txn.get_path(node);
    let dirslash = if cwd_is_dir && txn.cd(node, "..") != Some(node) {
        "/"
    } else {
        ""
    };

    let mut body = String::new();
    let _ = write!(
        body,
        "<!doctype html><title>voidfs:{}{}</title><pre style=\"cursor: default; margin: 0;\">",
        html_escape(&real_path),
        dirslash
    );

    print_header(&mut body, &txn, node, &real_path);

    if !txn.children(node).is_empty() {
        print_children(&mut body, &txn, node);
        body.push('\n');
    }

    print_owner_info(&mut body, &txn, node, &real_path);

    body.push_str("</pre>");

    (StatusCode::OK, response_headers, body).into_response()
}

fn print_header(out: &mut String, txn: &ReadTxn<'_>, node: NodeId, abspath: &str) {
    let _ = write!(out, r#"<a href="/">/</a>"#);
    let components: Vec<&str> = abspath.split('/').filter(|s| !s.is_empty()).collect();
    let mut path_len = abspath.len() + " is a ".len();
    let mut prefix = String::new();
    let mut cur = txn.root();
    for (i, name) in components.iter().enumerate() {
        cur = txn.cd(cur, name).expect("get_path roundtrips through follow_path");
        let (dirslash_url, dirslash_dis) = if i == components.len() - 1 {
            if txn.is_dir(cur, DEFAULT_LINK_DEPTH) {
                path_len += 1;
                ("/", "/")
            } else {
                ("", "")
            }
        } else {
            ("/", "/")
        };
        let part_uh = format!("{}{}", url_encode_segment(name), dirslash_url);
        let _ = write!(
            out,
            r#"<a href="/{prefix}{part_uh}">{}{dirslash_dis}</a>"#,
            html_escape(name)
        );
        prefix.push_str(&part_uh);
    }
    let _ = write!(out, " is a ");

    let mut spaces = String::new();
    let mut emit_type = |out: &mut String, spaces: &mut String, n: usize, label: &str| {
        if n == 0 {
            return;
        }
        let plural = if n == 1 { "" } else { "s" };
        let _ = writeln!(out, "{spaces}{label} in {n} package{plural}");
        if spaces.is_empty() {
            *spaces = " ".repeat(path_len);
        }
    };
    let types = txn.get_types(node);
    emit_type(out, &mut spaces, types.dir, "dir");
    emit_type(out, &mut spaces, types.file, "file");
    emit_type(out, &mut spaces, types.link, "link");
    out.push('\n');
}

fn make_typestr(types: OwnerTypeCounts) -> String {
    let mut parts = Vec::new();
    if types.dir > 0 {
        parts.push(format!("dir ({})", types.dir));
    }
    if types.file > 0 {
        parts.push(format!("file ({})", types.file));
    }
    if types.link > 0 {
        parts.push(format!("link ({})", types.link));
    }
    parts.join(", ")
}

struct ChildEntry {
    name: String,
    is_dir: bool,
    typestr: String,
    name_uh: String,
    dirslash: &'static str,
    name_h: String,
    vlen: usize,
}

fn print_children(out: &mut String, txn: &ReadTxn<'_>, node: NodeId) {
    let mut entries = Vec::new();
    let mut longest_vlen = 0usize;
    for (name, child) in txn.children(node) {
        let types = txn.get_types(child);
        let is_dir = types.dir > 0 || (types.link > 0 && txn.is_dir(child, DEFAULT_LINK_DEPTH));
        // Byte length, matching Go's `len(name)` (main.go:125) — keeps
        // column padding identical to the original for non-ASCII names.
        let mut vlen = name.len();
        let dirslash = if is_dir {
            vlen += 1;
            "/"
        } else {
            ""
        };
        if vlen > longest_vlen {
            longest_vlen = vlen;
        }
        entries.push(ChildEntry {
            name_uh: url_encode_segment(&name),
            name_h: html_escape(&name),
            typestr: make_typestr(types),
            is_dir,
            dirslash,
            vlen,
            name,
        });
    }
    entries.sort_by(|a, b| match (a.is_dir, b.is_dir) {
        (true, true) | (false, false) => a.name.cmp(&b.name),
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
    });
    for entry in &entries {
        let pad = " ".repeat(longest_vlen - entry.vlen + 2);
        let _ = writeln!(
            out,
            r#"<a href="./{}{dirslash}">{}{dirslash}</a>{pad}{}"#,
            entry.name_uh,
            entry.name_h,
            entry.typestr,
            dirslash = entry.dirslash,
        );
    }
}

fn print_owner_info(out: &mut String, txn: &ReadTxn<'_>, node: NodeId, real_path: &str) {
    struct OwnerEntry {
        label: String,
        typestr: String,
    }

    let mut owners: Vec<OwnerEntry> = Vec::new();
    let mut is_file = false;
    let mut longest_owner = 0usize;
    for (pkgver, ty) in txn.get_owners(node) {
        let typestr = match ty {
            OwnerType::Dir => "dir".to_string(),
            OwnerType::File => {
                is_file = true;
                "file".to_string()
            }
            OwnerType::Link(target) => {
                if let Some(resolved) = txn.link_resolve_target(node, target) {
                    let mut url = txn.get_path_urlencoded(resolved, url_encode_segment);
                    url.push_str(txn.get_dirslash(resolved, DEFAULT_LINK_DEPTH));
                    format!(
                        r#"link to <a href="{}">{}</a>"#,
                        html_escape(&url),
                        html_escape(target)
                    )
                } else {
                    format!(r#"link to <span>{}</span>"#, html_escape(target))
                }
            }
        };
        let label = pkgver.to_string();
        longest_owner = longest_owner.max(label.len());
        owners.push(OwnerEntry { label, typestr });
    }
    owners.sort_by(|a, b| a.label.cmp(&b.label));

    if is_file {
        let quoted_path = html_escape(&shell_quote(real_path));
        for entry in owners.iter().filter(|e| e.typestr == "file") {
            let _ = writeln!(out, "% xbps-query -R {} --cat={}", entry.label, quoted_path);
        }
        out.push('\n');
    }

    for (i, entry) in owners.iter().enumerate() {
        let pad = " ".repeat(longest_owner - entry.label.len() + 2);
        let _ = write!(out, "{}{pad}{}", entry.label, entry.typestr);
        if i < owners.len() - 1 {
            out.push('\n');
        }
    }
}
