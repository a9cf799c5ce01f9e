use std::sync::Arc;
use std::vec;

use axum::body::to_bytes;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use xldb::{Index, RecordSource};
use xldb_web::handlers::browse;

/// A fixed-content [`RecordSource`] for feeding a test [`Index`] without
/// reaching for `xldb`'s own (crate-private) test support.
struct FixedSource {
    tag: &'static str,
    lines: Vec<&'static str>,
}

impl RecordSource for FixedSource {
    type Records = vec::IntoIter<std::io::Result<String>>;

    fn snapshot_tag(&mut self) -> anyhow::Result<String> {
        Ok(self.tag.to_string())
    }

    fn records(&mut self) -> anyhow::Result<Self::Records> {
        Ok(self
            .lines
            .iter()
            .map(|line| Ok(line.to_string()))
            .collect::<Vec<_>>()
            .into_iter())
    }
}

async fn seeded_index() -> Arc<Index> {
    let index = Index::new();
    index
        .load(&mut FixedSource {
            tag: "Thu, 01 Jan 1970 00:00:00 GMT",
            lines: vec!["foo-1.0,/usr/bin/foo", "foo-1.0,/usr/share/doc/foo/README"],
        })
        .unwrap();
    Arc::new(index)
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn directory_listing_shows_children_and_owner() {
    let index = seeded_index().await;
    let response = browse(
        axum::extract::State(index),
        Method::GET,
        Uri::from_static("/usr/"),
        HeaderMap::new(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("bin"));
    assert!(body.contains("foo-1.0"));
}

#[tokio::test]
async fn directory_without_trailing_slash_redirects() {
    let index = seeded_index().await;
    let response = browse(
        axum::extract::State(index),
        Method::GET,
        Uri::from_static("/usr"),
        HeaderMap::new(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers().get("Location").unwrap(), "/usr/");
}

#[tokio::test]
async fn file_path_with_trailing_slash_redirects_away_from_it() {
    let index = seeded_index().await;
    let response = browse(
        axum::extract::State(index),
        Method::GET,
        Uri::from_static("/usr/bin/foo/"),
        HeaderMap::new(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers().get("Location").unwrap(), "/usr/bin/foo");
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let index = seeded_index().await;
    let response = browse(
        axum::extract::State(index),
        Method::GET,
        Uri::from_static("/nope"),
        HeaderMap::new(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn post_is_method_not_allowed() {
    let index = seeded_index().await;
    let response = browse(
        axum::extract::State(index),
        Method::POST,
        Uri::from_static("/"),
        HeaderMap::new(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn if_modified_since_matching_tag_yields_304() {
    let index = seeded_index().await;
    let mut headers = HeaderMap::new();
    headers.insert(
        "If-Modified-Since",
        "Thu, 01 Jan 1970 00:00:00 GMT".parse().unwrap(),
    );
    let response = browse(
        axum::extract::State(Arc::clone(&index)),
        Method::GET,
        Uri::from_static("/"),
        headers,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn leaf_file_page_has_no_children_block() {
    let index = seeded_index().await;
    let response = browse(
        axum::extract::State(index),
        Method::GET,
        Uri::from_static("/usr/bin/foo"),
        HeaderMap::new(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("file in 1 package"));
    assert!(body.contains("xbps-query -R foo-1.0 --cat=/usr/bin/foo"));
}
