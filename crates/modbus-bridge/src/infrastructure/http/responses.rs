//! Response builders shared by the bridge and portal routers.
//!
//! # Static pages (for beginners)
//!
//! Files come from `tower-http`: [`ServeFile`] for a named page and
//! [`ServeDir`] for whatever path the request asks for.  Both are `tower`
//! services, so a handler drives them with `ServiceExt::oneshot` and gets
//! back a response with the content type, length and caching headers
//! already filled in.  `ServeDir` also refuses paths that try to climb out
//! of the root with `..`.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, warn};

use crate::infrastructure::storage::AssetStore;

/// Page served at `/` in provisioning mode.
pub const INDEX_PAGE: &str = "index.html";

/// Page served for unmatched paths.
pub const NOT_FOUND_PAGE: &str = "404.html";

/// A `text/plain` response.
pub fn text(status: StatusCode, body: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body.into(),
    )
        .into_response()
}

/// A JSON `{"error": message}` response.
pub fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// The file `name` from the asset root, answered with `status`.
///
/// `None` when the store is unmounted or the file cannot be served.
pub async fn page(assets: &AssetStore, name: &str, status: StatusCode) -> Option<Response> {
    let path = assets.root()?.join(name);
    let response = ServeFile::new(&path)
        .oneshot(Request::new(Body::empty()))
        .await
        .unwrap_or_else(|never| match never {});
    if response.status() != StatusCode::OK {
        debug!(path = %path.display(), status = %response.status(), "Page unavailable");
        return None;
    }
    let mut response = response.into_response();
    *response.status_mut() = status;
    Some(response)
}

/// The asset named by `request`'s path, or `None` if there is no such file.
pub async fn static_asset(assets: &AssetStore, request: Request) -> Option<Response> {
    let root = assets.root()?;
    let response = ServeDir::new(root)
        .append_index_html_on_directories(false)
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});
    let status = response.status();
    (status.is_success() || status == StatusCode::NOT_MODIFIED).then(|| response.into_response())
}

/// The 404 page with status 404, or plain text when it is unavailable.
pub async fn not_found(assets: &AssetStore) -> Response {
    match page(assets, NOT_FOUND_PAGE, StatusCode::NOT_FOUND).await {
        Some(response) => response,
        None => text(StatusCode::NOT_FOUND, "Not found"),
    }
}

/// HTML list of the asset store's files, one link per file.
pub fn file_listing(assets: &AssetStore) -> Response {
    let entries = match assets.list() {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "Cannot list assets");
            return text(StatusCode::INTERNAL_SERVER_ERROR, "Asset store unavailable");
        }
    };

    let mut html = String::from(
        "<!DOCTYPE html><html><head><title>Internal files</title></head><body><ul>",
    );
    for entry in &entries {
        let path = escape_html(&entry.path);
        let name = escape_html(entry.path.trim_start_matches('/'));
        html.push_str(&format!(
            "<li><a href=\"{path}\">{name} - {path}</a> ({} bytes)</li>",
            entry.size
        ));
    }
    html.push_str("</ul></body></html>");
    Html(html).into_response()
}

// File names come straight from the directory, so they may contain markup.
fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn temp_assets(files: &[(&str, &str)]) -> AssetStore {
        let dir = std::env::temp_dir().join(format!("modbus_bridge_http_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        for (name, contents) in files {
            std::fs::write(dir.join(name), contents).unwrap();
        }
        AssetStore::mount(&dir).expect("mount")
    }

    fn get(uri: &str) -> Request {
        axum::http::Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_serves_404_page() {
        // Arrange
        let assets = temp_assets(&[("404.html", "<h1>gone</h1>")]);

        // Act
        let response = not_found(&assets).await;

        // Assert
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html"));
        assert_eq!(body_string(response).await, "<h1>gone</h1>");
    }

    #[tokio::test]
    async fn test_not_found_without_assets_is_plain_text() {
        let response = not_found(&AssetStore::unmounted()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "Not found");
    }

    #[tokio::test]
    async fn test_not_found_without_404_page_is_plain_text() {
        let response = not_found(&temp_assets(&[("index.html", "x")])).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "Not found");
    }

    #[tokio::test]
    async fn test_page_serves_named_file() {
        let assets = temp_assets(&[("index.html", "<h1>setup</h1>")]);

        let response = page(&assets, INDEX_PAGE, StatusCode::OK).await.expect("page");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "<h1>setup</h1>");
    }

    #[tokio::test]
    async fn test_static_asset_guesses_content_type() {
        // Arrange
        let assets = temp_assets(&[("script.js", "// js")]);

        // Act
        let response = static_asset(&assets, get("/script.js")).await.expect("asset");

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .contains("javascript"));
        assert_eq!(body_string(response).await, "// js");
    }

    #[tokio::test]
    async fn test_static_asset_missing_or_escaping_path_is_none() {
        let assets = temp_assets(&[("index.html", "x")]);
        assert!(static_asset(&assets, get("/nope.html")).await.is_none());
        assert!(static_asset(&assets, get("/../etc/passwd")).await.is_none());
        assert!(static_asset(&assets, get("/")).await.is_none());
        assert!(static_asset(&AssetStore::unmounted(), get("/index.html"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_file_listing_links_every_file() {
        // Arrange
        let assets = temp_assets(&[("index.html", "x"), ("script.js", "yy")]);

        // Act
        let body = body_string(file_listing(&assets)).await;

        // Assert
        assert!(body.starts_with("<!DOCTYPE html>"));
        assert!(body.contains("<li><a href=\"/index.html\">index.html - /index.html</a> (1 bytes)</li>"));
        assert!(body.contains("<a href=\"/script.js\">"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a&\"b\">"), "&lt;a&amp;&quot;b&quot;&gt;");
    }
}
