//! Frontend pages and assets, served verbatim from the frontend directory.

use std::path::Path;

use axum::Router;
use tower_http::services::{ServeDir, ServeFile};

use crate::state::AppState;

pub fn router(frontend_dir: &Path) -> Router<AppState> {
    Router::new()
        .route_service("/", ServeFile::new(frontend_dir.join("index.html")))
        .route_service("/map", ServeFile::new(frontend_dir.join("map.html")))
        .nest_service("/static", ServeDir::new(frontend_dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeExecutor;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use common::config::AppConfig;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn frontend_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("spatial-frontend-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(dir.join("css")).unwrap();
        std::fs::write(dir.join("index.html"), "<h1>index</h1>").unwrap();
        std::fs::write(dir.join("map.html"), "<div id=\"map\"></div>").unwrap();
        std::fs::write(dir.join("css/site.css"), "body { margin: 0; }").unwrap();
        dir
    }

    fn app(dir: &Path) -> Router {
        let config = AppConfig::from_lookup("spatial-service", |key| {
            (key == "DATABASE_URL").then(|| "postgres://localhost/gis".to_string())
        })
        .unwrap();
        let state = AppState::with_executor(config, Arc::new(FakeExecutor::new(|_| Ok(vec![]))));
        router(dir).with_state(state)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_pages_are_served_verbatim() {
        let dir = frontend_dir();
        assert_eq!(get(app(&dir), "/").await, (StatusCode::OK, "<h1>index</h1>".to_string()));
        assert_eq!(get(app(&dir), "/map").await, (StatusCode::OK, "<div id=\"map\"></div>".to_string()));
        assert_eq!(
            get(app(&dir), "/static/css/site.css").await,
            (StatusCode::OK, "body { margin: 0; }".to_string())
        );
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_missing_asset_is_404() {
        let dir = frontend_dir();
        let (status, _) = get(app(&dir), "/static/missing.js").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        std::fs::remove_dir_all(dir).ok();
    }
}
