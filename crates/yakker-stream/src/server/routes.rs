use crate::server::render;
use crate::snapshot::SnapshotStore;
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const XML_CONTENT_TYPE: &str = "application/xml";
const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

pub fn router(store: Arc<SnapshotStore>) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/data.xml", get(data_xml))
        .route("/livedata.xml", get(livedata_xml))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

async fn dashboard(State(store): State<Arc<SnapshotStore>>) -> impl IntoResponse {
    let body = render::dashboard_html(&store.load());
    ([(header::CONTENT_TYPE, HTML_CONTENT_TYPE)], body)
}

async fn data_xml(State(store): State<Arc<SnapshotStore>>) -> impl IntoResponse {
    let body = render::data_xml(&store.load());
    ([(header::CONTENT_TYPE, XML_CONTENT_TYPE)], body)
}

async fn livedata_xml(State(store): State<Arc<SnapshotStore>>) -> impl IntoResponse {
    let body = render::livedata_xml(&store.load());
    ([(header::CONTENT_TYPE, XML_CONTENT_TYPE)], body)
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}
