mod annotate;
mod health;
mod index;
mod metrics;

use crate::server::SharedState;
use axum::{routing::get, Router};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(index::index))
        .route(
            "/detection",
            get(annotate::detection_form).post(annotate::detection_upload),
        )
        .route(
            "/detection/",
            get(annotate::detection_form).post(annotate::detection_upload),
        )
        .route(
            "/segmentation",
            get(annotate::segmentation_form).post(annotate::segmentation_upload),
        )
        .route(
            "/segmentation/",
            get(annotate::segmentation_form).post(annotate::segmentation_upload),
        )
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
}
