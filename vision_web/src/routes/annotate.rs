use crate::{
    overlay::RenderError,
    pages,
    server::SharedState,
    storage::StorageError,
    task::Task,
};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use std::{io::Cursor, time::Instant};
use thiserror::Error;
use tracing::instrument;
use vision_inference::InferenceError;

const IMAGE_FIELD: &str = "image";

#[derive(Error, Debug)]
pub enum PageError {
    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),
    #[error("Image decode failed: {0}")]
    Decode(String),
    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),
    #[error("Rendering failed: {0}")]
    Render(#[from] RenderError),
    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        tracing::error!("Request failed: {}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(pages::server_error()),
        )
            .into_response()
    }
}

struct Upload {
    file_name: String,
    data: Bytes,
}

pub async fn detection_form(State(state): State<SharedState>) -> Html<String> {
    state.metrics.record_request(Task::Detection.route());
    Html(pages::upload_form(Task::Detection))
}

pub async fn segmentation_form(State(state): State<SharedState>) -> Html<String> {
    state.metrics.record_request(Task::Segmentation.route());
    Html(pages::upload_form(Task::Segmentation))
}

pub async fn detection_upload(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Html<String>, PageError> {
    handle_upload(state, Task::Detection, multipart).await
}

pub async fn segmentation_upload(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Html<String>, PageError> {
    handle_upload(state, Task::Segmentation, multipart).await
}

#[instrument(skip(state, multipart))]
async fn handle_upload(
    state: SharedState,
    task: Task,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Html<String>, PageError> {
    state.metrics.record_request(task.route());

    let Some(upload) = read_image_field(multipart).await else {
        return Ok(Html(pages::upload_form(task)));
    };

    let stored = state.storage.save(&upload.file_name, &upload.data)?;
    tracing::info!("Stored {} ({} bytes) for {}", stored, upload.data.len(), task.as_str());

    let processed = tokio::task::spawn_blocking({
        let state = state.clone();
        let stored = stored.clone();
        move || annotate(&state, task, &stored, &upload.data)
    })
    .await??;

    Ok(Html(pages::result(task, &stored, &processed)))
}

/// First `image` file field, `None` when the form has none or is unreadable.
async fn read_image_field(multipart: Result<Multipart, MultipartRejection>) -> Option<Upload> {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            tracing::debug!("Not a multipart upload: {}", rejection);
            return None;
        }
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Malformed multipart body: {}", e);
                return None;
            }
        };

        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let file_name = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return None,
        };

        return match field.bytes().await {
            Ok(data) => Some(Upload { file_name, data }),
            Err(e) => {
                tracing::warn!("Failed to read upload {}: {}", file_name, e);
                None
            }
        };
    }
}

/// Decode, infer, draw and store. Runs on the blocking pool.
fn annotate(state: &SharedState, task: Task, stored: &str, data: &[u8]) -> Result<String, PageError> {
    let mut image = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| PageError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| PageError::Decode(e.to_string()))?
        .to_rgb8();

    let started = Instant::now();
    let rendered = match task {
        Task::Detection => {
            let detections = state.detector.detect(&image)?;
            state.metrics.record_inference_duration(elapsed_ms(started), task);
            state.overlay.draw_detections(&mut image, &detections);
            detections.len()
        }
        Task::Segmentation => {
            let instances = state.segmenter.segment(&image)?;
            state.metrics.record_inference_duration(elapsed_ms(started), task);
            state.overlay.draw_masks(&mut image, &instances, &mut rand::rng())?;
            instances.len()
        }
    };
    state.metrics.record_rendered_objects(rendered, task);
    tracing::info!("Rendered {} objects onto {}", rendered, stored);

    Ok(state.storage.save_processed(stored, &image)?)
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
