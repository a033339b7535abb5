use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::core::{
    codec,
    error::{RejectReason, SkinCheckError},
    session::{SessionId, SessionState, SessionStore},
    upload::{IncomingFile, UploadPolicy},
    yolo::{DetectionRecord, Detector},
};
use crate::resources::pages::{FormPage, Pages};

const UNREADABLE_RESULT: &str = "The stored photo could not be read. Please upload it again.";

/// Everything the handlers share. Built once at startup and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub uploads: Arc<UploadPolicy>,
    pub detector: Arc<dyn Detector>,
    pub sessions: Arc<dyn SessionStore>,
    pub pages: Arc<Pages>,
}

impl AppState {
    pub fn new(
        uploads: UploadPolicy,
        detector: Arc<dyn Detector>,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, SkinCheckError> {
        Ok(Self {
            uploads: Arc::new(uploads),
            detector,
            sessions,
            pages: Arc::new(Pages::new()?),
        })
    }
}

/// A saved upload together with what the detector found in it.
#[derive(Debug, Clone)]
pub struct ProcessedUpload {
    pub img_path: PathBuf,
    pub results: Vec<DetectionRecord>,
}

impl IntoResponse for SkinCheckError {
    fn into_response(self) -> Response {
        tracing::error!("Request failed: {}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong").into_response()
    }
}

fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(SessionId::from_cookie_header)
}

/// The cookie's session id, but only when the store knows it. An id the
/// server never issued is dropped so the caller hands out a fresh one.
async fn issued_session(state: &AppState, headers: &HeaderMap) -> Option<SessionId> {
    let session_id = session_from_headers(headers)?;
    match state.sessions.load(&session_id).await {
        Ok(Some(_)) => Some(session_id),
        Ok(None) => {
            tracing::warn!("Ignoring unknown session id {}", session_id);
            None
        }
        Err(e) => {
            tracing::warn!("Replacing unreadable session {}: {}", session_id, e);
            None
        }
    }
}

async fn take_flash(state: &AppState, headers: &HeaderMap) -> Option<String> {
    let session_id = session_from_headers(headers)?;
    match state.sessions.take_flash(&session_id).await {
        Ok(flash) => flash,
        Err(e) => {
            tracing::warn!("Failed to read flash for session {}: {}", session_id, e);
            None
        }
    }
}

/// Loads the session, applies `update` and writes it back. Failures are
/// logged; the caller's redirect happens either way.
async fn update_session<F>(state: &AppState, session_id: &SessionId, update: F)
where
    F: FnOnce(&mut SessionState),
{
    let mut session = match state.sessions.load(session_id).await {
        Ok(session) => session.unwrap_or_default(),
        Err(e) => {
            tracing::warn!("Discarding unreadable session {}: {}", session_id, e);
            SessionState::default()
        }
    };
    update(&mut session);
    if let Err(e) = state.sessions.save(session_id, &session).await {
        tracing::error!("Failed to store session {}: {}", session_id, e);
    }
}

pub async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Html<String>, SkinCheckError> {
    let flash = take_flash(&state, &headers).await;
    Ok(Html(state.pages.index(flash.as_deref())?))
}

async fn form_page(
    state: &AppState,
    headers: &HeaderMap,
    page: FormPage,
) -> Result<Html<String>, SkinCheckError> {
    let flash = take_flash(state, headers).await;
    Ok(Html(state.pages.form(page, flash.as_deref())?))
}

pub async fn camera_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Html<String>, SkinCheckError> {
    form_page(&state, &headers, FormPage::Camera).await
}

pub async fn camera_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    handle_upload_request(&state, &headers, multipart, FormPage::Camera).await
}

pub async fn upload_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Html<String>, SkinCheckError> {
    form_page(&state, &headers, FormPage::Upload).await
}

pub async fn upload_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    handle_upload_request(&state, &headers, multipart, FormPage::Upload).await
}

/// A body cut off by the upload limit is "too large"; any other broken
/// multipart stream counts as no file at all.
fn multipart_failure(e: &MultipartError) -> Option<RejectReason> {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Some(RejectReason::TooLarge)
    } else {
        None
    }
}

/// Pulls the `file` field out of the form. Anything else is ignored.
async fn read_file_field(
    mut multipart: Multipart,
) -> Result<Option<IncomingFile>, RejectReason> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!("Malformed multipart body: {}", e);
                return multipart_failure(&e).map_or(Ok(None), Err);
            }
        };
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_owned();
        return match field.bytes().await {
            Ok(data) => Ok(Some(IncomingFile {
                file_name,
                data: data.to_vec(),
            })),
            Err(e) => {
                tracing::warn!("Failed to read upload {}: {}", file_name, e);
                multipart_failure(&e).map_or(Ok(None), Err)
            }
        };
    }
}

/// Saves the upload and runs detection on it, off the async workers.
///
/// Only a failed save is an error. A detector that fails (or panics) yields
/// an empty result list so the image can still be shown.
pub async fn process_uploaded_file(
    state: &AppState,
    file: Option<IncomingFile>,
) -> Result<ProcessedUpload, SkinCheckError> {
    let uploads = state.uploads.clone();
    let img_path = tokio::task::spawn_blocking(move || uploads.accept(file.as_ref()))
        .await
        .map_err(|e| SkinCheckError::Io(std::io::Error::other(e)))??;

    let detector = state.detector.clone();
    let detect_path = img_path.clone();
    let results = match tokio::task::spawn_blocking(move || detector.detect_records(&detect_path))
        .await
    {
        Ok(results) => results,
        Err(e) => {
            tracing::error!("Detection task for {} died: {}", img_path.display(), e);
            Vec::new()
        }
    };

    Ok(ProcessedUpload { img_path, results })
}

/// Common POST handling for the camera and upload forms: redirect to the
/// result view on success, back to `page` with a flash message otherwise.
pub async fn handle_upload_request(
    state: &AppState,
    headers: &HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
    page: FormPage,
) -> Response {
    let (session_id, fresh) = match issued_session(state, headers).await {
        Some(id) => (id, false),
        None => (SessionId::generate(), true),
    };

    let file = match multipart {
        Ok(multipart) => read_file_field(multipart).await,
        Err(rejection) => {
            tracing::warn!("Upload to {} is not a multipart form: {}", page.path(), rejection);
            Ok(None)
        }
    };
    let processed = match file {
        Ok(file) => process_uploaded_file(state, file).await,
        Err(reason) => Err(reason.into()),
    };

    let redirect = match processed {
        Ok(processed) => {
            tracing::info!(
                "Session {}: {} with {} detections",
                session_id,
                processed.img_path.display(),
                processed.results.len()
            );
            update_session(state, &session_id, |session| {
                session.image_path = Some(processed.img_path.to_string_lossy().into_owned());
                session.results = processed.results;
                session.flash = None;
            })
            .await;
            Redirect::to("/result")
        }
        Err(e) => {
            match &e {
                SkinCheckError::Rejected(_) => tracing::warn!("Upload to {}: {}", page.path(), e),
                _ => tracing::error!("File processing error: {}", e),
            }
            let message = e.user_message();
            update_session(state, &session_id, |session| {
                session.flash = Some(message);
            })
            .await;
            Redirect::to(page.path())
        }
    };

    if fresh {
        (
            [(header::SET_COOKIE, session_id.set_cookie_value())],
            redirect,
        )
            .into_response()
    } else {
        redirect.into_response()
    }
}

/// Shows the last processed image with its detections, or sends the client
/// back to the entry page when there is nothing displayable.
pub async fn result(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(session_id) = session_from_headers(&headers) else {
        return Redirect::to("/").into_response();
    };
    let session = match state.sessions.load(&session_id).await {
        Ok(session) => session.unwrap_or_default(),
        Err(e) => {
            tracing::error!("Failed to load session {}: {}", session_id, e);
            SessionState::default()
        }
    };
    let Some(img_path) = session.image_path else {
        return Redirect::to("/").into_response();
    };

    let encode_path = PathBuf::from(&img_path);
    let encoded = tokio::task::spawn_blocking(move || codec::encode(&encode_path))
        .await
        .ok()
        .flatten();
    let Some(encoded) = encoded else {
        update_session(&state, &session_id, |session| {
            session.flash = Some(UNREADABLE_RESULT.to_owned());
        })
        .await;
        return Redirect::to("/").into_response();
    };

    match state
        .pages
        .result(&encoded, &session.results, state.detector.input_dimension())
    {
        Ok(html) => Html(html).into_response(),
        Err(e) => e.into_response(),
    }
}
