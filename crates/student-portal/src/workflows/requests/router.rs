use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::domain::{Attachment, FileType, OwnerId, RequestId, RequestSubmission};
use super::repository::{ObjectStorage, RequestRepository};
use super::service::{RequestService, RequestServiceError};
use super::session::{Role, Session};
use super::status::{Locale, RequestStatus};

/// Header carrying the account id verified by the auth provider's gateway.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the caller's role (`student` or `admin`).
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Multipart overhead allowed on top of the attachment ceiling.
const FORM_OVERHEAD_BYTES: usize = 256 * 1024;

/// Router builder exposing the submission, tracking and back-office endpoints.
pub fn request_router<R, S>(service: Arc<RequestService<R, S>>) -> Router
where
    R: RequestRepository + 'static,
    S: ObjectStorage + 'static,
{
    let slots = 4usize;
    let ceiling = usize::try_from(service.upload_policy().max_upload_size_bytes).unwrap_or(usize::MAX);
    let body_limit = ceiling
        .saturating_add(1)
        .saturating_mul(slots)
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route(
            "/api/v1/requests",
            post(submit_handler::<R, S>).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/v1/requests/track", get(track_handler::<R, S>))
        .route("/api/v1/requests/mine", get(my_requests_handler::<R, S>))
        .route(
            "/api/v1/requests/:request_id/files",
            get(files_handler::<R, S>),
        )
        .route("/api/v1/admin/requests", get(admin_list_handler::<R, S>))
        .route(
            "/api/v1/admin/requests/:request_id/status",
            patch(status_update_handler::<R, S>),
        )
        .with_state(service)
}

/// Session for the identity the gateway attached to the request, if any.
pub fn session_from_headers(headers: &HeaderMap) -> Option<Session> {
    let owner_id = headers
        .get(USER_ID_HEADER)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|value| !value.is_empty())?;
    let role = headers
        .get(USER_ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(Role::from_str)
        .unwrap_or(Role::Student);

    Some(Session::sign_in(OwnerId(owner_id.to_string()), role))
}

fn error_response(error: RequestServiceError) -> Response {
    let status = match &error {
        RequestServiceError::AuthRequired => StatusCode::UNAUTHORIZED,
        RequestServiceError::Forbidden => StatusCode::FORBIDDEN,
        RequestServiceError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        RequestServiceError::UploadFailure { .. } => StatusCode::BAD_GATEWAY,
        RequestServiceError::NotFound => StatusCode::NOT_FOUND,
        RequestServiceError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = match &error {
        RequestServiceError::Unexpected(_) => "unexpected error, please try again later".to_string(),
        other => other.to_string(),
    };

    let payload = match error.request_number() {
        Some(number) => json!({ "error": message, "request_number": number }),
        None => json!({ "error": message }),
    };
    (status, Json(payload)).into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    let payload = json!({ "error": message.into() });
    (StatusCode::BAD_REQUEST, Json(payload)).into_response()
}

pub(crate) async fn submit_handler<R, S>(
    State(service): State<Arc<RequestService<R, S>>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response
where
    R: RequestRepository + 'static,
    S: ObjectStorage + 'static,
{
    let session = session_from_headers(&headers);
    if session.is_none() {
        return error_response(RequestServiceError::AuthRequired);
    }

    let submission = match read_submission(multipart).await {
        Ok(submission) => submission,
        Err(rejection) => return rejection,
    };

    match service.submit(session.as_ref(), submission).await {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn read_submission(mut multipart: Multipart) -> Result<RequestSubmission, Response> {
    let mut submission: Option<RequestSubmission> = None;
    let mut attachments = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "unreadable submission form");
                let payload = json!({ "error": err.body_text() });
                return Err((err.status(), Json(payload)).into_response());
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        if name == "payload" {
            let bytes = field
                .bytes()
                .await
                .map_err(|err| (err.status(), err.body_text()).into_response())?;
            let parsed: RequestSubmission = serde_json::from_slice(&bytes)
                .map_err(|err| bad_request(format!("invalid payload: {err}")))?;
            submission = Some(parsed);
            continue;
        }

        let Some(file_type) = FileType::parse(&name) else {
            return Err(bad_request(format!("unexpected form field '{name}'")));
        };
        let file_name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| file_type.as_str().to_string());
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|err| (err.status(), err.body_text()).into_response())?;

        // Browsers send an empty part for an untouched file input.
        if bytes.is_empty() && file_name.is_empty() {
            continue;
        }

        attachments.push(Attachment {
            file_type,
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    let mut submission = submission.ok_or_else(|| bad_request("missing 'payload' field"))?;
    submission.attachments = attachments;
    Ok(submission)
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrackQuery {
    pub(crate) request_number: String,
    pub(crate) submission_date: String,
    #[serde(default)]
    pub(crate) locale: Option<Locale>,
}

pub(crate) async fn track_handler<R, S>(
    State(service): State<Arc<RequestService<R, S>>>,
    Query(query): Query<TrackQuery>,
) -> Response
where
    R: RequestRepository + 'static,
    S: ObjectStorage + 'static,
{
    let Ok(date) = NaiveDate::parse_from_str(query.submission_date.trim(), "%Y-%m-%d") else {
        return bad_request(format!(
            "failed to parse '{}' as YYYY-MM-DD",
            query.submission_date
        ));
    };
    let locale = query.locale.unwrap_or_else(|| service.locale());

    match service.track(&query.request_number, date, locale).await {
        Ok(tracked) => (StatusCode::OK, Json(tracked)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LocaleQuery {
    #[serde(default)]
    pub(crate) locale: Option<Locale>,
}

pub(crate) async fn my_requests_handler<R, S>(
    State(service): State<Arc<RequestService<R, S>>>,
    headers: HeaderMap,
    Query(query): Query<LocaleQuery>,
) -> Response
where
    R: RequestRepository + 'static,
    S: ObjectStorage + 'static,
{
    let session = session_from_headers(&headers);
    let locale = query.locale.unwrap_or_else(|| service.locale());

    match service.my_requests(session.as_ref(), locale).await {
        Ok(requests) => (StatusCode::OK, Json(requests)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn files_handler<R, S>(
    State(service): State<Arc<RequestService<R, S>>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Response
where
    R: RequestRepository + 'static,
    S: ObjectStorage + 'static,
{
    let session = session_from_headers(&headers);
    let Some(request_id) = RequestId::parse(&request_id) else {
        return error_response(RequestServiceError::NotFound);
    };

    match service.request_files(session.as_ref(), &request_id).await {
        Ok(files) => (StatusCode::OK, Json(files)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AdminListQuery {
    #[serde(default)]
    pub(crate) status: Option<String>,
}

pub(crate) async fn admin_list_handler<R, S>(
    State(service): State<Arc<RequestService<R, S>>>,
    headers: HeaderMap,
    Query(query): Query<AdminListQuery>,
) -> Response
where
    R: RequestRepository + 'static,
    S: ObjectStorage + 'static,
{
    let session = session_from_headers(&headers);
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match RequestStatus::parse(raw) {
            Some(status) => Some(status),
            None => return bad_request(format!("unknown status '{raw}'")),
        },
    };

    match service.list_requests(session.as_ref(), status).await {
        Ok(records) => {
            let locale = service.locale();
            let views: Vec<_> = records
                .iter()
                .map(|record| record.status_view(locale))
                .collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusUpdateRequest {
    pub(crate) status: RequestStatus,
    #[serde(default)]
    pub(crate) admin_notes: Option<String>,
}

pub(crate) async fn status_update_handler<R, S>(
    State(service): State<Arc<RequestService<R, S>>>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
    Json(body): Json<StatusUpdateRequest>,
) -> Response
where
    R: RequestRepository + 'static,
    S: ObjectStorage + 'static,
{
    let session = session_from_headers(&headers);
    let Some(request_id) = RequestId::parse(&request_id) else {
        return error_response(RequestServiceError::NotFound);
    };

    match service
        .update_status(session.as_ref(), &request_id, body.status, body.admin_notes)
        .await
    {
        Ok(record) => {
            let view = record.status_view(service.locale());
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}
