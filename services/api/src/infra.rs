use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use student_portal::config::{BackendConfig, UploadConfig};
use student_portal::workflows::requests::{
    InMemoryObjectStorage, InMemoryRequestStore, Locale, RequestService, RequestStatus,
};

pub(crate) type PortalService = RequestService<InMemoryRequestStore, InMemoryObjectStorage>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Request service over the process-local backend.
pub(crate) fn in_memory_service(uploads: &UploadConfig, backend: &BackendConfig) -> Arc<PortalService> {
    Arc::new(RequestService::new(
        Arc::new(InMemoryRequestStore::default()),
        Arc::new(InMemoryObjectStorage::default()),
        uploads.clone(),
        backend.clone(),
    ))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_status(raw: &str) -> Result<RequestStatus, String> {
    RequestStatus::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = RequestStatus::ordered()
            .iter()
            .map(|status| status.as_str())
            .collect();
        format!("unknown status '{raw}' (expected one of {})", known.join(", "))
    })
}

pub(crate) fn parse_locale(raw: &str) -> Result<Locale, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "en" | "english" => Ok(Locale::English),
        "ar" | "arabic" => Ok(Locale::Arabic),
        other => Err(format!("unsupported locale '{other}' (expected en or ar)")),
    }
}
