use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::{translate_status, Locale, RequestStatus};
use super::timeline::{build_timeline, StatusDescriptor};

/// Server-generated identifier of a request row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of the account that owns a request, as issued by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub String);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-readable request number in the form `REQ-<year>-<nnnn>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequestNumber(String);

impl RequestNumber {
    pub fn new(year: i32, sequence: u16) -> Self {
        Self(format!("REQ-{year:04}-{:04}", sequence % 10_000))
    }

    /// Draws a number for `year`. Uniqueness is left to the store.
    pub fn generate<R: Rng + ?Sized>(year: i32, rng: &mut R) -> Self {
        Self::new(year, rng.gen_range(0..10_000))
    }

    pub fn parse(raw: &str) -> Result<Self, InvalidRequestNumber> {
        let candidate = raw.trim().to_ascii_uppercase();
        let mut parts = candidate.split('-');
        let well_formed = matches!(
            (parts.next(), parts.next(), parts.next(), parts.next()),
            (Some("REQ"), Some(year), Some(sequence), None)
                if is_four_digits(year) && is_four_digits(sequence)
        );

        if well_formed {
            Ok(Self(candidate))
        } else {
            Err(InvalidRequestNumber(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_four_digits(value: &str) -> bool {
    value.len() == 4 && value.bytes().all(|byte| byte.is_ascii_digit())
}

impl fmt::Display for RequestNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RequestNumber {
    type Error = InvalidRequestNumber;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RequestNumber> for String {
    fn from(value: RequestNumber) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a request number of the form REQ-YYYY-NNNN")]
pub struct InvalidRequestNumber(pub String);

/// Services a student can apply for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    PassportRenewal,
    VisaRequest,
    CertificateAttestation,
    UniversityAdmission,
    Other,
}

impl ServiceType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PassportRenewal => "passport_renewal",
            Self::VisaRequest => "visa_request",
            Self::CertificateAttestation => "certificate_attestation",
            Self::UniversityAdmission => "university_admission",
            Self::Other => "other",
        }
    }

    /// Attachment slots the application form offers for this service.
    pub const fn accepted_files(self) -> &'static [FileType] {
        match self {
            Self::PassportRenewal => &[FileType::Passport],
            Self::VisaRequest => &[FileType::Passport, FileType::VisaRequest],
            Self::CertificateAttestation => &[FileType::Certificate],
            Self::UniversityAdmission => &[FileType::Passport, FileType::Certificate],
            Self::Other => &[
                FileType::Passport,
                FileType::Certificate,
                FileType::VisaRequest,
                FileType::Other,
            ],
        }
    }

    pub fn accepts(self, file_type: FileType) -> bool {
        self.accepted_files().contains(&file_type)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag stored with every attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Passport,
    Certificate,
    VisaRequest,
    Other,
}

impl FileType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passport => "passport",
            Self::Certificate => "certificate",
            Self::VisaRequest => "visa_request",
            Self::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "passport" => Some(Self::Passport),
            "certificate" => Some(Self::Certificate),
            "visa_request" => Some(Self::VisaRequest),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-text fields typed by the applicant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantDetails {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub university_name: Option<String>,
    #[serde(default)]
    pub major: Option<String>,
    #[serde(default)]
    pub additional_notes: Option<String>,
}

impl ApplicantDetails {
    /// Trims every field and turns blank optional fields into `None`.
    pub fn normalized(self) -> Self {
        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            university_name: non_blank(self.university_name),
            major: non_blank(self.major),
            additional_notes: non_blank(self.additional_notes),
        }
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// One uploaded document as received from the form.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_type: FileType,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("file_type", &self.file_type)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size_bytes", &self.size_bytes())
            .finish()
    }
}

/// Everything the applicant sends when filing a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSubmission {
    pub service_type: ServiceType,
    pub applicant: ApplicantDetails,
    #[serde(skip)]
    pub attachments: Vec<Attachment>,
}

/// Row inserted into the `requests` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequest {
    pub owner_id: OwnerId,
    pub service_type: ServiceType,
    pub request_number: RequestNumber,
    pub submission_date: NaiveDate,
    pub applicant: ApplicantDetails,
    pub created_at: DateTime<Utc>,
}

/// Stored request. `status` keeps the raw persisted value so unknown values survive
/// a round trip through the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: RequestId,
    pub owner_id: OwnerId,
    pub service_type: ServiceType,
    pub status: String,
    pub request_number: RequestNumber,
    pub submission_date: NaiveDate,
    pub applicant: ApplicantDetails,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RequestRecord {
    pub fn current_status(&self) -> Option<RequestStatus> {
        RequestStatus::parse(&self.status)
    }

    pub fn timeline(&self, locale: Locale) -> Vec<StatusDescriptor> {
        build_timeline(Some(&self.status), self.created_at, locale)
    }

    pub fn status_view(&self, locale: Locale) -> RequestStatusView {
        RequestStatusView {
            request_id: self.id,
            request_number: self.request_number.clone(),
            service_type: self.service_type,
            status: self.status.clone(),
            status_label: translate_status(&self.status, locale).into_owned(),
            submission_date: self.submission_date,
            admin_notes: self.admin_notes.clone(),
        }
    }

    pub fn tracking_view(&self, locale: Locale) -> TrackedRequest {
        TrackedRequest {
            request: self.status_view(locale),
            timeline: self.timeline(locale),
        }
    }
}

/// Row inserted into the `files` table once the object is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUploadedFile {
    pub request_id: RequestId,
    pub file_type: FileType,
    pub file_path: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: Uuid,
    pub request_id: RequestId,
    pub file_type: FileType,
    pub file_path: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Status and notes written by an administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub request_id: RequestId,
    pub status: RequestStatus,
    /// `None` keeps the stored notes.
    pub admin_notes: Option<String>,
}

/// Sanitized view of a request for API responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestStatusView {
    pub request_id: RequestId,
    pub request_number: RequestNumber,
    pub service_type: ServiceType,
    pub status: String,
    pub status_label: String,
    pub submission_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
}

/// Lookup result rendered on the tracking page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedRequest {
    pub request: RequestStatusView,
    pub timeline: Vec<StatusDescriptor>,
}

/// Returned to the applicant after a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub request_id: RequestId,
    pub request_number: RequestNumber,
    pub submission_date: NaiveDate,
    pub status: RequestStatus,
    pub files: Vec<UploadedFile>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn matches_request_number_shape(value: &str) -> bool {
        let bytes = value.as_bytes();
        value.len() == 13
            && value.starts_with("REQ-")
            && bytes[8] == b'-'
            && value[4..8].bytes().all(|b| b.is_ascii_digit())
            && value[9..].bytes().all(|b| b.is_ascii_digit())
    }

    #[test]
    fn generated_numbers_are_zero_padded() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let number = RequestNumber::generate(2025, &mut rng);
            assert!(
                matches_request_number_shape(number.as_str()),
                "unexpected shape {number}"
            );
            assert!(number.as_str().starts_with("REQ-2025-"));
        }
        assert_eq!(RequestNumber::new(2024, 7).as_str(), "REQ-2024-0007");
        assert_eq!(RequestNumber::new(2024, 0).as_str(), "REQ-2024-0000");
        assert_eq!(RequestNumber::new(2024, 9999).as_str(), "REQ-2024-9999");
    }

    #[test]
    fn parse_normalizes_case_and_rejects_malformed_numbers() {
        let parsed = RequestNumber::parse(" req-2025-0042 ").expect("valid number");
        assert_eq!(parsed.as_str(), "REQ-2025-0042");

        for raw in ["REQ-25-0042", "REQ-2025-42", "REQ-2025-0042-1", "ABC-2025-0042", ""] {
            assert!(RequestNumber::parse(raw).is_err(), "{raw} should fail");
        }
    }

    #[test]
    fn normalized_applicant_nulls_blank_fields() {
        let applicant = ApplicantDetails {
            first_name: "  Layla ".to_string(),
            last_name: "Hassan".to_string(),
            university_name: Some("   ".to_string()),
            major: Some(" Civil Engineering ".to_string()),
            additional_notes: None,
        }
        .normalized();

        assert_eq!(applicant.first_name, "Layla");
        assert_eq!(applicant.university_name, None);
        assert_eq!(applicant.major.as_deref(), Some("Civil Engineering"));
    }

    #[test]
    fn service_types_govern_attachment_slots() {
        assert!(ServiceType::PassportRenewal.accepts(FileType::Passport));
        assert!(!ServiceType::PassportRenewal.accepts(FileType::Certificate));
        assert!(ServiceType::VisaRequest.accepts(FileType::VisaRequest));
        assert!(ServiceType::Other.accepts(FileType::Other));
    }
}
