use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Lifecycle status persisted on every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Submitted,
    UnderReview,
    Processing,
    Approved,
    Rejected,
}

impl RequestStatus {
    /// Display order for progress rendering. `Rejected` sits last even though it is
    /// reachable from every other status.
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Submitted,
            Self::UnderReview,
            Self::Processing,
            Self::Approved,
            Self::Rejected,
        ]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::Processing => "processing",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ordered()
            .into_iter()
            .find(|status| status.as_str() == normalized)
    }

    pub fn position(self) -> usize {
        Self::ordered()
            .iter()
            .position(|status| *status == self)
            .unwrap_or_default()
    }

    pub const fn label(self, locale: Locale) -> &'static str {
        match (self, locale) {
            (Self::Submitted, Locale::English) => "Submitted",
            (Self::UnderReview, Locale::English) => "Under Review",
            (Self::Processing, Locale::English) => "Processing",
            (Self::Approved, Locale::English) => "Approved",
            (Self::Rejected, Locale::English) => "Rejected",
            (Self::Submitted, Locale::Arabic) => "تم التقديم",
            (Self::UnderReview, Locale::Arabic) => "قيد المراجعة",
            (Self::Processing, Locale::Arabic) => "قيد المعالجة",
            (Self::Approved, Locale::Arabic) => "تمت الموافقة",
            (Self::Rejected, Locale::Arabic) => "مرفوض",
        }
    }
}

/// Display language for labels and timeline markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "ar")]
    Arabic,
}

impl Locale {
    pub fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "ar" | "arabic" => Self::Arabic,
            _ => Self::English,
        }
    }
}

/// Label for a persisted status value. Values outside the vocabulary are returned
/// untouched so drift in the backend schema still renders.
pub fn translate_status(raw: &str, locale: Locale) -> Cow<'_, str> {
    match RequestStatus::parse(raw) {
        Some(status) => Cow::Borrowed(status.label(locale)),
        None => Cow::Borrowed(raw),
    }
}
