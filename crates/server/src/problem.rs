use axum::http::header::LOCATION;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::authority::{RaError, SaError};

/// ACME problem türleri.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
    Malformed,
    Unauthorized,
    ServerInternal,
}

impl ProblemKind {
    /// Problem belgesinin `type` alanı.
    #[must_use]
    pub const fn urn(self) -> &'static str {
        match self {
            Self::Malformed => "urn:acme:error:malformed",
            Self::Unauthorized => "urn:acme:error:unauthorized",
            Self::ServerInternal => "urn:acme:error:serverInternal",
        }
    }

    const fn default_status(self) -> StatusCode {
        match self {
            Self::Malformed => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::ServerInternal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ProblemBody<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    detail: &'a str,
}

/// İstemciye dönen ACME problem belgesi.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    status: StatusCode,
    kind: ProblemKind,
    detail: String,
    location: Option<String>,
}

impl Problem {
    #[must_use]
    pub fn new(kind: ProblemKind, detail: impl Into<String>) -> Self {
        Self {
            status: kind.default_status(),
            kind,
            detail: detail.into(),
            location: None,
        }
    }

    #[must_use]
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::new(ProblemKind::Malformed, detail)
    }

    #[must_use]
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(ProblemKind::Unauthorized, detail)
    }

    #[must_use]
    pub fn server_internal(detail: impl Into<String>) -> Self {
        Self::new(ProblemKind::ServerInternal, detail)
    }

    /// Bilinmeyen kaynak: `malformed` türünde 404.
    #[must_use]
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::malformed(detail).with_status(StatusCode::NOT_FOUND)
    }

    /// Çakışan kaynak: `malformed` türünde 409.
    #[must_use]
    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::malformed(detail).with_status(StatusCode::CONFLICT)
    }

    #[must_use]
    pub fn method_not_allowed() -> Self {
        Self::malformed("Method not allowed")
    }

    /// Gövde okunamadığında ya da imza doğrulanamadığında dönen tek mesaj.
    #[must_use]
    pub fn unreadable_body() -> Self {
        Self::malformed("Unable to read/verify body")
    }

    #[must_use]
    pub const fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Yanıta `Location` başlığı ekler.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Kayıt otoritesi hatasını probleme çevirir.
    ///
    /// Reddetme nedeni istemciye `"<prefix>: <neden>"` olarak yansıtılır; iç
    /// hata ayrıntısı yalnızca günlüğe yazılır.
    #[must_use]
    pub fn from_ra(prefix: &str, err: RaError) -> Self {
        match err {
            RaError::Rejected(reason) => Self::malformed(format!("{prefix}: {reason}")),
            RaError::Unauthorized(reason) => Self::unauthorized(reason),
            RaError::Internal(message) => {
                tracing::warn!(error = %message, "kayıt otoritesi çağrısı başarısız");
                Self::server_internal(prefix)
            }
        }
    }

    /// İmzalayan anahtarın kaydı aranırken oluşan depolama hatasını çevirir.
    #[must_use]
    pub fn from_caller_lookup(err: SaError) -> Self {
        match err {
            SaError::NotFound(_) => {
                Self::unauthorized("No registration exists matching provided key")
            }
            SaError::Internal(message) => {
                tracing::warn!(error = %message, "kayıt sorgusu başarısız");
                Self::server_internal("Unable to look up registration")
            }
        }
    }

    /// Kaynak sorgusunda oluşan depolama hatasını çevirir.
    #[must_use]
    pub fn from_lookup(not_found_detail: &str, err: SaError) -> Self {
        match err {
            SaError::NotFound(_) => Self::not_found(not_found_detail),
            SaError::Internal(message) => {
                tracing::warn!(error = %message, "depolama sorgusu başarısız");
                Self::server_internal(not_found_detail)
            }
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub const fn kind(&self) -> ProblemKind {
        self.kind
    }

    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let body = ProblemBody {
            kind: self.kind.urn(),
            detail: &self.detail,
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(location) = self.location.as_deref() {
            if let Ok(value) = HeaderValue::from_str(location) {
                response.headers_mut().insert(LOCATION, value);
            }
        }
        response
    }
}
