use async_trait::async_trait;
use kapi_acme::{
    Authorization, Certificate, CertificateRequest, CertificateStatus, ChallengeResponse,
    JsonWebKey, Registration, RegistrationUpdate,
};
use thiserror::Error;

/// Kayıt otoritesi (RA) hataları.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RaError {
    /// İstek doğrulama kurallarına takıldı; neden istemciye iletilir.
    #[error("{0}")]
    Rejected(String),
    /// İmzalayan hesap bu işlem için yetkili değil.
    #[error("{0}")]
    Unauthorized(String),
    /// Otorite içinde beklenmeyen hata.
    #[error("kayıt otoritesi iç hatası: {0}")]
    Internal(String),
}

/// Depolama otoritesi (SA) hataları.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaError {
    #[error("kayıt bulunamadı: {0}")]
    NotFound(String),
    #[error("depolama otoritesi iç hatası: {0}")]
    Internal(String),
}

/// Ön yüzün doğrulanmış istekleri ilettiği kayıt otoritesi.
#[async_trait]
pub trait RegistrationAuthority: Send + Sync {
    async fn new_registration(
        &self,
        registration: Registration,
        key: JsonWebKey,
    ) -> Result<Registration, RaError>;

    async fn new_authorization(
        &self,
        authorization: Authorization,
        registration_id: i64,
    ) -> Result<Authorization, RaError>;

    async fn new_certificate(
        &self,
        request: CertificateRequest,
        registration_id: i64,
    ) -> Result<Certificate, RaError>;

    async fn update_registration(
        &self,
        current: Registration,
        update: RegistrationUpdate,
    ) -> Result<Registration, RaError>;

    async fn update_authorization(
        &self,
        authorization: Authorization,
        challenge_index: usize,
        response: ChallengeResponse,
    ) -> Result<Authorization, RaError>;

    async fn revoke_certificate(&self, certificate: Certificate) -> Result<(), RaError>;

    /// Doğrulama sonucu bildirimi; sonuç beklenmez.
    async fn on_validation_update(&self, authorization: Authorization);
}

/// Salt okunur depolama otoritesi.
#[async_trait]
pub trait StorageAuthority: Send + Sync {
    async fn get_registration(&self, id: i64) -> Result<Registration, SaError>;

    async fn get_registration_by_key(&self, key: &JsonWebKey) -> Result<Registration, SaError>;

    async fn get_authorization(&self, id: &str) -> Result<Authorization, SaError>;

    async fn get_certificate(&self, serial: &str) -> Result<Certificate, SaError>;

    async fn get_certificate_status(&self, serial: &str) -> Result<CertificateStatus, SaError>;

    async fn already_denied_csr(&self, names: &[String]) -> Result<bool, SaError>;
}
