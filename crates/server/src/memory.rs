use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use kapi_acme::{
    AcmeUrl, Authorization, Certificate, CertificateRequest, CertificateStatus, Challenge,
    ChallengeResponse, JsonWebKey, Registration, RegistrationUpdate, Status,
};
use rand_core::{OsRng, RngCore};
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::authority::{RaError, RegistrationAuthority, SaError, StorageAuthority};
use crate::config::ResourcePaths;

const AUTHORIZATION_LIFETIME: Duration = Duration::days(7);
const CHALLENGE_TYPES: [&str; 2] = ["http-01", "dns-01"];
/// Saklanan en fazla doğrulama bildirimi; eskiler atılır.
pub const VALIDATION_UPDATE_LIMIT: usize = 256;

#[derive(Debug, Default)]
struct Inner {
    last_registration_id: i64,
    registrations: HashMap<i64, Registration>,
    keys: HashMap<String, i64>,
    authorizations: HashMap<String, Authorization>,
    certificates: HashMap<String, Certificate>,
    revoked_at: HashMap<String, OffsetDateTime>,
    denied_names: HashSet<String>,
    validation_updates: VecDeque<String>,
}

impl Inner {
    fn store_registration(
        &mut self,
        mut registration: Registration,
        thumbprint: String,
    ) -> Registration {
        if registration.id == 0 {
            self.last_registration_id += 1;
            registration.id = self.last_registration_id;
        } else {
            self.last_registration_id = self.last_registration_id.max(registration.id);
        }
        registration.thumbprint.clone_from(&thumbprint);
        self.keys.insert(thumbprint, registration.id);
        self.registrations
            .insert(registration.id, registration.clone());
        registration
    }
}

/// Kayıt ve depolama otoritelerinin bellek içi, kalıcı olmayan uyarlaması.
///
/// Geliştirme ve testler içindir; alan doğrulaması yapmaz ve sertifika
/// düzenlemez.
#[derive(Debug)]
pub struct MemoryAuthority {
    paths: ResourcePaths,
    inner: RwLock<Inner>,
}

fn random_token() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn key_thumbprint(key: &JsonWebKey) -> Result<String, String> {
    key.thumbprint().map_err(|err| err.to_string())
}

fn validate_identifier(value: &str) -> Result<String, RaError> {
    let name = value.trim().trim_end_matches('.').to_ascii_lowercase();
    let valid = !name.is_empty()
        && name.len() <= 253
        && name.contains('.')
        && name.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
        });
    if valid {
        Ok(name)
    } else {
        Err(RaError::Rejected(format!("Invalid identifier: {value}")))
    }
}

impl MemoryAuthority {
    #[must_use]
    pub fn new(paths: ResourcePaths) -> Self {
        Self {
            paths,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Kaydı doğrudan depoya ekler; `id` sıfırsa yeni bir kimlik atanır.
    ///
    /// # Errors
    ///
    /// Kaydın anahtarı yoksa veya thumbprint hesaplanamazsa `SaError::Internal` döner.
    pub async fn insert_registration(
        &self,
        registration: Registration,
    ) -> Result<Registration, SaError> {
        let key = registration
            .key
            .as_ref()
            .ok_or_else(|| SaError::Internal("kayıt anahtarı eksik".to_string()))?;
        let thumbprint = key_thumbprint(key).map_err(SaError::Internal)?;
        Ok(self
            .inner
            .write()
            .await
            .store_registration(registration, thumbprint))
    }

    /// Yetkilendirmeyi olduğu gibi depoya ekler.
    pub async fn insert_authorization(&self, authorization: Authorization) {
        self.inner
            .write()
            .await
            .authorizations
            .insert(authorization.id.clone(), authorization);
    }

    /// Sertifikayı depoya ekler.
    pub async fn insert_certificate(&self, certificate: Certificate) {
        self.inner
            .write()
            .await
            .certificates
            .insert(certificate.serial.clone(), certificate);
    }

    /// Verilen adları içeren CSR'ların reddedilmesini sağlar.
    pub async fn deny_names<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inner = self.inner.write().await;
        inner
            .denied_names
            .extend(names.into_iter().map(|name| name.into().to_ascii_lowercase()));
    }

    /// Doğrulama bildirimi alınan son yetkilendirme kimlikleri, geliş sırasıyla.
    ///
    /// En fazla [`VALIDATION_UPDATE_LIMIT`] kayıt tutulur.
    pub async fn validation_updates(&self) -> Vec<String> {
        self.inner
            .read()
            .await
            .validation_updates
            .iter()
            .cloned()
            .collect()
    }

    fn challenge_uri(&self, authorization_id: &str, index: usize) -> Result<AcmeUrl, RaError> {
        let raw = format!(
            "{}?challenge={index}",
            self.paths.authorization(authorization_id)
        );
        AcmeUrl::parse(&raw).map_err(|err| RaError::Internal(err.to_string()))
    }
}

#[async_trait]
impl RegistrationAuthority for MemoryAuthority {
    async fn new_registration(
        &self,
        mut registration: Registration,
        key: JsonWebKey,
    ) -> Result<Registration, RaError> {
        let thumbprint = key_thumbprint(&key).map_err(RaError::Rejected)?;
        let mut inner = self.inner.write().await;
        if inner.keys.contains_key(&thumbprint) {
            return Err(RaError::Rejected(
                "Registration key is already in use".to_string(),
            ));
        }
        registration.id = 0;
        registration.key = Some(key);
        let stored = inner.store_registration(registration, thumbprint);
        drop(inner);
        info!(registration_id = stored.id, "kayıt oluşturuldu");
        Ok(stored)
    }

    async fn new_authorization(
        &self,
        mut authorization: Authorization,
        registration_id: i64,
    ) -> Result<Authorization, RaError> {
        if !self
            .inner
            .read()
            .await
            .registrations
            .contains_key(&registration_id)
        {
            return Err(RaError::Unauthorized(
                "No registration exists matching provided key".to_string(),
            ));
        }
        authorization.identifier.value = validate_identifier(&authorization.identifier.value)?;
        authorization.id = random_token();
        authorization.registration_id = registration_id;
        authorization.status = Some(Status::Pending);
        authorization.expires = Some(OffsetDateTime::now_utc() + AUTHORIZATION_LIFETIME);
        authorization.challenges = CHALLENGE_TYPES
            .iter()
            .enumerate()
            .map(|(index, kind)| {
                let uri = self.challenge_uri(&authorization.id, index)?;
                let mut challenge = Challenge::new((*kind).to_string(), uri);
                challenge.status = Some(Status::Pending);
                challenge.token = Some(random_token());
                Ok(challenge)
            })
            .collect::<Result<_, RaError>>()?;
        authorization.combinations = (0..CHALLENGE_TYPES.len()).map(|index| vec![index]).collect();

        self.insert_authorization(authorization.clone()).await;
        info!(
            authorization_id = %authorization.id,
            registration_id,
            identifier = %authorization.identifier.value,
            "yetkilendirme oluşturuldu"
        );
        Ok(authorization)
    }

    async fn new_certificate(
        &self,
        request: CertificateRequest,
        registration_id: i64,
    ) -> Result<Certificate, RaError> {
        request
            .verify_signature()
            .map_err(|_| RaError::Rejected("Invalid signature on CSR".to_string()))?;
        let names = request
            .dns_names()
            .map_err(|err| RaError::Rejected(err.to_string()))?;
        if names.is_empty() {
            return Err(RaError::Rejected(
                "CSR does not contain any DNS names".to_string(),
            ));
        }
        let denied = self
            .already_denied_csr(&names)
            .await
            .map_err(|err| RaError::Internal(err.to_string()))?;
        if denied {
            return Err(RaError::Rejected("CSR has already been denied".to_string()));
        }

        let now = OffsetDateTime::now_utc();
        let inner = self.inner.read().await;
        for name in &names {
            let authorized = inner.authorizations.values().any(|authorization| {
                authorization.registration_id == registration_id
                    && authorization.identifier.value == *name
                    && authorization.status == Some(Status::Valid)
                    && authorization.expires.map_or(true, |expires| expires > now)
            });
            if !authorized {
                return Err(RaError::Unauthorized(format!(
                    "Key not authorized for name {name}"
                )));
            }
        }
        drop(inner);

        Err(RaError::Internal(
            "bellek içi otorite sertifika düzenlemez".to_string(),
        ))
    }

    async fn update_registration(
        &self,
        mut current: Registration,
        update: RegistrationUpdate,
    ) -> Result<Registration, RaError> {
        current.apply(&update);
        let mut inner = self.inner.write().await;
        if !inner.registrations.contains_key(&current.id) {
            return Err(RaError::Internal(format!(
                "kayıt bulunamadı: {}",
                current.id
            )));
        }
        inner.registrations.insert(current.id, current.clone());
        drop(inner);
        info!(registration_id = current.id, "kayıt güncellendi");
        Ok(current)
    }

    async fn update_authorization(
        &self,
        mut authorization: Authorization,
        challenge_index: usize,
        response: ChallengeResponse,
    ) -> Result<Authorization, RaError> {
        let challenge = authorization
            .challenges
            .get_mut(challenge_index)
            .ok_or_else(|| RaError::Rejected("Challenge index out of range".to_string()))?;
        if let Some(kind) = response.kind.as_deref() {
            if kind != challenge.kind {
                return Err(RaError::Rejected(format!(
                    "Challenge type mismatch: expected {}",
                    challenge.kind
                )));
            }
        }
        if let (Some(key_authorization), Some(token)) =
            (response.key_authorization.as_deref(), challenge.token.as_deref())
        {
            if !key_authorization.starts_with(&format!("{token}.")) {
                return Err(RaError::Rejected(
                    "Key authorization does not match challenge token".to_string(),
                ));
            }
        }
        challenge.status = Some(Status::Pending);
        authorization.status = Some(Status::Pending);

        self.insert_authorization(authorization.clone()).await;
        self.on_validation_update(authorization.clone()).await;
        Ok(authorization)
    }

    async fn revoke_certificate(&self, certificate: Certificate) -> Result<(), RaError> {
        let mut inner = self.inner.write().await;
        let Some(stored) = inner.certificates.get_mut(&certificate.serial) else {
            return Err(RaError::Rejected("Unknown certificate".to_string()));
        };
        stored.status = Status::Revoked;
        inner
            .revoked_at
            .insert(certificate.serial.clone(), OffsetDateTime::now_utc());
        drop(inner);
        info!(serial = %certificate.serial, "sertifika iptal edildi");
        Ok(())
    }

    async fn on_validation_update(&self, authorization: Authorization) {
        debug!(authorization_id = %authorization.id, "doğrulama bildirimi alındı");
        let mut inner = self.inner.write().await;
        if inner.validation_updates.len() == VALIDATION_UPDATE_LIMIT {
            inner.validation_updates.pop_front();
        }
        inner.validation_updates.push_back(authorization.id);
    }
}

#[async_trait]
impl StorageAuthority for MemoryAuthority {
    async fn get_registration(&self, id: i64) -> Result<Registration, SaError> {
        self.inner
            .read()
            .await
            .registrations
            .get(&id)
            .cloned()
            .ok_or_else(|| SaError::NotFound(format!("registration {id}")))
    }

    async fn get_registration_by_key(&self, key: &JsonWebKey) -> Result<Registration, SaError> {
        let thumbprint = key_thumbprint(key).map_err(SaError::Internal)?;
        let inner = self.inner.read().await;
        inner
            .keys
            .get(&thumbprint)
            .and_then(|id| inner.registrations.get(id))
            .cloned()
            .ok_or_else(|| SaError::NotFound(format!("registration for key {thumbprint}")))
    }

    async fn get_authorization(&self, id: &str) -> Result<Authorization, SaError> {
        self.inner
            .read()
            .await
            .authorizations
            .get(id)
            .cloned()
            .ok_or_else(|| SaError::NotFound(format!("authorization {id}")))
    }

    async fn get_certificate(&self, serial: &str) -> Result<Certificate, SaError> {
        self.inner
            .read()
            .await
            .certificates
            .get(serial)
            .cloned()
            .ok_or_else(|| SaError::NotFound(format!("certificate {serial}")))
    }

    async fn get_certificate_status(&self, serial: &str) -> Result<CertificateStatus, SaError> {
        let inner = self.inner.read().await;
        let certificate = inner
            .certificates
            .get(serial)
            .ok_or_else(|| SaError::NotFound(format!("certificate {serial}")))?;
        Ok(CertificateStatus {
            serial: certificate.serial.clone(),
            status: certificate.status,
            revoked_at: inner.revoked_at.get(serial).copied(),
        })
    }

    async fn already_denied_csr(&self, names: &[String]) -> Result<bool, SaError> {
        let inner = self.inner.read().await;
        Ok(names.iter().any(|name| inner.denied_names.contains(name)))
    }
}
