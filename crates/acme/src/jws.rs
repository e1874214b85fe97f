use std::fmt;

use ed25519_dalek::{Signer as Ed25519Signer, SigningKey, VerifyingKey};
use p256::ecdsa::{Signature as P256Signature, SigningKey as P256SigningKey};
use p256::elliptic_curve;
use p256::SecretKey as P256SecretKey;
use rand_core::{CryptoRng, RngCore};
use rsa::errors::Error as RsaError;
use rsa::pkcs1v15::SigningKey as RsaSigningKey;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use signature::Error as SignatureError;
use thiserror::Error;
use zeroize::Zeroize;

use crate::jwk::{decode_base64url, encode_base64url, JsonWebKey, JwkError};

/// İmzalı istek gövdesi doğrulanırken oluşabilecek hatalar.
///
/// Nedenler günlükte ayrı tutulur; istemciye tek bir mesajla yansıtılır.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("istek gövdesi boş")]
    EmptyBody,
    #[error("JWS zarfı ayrıştırılamadı: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("korumalı JWS başlığı çözülemedi")]
    ProtectedHeader,
    #[error("JWS başlık parametresi hem korumalı hem açık başlıkta yer alıyor: {0}")]
    DuplicateHeader(&'static str),
    #[error("JWS başlığında alg bulunmuyor")]
    MissingAlgorithm,
    #[error("JWS başlığında jwk bulunmuyor")]
    MissingKey,
    #[error(transparent)]
    Key(#[from] JwkError),
    #[error("JWS imzası base64url olarak çözülemedi")]
    SignatureEncoding,
    #[error("JWS imzası doğrulanamadı")]
    BadSignature,
    #[error("JWS yükü base64url olarak çözülemedi")]
    PayloadEncoding,
}

/// İstemci anahtarı üretimi ve imzalama hataları.
#[derive(Debug, Error)]
pub enum JwsError {
    /// JSON yükü serileştirilirken hata meydana geldiğinde döner.
    #[error("JWS yükü serileştirilemedi: {0}")]
    SerializePayload(#[from] serde_json::Error),
    /// ECDSA tabanlı hesap anahtarı hatalı olduğunda döner.
    #[error("ECDSA P-256 anahtarı geçersiz: {0}")]
    InvalidEcdsaKey(#[from] elliptic_curve::Error),
    /// RSA tabanlı hesap anahtarı hatalı olduğunda döner.
    #[error("RSA anahtarı geçersiz: {0}")]
    InvalidRsaKey(#[from] RsaError),
    /// İmza üretimi sırasında hata oluştuğunda döner.
    #[error("JWS imzası üretilemedi: {0}")]
    Signature(#[from] SignatureError),
}

/// JWS başlık parametreleri.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwk: Option<JsonWebKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// JSON serileştirilmiş (flattened) JWS zarfı.
///
/// Eski istemciler korumalı başlık göndermez; `alg` ve `jwk` açık `header`
/// nesnesinde taşınır ve imza girdisi `"." || payload` olur.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<JwsHeader>,
    pub payload: String,
    pub signature: String,
}

/// Doğrulanmış yük ve onu imzalayan anahtar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayload {
    pub payload: Vec<u8>,
    pub key: JsonWebKey,
    pub algorithm: String,
}

impl SignedEnvelope {
    /// Ham gövdeyi JWS zarfı olarak ayrıştırır.
    ///
    /// # Errors
    ///
    /// Gövde boşsa `VerificationError::EmptyBody`, JSON geçersizse
    /// `VerificationError::Envelope` döner.
    pub fn from_slice(body: &[u8]) -> Result<Self, VerificationError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(VerificationError::EmptyBody);
        }
        serde_json::from_slice(body).map_err(VerificationError::Envelope)
    }

    /// Zarfı çözümler, imzayı gömülü anahtarla doğrular ve yükü döndürür.
    ///
    /// # Errors
    ///
    /// Başlık, anahtar, imza veya yük adımlarından biri başarısız olursa
    /// ilgili `VerificationError` döner.
    pub fn verify(&self) -> Result<VerifiedPayload, VerificationError> {
        let header = self.merged_header()?;
        let algorithm = header.alg.ok_or(VerificationError::MissingAlgorithm)?;
        let key = header.jwk.ok_or(VerificationError::MissingKey)?;
        let verifier = key.verifier(&algorithm)?;

        let signature =
            decode_base64url(&self.signature).map_err(|_| VerificationError::SignatureEncoding)?;
        let signing_input = format!(
            "{}.{}",
            self.protected.as_deref().unwrap_or_default(),
            self.payload
        );
        verifier
            .verify(signing_input.as_bytes(), &signature)
            .map_err(|_| VerificationError::BadSignature)?;

        let payload =
            decode_base64url(&self.payload).map_err(|_| VerificationError::PayloadEncoding)?;
        Ok(VerifiedPayload {
            payload,
            key,
            algorithm,
        })
    }

    fn merged_header(&self) -> Result<JwsHeader, VerificationError> {
        let unprotected = self.header.clone().unwrap_or_default();
        let Some(encoded) = self.protected.as_deref().filter(|value| !value.is_empty()) else {
            return Ok(unprotected);
        };
        let decoded = decode_base64url(encoded).map_err(|_| VerificationError::ProtectedHeader)?;
        let protected: JwsHeader =
            serde_json::from_slice(&decoded).map_err(|_| VerificationError::ProtectedHeader)?;

        Ok(JwsHeader {
            alg: merge_parameter("alg", protected.alg, unprotected.alg)?,
            jwk: merge_parameter("jwk", protected.jwk, unprotected.jwk)?,
            nonce: merge_parameter("nonce", protected.nonce, unprotected.nonce)?,
        })
    }
}

fn merge_parameter<T>(
    name: &'static str,
    protected: Option<T>,
    unprotected: Option<T>,
) -> Result<Option<T>, VerificationError> {
    match (protected, unprotected) {
        (Some(_), Some(_)) => Err(VerificationError::DuplicateHeader(name)),
        (protected, unprotected) => Ok(protected.or(unprotected)),
    }
}

/// Ham istek gövdesini doğrular.
///
/// # Errors
///
/// Bkz. [`SignedEnvelope::from_slice`] ve [`SignedEnvelope::verify`].
pub fn verify_body(body: &[u8]) -> Result<VerifiedPayload, VerificationError> {
    SignedEnvelope::from_slice(body)?.verify()
}

/// İmzalı zarfta `alg` ve `jwk` parametrelerinin yerleşimi.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderPlacement {
    /// Parametreler açık `header` nesnesinde taşınır (eski istemciler).
    Unprotected,
    /// Parametreler base64url kodlu `protected` başlığında taşınır.
    Protected,
}

/// Ed25519 tabanlı ACME hesap anahtarı.
#[derive(Clone)]
pub struct Ed25519AccountKey {
    signing_key: SigningKey,
}

impl fmt::Debug for Ed25519AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519AccountKey").finish_non_exhaustive()
    }
}

impl Ed25519AccountKey {
    /// JWS başlığında kullanılacak algoritma adı.
    pub const ALGORITHM: &'static str = "EdDSA";

    /// Harici RNG kullanarak yeni hesap anahtarı üretir.
    #[must_use]
    pub fn generate_with_rng(rng: &mut (impl CryptoRng + RngCore)) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self::from_seed(bytes)
    }

    /// 32 baytlık seed'i tüketerek hesap anahtarı oluşturur.
    #[must_use]
    pub fn from_seed(mut seed: [u8; 32]) -> Self {
        let key = Self {
            signing_key: SigningKey::from_bytes(&seed),
        };
        seed.zeroize();
        key
    }

    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Doğrulama anahtarını JWK formatında döndürür.
    #[must_use]
    pub fn jwk(&self) -> JsonWebKey {
        JsonWebKey::from_ed25519(&self.verifying_key())
    }

    /// Ham payload'ı imzalayıp JWS zarfı üretir.
    ///
    /// # Errors
    ///
    /// Başlık serileştirilemezse `JwsError::SerializePayload` döner.
    pub fn sign_payload(
        &self,
        payload: &[u8],
        placement: HeaderPlacement,
    ) -> Result<SignedEnvelope, JwsError> {
        sign_payload_internal(Self::ALGORITHM, self.jwk(), payload, placement, |input| {
            Ok(self.signing_key.sign(input).to_bytes().to_vec())
        })
    }

    /// JSON payload'ı JWS zarfı olarak imzalar.
    ///
    /// # Errors
    ///
    /// JSON serileştirme başarısız olursa `JwsError::SerializePayload` döner.
    pub fn sign_json<T: Serialize>(
        &self,
        payload: &T,
        placement: HeaderPlacement,
    ) -> Result<SignedEnvelope, JwsError> {
        let bytes = serde_json::to_vec(payload)?;
        self.sign_payload(&bytes, placement)
    }
}

/// ECDSA P-256 tabanlı ACME hesap anahtarı.
#[derive(Clone)]
pub struct EcdsaP256AccountKey {
    signing_key: P256SigningKey,
}

impl fmt::Debug for EcdsaP256AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdsaP256AccountKey")
            .finish_non_exhaustive()
    }
}

impl EcdsaP256AccountKey {
    /// JWS başlığında kullanılacak algoritma adı.
    pub const ALGORITHM: &'static str = "ES256";

    /// Harici RNG kullanarak yeni hesap anahtarı üretir.
    #[must_use]
    pub fn generate_with_rng(rng: &mut (impl CryptoRng + RngCore)) -> Self {
        Self::from_secret_key(P256SecretKey::random(rng))
    }

    #[must_use]
    pub fn from_secret_key(secret_key: P256SecretKey) -> Self {
        Self {
            signing_key: P256SigningKey::from(secret_key),
        }
    }

    /// 32 baytlık özel anahtar materyalini tüketip belleği sıfırlar.
    ///
    /// # Errors
    ///
    /// Anahtar materyali eğri alanı dışında kaldığında `JwsError::InvalidEcdsaKey`
    /// döner.
    pub fn from_be_bytes(mut bytes: [u8; 32]) -> Result<Self, JwsError> {
        let secret_key = P256SecretKey::from_slice(&bytes);
        bytes.zeroize();
        Ok(Self::from_secret_key(secret_key?))
    }

    /// Doğrulama anahtarını JWK formatında döndürür.
    #[must_use]
    pub fn jwk(&self) -> JsonWebKey {
        JsonWebKey::from_p256(self.signing_key.verifying_key())
    }

    /// Ham payload'ı imzalayıp JWS zarfı üretir. İmza ham `r || s` biçimindedir.
    ///
    /// # Errors
    ///
    /// Başlık serileştirilemezse veya imza üretilemezse `JwsError` döner.
    pub fn sign_payload(
        &self,
        payload: &[u8],
        placement: HeaderPlacement,
    ) -> Result<SignedEnvelope, JwsError> {
        sign_payload_internal(Self::ALGORITHM, self.jwk(), payload, placement, |input| {
            let signature: P256Signature = signature::Signer::try_sign(&self.signing_key, input)?;
            Ok(signature.to_bytes().to_vec())
        })
    }

    /// JSON payload'ı JWS zarfı olarak imzalar.
    ///
    /// # Errors
    ///
    /// JSON serileştirme veya imza üretimi başarısız olursa `JwsError` döner.
    pub fn sign_json<T: Serialize>(
        &self,
        payload: &T,
        placement: HeaderPlacement,
    ) -> Result<SignedEnvelope, JwsError> {
        let bytes = serde_json::to_vec(payload)?;
        self.sign_payload(&bytes, placement)
    }
}

/// RSA (RS256) tabanlı ACME hesap anahtarı.
#[derive(Clone)]
pub struct RsaAccountKey {
    signing_key: RsaSigningKey<Sha256>,
}

impl fmt::Debug for RsaAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaAccountKey").finish_non_exhaustive()
    }
}

impl RsaAccountKey {
    /// JWS başlığında kullanılacak algoritma adı.
    pub const ALGORITHM: &'static str = "RS256";

    /// RSA özel anahtarından hesap anahtarı oluşturur.
    ///
    /// # Errors
    ///
    /// Sağlanan anahtar doğrulama kontrollerinden geçemezse
    /// `JwsError::InvalidRsaKey` döner.
    pub fn new(private_key: RsaPrivateKey) -> Result<Self, JwsError> {
        private_key.validate()?;
        Ok(Self {
            signing_key: RsaSigningKey::<Sha256>::new(private_key),
        })
    }

    /// Doğrulama anahtarını JWK formatında döndürür.
    #[must_use]
    pub fn jwk(&self) -> JsonWebKey {
        let verifying_key = signature::Keypair::verifying_key(&self.signing_key);
        JsonWebKey::from_rsa(verifying_key.as_ref())
    }

    /// Ham payload'ı imzalayıp JWS zarfı üretir.
    ///
    /// # Errors
    ///
    /// Başlık serileştirilemezse veya imza üretilemezse `JwsError` döner.
    pub fn sign_payload(
        &self,
        payload: &[u8],
        placement: HeaderPlacement,
    ) -> Result<SignedEnvelope, JwsError> {
        sign_payload_internal(Self::ALGORITHM, self.jwk(), payload, placement, |input| {
            let signature = signature::Signer::try_sign(&self.signing_key, input)?;
            let bytes: Box<[u8]> = signature::SignatureEncoding::to_bytes(&signature);
            Ok(bytes.into_vec())
        })
    }

    /// JSON payload'ı JWS zarfı olarak imzalar.
    ///
    /// # Errors
    ///
    /// JSON serileştirme veya imza üretimi başarısız olursa `JwsError` döner.
    pub fn sign_json<T: Serialize>(
        &self,
        payload: &T,
        placement: HeaderPlacement,
    ) -> Result<SignedEnvelope, JwsError> {
        let bytes = serde_json::to_vec(payload)?;
        self.sign_payload(&bytes, placement)
    }
}

fn sign_payload_internal(
    algorithm: &'static str,
    jwk: JsonWebKey,
    payload: &[u8],
    placement: HeaderPlacement,
    signer: impl FnOnce(&[u8]) -> Result<Vec<u8>, JwsError>,
) -> Result<SignedEnvelope, JwsError> {
    let header = JwsHeader {
        alg: Some(algorithm.to_owned()),
        jwk: Some(jwk),
        nonce: None,
    };
    let (protected, header) = match placement {
        HeaderPlacement::Unprotected => (None, Some(header)),
        HeaderPlacement::Protected => {
            let encoded = encode_base64url(serde_json::to_vec(&header)?);
            (Some(encoded), None)
        }
    };
    let payload = encode_base64url(payload);
    let signing_input = format!("{}.{payload}", protected.as_deref().unwrap_or_default());
    let signature = encode_base64url(signer(signing_input.as_bytes())?);

    Ok(SignedEnvelope {
        protected,
        header,
        payload,
        signature,
    })
}
