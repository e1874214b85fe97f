use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use x509_parser::certificate::X509Certificate;
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::prelude::FromDer;

use crate::authorization::Status;
use crate::jwk::{decode_base64url, encode_base64url};
use crate::url::AcmeUrl;

/// Sertifika isteği ve sertifika gövdelerinin çözümlenmesi sırasında oluşan hatalar.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("CSR base64url olarak çözülemedi")]
    CsrEncoding,
    #[error("CSR PKCS#10 olarak ayrıştırılamadı: {0}")]
    CsrParse(String),
    #[error("CSR imzası geçersiz")]
    CsrSignature,
    #[error("sertifika base64url olarak çözülemedi")]
    CertificateEncoding,
    #[error("sertifika DER olarak ayrıştırılamadı: {0}")]
    CertificateParse(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawCertificateRequest {
    csr: String,
    #[serde(default)]
    authorizations: Vec<AcmeUrl>,
}

/// `new-cert` isteğinin yükü.
///
/// Çözümleme sırasında CSR'ın PKCS#10 olarak ayrıştırılabildiği denetlenir;
/// imza doğrulaması ayrı bir adımdır.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCertificateRequest", into = "RawCertificateRequest")]
pub struct CertificateRequest {
    csr: Vec<u8>,
    authorizations: Vec<AcmeUrl>,
}

impl TryFrom<RawCertificateRequest> for CertificateRequest {
    type Error = CodecError;

    fn try_from(raw: RawCertificateRequest) -> Result<Self, Self::Error> {
        let csr = decode_base64url(&raw.csr).map_err(|_| CodecError::CsrEncoding)?;
        parse_csr(&csr)?;
        Ok(Self {
            csr,
            authorizations: raw.authorizations,
        })
    }
}

impl From<CertificateRequest> for RawCertificateRequest {
    fn from(request: CertificateRequest) -> Self {
        Self {
            csr: encode_base64url(&request.csr),
            authorizations: request.authorizations,
        }
    }
}

/// Harf, rakam ve tireden oluşan etiketlerle yazılmış ana makine adı mı.
///
/// Serbest metin CN değerleri (ör. `"My Test Cert"`) ad listesine girmez.
fn is_hostname(value: &str) -> bool {
    let name = value.strip_suffix('.').unwrap_or(value);
    !name.is_empty()
        && name.len() <= 253
        && name.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .bytes()
                    .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-')
        })
}

fn parse_csr(der: &[u8]) -> Result<X509CertificationRequest<'_>, CodecError> {
    X509CertificationRequest::from_der(der)
        .map(|(_, csr)| csr)
        .map_err(|err| CodecError::CsrParse(err.to_string()))
}

impl CertificateRequest {
    /// DER kodlu CSR'dan istek oluşturur.
    ///
    /// # Errors
    ///
    /// DER geçerli bir PKCS#10 isteği değilse `CodecError::CsrParse` döner.
    pub fn new(csr: Vec<u8>, authorizations: Vec<AcmeUrl>) -> Result<Self, CodecError> {
        parse_csr(&csr)?;
        Ok(Self {
            csr,
            authorizations,
        })
    }

    #[must_use]
    pub fn csr_der(&self) -> &[u8] {
        &self.csr
    }

    #[must_use]
    pub fn authorizations(&self) -> &[AcmeUrl] {
        &self.authorizations
    }

    /// CSR'ın kendi açık anahtarıyla attığı imzayı doğrular.
    ///
    /// # Errors
    ///
    /// İmza geçersizse veya algoritma desteklenmiyorsa `CodecError::CsrSignature` döner.
    pub fn verify_signature(&self) -> Result<(), CodecError> {
        let csr = parse_csr(&self.csr)?;
        csr.verify_signature()
            .map_err(|_| CodecError::CsrSignature)
    }

    /// Ana makine adı biçimindeki konu CN değerleri ve SAN DNS adlarından
    /// oluşan, küçük harfe çevrilmiş, tekrarsız ve sıralı ad listesi.
    ///
    /// # Errors
    ///
    /// CSR ayrıştırılamazsa `CodecError::CsrParse` döner.
    pub fn dns_names(&self) -> Result<Vec<String>, CodecError> {
        let csr = parse_csr(&self.csr)?;
        let mut names = Vec::new();
        for attribute in csr.certification_request_info.subject.iter_common_name() {
            match attribute.as_str() {
                Ok(value) if is_hostname(value) => names.push(value.to_ascii_lowercase()),
                _ => {}
            }
        }
        if let Some(extensions) = csr.requested_extensions() {
            for extension in extensions {
                if let ParsedExtension::SubjectAlternativeName(san) = extension {
                    for name in &san.general_names {
                        if let GeneralName::DNSName(value) = name {
                            names.push(value.to_ascii_lowercase());
                        }
                    }
                }
            }
        }
        names.sort_unstable();
        names.dedup();
        Ok(names)
    }
}

/// DER sertifikanın seri numarasını küçük harfli onaltılık metin olarak döndürür.
///
/// # Errors
///
/// DER ayrıştırılamazsa `CodecError::CertificateParse` döner.
pub fn certificate_serial(der: &[u8]) -> Result<String, CodecError> {
    let (_, certificate) = X509Certificate::from_der(der)
        .map_err(|err| CodecError::CertificateParse(err.to_string()))?;
    Ok(certificate
        .tbs_certificate
        .raw_serial()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect())
}

/// Verilmiş bir sertifika.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub serial: String,
    pub der: Vec<u8>,
    pub registration_id: i64,
    pub status: Status,
}

impl Certificate {
    /// DER sertifikadan seri numarası çıkarılmış kayıt oluşturur.
    ///
    /// # Errors
    ///
    /// DER ayrıştırılamazsa `CodecError::CertificateParse` döner.
    pub fn from_der(der: Vec<u8>, registration_id: i64) -> Result<Self, CodecError> {
        let serial = certificate_serial(&der)?;
        Ok(Self {
            serial,
            der,
            registration_id,
            status: Status::Valid,
        })
    }
}

/// Sertifikanın iptal durumu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateStatus {
    pub serial: String,
    pub status: Status,
    pub revoked_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRevocationRequest {
    certificate: String,
}

/// `revoke-cert` isteğinin yükü.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRevocationRequest", into = "RawRevocationRequest")]
pub struct RevocationRequest {
    certificate: Vec<u8>,
}

impl TryFrom<RawRevocationRequest> for RevocationRequest {
    type Error = CodecError;

    fn try_from(raw: RawRevocationRequest) -> Result<Self, Self::Error> {
        let certificate =
            decode_base64url(&raw.certificate).map_err(|_| CodecError::CertificateEncoding)?;
        Ok(Self { certificate })
    }
}

impl From<RevocationRequest> for RawRevocationRequest {
    fn from(request: RevocationRequest) -> Self {
        Self {
            certificate: encode_base64url(&request.certificate),
        }
    }
}

impl RevocationRequest {
    #[must_use]
    pub const fn new(certificate: Vec<u8>) -> Self {
        Self { certificate }
    }

    #[must_use]
    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate
    }

    /// İptal edilecek sertifikanın seri numarası.
    ///
    /// # Errors
    ///
    /// DER ayrıştırılamazsa `CodecError::CertificateParse` döner.
    pub fn serial(&self) -> Result<String, CodecError> {
        certificate_serial(&self.certificate)
    }
}
