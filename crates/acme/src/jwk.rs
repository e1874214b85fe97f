use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use ed25519_dalek::{Signature as Ed25519Signature, VerifyingKey as Ed25519VerifyingKey};
use p256::ecdsa::{Signature as P256Signature, VerifyingKey as P256VerifyingKey};
use rsa::pkcs1v15::{Signature as RsaSignature, VerifyingKey as RsaVerifyingKey};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use signature::Verifier;
use thiserror::Error;

/// Dolgulu ya da dolgusuz base64url girdisini kabul eden çözücü.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub(crate) fn decode_base64url(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_LENIENT.decode(value)
}

pub(crate) fn encode_base64url(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// JWK ayrıştırma ve doğrulama anahtarı üretimi hataları.
#[derive(Debug, Error)]
pub enum JwkError {
    /// `alg` değeri desteklenmiyor.
    #[error("desteklenmeyen imza algoritması: {alg}")]
    UnsupportedAlgorithm {
        /// İstemcinin bildirdiği algoritma.
        alg: String,
    },
    /// Algoritma ile anahtar türü uyuşmuyor.
    #[error("{alg} algoritması {kty} anahtarıyla kullanılamaz")]
    KeyTypeMismatch {
        /// Bildirilen algoritma.
        alg: String,
        /// JWK `kty` değeri.
        kty: &'static str,
    },
    /// Eğri desteklenmiyor.
    #[error("desteklenmeyen eğri: {crv}")]
    UnsupportedCurve {
        /// JWK `crv` değeri.
        crv: String,
    },
    /// Alan base64url olarak çözülemedi.
    #[error("JWK {field} alanı base64url olarak çözülemedi")]
    Encoding {
        /// Hatalı alan adı.
        field: &'static str,
    },
    /// Anahtar materyali geçersiz.
    #[error("JWK anahtar materyali geçersiz: {0}")]
    InvalidKey(String),
}

/// İstemcinin JWS başlığında taşıdığı açık anahtar.
///
/// Alan değerleri alındığı biçimde saklanır; böylece `"e":"AAEAAQ"` gibi
/// minimal olmayan kodlamalar yanıtta aynen geri döner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kty")]
pub enum JsonWebKey {
    /// RSA açık anahtarı.
    #[serde(rename = "RSA")]
    Rsa { n: String, e: String },
    /// NIST eğrisi üzerindeki EC açık anahtarı.
    #[serde(rename = "EC")]
    Ec { crv: String, x: String, y: String },
    /// Edwards eğrisi (Ed25519) açık anahtarı.
    #[serde(rename = "OKP")]
    Okp { crv: String, x: String },
}

impl JsonWebKey {
    /// RSA açık anahtarından JWK üretir.
    #[must_use]
    pub fn from_rsa(key: &RsaPublicKey) -> Self {
        Self::Rsa {
            n: encode_base64url(key.n().to_bytes_be()),
            e: encode_base64url(key.e().to_bytes_be()),
        }
    }

    /// P-256 doğrulama anahtarından JWK üretir.
    #[must_use]
    pub fn from_p256(key: &P256VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        // 0x04 || X (32) || Y (32)
        let bytes = point.as_bytes();
        Self::Ec {
            crv: "P-256".to_string(),
            x: encode_base64url(&bytes[1..33]),
            y: encode_base64url(&bytes[33..65]),
        }
    }

    /// Ed25519 doğrulama anahtarından JWK üretir.
    #[must_use]
    pub fn from_ed25519(key: &Ed25519VerifyingKey) -> Self {
        Self::Okp {
            crv: "Ed25519".to_string(),
            x: encode_base64url(key.as_bytes()),
        }
    }

    /// JWK `kty` değeri.
    #[must_use]
    pub const fn kty(&self) -> &'static str {
        match self {
            Self::Rsa { .. } => "RSA",
            Self::Ec { .. } => "EC",
            Self::Okp { .. } => "OKP",
        }
    }

    /// RFC 7638 uyumlu SHA-256 thumbprint değerini üretir.
    ///
    /// RSA tamsayıları kanonik (baştaki sıfırlar atılmış) biçime getirilerek
    /// özetlenir; aynı anahtarın farklı kodlamaları aynı thumbprint'i verir.
    ///
    /// # Errors
    ///
    /// Alanlardan biri base64url olarak çözülemezse `JwkError::Encoding` döner.
    pub fn thumbprint(&self) -> Result<String, JwkError> {
        let digest = match self {
            Self::Rsa { n, e } => {
                let n = canonical_integer(n, "n")?;
                let e = canonical_integer(e, "e")?;
                compute_thumbprint(&[("e", e.as_str()), ("kty", "RSA"), ("n", n.as_str())])
            }
            Self::Ec { crv, x, y } => compute_thumbprint(&[
                ("crv", crv.as_str()),
                ("kty", "EC"),
                ("x", x.as_str()),
                ("y", y.as_str()),
            ]),
            Self::Okp { crv, x } => {
                compute_thumbprint(&[("crv", crv.as_str()), ("kty", "OKP"), ("x", x.as_str())])
            }
        };
        Ok(digest)
    }

    /// Bildirilen `alg` için imza doğrulayıcı üretir.
    ///
    /// # Errors
    ///
    /// Algoritma desteklenmiyorsa, anahtar türüyle uyuşmuyorsa veya anahtar
    /// materyali geçersizse `JwkError` döner.
    pub fn verifier(&self, alg: &str) -> Result<AccountVerifier, JwkError> {
        match (alg, self) {
            ("RS256", Self::Rsa { n, e }) => {
                let modulus = decode_field(n, "n")?;
                let exponent = decode_field(e, "e")?;
                let public = RsaPublicKey::new(
                    BigUint::from_bytes_be(&modulus),
                    BigUint::from_bytes_be(&exponent),
                )
                .map_err(|err| JwkError::InvalidKey(err.to_string()))?;
                Ok(AccountVerifier::Rs256(RsaVerifyingKey::<Sha256>::new(public)))
            }
            ("ES256", Self::Ec { crv, x, y }) => {
                if crv != "P-256" {
                    return Err(JwkError::UnsupportedCurve { crv: crv.clone() });
                }
                let x = decode_field(x, "x")?;
                let y = decode_field(y, "y")?;
                if x.len() != 32 || y.len() != 32 {
                    return Err(JwkError::InvalidKey(
                        "P-256 koordinatları 32 bayt olmalı".to_string(),
                    ));
                }
                let mut sec1 = Vec::with_capacity(65);
                sec1.push(0x04);
                sec1.extend_from_slice(&x);
                sec1.extend_from_slice(&y);
                let key = P256VerifyingKey::from_sec1_bytes(&sec1)
                    .map_err(|err| JwkError::InvalidKey(err.to_string()))?;
                Ok(AccountVerifier::Es256(key))
            }
            ("EdDSA", Self::Okp { crv, x }) => {
                if crv != "Ed25519" {
                    return Err(JwkError::UnsupportedCurve { crv: crv.clone() });
                }
                let bytes = decode_field(x, "x")?;
                let bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
                    JwkError::InvalidKey("Ed25519 anahtarı 32 bayt olmalı".to_string())
                })?;
                let key = Ed25519VerifyingKey::from_bytes(&bytes)
                    .map_err(|err| JwkError::InvalidKey(err.to_string()))?;
                Ok(AccountVerifier::EdDsa(key))
            }
            ("RS256" | "ES256" | "EdDSA", key) => Err(JwkError::KeyTypeMismatch {
                alg: alg.to_owned(),
                kty: key.kty(),
            }),
            (other, _) => Err(JwkError::UnsupportedAlgorithm {
                alg: other.to_owned(),
            }),
        }
    }
}

/// JWS imzasını doğrulamaya hazır hesap anahtarı.
#[derive(Debug, Clone)]
pub enum AccountVerifier {
    Rs256(RsaVerifyingKey<Sha256>),
    Es256(P256VerifyingKey),
    EdDsa(Ed25519VerifyingKey),
}

impl AccountVerifier {
    /// İmza girdisi üzerinde ham imza baytlarını doğrular.
    ///
    /// # Errors
    ///
    /// İmza ayrıştırılamazsa veya doğrulanamazsa `signature::Error` döner.
    pub fn verify(&self, signing_input: &[u8], signature: &[u8]) -> Result<(), signature::Error> {
        match self {
            Self::Rs256(key) => {
                let signature = RsaSignature::try_from(signature)?;
                key.verify(signing_input, &signature)
            }
            Self::Es256(key) => {
                let signature = P256Signature::from_slice(signature)?;
                key.verify(signing_input, &signature)
            }
            Self::EdDsa(key) => {
                let signature = Ed25519Signature::from_slice(signature)?;
                key.verify_strict(signing_input, &signature)
            }
        }
    }
}

fn decode_field(value: &str, field: &'static str) -> Result<Vec<u8>, JwkError> {
    decode_base64url(value).map_err(|_| JwkError::Encoding { field })
}

fn canonical_integer(value: &str, field: &'static str) -> Result<String, JwkError> {
    let bytes = decode_field(value, field)?;
    let first = bytes.iter().position(|byte| *byte != 0).unwrap_or(bytes.len());
    Ok(encode_base64url(&bytes[first..]))
}

fn compute_thumbprint(entries: &[(&str, &str)]) -> String {
    let mut sorted = entries.to_vec();
    sorted.sort_unstable_by(|lhs, rhs| lhs.0.cmp(rhs.0));
    let mut serialized = String::from("{");
    for (index, (name, value)) in sorted.iter().enumerate() {
        if index > 0 {
            serialized.push(',');
        }
        serialized.push('"');
        serialized.push_str(name);
        serialized.push_str("\":\"");
        serialized.push_str(value);
        serialized.push('"');
    }
    serialized.push('}');
    encode_base64url(Sha256::digest(serialized.as_bytes()))
}
