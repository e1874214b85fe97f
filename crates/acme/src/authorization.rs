use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::url::AcmeUrl;

/// ACME nesnelerinin yaşam döngüsü durumu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Unknown,
    Pending,
    Processing,
    Valid,
    Invalid,
    Revoked,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Revoked => "revoked",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desteklenen tanımlayıcı türleri.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentifierType {
    #[default]
    #[serde(rename = "dns")]
    Dns,
}

/// Yetkilendirilecek tanımlayıcı.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AcmeIdentifier {
    #[serde(rename = "type")]
    pub kind: IdentifierType,
    pub value: String,
}

impl AcmeIdentifier {
    /// DNS tanımlayıcısı oluşturur.
    #[must_use]
    pub fn dns(value: impl Into<String>) -> Self {
        Self {
            kind: IdentifierType::Dns,
            value: value.into(),
        }
    }
}

/// Bir yetkilendirme içindeki doğrulama görevi.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    pub uri: AcmeUrl,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub validated: Option<OffsetDateTime>,
}

impl Challenge {
    /// Verilen tür ve URI ile durumsuz bir challenge oluşturur.
    #[must_use]
    pub const fn new(kind: String, uri: AcmeUrl) -> Self {
        Self {
            kind,
            status: None,
            uri,
            token: None,
            validated: None,
        }
    }
}

/// Bir hesabın bir tanımlayıcıyı kontrol ettiğini kanıtlama süreci.
///
/// `expires` her zaman serileştirilir; ayarlanmamış değer sıfır anı
/// (`0001-01-01T00:00:00Z`) olarak yazılır ve geri okunurken yeniden
/// ayarlanmamış kabul edilir.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub identifier: AcmeIdentifier,
    #[serde(skip)]
    pub registration_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, with = "zero_instant")]
    pub expires: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub challenges: Vec<Challenge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub combinations: Vec<Vec<usize>>,
}

impl Authorization {
    /// Yalnızca tanımlayıcısı belirli, boş bir yetkilendirme oluşturur.
    #[must_use]
    pub const fn new(identifier: AcmeIdentifier) -> Self {
        Self {
            id: String::new(),
            identifier,
            registration_id: 0,
            status: None,
            expires: None,
            challenges: Vec::new(),
            combinations: Vec::new(),
        }
    }

    /// İstek hedefiyle (yol + sorgu) eşleşen challenge'ın indeksini döndürür.
    #[must_use]
    pub fn challenge_index(&self, path: &str, query: Option<&str>) -> Option<usize> {
        self.challenges
            .iter()
            .position(|challenge| challenge.uri.matches_target(path, query))
    }

    /// İstemciye dönülecek görünüm: `id` ve hesap bağı temizlenir.
    #[must_use]
    pub fn public_view(&self) -> Self {
        Self {
            id: String::new(),
            registration_id: 0,
            ..self.clone()
        }
    }
}

/// `new-authz` isteğinin yükü.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub identifier: AcmeIdentifier,
}

impl From<AuthorizationRequest> for Authorization {
    fn from(request: AuthorizationRequest) -> Self {
        Self::new(request.identifier)
    }
}

/// Challenge POST isteğinin yükü. Tüm alanlar isteğe bağlıdır.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(
        rename = "keyAuthorization",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub key_authorization: Option<String>,
}

mod zero_instant {
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use time::format_description::well_known::Rfc3339;
    use time::OffsetDateTime;

    const ZERO: &str = "0001-01-01T00:00:00Z";

    pub fn serialize<S: Serializer>(
        value: &Option<OffsetDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(instant) => {
                let text = instant.format(&Rfc3339).map_err(S::Error::custom)?;
                serializer.serialize_str(&text)
            }
            None => serializer.serialize_str(ZERO),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<OffsetDateTime>, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?;
        match text.as_deref() {
            None | Some(ZERO) => Ok(None),
            Some(value) => {
                let instant = OffsetDateTime::parse(value, &Rfc3339).map_err(D::Error::custom)?;
                Ok((instant.year() > 1).then_some(instant))
            }
        }
    }
}
