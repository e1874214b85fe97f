use serde::{Deserialize, Serialize};

use crate::jwk::JsonWebKey;
use crate::url::AcmeUrl;

/// Bir hesap anahtarına bağlı ACME kaydı.
///
/// `id` kablo biçiminde yer almaz; istemciye `Location` başlığıyla bildirilir.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    #[serde(skip)]
    pub id: i64,
    #[serde(default)]
    pub key: Option<JsonWebKey>,
    #[serde(rename = "recoveryToken", default)]
    pub recovery_token: String,
    #[serde(default)]
    pub contact: Vec<AcmeUrl>,
    #[serde(default)]
    pub thumbprint: String,
}

impl Registration {
    /// İstemcinin gönderdiği alanlardan doğrulanmış anahtara bağlı yeni kayıt oluşturur.
    ///
    /// İstemcinin gövdede gönderdiği anahtar yok sayılır.
    #[must_use]
    pub fn from_update(key: JsonWebKey, update: RegistrationUpdate) -> Self {
        Self {
            id: 0,
            key: Some(key),
            recovery_token: update.recovery_token.unwrap_or_default(),
            contact: update.contact.unwrap_or_default(),
            thumbprint: String::new(),
        }
    }

    /// Güncellemede yer alan alanları kayda uygular; eksik alanlar korunur.
    pub fn apply(&mut self, update: &RegistrationUpdate) {
        if let Some(contact) = &update.contact {
            self.contact.clone_from(contact);
        }
        if let Some(token) = &update.recovery_token {
            self.recovery_token.clone_from(token);
        }
    }
}

/// `new-reg` ve kayıt güncelleme isteklerinin yükü.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Vec<AcmeUrl>>,
    #[serde(
        rename = "recoveryToken",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub recovery_token: Option<String>,
    #[serde(default, skip_serializing)]
    pub key: Option<serde_json::Value>,
}
