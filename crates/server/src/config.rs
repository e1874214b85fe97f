use std::env;
use std::net::SocketAddr;

use kapi_acme::AcmeUrl;

use crate::error::ServerError;

const DEFAULT_PREFIX: &str = "/acme/";
const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// ACME kaynaklarının yayınlandığı yollar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePaths {
    pub(crate) new_reg: String,
    pub(crate) reg_base: String,
    pub(crate) new_authz: String,
    pub(crate) authz_base: String,
    pub(crate) new_cert: String,
    pub(crate) cert_base: String,
    pub(crate) revoke_cert: String,
}

impl ResourcePaths {
    /// Verilen önek altında varsayılan kaynak adlarını kurar.
    ///
    /// # Errors
    ///
    /// Önek `/` ile başlamıyorsa veya boşluk içeriyorsa
    /// `ServerError::Configuration` döner.
    pub fn with_prefix(prefix: &str) -> Result<Self, ServerError> {
        let trimmed = prefix.trim();
        if !trimmed.starts_with('/') || trimmed.contains(char::is_whitespace) {
            return Err(ServerError::Configuration(format!(
                "ACME yol öneki '/' ile başlamalı: {prefix}"
            )));
        }
        let prefix = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{trimmed}/")
        };
        Ok(Self {
            new_reg: format!("{prefix}new-reg"),
            reg_base: format!("{prefix}reg/"),
            new_authz: format!("{prefix}new-authz"),
            authz_base: format!("{prefix}authz/"),
            new_cert: format!("{prefix}new-cert"),
            cert_base: format!("{prefix}cert/"),
            revoke_cert: format!("{prefix}revoke-cert"),
        })
    }

    #[must_use]
    pub fn new_reg(&self) -> &str {
        &self.new_reg
    }

    #[must_use]
    pub fn new_authz(&self) -> &str {
        &self.new_authz
    }

    #[must_use]
    pub fn new_cert(&self) -> &str {
        &self.new_cert
    }

    #[must_use]
    pub fn revoke_cert(&self) -> &str {
        &self.revoke_cert
    }

    #[must_use]
    pub fn authz_base(&self) -> &str {
        &self.authz_base
    }

    /// Kayıt kaynağının URL'i.
    #[must_use]
    pub fn registration(&self, id: i64) -> String {
        format!("{}{id}", self.reg_base)
    }

    /// Yetkilendirme kaynağının URL'i.
    #[must_use]
    pub fn authorization(&self, id: &str) -> String {
        format!("{}{id}", self.authz_base)
    }

    /// Sertifika kaynağının URL'i.
    #[must_use]
    pub fn certificate(&self, serial: &str) -> String {
        format!("{}{serial}", self.cert_base)
    }

    pub(crate) fn registration_route(&self) -> String {
        format!("{}:id", self.reg_base)
    }

    pub(crate) fn authorization_route(&self) -> String {
        format!("{}:id", self.authz_base)
    }

    pub(crate) fn certificate_route(&self) -> String {
        format!("{}:serial", self.cert_base)
    }
}

impl Default for ResourcePaths {
    fn default() -> Self {
        Self {
            new_reg: "/acme/new-reg".to_string(),
            reg_base: "/acme/reg/".to_string(),
            new_authz: "/acme/new-authz".to_string(),
            authz_base: "/acme/authz/".to_string(),
            new_cert: "/acme/new-cert".to_string(),
            cert_base: "/acme/cert/".to_string(),
            revoke_cert: "/acme/revoke-cert".to_string(),
        }
    }
}

fn invalid_listen_address(err: impl std::fmt::Display) -> ServerError {
    ServerError::Configuration(format!("Dinleme adresi geçersiz: {err}"))
}

fn derive_listen_addr(
    listen_raw: Option<String>,
    host_raw: Option<String>,
) -> Result<SocketAddr, ServerError> {
    if let Some(raw) = listen_raw {
        return raw.trim().parse().map_err(invalid_listen_address);
    }

    if let Some(host_value) = host_raw {
        let normalized = normalize_host_value(&host_value)?;
        return normalized.parse().map_err(invalid_listen_address);
    }

    Ok(SocketAddr::from(([127, 0, 0, 1], 8080)))
}

/// `HOST` değerini `adres:port` biçimine getirir; port yoksa 8080 eklenir.
fn normalize_host_value(host_raw: &str) -> Result<String, ServerError> {
    let trimmed = host_raw.trim();
    if trimmed.is_empty() {
        return Err(ServerError::Configuration(
            "HOST değeri boş olamaz".to_string(),
        ));
    }
    if trimmed.parse::<SocketAddr>().is_ok() {
        return Ok(trimmed.to_string());
    }

    let without_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest);
    let authority = without_scheme
        .split(['/', '?'])
        .next()
        .unwrap_or_default()
        .trim();
    if authority.is_empty() {
        return Err(ServerError::Configuration(
            "HOST değeri geçerli bir adres içermiyor".to_string(),
        ));
    }
    if authority.parse::<SocketAddr>().is_ok() {
        return Ok(authority.to_string());
    }

    let host = authority.trim_matches(['[', ']']);
    if host.contains(':') {
        Ok(format!("[{host}]:8080"))
    } else {
        Ok(format!("{host}:8080"))
    }
}

fn parse_max_body(raw: Option<String>) -> Result<usize, ServerError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_MAX_BODY_BYTES);
    };
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(ServerError::Configuration(
            "KAPI_MAX_BODY_BYTES sıfır olamaz".to_string(),
        )),
        Ok(value) => Ok(value),
        Err(err) => Err(ServerError::Configuration(format!(
            "KAPI_MAX_BODY_BYTES geçersiz: {err}"
        ))),
    }
}

/// Sunucu yapılandırması.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub(crate) listen: SocketAddr,
    pub(crate) paths: ResourcePaths,
    pub(crate) terms_url: Option<AcmeUrl>,
    pub(crate) max_body_bytes: usize,
}

impl ServerConfig {
    /// Çevre değişkenlerinden yapılandırmayı oluşturur.
    ///
    /// * `KAPI_LISTEN` veya `HOST` dinleme adresini belirler.
    /// * `KAPI_ACME_PREFIX` kaynak yollarının önekidir (`/acme/`).
    /// * `KAPI_TERMS_URL` ayarlanırsa yeni kayıt yanıtına kullanım koşulları
    ///   bağlantısı eklenir.
    /// * `KAPI_MAX_BODY_BYTES` istek gövdesi sınırıdır (64 KiB).
    ///
    /// # Errors
    ///
    /// Değerlerden biri geçersizse `ServerError::Configuration` döner.
    pub fn from_env() -> Result<Self, ServerError> {
        let listen = derive_listen_addr(env::var("KAPI_LISTEN").ok(), env::var("HOST").ok())?;
        let prefix = env::var("KAPI_ACME_PREFIX").unwrap_or_else(|_| DEFAULT_PREFIX.to_string());
        let terms_url = env::var("KAPI_TERMS_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let max_body_bytes = parse_max_body(env::var("KAPI_MAX_BODY_BYTES").ok())?;
        Self::new(listen, &prefix, terms_url.as_deref(), max_body_bytes)
    }

    /// Yapılandırmayı doğrudan değerlerden oluşturur.
    ///
    /// # Errors
    ///
    /// Önek veya kullanım koşulları URL'i geçersizse ya da gövde sınırı sıfırsa
    /// `ServerError::Configuration` döner.
    pub fn new(
        listen: SocketAddr,
        prefix: &str,
        terms_url: Option<&str>,
        max_body_bytes: usize,
    ) -> Result<Self, ServerError> {
        if max_body_bytes == 0 {
            return Err(ServerError::Configuration(
                "istek gövdesi sınırı sıfır olamaz".to_string(),
            ));
        }
        let paths = ResourcePaths::with_prefix(prefix)?;
        let terms_url = terms_url
            .map(|raw| {
                AcmeUrl::parse(raw).map_err(|err| {
                    ServerError::Configuration(format!(
                        "kullanım koşulları URL'i geçersiz: {err}"
                    ))
                })
            })
            .transpose()?;
        Ok(Self {
            listen,
            paths,
            terms_url,
            max_body_bytes,
        })
    }

    #[must_use]
    pub const fn listen(&self) -> SocketAddr {
        self.listen
    }

    #[must_use]
    pub const fn paths(&self) -> &ResourcePaths {
        &self.paths
    }

    #[must_use]
    pub const fn terms_url(&self) -> Option<&AcmeUrl> {
        self.terms_url.as_ref()
    }

    #[must_use]
    pub const fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }
}
