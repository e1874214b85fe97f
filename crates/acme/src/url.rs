use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::{ParseError, Url};

/// Göreli referansların çözümlendiği yer tutucu köken.
const RELATIVE_BASE: &str = "http://relative.invalid/";

/// ACME nesnelerinde taşınan URL değeri.
///
/// Mutlak URL'ler (`https://ca.example/acme/reg/1`), kökene göreli
/// referanslar (`/acme/authz/x?challenge=0`) ve opak URI'ler (`tel:123`)
/// kabul edilir. Serileştirme her zaman ayrıştırılan metnin aynısını üretir.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AcmeUrl {
    raw: String,
    resolved: Url,
    relative: bool,
}

impl AcmeUrl {
    /// Metni URL olarak ayrıştırır.
    ///
    /// # Errors
    ///
    /// Metin ne mutlak URL ne de göreli referans olarak çözümlenemezse
    /// `url::ParseError` döner.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        match Url::parse(raw) {
            Ok(resolved) => Ok(Self {
                raw: raw.to_owned(),
                resolved,
                relative: false,
            }),
            Err(ParseError::RelativeUrlWithoutBase) => {
                let resolved = Url::parse(RELATIVE_BASE)?.join(raw)?;
                Ok(Self {
                    raw: raw.to_owned(),
                    resolved,
                    relative: true,
                })
            }
            Err(err) => Err(err),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Değer kökene göreli bir referans ise `true`.
    #[must_use]
    pub const fn is_relative(&self) -> bool {
        self.relative
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.resolved.path()
    }

    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.resolved.query()
    }

    /// Sorgu parametresinin ilk değerini döndürür.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.resolved
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Sorgu ve parça bileşenleri atılmış kopyayı döndürür.
    #[must_use]
    pub fn without_query(&self) -> Self {
        let mut resolved = self.resolved.clone();
        resolved.set_query(None);
        resolved.set_fragment(None);
        let raw = if self.relative {
            resolved.path().to_owned()
        } else {
            resolved.as_str().to_owned()
        };
        Self {
            raw,
            resolved,
            relative: self.relative,
        }
    }

    /// Yol ve sorgu bileşenlerinin verilen istek hedefiyle eşleşip eşleşmediğini denetler.
    #[must_use]
    pub fn matches_target(&self, path: &str, query: Option<&str>) -> bool {
        self.path() == path && self.query().unwrap_or_default() == query.unwrap_or_default()
    }
}

impl fmt::Display for AcmeUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl fmt::Debug for AcmeUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AcmeUrl").field(&self.raw).finish()
    }
}

impl FromStr for AcmeUrl {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Serialize for AcmeUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for AcmeUrl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(D::Error::custom)
    }
}
