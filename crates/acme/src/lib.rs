#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

//! ACME kablo nesneleri ve JWS zarf doğrulayıcısı.

mod authorization;
mod certificates;
mod jwk;
mod jws;
mod registration;
mod url;

pub use authorization::{
    AcmeIdentifier, Authorization, AuthorizationRequest, Challenge, ChallengeResponse,
    IdentifierType, Status,
};
pub use certificates::{
    certificate_serial, Certificate, CertificateRequest, CertificateStatus, CodecError,
    RevocationRequest,
};
pub use jwk::{AccountVerifier, JsonWebKey, JwkError};
pub use jws::{
    verify_body, EcdsaP256AccountKey, Ed25519AccountKey, HeaderPlacement, JwsError, JwsHeader,
    RsaAccountKey, SignedEnvelope, VerificationError, VerifiedPayload,
};
pub use registration::{Registration, RegistrationUpdate};
pub use url::AcmeUrl;
