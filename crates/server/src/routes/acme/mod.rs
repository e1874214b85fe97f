pub mod authorization;
pub mod certificate;
pub mod index;
pub mod registration;

pub use authorization::{authorization, new_authorization};
pub use certificate::{certificate, new_certificate, revoke_certificate};
pub use index::index;
pub use registration::{new_registration, registration};
