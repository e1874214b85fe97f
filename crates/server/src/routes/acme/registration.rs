use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{LINK, LOCATION};
use axum::http::{Method, StatusCode};
use axum::response::Response;
use kapi_acme::{Registration, RegistrationUpdate};
use tracing::{info, warn};

use crate::authority::SaError;
use crate::problem::Problem;
use crate::routes::{
    caller_registration, decode_payload, json_response, link, read_verified, require_post,
};
use crate::state::WfeState;

/// Yeni hesap kaydı oluşturur.
///
/// İmzalayan anahtar zaten kayıtlıysa mevcut kaydı gösteren `Location` ile
/// 409 döner.
pub async fn new_registration(
    State(state): State<Arc<WfeState>>,
    method: Method,
    body: Body,
) -> Result<Response, Problem> {
    require_post(&method)?;
    let verified = read_verified(&state, body).await?;
    let update: RegistrationUpdate = decode_payload(&verified.payload, "Error unmarshaling JSON")?;

    match state.sa().get_registration_by_key(&verified.key).await {
        Ok(existing) => {
            return Err(Problem::conflict("Registration key is already in use")
                .with_location(state.paths().registration(existing.id)));
        }
        Err(SaError::NotFound(_)) => {}
        Err(SaError::Internal(message)) => {
            warn!(error = %message, "kayıt sorgusu başarısız");
            return Err(Problem::server_internal("Error creating new registration"));
        }
    }

    let registration = Registration::from_update(verified.key.clone(), update);
    let created = state
        .ra()
        .new_registration(registration, verified.key)
        .await
        .map_err(|err| Problem::from_ra("Error creating new registration", err))?;
    state.stats().inc("wfe.registrations", 1);
    info!(registration_id = created.id, "yeni kayıt oluşturuldu");

    let paths = state.paths();
    let mut headers = vec![
        (LOCATION, paths.registration(created.id)),
        (LINK, link(paths.new_authz(), "next")),
    ];
    if let Some(terms) = state.config().terms_url() {
        headers.push((LINK, link(terms.as_str(), "terms-of-service")));
    }
    json_response(StatusCode::OK, &created, headers)
}

/// Mevcut kaydın iletişim bilgilerini ve kurtarma jetonunu günceller.
pub async fn registration(
    State(state): State<Arc<WfeState>>,
    method: Method,
    Path(id): Path<String>,
    body: Body,
) -> Result<Response, Problem> {
    require_post(&method)?;
    let verified = read_verified(&state, body).await?;
    let current = caller_registration(&state, &verified.key).await?;

    let id: i64 = id
        .parse()
        .map_err(|_| Problem::malformed("Registration ID must be an integer"))?;
    if id <= 0 {
        return Err(Problem::malformed(
            "Registration ID must be a positive non-zero integer",
        ));
    }
    if id != current.id {
        return Err(Problem::unauthorized(
            "Request signing key did not match registration key",
        ));
    }

    let update: RegistrationUpdate =
        decode_payload(&verified.payload, "Error unmarshaling registration")?;
    let updated = state
        .ra()
        .update_registration(current, update)
        .await
        .map_err(|err| Problem::from_ra("Unable to update registration", err))?;
    info!(registration_id = updated.id, "kayıt güncellendi");

    json_response(
        StatusCode::ACCEPTED,
        &updated,
        vec![(LINK, link(state.paths().new_authz(), "next"))],
    )
}
