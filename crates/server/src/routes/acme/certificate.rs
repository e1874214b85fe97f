use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use kapi_acme::{CertificateRequest, RevocationRequest, Status};
use tracing::{debug, info};

use crate::problem::Problem;
use crate::routes::{
    caller_registration, certificate_response, decode_payload, read_verified, require_get,
    require_post,
};
use crate::state::WfeState;

/// CSR karşılığında sertifika düzenlenmesini ister.
pub async fn new_certificate(
    State(state): State<Arc<WfeState>>,
    method: Method,
    body: Body,
) -> Result<Response, Problem> {
    require_post(&method)?;
    let verified = read_verified(&state, body).await?;
    let request: CertificateRequest =
        decode_payload(&verified.payload, "Error unmarshaling certificate request")?;
    let caller = caller_registration(&state, &verified.key).await?;

    let certificate = state
        .ra()
        .new_certificate(request, caller.id)
        .await
        .map_err(|err| Problem::from_ra("Error creating new cert", err))?;
    state.stats().inc("wfe.certificates", 1);
    info!(
        serial = %certificate.serial,
        registration_id = caller.id,
        "sertifika düzenlendi"
    );

    let location = state.paths().certificate(&certificate.serial);
    certificate_response(StatusCode::CREATED, certificate.der, Some(location))
}

pub async fn certificate(
    State(state): State<Arc<WfeState>>,
    method: Method,
    Path(serial): Path<String>,
) -> Result<Response, Problem> {
    require_get(&method)?;
    let certificate = state
        .sa()
        .get_certificate(&serial.to_ascii_lowercase())
        .await
        .map_err(|err| Problem::from_lookup("Unable to find certificate", err))?;
    certificate_response(StatusCode::OK, certificate.der, None)
}

/// Sahibinin imzaladığı istekle bir sertifikayı iptal eder.
pub async fn revoke_certificate(
    State(state): State<Arc<WfeState>>,
    method: Method,
    body: Body,
) -> Result<Response, Problem> {
    require_post(&method)?;
    let verified = read_verified(&state, body).await?;
    let request: RevocationRequest =
        decode_payload(&verified.payload, "Error unmarshaling revocation request")?;
    let serial = request.serial().map_err(|err| {
        debug!(error = %err, "iptal edilecek sertifika ayrıştırılamadı");
        Problem::malformed("Error unmarshaling revocation request")
    })?;

    let certificate = state
        .sa()
        .get_certificate(&serial)
        .await
        .map_err(|err| Problem::from_lookup("Unable to find certificate", err))?;
    if certificate.der != request.certificate_der() {
        return Err(Problem::not_found("Unable to find certificate"));
    }

    let caller = caller_registration(&state, &verified.key).await?;
    if caller.id != certificate.registration_id {
        return Err(Problem::unauthorized(
            "Revocation request must be signed by the certificate owner",
        ));
    }

    let status = state
        .sa()
        .get_certificate_status(&serial)
        .await
        .map_err(|err| Problem::from_lookup("Unable to find certificate", err))?;
    if status.status == Status::Revoked {
        return Err(Problem::conflict("Certificate already revoked"));
    }

    state
        .ra()
        .revoke_certificate(certificate)
        .await
        .map_err(|err| Problem::from_ra("Failed to revoke certificate", err))?;
    state.stats().inc("wfe.revocations", 1);
    info!(serial = %serial, registration_id = caller.id, "sertifika iptal edildi");
    Ok(StatusCode::OK.into_response())
}
