use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{LINK, LOCATION};
use axum::http::{Method, StatusCode, Uri};
use axum::response::Response;
use kapi_acme::{Authorization, AuthorizationRequest, ChallengeResponse};
use tracing::info;

use crate::problem::Problem;
use crate::routes::{
    caller_registration, decode_payload, json_response, link, read_verified, require_get,
    require_post,
};
use crate::state::WfeState;

/// Hesap adına yeni bir tanımlayıcı yetkilendirmesi ister.
pub async fn new_authorization(
    State(state): State<Arc<WfeState>>,
    method: Method,
    body: Body,
) -> Result<Response, Problem> {
    require_post(&method)?;
    let verified = read_verified(&state, body).await?;
    let request: AuthorizationRequest =
        decode_payload(&verified.payload, "Error unmarshaling JSON")?;
    let caller = caller_registration(&state, &verified.key).await?;

    let created = state
        .ra()
        .new_authorization(Authorization::from(request), caller.id)
        .await
        .map_err(|err| Problem::from_ra("Error creating new authz", err))?;
    state.stats().inc("wfe.authorizations", 1);
    info!(
        authorization_id = %created.id,
        registration_id = caller.id,
        identifier = %created.identifier.value,
        "yeni yetkilendirme oluşturuldu"
    );

    let paths = state.paths();
    json_response(
        StatusCode::OK,
        &created.public_view(),
        vec![
            (LOCATION, paths.authorization(&created.id)),
            (LINK, link(paths.new_cert(), "next")),
        ],
    )
}

fn targets_challenge(uri: &Uri) -> bool {
    uri.query().is_some_and(|query| {
        query
            .split('&')
            .any(|pair| pair == "challenge" || pair.starts_with("challenge="))
    })
}

/// Yetkilendirmeyi döndürür; `challenge` sorgusu taşıyan istekler
/// [`challenge`] işleyicisine yönlendirilir.
pub async fn authorization(
    State(state): State<Arc<WfeState>>,
    method: Method,
    uri: Uri,
    Path(id): Path<String>,
    body: Body,
) -> Result<Response, Problem> {
    let authorization = state
        .sa()
        .get_authorization(&id)
        .await
        .map_err(|err| Problem::from_lookup("Unable to find authorization", err))?;

    if targets_challenge(&uri) {
        return challenge(&state, authorization, &method, &uri, body).await;
    }

    require_get(&method)?;
    json_response(StatusCode::OK, &authorization.public_view(), Vec::new())
}

/// Çözümlenmiş yetkilendirmenin bir challenge'ına verilen yanıtı işler.
///
/// # Errors
///
/// Challenge bulunamazsa, yöntem POST değilse, gövde doğrulanamazsa veya
/// imzalayan hesap yetkilendirmenin sahibi değilse `Problem` döner.
pub async fn challenge(
    state: &WfeState,
    authorization: Authorization,
    method: &Method,
    uri: &Uri,
    body: Body,
) -> Result<Response, Problem> {
    let index = authorization
        .challenge_index(uri.path(), uri.query())
        .ok_or_else(|| Problem::not_found("Unable to find challenge"))?;
    require_post(method)?;
    let verified = read_verified(state, body).await?;
    let response: ChallengeResponse =
        decode_payload(&verified.payload, "Error unmarshaling authorization")?;
    let caller = caller_registration(state, &verified.key).await?;
    if caller.id != authorization.registration_id {
        return Err(Problem::unauthorized(
            "User registration ID doesn't match registration ID in authorization",
        ));
    }

    let authorization_id = authorization.id.clone();
    let updated = state
        .ra()
        .update_authorization(authorization, index, response)
        .await
        .map_err(|err| Problem::from_ra("Unable to update authorization", err))?;
    let challenge = updated
        .challenges
        .get(index)
        .cloned()
        .ok_or_else(|| Problem::server_internal("Unable to update authorization"))?;
    info!(
        authorization_id = %authorization_id,
        challenge = %challenge.kind,
        "challenge yanıtı alındı"
    );

    let up = challenge.uri.without_query();
    json_response(
        StatusCode::ACCEPTED,
        &challenge,
        vec![
            (LOCATION, challenge.uri.as_str().to_owned()),
            (LINK, link(up.as_str(), "up")),
        ],
    )
}
