use std::sync::Arc;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::routes::require_get;
use crate::state::WfeState;

#[derive(Debug, Serialize)]
struct DirectoryDocument<'a> {
    #[serde(rename = "new-reg")]
    new_reg: &'a str,
    #[serde(rename = "new-authz")]
    new_authz: &'a str,
    #[serde(rename = "new-cert")]
    new_cert: &'a str,
    #[serde(rename = "revoke-cert")]
    revoke_cert: &'a str,
}

fn page_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        "404 page not found\n",
    )
        .into_response()
}

/// Kök dizin belgesini sunar; başka hiçbir yol bu işleyicide eşleşmez.
pub async fn index(State(state): State<Arc<WfeState>>, method: Method, uri: Uri) -> Response {
    if uri.path() != "/" {
        return page_not_found();
    }
    if let Err(problem) = require_get(&method) {
        return problem.into_response();
    }
    let paths = state.paths();
    Json(DirectoryDocument {
        new_reg: paths.new_reg(),
        new_authz: paths.new_authz(),
        new_cert: paths.new_cert(),
        revoke_cert: paths.revoke_cert(),
    })
    .into_response()
}
