use std::sync::Arc;
use std::time::Instant;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::header::{HeaderName, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use kapi_acme::{verify_body, JsonWebKey, Registration, VerifiedPayload};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::signal;
#[cfg(unix)]
use tokio::signal::unix::{signal as unix_signal, SignalKind};
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};
use tower_http::LatencyUnit;
use tracing::{debug, info, warn, Level};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::problem::Problem;
use crate::state::WfeState;

pub mod acme;

const PKIX_CERT: &str = "application/pkix-cert";

/// ACME kaynaklarını yapılandırılmış yollara bağlayan router'ı kurar.
///
/// Yol eşleşmesi yöntemden bağımsızdır; yöntem denetimi her işleyicide
/// yapılır ve uygunsuz yöntem `malformed` problemiyle yanıtlanır.
pub fn build_router(state: Arc<WfeState>) -> Router {
    let paths = state.paths().clone();
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        )
        .on_failure(
            DefaultOnFailure::new()
                .level(Level::ERROR)
                .latency_unit(LatencyUnit::Millis),
        );

    Router::new()
        .route("/", any(acme::index))
        .route(paths.new_reg(), any(acme::new_registration))
        .route(&paths.registration_route(), any(acme::registration))
        .route(paths.new_authz(), any(acme::new_authorization))
        .route(&paths.authorization_route(), any(acme::authorization))
        .route(paths.new_cert(), any(acme::new_certificate))
        .route(&paths.certificate_route(), any(acme::certificate))
        .route(paths.revoke_cert(), any(acme::revoke_certificate))
        .fallback(acme::index)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            record_request,
        ))
        .layer(trace_layer)
        .with_state(state)
}

/// HTTP sunucusunu bellek içi otoritelerle başlatır.
///
/// # Errors
///
/// Ağ dinleyicisi oluşturulamazsa veya HTTP hizmeti başlatılamazsa `ServerError` döner.
pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    serve_with_state(Arc::new(WfeState::in_memory(config))).await
}

/// HTTP sunucusunu verilen otoritelerle başlatır.
///
/// # Errors
///
/// Ağ dinleyicisi oluşturulamazsa veya HTTP hizmeti başlatılamazsa `ServerError` döner.
pub async fn serve_with_state(state: Arc<WfeState>) -> Result<(), ServerError> {
    let listen = state.config().listen();
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!(address = %listen, "kapi-server dinlemede");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("kapi-server durdu");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("SIGINT alındı, kapanış başlatılıyor"),
            Err(err) => warn!(error = %err, "CTRL+C sinyali dinlenemedi"),
        }
    };

    #[cfg(unix)]
    {
        let mut term_signal = match unix_signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                warn!(error = %err, "SIGTERM dinleyicisi kurulamadı");
                ctrl_c.await;
                return;
            }
        };

        tokio::select! {
            () = ctrl_c => (),
            () = async {
                term_signal.recv().await;
                info!("SIGTERM alındı, kapanış başlatılıyor");
            } => (),
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}

async fn record_request(
    State(state): State<Arc<WfeState>>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let response = next.run(request).await;
    let stats = state.stats();
    stats.inc("wfe.http.requests", 1);
    stats.inc(&format!("wfe.http.status.{}", response.status().as_u16()), 1);
    stats.timing("wfe.http.latency", started.elapsed());
    response
}

pub(crate) fn require_post(method: &Method) -> Result<(), Problem> {
    if method == Method::POST {
        Ok(())
    } else {
        Err(Problem::method_not_allowed())
    }
}

pub(crate) fn require_get(method: &Method) -> Result<(), Problem> {
    if method == Method::GET || method == Method::HEAD {
        Ok(())
    } else {
        Err(Problem::method_not_allowed())
    }
}

/// Gövdeyi okur ve JWS imzasını doğrular.
///
/// Okuma ve doğrulama hataları istemciye ayırt edilmeden aynı problemle döner.
pub(crate) async fn read_verified(
    state: &WfeState,
    body: Body,
) -> Result<VerifiedPayload, Problem> {
    let bytes = to_bytes(body, state.config().max_body_bytes())
        .await
        .map_err(|err| {
            debug!(error = %err, "istek gövdesi okunamadı");
            Problem::unreadable_body()
        })?;
    verify_body(&bytes).map_err(|err| {
        debug!(error = %err, "JWS doğrulanamadı");
        Problem::unreadable_body()
    })
}

pub(crate) fn decode_payload<T: DeserializeOwned>(
    payload: &[u8],
    detail: &str,
) -> Result<T, Problem> {
    serde_json::from_slice(payload).map_err(|err| {
        debug!(error = %err, "yük çözümlenemedi");
        Problem::malformed(detail)
    })
}

/// İmzalayan anahtara ait kaydı bulur.
pub(crate) async fn caller_registration(
    state: &WfeState,
    key: &JsonWebKey,
) -> Result<Registration, Problem> {
    state
        .sa()
        .get_registration_by_key(key)
        .await
        .map_err(Problem::from_caller_lookup)
}

pub(crate) fn link(target: &str, relation: &str) -> String {
    format!("<{target}>;rel=\"{relation}\"")
}

fn append_headers(
    response: &mut Response,
    headers: Vec<(HeaderName, String)>,
) -> Result<(), Problem> {
    for (name, value) in headers {
        let value = HeaderValue::try_from(value).map_err(|err| {
            warn!(error = %err, header = %name, "başlık değeri geçersiz");
            Problem::server_internal("Unable to build response")
        })?;
        response.headers_mut().append(name, value);
    }
    Ok(())
}

pub(crate) fn json_response<T: Serialize>(
    status: StatusCode,
    value: &T,
    headers: Vec<(HeaderName, String)>,
) -> Result<Response, Problem> {
    let mut response = (status, Json(value)).into_response();
    append_headers(&mut response, headers)?;
    Ok(response)
}

pub(crate) fn certificate_response(
    status: StatusCode,
    der: Vec<u8>,
    location: Option<String>,
) -> Result<Response, Problem> {
    let mut response = (status, [(CONTENT_TYPE, PKIX_CERT)], der).into_response();
    let headers = location.map(|value| (LOCATION, value)).into_iter().collect();
    append_headers(&mut response, headers)?;
    Ok(response)
}
