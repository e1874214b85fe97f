use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::header::{CONTENT_TYPE, LINK, LOCATION};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use pretty_assertions::assert_eq;
use rsa::{BigUint, RsaPrivateKey};
use serde_json::{json, Value};
use tower::util::ServiceExt;

use kapi_acme::{
    AcmeIdentifier, AcmeUrl, Authorization, Certificate, CertificateRequest, Challenge,
    ChallengeResponse, Ed25519AccountKey, HeaderPlacement, JsonWebKey, Registration,
    RegistrationUpdate, RsaAccountKey, SignedEnvelope,
};

use crate::authority::{RaError, RegistrationAuthority, StorageAuthority};
use crate::build_router;
use crate::config::ServerConfig;
use crate::memory::MemoryAuthority;
use crate::state::WfeState;
use crate::stats::{MemoryStats, NoopStats};

const LEGACY_N: &str = "tSwgy3ORGvc7YJI9B2qqkelZRUC6F1S5NwXFvM4w5-M0TsxbFsH5UH6adigV0jzsDJ5imAechcSoOhAh9POceCbPN1sTNwLpNbOLiQQ7RD5mY_pSUHWXNmS9R4NZ3t2fQAzPeW7jOfF0LKuJRGkekx6tXP1uSnNibgpJULNc4208dgBaCHo3mvaE2HV2GmVl1yxwWX5QZZkGQGjNDZYnjFfa2DKVvFs0QbAk21ROm594kAxlRlMMrvqlf24Eq4ERO0ptzpZgm_3j_e4hGRD39gJS7kAzK-j2cacFQ5Qi2Y6wZI2p-FCq_wiYsfEAIkATPBiLKl_6d_Jfcvs_impcXQ";

/// Eski bir istemcinin `"foo\n"` yükünü imzaladığı gövde.
const FOO_SIGNATURE: &str = "hRt2eYqBd_MyMRNIh8PEIACoFtmBi7BHTLBaAhpSU6zyDAFdEBaX7us4VB9Vo1afOL03Q8iuoRA0AT4akdV_mQTAQ_jhTcVOAeXPr0tB8b8Q11UPQ0tXJYmU4spAW2SapJIvO50ntUaqU05kZd0qw8-noH1Lja-aNnU-tQII4iYVvlTiRJ5g8_CADsvJqOk6FcHuo2mG643TRnhkAxUtazvHyIHeXMxydMMSrpwUwzMtln4ZJYBNx4QGEq6OhpAD_VSp-w8Lq5HOwGQoNs0bPxH1SGrArt67LFQBfjlVr94E1sn26p4vigXm83nJdNhWAMHHE9iV67xN-r29LT-FjA";

/// Aynı anahtarla `"{}\n"` yükünün imzası.
const EMPTY_OBJECT_SIGNATURE: &str = "JXYA_pin91Bc5oz5I6dqCNNWDrBaYTB31EnWorrj4JEFRaidafC9mpLDLLA9jR9kX_Vy2bA5b6pPpXVKm0w146a0L551OdL8JrrLka9q6LypQdDLLQa76XD03hSBOFcC-Oo5FLPa3WRWS1fQ37hYAoLxtS3isWXMIq_4Onx5bq8bwKyu-3E3fRb_lzIZ8hTIWwcblCTOfufUe6AoK4m6MfBjz0NGhyyk4lEZZw6Sttm2VuZo3xmWoRTJEyJG5AOJ6fkNJ9iQQ1kVhMr0ZZ7NVCaOZAnxrwv2sCjY6R3f4HuEVe1yzT75Mq2IuXq-tadGyFujvUxF6BWHCulbEnss7g";

/// openssl ile üretilmiş `CN=foo` CSR'ını taşıyan yük; CSR imzası geçersizdir.
const LEGACY_CSR_PAYLOAD: &str = "ICAgIHsKICAgICAgImNzciI6ICJNSUlDVXpDQ0FUc0NBUUF3RGpFTU1Bb0dBMVVFQXd3RFptOXZNSUlCSWpBTkJna3Foa2lHOXcwQkFRRUZBQU9DQVE4QU1JSUJDZ0tDQVFFQTNVV2NlMlBZOXk4bjRCN2pPazNEWFpudTJwVWdMcXM3YTVEelJCeG5QcUw3YXhpczZ0aGpTQkkyRk83dzVDVWpPLW04WGpELUdZV2dmWGViWjNhUVZsQmlZcWR4WjNVRzZSRHdFYkJDZUtvN3Y4Vy1VVWZFU05OQ1hGODc0ZGRoSm1FdzBSRjBZV1NBRWN0QVlIRUdvUEZ6NjlnQ3FsNnhYRFBZMU9scE1BcmtJSWxxOUVaV3dUMDgxZWt5SnYwR1lSZlFpZ0NNSzRiMWdrRnZLc0hqYTktUTV1MWIwQVp5QS1tUFR1Nno1RVdrQjJvbmhBWHdXWFg5MHNmVWU4RFNldDlyOUd4TWxuM2xnWldUMXpoM1JNWklMcDBVaGgzTmJYbkE4SkludWtoYTNIUE84V2dtRGQ0SzZ1QnpXc28wQTZmcDVOcFgyOFpwS0F3TTVpUWx0UUlEQVFBQm9BQXdEUVlKS29aSWh2Y05BUUVMQlFBRGdnRUJBRkdKVjNPY2doSkVadk9faEd0SWRhUm5zdTZlWDNDZXFTMGJZY0VFemE4dml6bGo0eDA5bnRNSDNRb29xUE9qOHN1dWwwdkQ3NUhaVHB6NkZIRTdTeUxlTktRQkdOR3AxUE1XbVhzRnFENnhVUkN5TUh2Q1pvSHlucENyN0Q1SHR6SXZ1OWZBVjdYUks3cUJLWGZSeGJ2MjFxMHlzTVduZndrYlMyd3JzMXdBelBQZzRpR0pxOHVWSXRybGNGTDhidUpMenh2S2EzbHVfT2p4TlhqemRFdDNWVmtvLUFLUzFzd2tZRWhzR3dLZDhaek5icEYySVEtb2tYZ1JfWmVjeVc4dDgzcFYtdzMzR2hETDl3NlJMUk1nU001YW9qeThyaTdZSW9JdmMzLTlrbGJ3Mmt3WTVvTTJsbWhvSU9HVTEwVGtFeW4xOG15eV81R1VFR2hOelBBPSIsCiAgICAgICJhdXRob3JpemF0aW9ucyI6IFtdCiAgICB9Cg";

const LEGACY_CSR_SIGNATURE: &str = "PxtFtDXR74ZDgZUWsNaMFpFAhJrYtCYpl3-vr9SCwuWIxB9hZCnLWB5JFwNuC9CtTSYXqDJhzPs4-Bzh345HdwO-ifu1EIVxmc3bAszYS-cxA0lDzr8wJ0ldX0WvADshRWaeFYWJja7ggW03k5JZiNa9AigKIvkGBS2YWpEpCo954cdCEmIL3UOdVjN9aXRT7zzC9wczv4-hYDR-6uP_8J6ATUXJ-UJaTnMi3R0cwtHIcTBZgtgGspoCbtgv-3KaAGNkm5AY062xO5_GbefWwuD2hd8AjKyoTLdfQtwadu6Q3Zl6ZzW_eAfQVDnoblgSt19Gtm4HP4Rf_GosGjRMog";

/// İmzası bozulmuş, farklı anahtarlı gövde.
const TAMPERED_BODY: &str = r#"
    {
        "header": {
            "alg": "RS256",
            "jwk": {
                "e": "AQAB",
                "kty": "RSA",
                "n": "vd7rZIoTLEe-z1_8G1FcXSw9CQFEJgV4g9V277sER7yx5Qjz_Pkf2YVth6wwwFJEmzc0hoKY-MMYFNwBE4hQHw"
            }
        },
        "payload": "xm9vCg",
        "signature": "RjUQ679fxJgeAJlxqgvDP_sfGZnJ-1RgWF2qmcbnBWljs6h1qp63pLnJOl13u81bP_bCSjaWkelGG8Ymx_X-aQ"
    }
"#;

const FIXTURE_N: &str = "z2NsNdHeqAiGdPP8KuxfQXat_uatOK9y12SyGpfKw1sfkizBIsNxERjNDke6Wp9MugN9srN3sr2TDkmQ-gK8lfWo0v1uG_QgzJb1vBdf_hH7aejgETRGLNJZOdaKDsyFnWq1WGJq36zsHcd0qhggTk6zVwqczSxdiWIAZzEakIUZ13KxXvoepYLY0Q-rEEQiuX71e4hvhfeJ4l7m_B-awn22UUVvo3kCqmaRlZT-36vmQhDGoBsoUo1KBEU44jfeK5PbNRk7vDJuH0B7qinr_jczHcvyD-2TtPzKaCioMtNh_VZbPNDaG67sYkQlC15-Ff3HPzKKJW2XvkVG91qMvQ";

fn malformed(detail: &str) -> String {
    format!(r#"{{"type":"urn:acme:error:malformed","detail":"{detail}"}}"#)
}

fn legacy_body(payload: &str, signature: &str) -> String {
    format!(
        r#"
{{
    "header": {{
        "alg": "RS256",
        "jwk": {{
            "e": "AQAB",
            "kty": "RSA",
            "n": "{LEGACY_N}"
        }}
    }},
    "payload": "{payload}",
    "signature": "{signature}"
}}
"#
    )
}

fn legacy_key() -> JsonWebKey {
    JsonWebKey::Rsa {
        n: LEGACY_N.to_string(),
        e: "AQAB".to_string(),
    }
}

fn fixture_key() -> RsaAccountKey {
    fn int(value: &str) -> BigUint {
        BigUint::from_bytes_be(&URL_SAFE_NO_PAD.decode(value).expect("base64url"))
    }
    let private_key = RsaPrivateKey::from_components(
        int(FIXTURE_N),
        int("AAEAAQ"),
        int("BhAmDbzBAbCeHbU0Xhzi_Ar4M0eTMOEQPnPXMSfW6bc0SRW938JO_-z1scEvFY8qsxV_C0Zr7XHVZsmHz4dc9BVmhiSan36XpuOS85jLWaY073e7dUVN9-l-ak53Ys9f6KZB_v-BmGB51rUKGB70ctWiMJ1C0EzHv0h6Moog-LCd_zo03uuZD5F5wtnPrAB3SEM3vRKeZHzm5eiGxNUsaCEzGDApMYgt6YkQuUlkJwD8Ky2CkAE6lLQSPwddAfPDhsCug-12SkSIKw1EepSHz86ZVfJEnvY-h9jHIdI57mR1v7NTCDcWqy6c6qIzxwh8n2X94QTbtWT3vGQ6HXM5AQ"),
        vec![
            int("2uhvZwNS5i-PzeI9vGx89XbdsVmeNjVxjH08V3aRBVY0dzUzwVDYk3z7sqBIj6de53Lx6W1hjmhPIqAwqQgjIKH5Z3uUCinGguKkfGDL3KgLCzYL2UIvZMvTzr9NWLc0AHMZdee5utxWKCGnZBOqy1Rd4V-6QrqjEDBvanoqA60"),
            int("8odNkMEiriaDKmvwDv-vOOu3LaWbu03yB7VhABu-hK5Xx74bHcvDP2HuCwDGGJY2H-xKdMdUPs0HPwbfHMUicD2vIEUDj6uyrMMZHtbcZ3moh3-WESg3TaEaJ6vhwcWXWG7Wc46G-HbCChkuVenFYYkoi68BAAjloqEUl1JBT1E"),
        ],
    )
    .expect("rsa components");
    RsaAccountKey::new(private_key).expect("rsa key")
}

fn envelope_body(envelope: SignedEnvelope) -> String {
    serde_json::to_string(&envelope).expect("envelope json")
}

fn sign(key: &RsaAccountKey, payload: &str) -> String {
    envelope_body(
        key.sign_payload(payload.as_bytes(), HeaderPlacement::Unprotected)
            .expect("imza"),
    )
}

fn config() -> ServerConfig {
    ServerConfig::new(SocketAddr::from(([127, 0, 0, 1], 0)), "/acme/", None, 64 * 1024)
        .expect("config")
}

fn signed_csr(names: &[&str]) -> Vec<u8> {
    let key_pair = rcgen::KeyPair::generate().expect("anahtar çifti");
    let mut params = rcgen::CertificateParams::new(
        names.iter().map(|name| (*name).to_string()).collect::<Vec<_>>(),
    )
    .expect("parametreler");
    params.distinguished_name = rcgen::DistinguishedName::new();
    params
        .serialize_request(&key_pair)
        .expect("csr")
        .der()
        .to_vec()
}

fn self_signed_certificate(names: &[&str]) -> Vec<u8> {
    let key_pair = rcgen::KeyPair::generate().expect("anahtar çifti");
    rcgen::CertificateParams::new(names.iter().map(|name| (*name).to_string()).collect::<Vec<_>>())
        .expect("parametreler")
        .self_signed(&key_pair)
        .expect("sertifika")
        .der()
        .to_vec()
}

/// Girdilerini geri döndüren kayıt otoritesi.
#[derive(Debug, Default)]
struct EchoAuthority {
    certificate: Vec<u8>,
}

#[async_trait]
impl RegistrationAuthority for EchoAuthority {
    async fn new_registration(
        &self,
        mut registration: Registration,
        key: JsonWebKey,
    ) -> Result<Registration, RaError> {
        registration.key = Some(key);
        Ok(registration)
    }

    async fn new_authorization(
        &self,
        mut authorization: Authorization,
        registration_id: i64,
    ) -> Result<Authorization, RaError> {
        authorization.registration_id = registration_id;
        Ok(authorization)
    }

    async fn new_certificate(
        &self,
        _request: CertificateRequest,
        registration_id: i64,
    ) -> Result<Certificate, RaError> {
        Certificate::from_der(self.certificate.clone(), registration_id)
            .map_err(|err| RaError::Internal(err.to_string()))
    }

    async fn update_registration(
        &self,
        mut current: Registration,
        update: RegistrationUpdate,
    ) -> Result<Registration, RaError> {
        current.apply(&update);
        Ok(current)
    }

    async fn update_authorization(
        &self,
        authorization: Authorization,
        _challenge_index: usize,
        _response: ChallengeResponse,
    ) -> Result<Authorization, RaError> {
        Ok(authorization)
    }

    async fn revoke_certificate(&self, _certificate: Certificate) -> Result<(), RaError> {
        Ok(())
    }

    async fn on_validation_update(&self, _authorization: Authorization) {}
}

struct Harness {
    router: Router,
    storage: Arc<MemoryAuthority>,
}

impl Harness {
    /// Kayıt otoritesi olarak [`EchoAuthority`], depolama olarak bellek içi otorite.
    fn echo() -> Self {
        Self::echo_with(config(), EchoAuthority::default())
    }

    fn echo_with(config: ServerConfig, ra: EchoAuthority) -> Self {
        let storage = Arc::new(MemoryAuthority::new(config.paths().clone()));
        let state = WfeState::new(
            config,
            Arc::new(ra),
            Arc::clone(&storage) as Arc<dyn StorageAuthority>,
            Arc::new(NoopStats),
        );
        Self {
            router: build_router(Arc::new(state)),
            storage,
        }
    }

    /// Her iki rolü aynı bellek içi otoritenin üstlendiği düzen.
    fn memory() -> Self {
        let config = config();
        let storage = Arc::new(MemoryAuthority::new(config.paths().clone()));
        let state = WfeState::new(
            config,
            Arc::clone(&storage) as Arc<dyn RegistrationAuthority>,
            Arc::clone(&storage) as Arc<dyn StorageAuthority>,
            Arc::new(NoopStats),
        );
        Self {
            router: build_router(Arc::new(state)),
            storage,
        }
    }

    async fn register(&self, key: JsonWebKey) -> Registration {
        self.storage
            .insert_registration(Registration {
                key: Some(key),
                ..Registration::default()
            })
            .await
            .expect("kayıt")
    }

    async fn send(&self, method: Method, uri: &str, body: impl Into<Body>) -> TestResponse {
        send(&self.router, method, uri, body).await
    }
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl TestResponse {
    fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("utf8")
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .map(|value| value.to_str().expect("ascii").to_string())
    }

    fn links(&self) -> Vec<String> {
        self.headers
            .get_all(LINK)
            .iter()
            .map(|value| value.to_str().expect("ascii").to_string())
            .collect()
    }
}

async fn send(router: &Router, method: Method, uri: &str, body: impl Into<Body>) -> TestResponse {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(body.into())
                .expect("request"),
        )
        .await
        .expect("response");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body")
        .to_vec();
    TestResponse {
        status,
        headers,
        body,
    }
}

#[tokio::test]
async fn index_serves_directory_only_at_root() {
    let harness = Harness::echo();

    let response = harness.send(Method::GET, "/", Body::empty()).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_ne!(response.text(), "404 page not found\n");
    let directory: Value = serde_json::from_slice(&response.body).expect("directory");
    assert_eq!(
        directory,
        json!({
            "new-reg": "/acme/new-reg",
            "new-authz": "/acme/new-authz",
            "new-cert": "/acme/new-cert",
            "revoke-cert": "/acme/revoke-cert",
        })
    );

    let response = harness.send(Method::GET, "/foo", Body::empty()).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.text(), "404 page not found\n");
    assert_eq!(
        response.header("content-type").as_deref(),
        Some("text/plain; charset=utf-8")
    );

    let response = harness.send(Method::POST, "/", Body::empty()).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), malformed("Method not allowed"));
}

#[tokio::test]
async fn new_certificate_rejects_unusable_requests() {
    let harness = Harness::memory();
    harness.register(legacy_key()).await;
    let uri = "/acme/new-cert";

    let response = harness.send(Method::GET, uri, Body::empty()).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), malformed("Method not allowed"));

    let response = harness.send(Method::POST, uri, Body::empty()).await;
    assert_eq!(response.text(), malformed("Unable to read/verify body"));

    let response = harness.send(Method::POST, uri, "hi").await;
    assert_eq!(response.text(), malformed("Unable to read/verify body"));

    let response = harness
        .send(Method::POST, uri, legacy_body("Zm9vCg", FOO_SIGNATURE))
        .await;
    assert_eq!(
        response.text(),
        malformed("Error unmarshaling certificate request")
    );

    let response = harness.send(Method::POST, uri, TAMPERED_BODY).await;
    assert_eq!(response.text(), malformed("Unable to read/verify body"));

    let response = harness
        .send(Method::POST, uri, legacy_body("e30K", EMPTY_OBJECT_SIGNATURE))
        .await;
    assert_eq!(
        response.text(),
        malformed("Error unmarshaling certificate request")
    );

    let response = harness
        .send(
            Method::POST,
            uri,
            legacy_body(LEGACY_CSR_PAYLOAD, LEGACY_CSR_SIGNATURE),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.text(),
        malformed("Error creating new cert: Invalid signature on CSR")
    );
}

#[tokio::test]
async fn new_certificate_requires_authorized_names() {
    let harness = Harness::memory();
    let key = fixture_key();
    harness.register(key.jwk()).await;
    let csr = URL_SAFE_NO_PAD.encode(signed_csr(&["example.org"]));
    let payload = json!({ "csr": csr, "authorizations": [] }).to_string();

    let response = harness
        .send(Method::POST, "/acme/new-cert", sign(&key, &payload))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(
        response.text(),
        r#"{"type":"urn:acme:error:unauthorized","detail":"Key not authorized for name example.org"}"#
    );
}

#[tokio::test]
async fn new_certificate_returns_der_with_location() {
    let der = self_signed_certificate(&["example.org"]);
    let harness = Harness::echo_with(
        config(),
        EchoAuthority {
            certificate: der.clone(),
        },
    );
    let key = fixture_key();
    harness.register(key.jwk()).await;
    let csr = URL_SAFE_NO_PAD.encode(signed_csr(&["example.org"]));
    let payload = json!({ "csr": csr, "authorizations": [] }).to_string();

    let response = harness
        .send(Method::POST, "/acme/new-cert", sign(&key, &payload))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(
        response.header("content-type").as_deref(),
        Some("application/pkix-cert")
    );
    let serial = kapi_acme::certificate_serial(&der).expect("serial");
    assert_eq!(
        response.header("location"),
        Some(format!("/acme/cert/{serial}"))
    );
    assert_eq!(response.body, der);
}

#[tokio::test]
async fn new_registration_echoes_registration() {
    let harness = Harness::echo();
    let uri = "/acme/new-reg";

    let response = harness.send(Method::GET, uri, Body::empty()).await;
    assert_eq!(response.text(), malformed("Method not allowed"));

    let response = harness.send(Method::POST, uri, Body::empty()).await;
    assert_eq!(response.text(), malformed("Unable to read/verify body"));

    let response = harness.send(Method::POST, uri, "hi").await;
    assert_eq!(response.text(), malformed("Unable to read/verify body"));

    let response = harness
        .send(Method::POST, uri, legacy_body("Zm9vCg", FOO_SIGNATURE))
        .await;
    assert_eq!(response.text(), malformed("Error unmarshaling JSON"));

    let response = harness.send(Method::POST, uri, TAMPERED_BODY).await;
    assert_eq!(response.text(), malformed("Unable to read/verify body"));

    let response = harness
        .send(
            Method::POST,
            uri,
            sign(&fixture_key(), r#"{"contact":["tel:123456789"]}"#),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.text(),
        format!(
            r#"{{"key":{{"kty":"RSA","n":"{FIXTURE_N}","e":"AQAB"}},"recoveryToken":"","contact":["tel:123456789"],"thumbprint":""}}"#
        )
    );
    assert_eq!(response.header("location").as_deref(), Some("/acme/reg/0"));
    assert_eq!(response.links(), vec![r#"</acme/new-authz>;rel="next""#.to_string()]);

    let registration: Registration = serde_json::from_slice(&response.body).expect("registration");
    assert_eq!(registration.contact[0].as_str(), "tel:123456789");
}

#[tokio::test]
async fn new_registration_links_terms_of_service() {
    let config = ServerConfig::new(
        SocketAddr::from(([127, 0, 0, 1], 0)),
        "/acme/",
        Some("https://ca.example/terms"),
        64 * 1024,
    )
    .expect("config");
    let harness = Harness::echo_with(config, EchoAuthority::default());

    let response = harness
        .send(Method::POST, "/acme/new-reg", sign(&fixture_key(), "{}"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.links(),
        vec![
            r#"</acme/new-authz>;rel="next""#.to_string(),
            r#"<https://ca.example/terms>;rel="terms-of-service""#.to_string(),
        ]
    );
}

#[tokio::test]
async fn new_registration_conflicts_for_known_key() {
    let harness = Harness::echo();
    let key = fixture_key();
    let existing = harness.register(key.jwk()).await;

    let response = harness
        .send(Method::POST, "/acme/new-reg", sign(&key, "{}"))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(
        response.text(),
        malformed("Registration key is already in use")
    );
    assert_eq!(
        response.header("location"),
        Some(format!("/acme/reg/{}", existing.id))
    );
}

#[tokio::test]
async fn registration_update_checks_ownership() {
    let harness = Harness::echo();
    let key = fixture_key();
    let registration = harness.register(key.jwk()).await;
    let update = r#"{"contact":["mailto:ops@example.org"]}"#;

    let response = harness
        .send(
            Method::POST,
            &format!("/acme/reg/{}", registration.id),
            sign(&key, update),
        )
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    let updated: Registration = serde_json::from_slice(&response.body).expect("registration");
    assert_eq!(updated.contact[0].as_str(), "mailto:ops@example.org");

    let response = harness
        .send(Method::POST, "/acme/reg/abc", sign(&key, update))
        .await;
    assert_eq!(response.text(), malformed("Registration ID must be an integer"));

    let response = harness
        .send(Method::POST, "/acme/reg/0", sign(&key, update))
        .await;
    assert_eq!(
        response.text(),
        malformed("Registration ID must be a positive non-zero integer")
    );

    let response = harness
        .send(Method::POST, "/acme/reg/99", sign(&key, update))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(
        response.text(),
        r#"{"type":"urn:acme:error:unauthorized","detail":"Request signing key did not match registration key"}"#
    );

    let response = harness
        .send(
            Method::POST,
            &format!("/acme/reg/{}", registration.id),
            sign(&key, r#""foo""#),
        )
        .await;
    assert_eq!(response.text(), malformed("Error unmarshaling registration"));
}

#[tokio::test]
async fn new_authorization_blanks_identifiers() {
    let harness = Harness::echo();
    let uri = "/acme/new-authz";

    let response = harness.send(Method::GET, uri, Body::empty()).await;
    assert_eq!(response.text(), malformed("Method not allowed"));

    let response = harness.send(Method::POST, uri, Body::empty()).await;
    assert_eq!(response.text(), malformed("Unable to read/verify body"));

    let response = harness.send(Method::POST, uri, "hi").await;
    assert_eq!(response.text(), malformed("Unable to read/verify body"));

    let response = harness
        .send(Method::POST, uri, legacy_body("Zm9vCg", FOO_SIGNATURE))
        .await;
    assert_eq!(response.text(), malformed("Error unmarshaling JSON"));

    let response = harness.send(Method::POST, uri, TAMPERED_BODY).await;
    assert_eq!(response.text(), malformed("Unable to read/verify body"));

    let key = fixture_key();
    harness.register(key.jwk()).await;
    let response = harness
        .send(
            Method::POST,
            uri,
            sign(&key, r#"{"identifier":{"type":"dns","value":"test.com"}}"#),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.text(),
        r#"{"identifier":{"type":"dns","value":"test.com"},"expires":"0001-01-01T00:00:00Z"}"#
    );
    assert_eq!(response.header("location").as_deref(), Some("/acme/authz/"));
    assert_eq!(response.links(), vec![r#"</acme/new-cert>;rel="next""#.to_string()]);

    let authorization: Authorization =
        serde_json::from_slice(&response.body).expect("authorization");
    assert_eq!(authorization.expires, None);
}

#[tokio::test]
async fn unknown_signing_key_is_unauthorized() {
    let harness = Harness::echo();
    let response = harness
        .send(
            Method::POST,
            "/acme/new-authz",
            sign(&fixture_key(), r#"{"identifier":{"type":"dns","value":"test.com"}}"#),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(
        response.text(),
        r#"{"type":"urn:acme:error:unauthorized","detail":"No registration exists matching provided key"}"#
    );
}

fn pending_authorization(registration_id: i64) -> Authorization {
    let mut authorization = Authorization::new(AcmeIdentifier::dns("letsencrypt.org"));
    authorization.id = "asdf".to_string();
    authorization.registration_id = registration_id;
    authorization.challenges = vec![Challenge::new(
        "dns".to_string(),
        AcmeUrl::parse("/acme/authz/asdf?challenge=foo").expect("uri"),
    )];
    authorization
}

#[tokio::test]
async fn challenge_response_returns_updated_challenge() {
    let harness = Harness::echo();
    let registration = harness.register(legacy_key()).await;
    harness
        .storage
        .insert_authorization(pending_authorization(registration.id))
        .await;

    let response = harness
        .send(
            Method::POST,
            "/acme/authz/asdf?challenge=foo",
            legacy_body("e30K", EMPTY_OBJECT_SIGNATURE),
        )
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(
        response.header("location").as_deref(),
        Some("/acme/authz/asdf?challenge=foo")
    );
    assert_eq!(
        response.header("link").as_deref(),
        Some(r#"</acme/authz/asdf>;rel="up""#)
    );
    assert_eq!(
        response.text(),
        r#"{"type":"dns","uri":"/acme/authz/asdf?challenge=foo"}"#
    );
}

#[tokio::test]
async fn challenge_lookup_failures() {
    let harness = Harness::echo();
    let registration = harness.register(legacy_key()).await;
    harness
        .storage
        .insert_authorization(pending_authorization(registration.id + 1))
        .await;
    let body = || legacy_body("e30K", EMPTY_OBJECT_SIGNATURE);

    let response = harness
        .send(Method::POST, "/acme/authz/missing?challenge=foo", body())
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.text(), malformed("Unable to find authorization"));

    let response = harness
        .send(Method::POST, "/acme/authz/asdf?challenge=bar", body())
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.text(), malformed("Unable to find challenge"));

    let response = harness
        .send(Method::GET, "/acme/authz/asdf?challenge=foo", Body::empty())
        .await;
    assert_eq!(response.text(), malformed("Method not allowed"));

    let response = harness
        .send(Method::POST, "/acme/authz/asdf?challenge=foo", body())
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(
        response.text(),
        r#"{"type":"urn:acme:error:unauthorized","detail":"User registration ID doesn't match registration ID in authorization"}"#
    );
}

#[tokio::test]
async fn authorization_get_returns_public_view() {
    let harness = Harness::echo();
    harness
        .storage
        .insert_authorization(pending_authorization(7))
        .await;

    let response = harness
        .send(Method::GET, "/acme/authz/asdf", Body::empty())
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.text(),
        r#"{"identifier":{"type":"dns","value":"letsencrypt.org"},"expires":"0001-01-01T00:00:00Z","challenges":[{"type":"dns","uri":"/acme/authz/asdf?challenge=foo"}]}"#
    );

    let response = harness
        .send(Method::POST, "/acme/authz/asdf", Body::empty())
        .await;
    assert_eq!(response.text(), malformed("Method not allowed"));
}

#[tokio::test]
async fn memory_authority_round_trip() {
    let harness = Harness::memory();
    let key = fixture_key();

    let response = harness
        .send(
            Method::POST,
            "/acme/new-reg",
            sign(&key, r#"{"contact":["mailto:ops@example.org"]}"#),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("location").as_deref(), Some("/acme/reg/1"));

    let response = harness
        .send(
            Method::POST,
            "/acme/new-authz",
            sign(&key, r#"{"identifier":{"type":"dns","value":"example.org"}}"#),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let location = response.header("location").expect("location");
    let authorization: Value = serde_json::from_slice(&response.body).expect("json");
    assert_eq!(authorization["status"], "pending");
    let challenge_uri = authorization["challenges"][0]["uri"]
        .as_str()
        .expect("uri")
        .to_string();
    assert!(challenge_uri.starts_with(&location));

    let token = authorization["challenges"][0]["token"]
        .as_str()
        .expect("token")
        .to_string();
    let payload = json!({ "type": "http-01", "keyAuthorization": format!("{token}.x") });
    let response = harness
        .send(Method::POST, &challenge_uri, sign(&key, &payload.to_string()))
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.links(), vec![format!("<{location}>;rel=\"up\"")]);
    assert_eq!(harness.storage.validation_updates().await.len(), 1);
}

#[tokio::test]
async fn certificate_get_serves_stored_der() {
    let harness = Harness::echo();
    let der = self_signed_certificate(&["example.org"]);
    let certificate = Certificate::from_der(der.clone(), 1).expect("certificate");
    let serial = certificate.serial.clone();
    harness.storage.insert_certificate(certificate).await;

    let response = harness
        .send(Method::GET, &format!("/acme/cert/{serial}"), Body::empty())
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.headers.get(CONTENT_TYPE).expect("content type"),
        "application/pkix-cert"
    );
    assert!(response.headers.get(LOCATION).is_none());
    assert_eq!(response.body, der);

    let response = harness
        .send(Method::GET, "/acme/cert/00ff", Body::empty())
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.text(), malformed("Unable to find certificate"));

    let response = harness
        .send(Method::POST, &format!("/acme/cert/{serial}"), Body::empty())
        .await;
    assert_eq!(response.text(), malformed("Method not allowed"));
}

#[tokio::test]
async fn revocation_requires_owner() {
    let harness = Harness::memory();
    let owner = fixture_key();
    let stranger = Ed25519AccountKey::from_seed([7u8; 32]);
    let owner_registration = harness.register(owner.jwk()).await;
    harness.register(stranger.jwk()).await;

    let der = self_signed_certificate(&["example.org"]);
    let certificate =
        Certificate::from_der(der.clone(), owner_registration.id).expect("certificate");
    let serial = certificate.serial.clone();
    harness.storage.insert_certificate(certificate).await;
    let payload = json!({ "certificate": URL_SAFE_NO_PAD.encode(&der) }).to_string();

    let foreign = envelope_body(
        stranger
            .sign_payload(payload.as_bytes(), HeaderPlacement::Protected)
            .expect("imza"),
    );
    let response = harness
        .send(Method::POST, "/acme/revoke-cert", foreign)
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = harness
        .send(Method::POST, "/acme/revoke-cert", sign(&owner, &payload))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.is_empty());
    let status = harness
        .storage
        .get_certificate_status(&serial)
        .await
        .expect("status");
    assert!(status.revoked_at.is_some());

    let response = harness
        .send(Method::POST, "/acme/revoke-cert", sign(&owner, &payload))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.text(), malformed("Certificate already revoked"));

    let other = self_signed_certificate(&["other.org"]);
    let unknown = json!({ "certificate": URL_SAFE_NO_PAD.encode(other) });
    let response = harness
        .send(Method::POST, "/acme/revoke-cert", sign(&owner, &unknown.to_string()))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = harness
        .send(Method::POST, "/acme/revoke-cert", sign(&owner, r#"{"certificate":7}"#))
        .await;
    assert_eq!(
        response.text(),
        malformed("Error unmarshaling revocation request")
    );
}

#[tokio::test]
async fn oversized_body_is_unreadable() {
    let config =
        ServerConfig::new(SocketAddr::from(([127, 0, 0, 1], 0)), "/acme/", None, 32)
            .expect("config");
    let harness = Harness::echo_with(config, EchoAuthority::default());
    let response = harness
        .send(Method::POST, "/acme/new-reg", sign(&fixture_key(), "{}"))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), malformed("Unable to read/verify body"));
}

#[tokio::test]
async fn custom_prefix_moves_every_resource() {
    let config = ServerConfig::new(SocketAddr::from(([127, 0, 0, 1], 0)), "/v1", None, 64 * 1024)
        .expect("config");
    let harness = Harness::echo_with(config, EchoAuthority::default());

    let response = harness.send(Method::GET, "/", Body::empty()).await;
    let directory: Value = serde_json::from_slice(&response.body).expect("directory");
    assert_eq!(directory["new-reg"], "/v1/new-reg");

    let response = harness
        .send(Method::POST, "/v1/new-reg", sign(&fixture_key(), "{}"))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = harness
        .send(Method::POST, "/acme/new-reg", sign(&fixture_key(), "{}"))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.text(), "404 page not found\n");
}

#[tokio::test]
async fn requests_are_counted() {
    let stats = Arc::new(MemoryStats::new());
    let config = config();
    let storage = Arc::new(MemoryAuthority::new(config.paths().clone()));
    let state = WfeState::new(
        config,
        Arc::clone(&storage) as Arc<dyn RegistrationAuthority>,
        storage,
        Arc::clone(&stats) as Arc<dyn crate::stats::StatsSink>,
    );
    let router = build_router(Arc::new(state));

    send(&router, Method::GET, "/", Body::empty()).await;
    send(&router, Method::GET, "/acme/new-reg", Body::empty()).await;

    assert_eq!(stats.counter("wfe.http.requests"), 2);
    assert_eq!(stats.counter("wfe.http.status.200"), 1);
    assert_eq!(stats.counter("wfe.http.status.400"), 1);
    assert_eq!(stats.timing_count("wfe.http.latency"), 2);
}
