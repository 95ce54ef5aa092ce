//! Authentication integration tests.
//!
//! Tests verify:
//! - Requests without a bearer token are rejected before any handler runs
//! - Expired, mis-signed and email-less tokens are rejected
//! - Valid tokens reach the handlers
//! - CORS preflight is answered without authentication

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use notesai_api::server::RouterConfig;

use super::test_utils::{
    claims, json_body, request, sign_claims, test_router, test_router_with_config, token_for,
    MemoryProjectStore, MockImageEditor, ALICE, TEST_SECRET,
};

const ALLOWED_ORIGIN: &str = "https://notes.example.com";

fn doubles() -> (MemoryProjectStore, MockImageEditor) {
    (
        MemoryProjectStore::new(),
        MockImageEditor::succeeding("https://replicate.delivery/out.png"),
    )
}

// =============================================================================
// Missing Token
// =============================================================================

#[tokio::test]
async fn test_missing_token_rejected_on_every_route() {
    let (store, editor) = doubles();
    let router = test_router(store.clone(), editor.clone());
    let id = "65f1a2b3c4d5e6f708091a2b";

    let cases = [
        (Method::GET, "/projects".to_string(), None),
        (Method::POST, "/projects".to_string(), Some(json!({"name": "x"}))),
        (Method::GET, format!("/projects/{}", id), None),
        (Method::PUT, format!("/projects/{}", id), Some(json!({"name": "x"}))),
        (Method::DELETE, format!("/projects/{}", id), None),
        (
            Method::POST,
            "/projects/ai/process".to_string(),
            Some(json!({"imageBase64": "AAAA", "prompt": "hat"})),
        ),
    ];

    for (method, uri, body) in cases {
        let response = router
            .clone()
            .oneshot(request(method.clone(), &uri, None, body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        assert_eq!(json_body(response).await["message"], "No autorizado");
    }

    assert_eq!(store.call_count(), 0);
    assert_eq!(editor.call_count(), 0);
}

#[tokio::test]
async fn test_non_bearer_scheme_rejected() {
    let (store, editor) = doubles();
    let router = test_router(store.clone(), editor);

    let request = Request::builder()
        .uri("/projects")
        .header(header::AUTHORIZATION, "Basic YWxpY2U6cGFzcw==")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["message"], "No autorizado");
    assert_eq!(store.call_count(), 0);
}

// =============================================================================
// Invalid Token
// =============================================================================

#[tokio::test]
async fn test_garbage_token_rejected() {
    let (store, editor) = doubles();
    let router = test_router(store.clone(), editor);

    let response = router
        .oneshot(request(Method::GET, "/projects", Some("not-a-jwt"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["message"], "Invalid token");
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_wrong_secret_rejected() {
    let (store, editor) = doubles();
    let router = test_router(store.clone(), editor);
    let token = sign_claims(&claims(Some(ALICE), 3600), "some-other-secret");

    let response = router
        .oneshot(request(Method::GET, "/projects", Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["message"], "Invalid token");
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let (store, editor) = doubles();
    let router = test_router(store.clone(), editor);
    // Well past the verifier's leeway
    let token = sign_claims(&claims(Some(ALICE), -600), TEST_SECRET);

    let response = router
        .oneshot(request(Method::GET, "/projects", Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_token_without_email_rejected() {
    let (store, editor) = doubles();
    let router = test_router(store.clone(), editor.clone());
    let token = sign_claims(&claims(None, 3600), TEST_SECRET);

    let response = router
        .oneshot(request(
            Method::POST,
            "/projects/ai/process",
            Some(&token),
            Some(json!({"imageBase64": "AAAA", "prompt": "hat"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(editor.call_count(), 0);
}

// =============================================================================
// Valid Token
// =============================================================================

#[tokio::test]
async fn test_valid_token_reaches_handler() {
    let (store, editor) = doubles();
    let router = test_router(store.clone(), editor);

    let response = router
        .oneshot(request(Method::GET, "/projects", Some(&token_for(ALICE)), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!([]));
    assert_eq!(store.call_count(), 1);
}

// =============================================================================
// CORS
// =============================================================================

#[tokio::test]
async fn test_preflight_bypasses_auth() {
    let (store, editor) = doubles();
    let router = test_router(store.clone(), editor);

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/projects")
        .header(header::ORIGIN, ALLOWED_ORIGIN)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(store.call_count(), 0);
}

fn preflight(origin: &str) -> Request<Body> {
    Request::builder()
        .method(Method::OPTIONS)
        .uri("/projects")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
        .body(Body::empty())
        .unwrap()
}

fn restricted_router(store: MemoryProjectStore, editor: MockImageEditor) -> axum::Router {
    test_router_with_config(
        store,
        editor,
        RouterConfig::new()
            .with_cors_origins(vec![
                ALLOWED_ORIGIN.to_string(),
                "not a valid origin\n".to_string(),
            ])
            .with_tracing(false),
    )
}

#[tokio::test]
async fn test_preflight_from_allowed_origin() {
    let (store, editor) = doubles();
    let router = restricted_router(store.clone(), editor);

    let response = router.oneshot(preflight(ALLOWED_ORIGIN)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        ALLOWED_ORIGIN
    );
    let allowed_headers = response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS]
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(allowed_headers.contains("authorization"), "{}", allowed_headers);
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_preflight_from_other_origin_not_allowed() {
    let (store, editor) = doubles();
    let router = restricted_router(store.clone(), editor);

    let response = router
        .oneshot(preflight("https://evil.example.com"))
        .await
        .unwrap();

    assert!(!response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_empty_origin_list_allows_none() {
    let (store, editor) = doubles();
    let router = test_router_with_config(
        store,
        editor,
        RouterConfig::new().with_cors_origins(vec![]).with_tracing(false),
    );

    let response = router.oneshot(preflight(ALLOWED_ORIGIN)).await.unwrap();

    assert!(!response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_allowed_origin_on_authenticated_request() {
    let (store, editor) = doubles();
    let router = restricted_router(store, editor);

    let mut request = request(Method::GET, "/projects", Some(&token_for(ALICE)), None);
    request
        .headers_mut()
        .insert(header::ORIGIN, ALLOWED_ORIGIN.parse().unwrap());

    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        ALLOWED_ORIGIN
    );
}

// =============================================================================
// Firebase Key Set
// =============================================================================

mod firebase {
    use axum::http::{Method, StatusCode};
    use chrono::Utc;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use notesai_api::error::AuthError;
    use notesai_api::server::{create_router, RouterConfig};
    use notesai_api::{JwtVerifier, TokenVerifier};

    use super::super::test_utils::{json_body, request, MemoryProjectStore, MockImageEditor};
    use super::claims;

    const PROJECT_ID: &str = "notes-ai";
    const KEY_ID: &str = "test-key-1";

    /// RSA key pair used to sign test ID tokens; the public half is served as a JWK.
    const SIGNING_KEY_PEM: &str = include_str!("../fixtures/rs256_signing_key.pem");
    const SIGNING_KEY_MODULUS: &str = "netnq6n6U4vgsc-FCCVo-WwqmbaLNDBzhfOX13qUKugwwA7_9ARQEGkXAkZx3asnnxLjFjoh8CayleWcqwkoxxx3vuMU43lvascG9ppytHxI3DuzayOZci8CUnE8Dc0bbz2zRBXu0VpFtclR9qMswpXO2rxwMpRm-y5ksJcoGf0CpexDKxvpY6qa5Pp1LeFuVBwYcUZbq91BlzA5b8rYQlTRJgQQIEo7RzSiB5ldC84WAjAGNeh2WNKLL_At_pVvHQs6vXdkFBLgv4V9c0_3ZTiyvJ1wzwrgofKQFD9XxX4F4P-lTIyJia7Jvs-Of7lFdGONbvPrqknwKMh5QlsGHQ";

    fn key_set() -> Value {
        json!({
            "keys": [{
                "kty": "RSA",
                "alg": "RS256",
                "use": "sig",
                "kid": KEY_ID,
                "n": SIGNING_KEY_MODULUS,
                "e": "AQAB",
            }]
        })
    }

    async fn key_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("cache-control", "public, max-age=3600")
                    .set_body_json(key_set()),
            )
            .mount(&server)
            .await;
        server
    }

    fn verifier_for(server: &MockServer) -> JwtVerifier {
        JwtVerifier::firebase_with_jwks_url(
            PROJECT_ID,
            reqwest::Client::new(),
            format!("{}/jwks", server.uri()),
        )
    }

    fn id_token_claims(email: &str) -> Value {
        let now = Utc::now().timestamp();
        json!({
            "iss": format!("https://securetoken.google.com/{}", PROJECT_ID),
            "aud": PROJECT_ID,
            "sub": "firebase-uid-1",
            "email": email,
            "email_verified": true,
            "iat": now,
            "exp": now + 3600,
        })
    }

    fn sign_rs256(claims: &Value) -> String {
        let header = Header {
            kid: Some(KEY_ID.to_string()),
            ..Header::new(Algorithm::RS256)
        };
        let key = EncodingKey::from_rsa_pem(SIGNING_KEY_PEM.as_bytes()).unwrap();
        encode(&header, claims, &key).unwrap()
    }

    #[tokio::test]
    async fn test_signed_id_token_accepted() {
        let server = key_server().await;
        let verifier = verifier_for(&server);

        let principal = verifier
            .verify(&sign_rs256(&id_token_claims("ada@example.com")))
            .await
            .unwrap();

        assert_eq!(principal.uid, "firebase-uid-1");
        assert_eq!(principal.email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_wrong_audience_rejected() {
        let server = key_server().await;
        let verifier = verifier_for(&server);

        let mut claims = id_token_claims("ada@example.com");
        claims["aud"] = json!("some-other-project");

        let err = verifier.verify(&sign_rs256(&claims)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_wrong_issuer_rejected() {
        let server = key_server().await;
        let verifier = verifier_for(&server);

        let mut claims = id_token_claims("ada@example.com");
        claims["iss"] = json!("https://securetoken.google.com/some-other-project");

        let err = verifier.verify(&sign_rs256(&claims)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_hs256_token_with_known_kid_rejected() {
        let server = key_server().await;
        let verifier = verifier_for(&server);

        let header = Header {
            kid: Some(KEY_ID.to_string()),
            ..Header::new(Algorithm::HS256)
        };
        let token = encode(
            &header,
            &id_token_claims("ada@example.com"),
            &EncodingKey::from_secret(SIGNING_KEY_MODULUS.as_bytes()),
        )
        .unwrap();

        let err = verifier.verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_signed_id_token_reaches_handler() {
        let server = key_server().await;
        let store = MemoryProjectStore::new();
        let router = create_router(
            store.clone(),
            MockImageEditor::succeeding("https://replicate.delivery/out.png"),
            verifier_for(&server),
            RouterConfig::new().with_tracing(false),
        );

        let token = sign_rs256(&id_token_claims("ada@example.com"));
        let response = router
            .oneshot(request(Method::GET, "/projects", Some(&token), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!([]));
        assert_eq!(store.call_count(), 1);
    }

    /// A token whose header names key `kid`. The signature is irrelevant here.
    fn token_with_kid(kid: &str) -> String {
        let header = Header {
            kid: Some(kid.to_string()),
            ..Header::default()
        };
        encode(
            &header,
            &claims(Some("a@x.com"), 3600),
            &EncodingKey::from_secret(b"unused"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_key_endpoint_failure_is_key_fetch_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let verifier = JwtVerifier::firebase_with_jwks_url(
            "notes-ai",
            reqwest::Client::new(),
            format!("{}/jwks", server.uri()),
        );

        let err = verifier.verify(&token_with_kid("k1")).await.unwrap_err();
        assert!(matches!(err, AuthError::KeyFetch(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_unknown_kid_uses_cached_key_set() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("cache-control", "public, max-age=19000, must-revalidate")
                    .set_body_json(json!({ "keys": [] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let verifier = JwtVerifier::firebase_with_jwks_url(
            "notes-ai",
            reqwest::Client::new(),
            format!("{}/jwks", server.uri()),
        );

        for _ in 0..3 {
            let err = verifier.verify(&token_with_kid("rotated")).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidToken(_)), "{:?}", err);
        }
    }

    #[tokio::test]
    async fn test_token_without_kid_rejected_without_fetch() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": [] })))
            .expect(0)
            .mount(&server)
            .await;

        let verifier = JwtVerifier::firebase_with_jwks_url(
            "notes-ai",
            reqwest::Client::new(),
            format!("{}/jwks", server.uri()),
        );
        let token = super::sign_claims(&claims(Some("a@x.com"), 3600), "unused");

        let err = verifier.verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)), "{:?}", err);
    }
}
