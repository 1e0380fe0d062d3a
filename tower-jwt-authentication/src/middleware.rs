use core::fmt;
use std::sync::Arc;

use http::{
    header::{HeaderName, HOST},
    uri::Authority,
};
use log::{debug, info, warn};
use tower::layer::util::Stack;

use crate::{
    config::Configuration,
    error::ConfigurationError,
    jwt_extract::{HeaderCookieJwtExtractor, JwtExtractor},
    layer::{AuthenticationLayer, AuthorizationLayer},
    rule::RequestHead,
    token::DecodedToken,
};

const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Outcome of looking for and verifying a token.
///
/// A missing or invalid token is not an error, the request is simply unauthenticated.
#[derive(Clone, Debug, PartialEq)]
pub enum Authentication {
    Authenticated(DecodedToken),
    Unauthenticated,
}

/// JwtAuthentication
///
/// This is the actual middleware.
/// May be turned into a tower layer by calling [into_layer](JwtAuthentication::into_layer).
pub struct JwtAuthentication<ResBody> {
    configuration: Arc<Configuration<ResBody>>,
}

impl<ResBody> JwtAuthentication<ResBody> {
    pub fn new(configuration: Configuration<ResBody>) -> Self {
        info!(
            "Expecting {:?} tokens in header '{}' or cookie '{}', attached as '{}'",
            configuration.algorithm(),
            configuration.header(),
            configuration.cookie(),
            configuration.attribute()
        );
        Self {
            configuration: Arc::new(configuration),
        }
    }

    pub fn configuration(&self) -> &Configuration<ResBody> {
        &self.configuration
    }

    /// Fails when `secure` is set, the request is not made over HTTPS and its host is not relaxed.
    pub fn check_transport(&self, request: &RequestHead<'_>) -> Result<(), ConfigurationError> {
        if !self.configuration.secure() {
            return Ok(());
        }
        let scheme = scheme(request);
        if scheme == "https" {
            return Ok(());
        }
        let host = host(request).unwrap_or_default();
        if self.configuration.relaxed().iter().any(|relaxed| *relaxed == host) {
            return Ok(());
        }
        warn!("Refusing to authenticate over {} for host '{}'", scheme, host);
        Err(ConfigurationError::InsecureTransport { scheme, host })
    }

    /// Locates and verifies the token of a request.
    ///
    /// Only a transport violation is returned as an error.
    pub fn authenticate(
        &self,
        request: &RequestHead<'_>,
    ) -> Result<Authentication, ConfigurationError> {
        self.check_transport(request)?;

        let config = &self.configuration;
        let extractor = HeaderCookieJwtExtractor {
            header: config.header(),
            cookie: config.cookie(),
            regexp: config.regexp(),
        };
        let token = match extractor.extract_jwt(request.headers) {
            Some(token) => token,
            None => {
                debug!(
                    "No token found in header '{}' or cookie '{}'",
                    config.header(),
                    config.cookie()
                );
                return Ok(Authentication::Unauthenticated);
            }
        };

        let algorithm = config.algorithm();
        let key = config.secret().resolve(algorithm);
        match config.verifier().verify(&token, &key, algorithm) {
            Ok(payload) => {
                debug!("JWT validation successful");
                Ok(Authentication::Authenticated(DecodedToken::new(
                    payload,
                    token.into_inner(),
                )))
            }
            Err(e) => {
                debug!("JWT validation failed (kid: {:?}): {}", token.key_id(), e);
                Ok(Authentication::Unauthenticated)
            }
        }
    }

    /// Returns the authentication stage as a [tower layer](tower::Layer).
    pub fn authentication_layer(&self) -> AuthenticationLayer<ResBody> {
        AuthenticationLayer::new(self.clone())
    }

    /// Returns the authorization gate as a [tower layer](tower::Layer).
    ///
    /// Must be placed inside the authentication layer of the same instance.
    pub fn authorization_layer(&self) -> AuthorizationLayer<ResBody> {
        AuthorizationLayer::new(self.clone())
    }

    /// Returns both stages as one layer, authentication outermost.
    pub fn into_layer(&self) -> Stack<AuthorizationLayer<ResBody>, AuthenticationLayer<ResBody>> {
        Stack::new(self.authorization_layer(), self.authentication_layer())
    }
}

impl<ResBody> Clone for JwtAuthentication<ResBody> {
    fn clone(&self) -> Self {
        Self {
            configuration: self.configuration.clone(),
        }
    }
}

impl<ResBody> fmt::Debug for JwtAuthentication<ResBody> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtAuthentication")
            .field("configuration", &self.configuration)
            .finish()
    }
}

fn scheme(request: &RequestHead<'_>) -> String {
    if let Some(scheme) = request.uri.scheme_str() {
        return scheme.to_ascii_lowercase();
    }
    request
        .headers
        .get(X_FORWARDED_PROTO)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "http".to_owned())
}

fn host(request: &RequestHead<'_>) -> Option<String> {
    if let Some(host) = request.uri.host() {
        return Some(host.to_owned());
    }
    let authority = request
        .headers
        .get(HOST)?
        .to_str()
        .ok()?
        .parse::<Authority>()
        .ok()?;
    Some(authority.host().to_owned())
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use http::{header::AUTHORIZATION, Request};
    use jsonwebtoken::Algorithm;
    use mockall::predicate::eq;
    use serde_json::{json, Map};

    use super::*;
    use crate::{
        error::VerificationError, jwt_unverified::UnverifiedJwt, secret::KeyMaterial,
        verifier::MockTokenVerifier,
    };

    fn middleware(verifier: MockTokenVerifier) -> JwtAuthentication<String> {
        JwtAuthentication::new(
            Configuration::new("supersecret")
                .unwrap()
                .with_verifier(verifier),
        )
    }

    fn claims() -> Map<String, serde_json::Value> {
        match json!({"sub": "someone"}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn authenticate(
        middleware: &JwtAuthentication<String>,
        request: &Request<()>,
    ) -> Result<Authentication, ConfigurationError> {
        middleware.authenticate(&RequestHead::from_request(request))
    }

    #[test]
    fn passes_token_key_and_algorithm_to_verifier() {
        let mut verifier = MockTokenVerifier::new();
        verifier
            .expect_verify()
            .with(
                eq(UnverifiedJwt::new("abc")),
                eq(KeyMaterial::Single("supersecret".to_owned())),
                eq(Algorithm::HS256),
            )
            .returning(|_, _, _| Ok(claims()))
            .once();

        let request = Request::get("https://example.com/api")
            .header(AUTHORIZATION, "Bearer abc")
            .body(())
            .unwrap();
        assert_eq!(
            authenticate(&middleware(verifier), &request),
            Ok(Authentication::Authenticated(DecodedToken::new(
                claims(),
                "abc"
            )))
        );
    }

    #[test]
    fn keyed_secret_is_resolved_as_a_whole() {
        let mut verifier = MockTokenVerifier::new();
        verifier
            .expect_verify()
            .withf(|_, key, _| {
                *key == KeyMaterial::Keyed(BTreeMap::from([
                    ("alpha".to_owned(), "a".to_owned()),
                    ("beta".to_owned(), "b".to_owned()),
                ]))
            })
            .returning(|_, _, _| Err(VerificationError::UnknownKeyId("gamma".to_owned())))
            .once();
        let middleware = JwtAuthentication::<String>::new(
            Configuration::new(vec![("alpha", "a"), ("beta", "b")])
                .unwrap()
                .with_verifier(verifier),
        );

        let request = Request::get("https://example.com/api")
            .header(AUTHORIZATION, "Bearer abc")
            .body(())
            .unwrap();
        assert_eq!(
            authenticate(&middleware, &request),
            Ok(Authentication::Unauthenticated)
        );
    }

    #[test]
    fn verification_failure_is_unauthenticated() {
        let mut verifier = MockTokenVerifier::new();
        verifier
            .expect_verify()
            .returning(|_, _, _| Err(VerificationError::Malformed));

        let request = Request::get("https://example.com/api")
            .header(AUTHORIZATION, "Bearer abc")
            .body(())
            .unwrap();
        assert_eq!(
            authenticate(&middleware(verifier), &request),
            Ok(Authentication::Unauthenticated)
        );
    }

    #[test]
    fn missing_token_skips_verifier() {
        let mut verifier = MockTokenVerifier::new();
        verifier.expect_verify().never();

        let request = Request::get("https://example.com/api").body(()).unwrap();
        assert_eq!(
            authenticate(&middleware(verifier), &request),
            Ok(Authentication::Unauthenticated)
        );
    }

    #[test]
    fn insecure_transport_fails_before_token_processing() {
        let mut verifier = MockTokenVerifier::new();
        verifier.expect_verify().never();

        let request = Request::get("http://example.com/api")
            .header(AUTHORIZATION, "Bearer abc")
            .body(())
            .unwrap();
        assert_eq!(
            authenticate(&middleware(verifier), &request),
            Err(ConfigurationError::InsecureTransport {
                scheme: "http".to_owned(),
                host: "example.com".to_owned(),
            })
        );
    }

    #[test]
    fn relaxed_hosts_may_use_http() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut verifier = MockTokenVerifier::new();
        verifier.expect_verify().returning(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(claims())
        });
        let middleware = middleware(verifier);

        for uri in ["http://localhost/api", "http://127.0.0.1:8080/api"] {
            let request = Request::get(uri)
                .header(AUTHORIZATION, "Bearer abc")
                .body(())
                .unwrap();
            assert!(authenticate(&middleware, &request).is_ok(), "{}", uri);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn origin_form_uses_host_and_forwarded_proto() {
        let mut verifier = MockTokenVerifier::new();
        verifier.expect_verify().never();
        let middleware = middleware(verifier);

        let plain = Request::get("/api")
            .header(HOST, "example.com:8080")
            .body(())
            .unwrap();
        assert_eq!(
            middleware.check_transport(&RequestHead::from_request(&plain)),
            Err(ConfigurationError::InsecureTransport {
                scheme: "http".to_owned(),
                host: "example.com".to_owned(),
            })
        );

        let local = Request::get("/api")
            .header(HOST, "localhost:3000")
            .body(())
            .unwrap();
        assert!(middleware
            .check_transport(&RequestHead::from_request(&local))
            .is_ok());

        let forwarded = Request::get("/api")
            .header(HOST, "example.com")
            .header(X_FORWARDED_PROTO, "https")
            .body(())
            .unwrap();
        assert!(middleware
            .check_transport(&RequestHead::from_request(&forwarded))
            .is_ok());
    }

    #[test]
    fn not_secure_allows_http() {
        let mut verifier = MockTokenVerifier::new();
        verifier.expect_verify().never();
        let middleware = JwtAuthentication::<String>::new(
            Configuration::new("supersecret")
                .unwrap()
                .with_secure(false)
                .with_verifier(verifier),
        );
        let request = Request::get("http://example.com/api").body(()).unwrap();
        assert_eq!(
            authenticate(&middleware, &request),
            Ok(Authentication::Unauthenticated)
        );
    }
}
