#![doc = include_str!("../README.md")]

/// [Configuration](crate::config::Configuration) is the immutable value holding
/// everything a [JwtAuthentication](crate::middleware::JwtAuthentication) instance needs.
///
/// Every `with_*` method returns a new configuration.
///
/// # Example
///
/// ```
/// use http::Method;
/// use tower_jwt_authentication::config::Configuration;
/// use tower_jwt_authentication::rule::{MethodRule, PathRule, RuleStack};
///
/// let config = Configuration::<String>::new("supersecret")
///     .unwrap()
///     .with_attribute("jwt")
///     .with_rules(
///         RuleStack::new()
///             .with(MethodRule::new([Method::OPTIONS, Method::HEAD]))
///             .with(PathRule::new(["/api"], ["/api/token"]).unwrap()),
///     );
/// assert_eq!(config.attribute(), "jwt");
/// ```
pub mod config;

/// Error types.
pub mod error;

/// Extension points invoked by the middleware.
///
/// - [BeforeHook](crate::hooks::BeforeHook): after a token was attached, before the request
///   is passed on.
/// - [AfterHook](crate::hooks::AfterHook): with the response of an authenticated request,
///   may replace it.
/// - [ErrorHook](crate::hooks::ErrorHook): builds the response when authentication was
///   required but missing.
///
/// Closures can be used through [before_fn](crate::hooks::before_fn),
/// [after_fn](crate::hooks::after_fn) and [error_fn](crate::hooks::error_fn).
pub mod hooks;

/// [UnverifiedJwt](crate::jwt_unverified::UnverifiedJwt) is the raw token
/// as found in a request, before verification.
pub mod jwt_unverified;

/// The actual tower middleware
///
/// Contains implementations of [Service](https://docs.rs/tower/latest/tower/trait.Service.html)
/// and [Layer](https://docs.rs/tower/latest/tower/trait.Layer.html)
/// from the tower library.
///
/// You shouldn't need to interact with these implementations, more than
/// calling [JwtAuthentication::into_layer()](crate::middleware::JwtAuthentication::into_layer).
pub mod layer;

/// [JwtAuthentication](crate::middleware::JwtAuthentication) ties a
/// [Configuration](crate::config::Configuration) to the tower layers.
///
/// It's cheap to clone, all clones share the same configuration.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use http::{Request, Response};
/// use http_body_util::Full;
/// use tower::{BoxError, ServiceBuilder};
/// use tower_jwt_authentication::{config::Configuration, middleware::JwtAuthentication};
///
/// async fn handler(_: Request<Full<Bytes>>) -> Result<Response<Full<Bytes>>, BoxError> {
///     Ok(Response::new(Full::default()))
/// }
///
/// let config = Configuration::<Full<Bytes>>::new("supersecret").unwrap();
/// let authentication = JwtAuthentication::new(config);
/// let service = ServiceBuilder::new()
///     .layer(authentication.into_layer())
///     .service_fn(handler);
/// ```
pub mod middleware;

/// Rules deciding whether a request must be authenticated.
///
/// A [RuleStack](crate::rule::RuleStack) authenticates a request only when
/// all of its rules agree.
pub mod rule;

/// Key material used to verify tokens.
///
/// A secret is either a single key or a set of keys selected by the `kid`
/// header of a token.
pub mod secret;

/// [DecodedToken](crate::token::DecodedToken) is attached to the request
/// extensions once a token was verified.
///
/// Read it back in a handler with
/// [DecodedToken::from_extensions](crate::token::DecodedToken::from_extensions).
pub mod token;

/// Token verification.
///
/// [JsonWebTokenVerifier](crate::verifier::JsonWebTokenVerifier) is used by default.
/// Provide an own [TokenVerifier](crate::verifier::TokenVerifier) via
/// [with_verifier](crate::config::Configuration::with_verifier) to customize it.
pub mod verifier;

mod jwt_extract;
