use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use bytes::Bytes;
use http::{HeaderName, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use tower::{service_fn, BoxError, Service};
use tower_jwt_authentication::{
    config::Configuration, middleware::JwtAuthentication, token::DecodedToken,
};

pub type Body = Full<Bytes>;

pub fn middleware(config: Configuration<Body>) -> JwtAuthentication<Body> {
    JwtAuthentication::new(config)
}

pub fn default_config() -> Configuration<Body> {
    Configuration::new(crate::common::jwt::SECRET).unwrap()
}

pub async fn echo(req: Request<Body>) -> Result<Response<Body>, BoxError> {
    let b = req.into_body();
    let mut response = Response::new(b);
    *response.status_mut() = StatusCode::OK;
    Ok(response)
}

/// Responds with the `sub` claim of the token attached as `attribute`, or `anonymous`.
pub fn echo_sub(
    attribute: &'static str,
) -> impl Service<Request<Body>, Response = Response<Body>, Error = BoxError> + Clone {
    service_fn(move |req: Request<Body>| async move {
        let sub = DecodedToken::from_extensions(req.extensions(), attribute)
            .and_then(|token| token.get_str("sub").ok().map(str::to_owned))
            .unwrap_or_else(|| "anonymous".to_owned());
        Ok::<_, BoxError>(Response::new(Full::new(Bytes::from(sub))))
    })
}

/// Wraps [echo] and counts how often it was called.
pub fn counting_echo(
    calls: Arc<AtomicUsize>,
) -> impl Service<Request<Body>, Response = Response<Body>, Error = BoxError> + Clone {
    service_fn(move |req: Request<Body>| {
        calls.fetch_add(1, Ordering::SeqCst);
        echo(req)
    })
}

pub fn request(uri: &str, headers: Vec<(HeaderName, &str)>) -> Request<Body> {
    let mut request = Request::get(uri);
    let request_headers = request.headers_mut().unwrap();
    headers.into_iter().for_each(|(name, value)| {
        request_headers.append(name, value.parse().unwrap());
    });
    request.body(Full::new(Bytes::from_static(b"hello"))).unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let body = response.into_body().collect().await.unwrap();
    String::from_utf8(body.to_bytes().into()).unwrap()
}
