use http::{Request, Response, StatusCode};
use log::debug;
use pin_project::pin_project;

use std::{
    future::Future,
    mem,
    pin::Pin,
    sync::Arc,
    task::{ready, Context, Poll},
};
use tower::{BoxError, Layer, Service};

use crate::{
    error::{AuthError, ConfigurationError},
    hooks::AfterHook,
    middleware::{Authentication, JwtAuthentication},
    rule::RequestHead,
    token::{DecodedToken, TokenAttributes},
};

/// Locates and verifies tokens, attaches them to the request and runs the `before` and `after`
/// hooks.
pub struct AuthenticationLayer<ResBody> {
    middleware: JwtAuthentication<ResBody>,
}

impl<ResBody> AuthenticationLayer<ResBody> {
    pub(crate) fn new(middleware: JwtAuthentication<ResBody>) -> Self {
        Self { middleware }
    }
}

impl<ResBody> Clone for AuthenticationLayer<ResBody> {
    fn clone(&self) -> Self {
        Self {
            middleware: self.middleware.clone(),
        }
    }
}

impl<S, ResBody> Layer<S> for AuthenticationLayer<ResBody> {
    type Service = AuthenticationService<S, ResBody>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthenticationService {
            inner,
            middleware: self.middleware.clone(),
        }
    }
}

pub struct AuthenticationService<S, ResBody> {
    inner: S,
    middleware: JwtAuthentication<ResBody>,
}

impl<S, ResBody> Clone for AuthenticationService<S, ResBody>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            middleware: self.middleware.clone(),
        }
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for AuthenticationService<S, ResBody>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone,
    S::Error: Into<BoxError>,
{
    type Response = Response<ResBody>;
    type Error = BoxError;
    type Future = AuthenticationFuture<S::Future, ResBody>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let (mut parts, body) = request.into_parts();
        let authentication = self
            .middleware
            .authenticate(&RequestHead::from_parts(&parts));

        let state = match authentication {
            Err(error) => {
                release(&mut self.inner);
                AuthenticationState::Failed { error: Some(error) }
            }
            Ok(Authentication::Unauthenticated) => AuthenticationState::Forward {
                fut: self.inner.call(Request::from_parts(parts, body)),
                authenticated: None,
            },
            Ok(Authentication::Authenticated(token)) => {
                let config = self.middleware.configuration();
                TokenAttributes::attach(&mut parts.extensions, config.attribute(), token.clone());
                config.before().before(&mut parts, &token);
                AuthenticationState::Forward {
                    fut: self.inner.call(Request::from_parts(parts, body)),
                    authenticated: Some((token, config.after().clone())),
                }
            }
        };
        AuthenticationFuture { state }
    }
}

/// Drops the capacity `poll_ready` reserved on a service that will not be called.
fn release<S: Clone>(inner: &mut S) {
    let fresh = inner.clone();
    drop(mem::replace(inner, fresh));
}

#[pin_project]
pub struct AuthenticationFuture<F, ResBody> {
    #[pin]
    state: AuthenticationState<F, ResBody>,
}

#[pin_project(project = AuthenticationStateProj)]
enum AuthenticationState<F, ResBody> {
    Failed {
        error: Option<ConfigurationError>,
    },
    Forward {
        #[pin]
        fut: F,
        authenticated: Option<(DecodedToken, Arc<dyn AfterHook<ResBody>>)>,
    },
}

impl<F, ResBody, E> Future for AuthenticationFuture<F, ResBody>
where
    F: Future<Output = Result<Response<ResBody>, E>>,
    E: Into<BoxError>,
{
    type Output = Result<Response<ResBody>, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().state.project() {
            AuthenticationStateProj::Failed { error } => {
                let error = error.take().expect("polled after completion");
                Poll::Ready(Err(error.into()))
            }
            AuthenticationStateProj::Forward { fut, authenticated } => {
                let response = match ready!(fut.poll(cx)) {
                    Ok(response) => response,
                    Err(e) => return Poll::Ready(Err(e.into())),
                };
                match authenticated.take() {
                    Some((token, after)) => Poll::Ready(Ok(after.after(response, &token))),
                    None => Poll::Ready(Ok(response)),
                }
            }
        }
    }
}

/// Rejects requests that require authentication but carry no verified token.
pub struct AuthorizationLayer<ResBody> {
    middleware: JwtAuthentication<ResBody>,
}

impl<ResBody> AuthorizationLayer<ResBody> {
    pub(crate) fn new(middleware: JwtAuthentication<ResBody>) -> Self {
        Self { middleware }
    }
}

impl<ResBody> Clone for AuthorizationLayer<ResBody> {
    fn clone(&self) -> Self {
        Self {
            middleware: self.middleware.clone(),
        }
    }
}

impl<S, ResBody> Layer<S> for AuthorizationLayer<ResBody> {
    type Service = AuthorizationService<S, ResBody>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthorizationService {
            inner,
            middleware: self.middleware.clone(),
        }
    }
}

pub struct AuthorizationService<S, ResBody> {
    inner: S,
    middleware: JwtAuthentication<ResBody>,
}

impl<S, ResBody> Clone for AuthorizationService<S, ResBody>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            middleware: self.middleware.clone(),
        }
    }
}

impl<S, ResBody> AuthorizationService<S, ResBody> {
    fn reject<ReqBody>(&self, request: &Request<ReqBody>) -> Option<Response<ResBody>> {
        let config = self.middleware.configuration();
        let head = RequestHead::from_request(request);
        if !config.rules().should_authenticate(&head) {
            return None;
        }
        if DecodedToken::from_extensions(request.extensions(), config.attribute()).is_some() {
            return None;
        }
        debug!(
            "Rejecting {} {}: authentication required",
            request.method(),
            request.uri().path()
        );
        let response = config.response_factory().create(StatusCode::UNAUTHORIZED);
        Some(
            config
                .error()
                .on_error(&head, response, &AuthError::TokenNotFound),
        )
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for AuthorizationService<S, ResBody>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = AuthorizationFuture<S::Future, ResBody>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        match self.reject(&request) {
            Some(response) => {
                release(&mut self.inner);
                AuthorizationFuture::Rejected {
                    response: Some(response),
                }
            }
            None => AuthorizationFuture::Forward {
                fut: self.inner.call(request),
            },
        }
    }
}

#[pin_project(project = AuthorizationFutureProj)]
pub enum AuthorizationFuture<F, ResBody> {
    Forward {
        #[pin]
        fut: F,
    },
    Rejected {
        response: Option<Response<ResBody>>,
    },
}

impl<F, ResBody, E> Future for AuthorizationFuture<F, ResBody>
where
    F: Future<Output = Result<Response<ResBody>, E>>,
{
    type Output = Result<Response<ResBody>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            AuthorizationFutureProj::Forward { fut } => fut.poll(cx),
            AuthorizationFutureProj::Rejected { response } => {
                Poll::Ready(Ok(response.take().expect("polled after completion")))
            }
        }
    }
}
