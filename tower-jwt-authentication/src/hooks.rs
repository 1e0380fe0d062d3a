use std::{fmt, marker::PhantomData};

use http::{request, Response, StatusCode};

use crate::{error::AuthError, rule::RequestHead, token::DecodedToken};

/// Called after a token was verified and attached, before the request is passed on.
pub trait BeforeHook: Send + Sync {
    fn before(&self, request: &mut request::Parts, token: &DecodedToken);
}

/// Called with the response of an authenticated request. Returns the response to pass on.
pub trait AfterHook<B>: Send + Sync {
    fn after(&self, response: Response<B>, token: &DecodedToken) -> Response<B>;
}

/// Builds the response for a request that required authentication but carried no valid token.
pub trait ErrorHook<B>: Send + Sync {
    fn on_error(
        &self,
        request: &RequestHead<'_>,
        response: Response<B>,
        error: &AuthError,
    ) -> Response<B>;
}

/// Creates the initial response handed to the [ErrorHook].
pub trait ResponseFactory<B>: Send + Sync {
    fn create(&self, status: StatusCode) -> Response<B>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHook;

impl BeforeHook for NoopHook {
    fn before(&self, _request: &mut request::Parts, _token: &DecodedToken) {}
}

impl<B> AfterHook<B> for NoopHook {
    fn after(&self, response: Response<B>, _token: &DecodedToken) -> Response<B> {
        response
    }
}

impl<B> ErrorHook<B> for NoopHook {
    fn on_error(
        &self,
        _request: &RequestHead<'_>,
        response: Response<B>,
        _error: &AuthError,
    ) -> Response<B> {
        response
    }
}

/// Responses with the requested status and an empty body.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultResponseFactory;

impl<B> ResponseFactory<B> for DefaultResponseFactory
where
    B: Default,
{
    fn create(&self, status: StatusCode) -> Response<B> {
        let mut response = Response::new(B::default());
        *response.status_mut() = status;
        response
    }
}

/// Returns a [BeforeHook] backed by a closure.
pub fn before_fn<F>(f: F) -> HookFn<F>
where
    F: Fn(&mut request::Parts, &DecodedToken) + Send + Sync,
{
    HookFn { f }
}

/// Returns an [AfterHook] backed by a closure.
pub fn after_fn<F, B>(f: F) -> ResponseHookFn<F, B>
where
    F: Fn(Response<B>, &DecodedToken) -> Response<B> + Send + Sync,
{
    ResponseHookFn {
        f,
        _body: PhantomData,
    }
}

/// Returns an [ErrorHook] backed by a closure.
pub fn error_fn<F, B>(f: F) -> ResponseHookFn<F, B>
where
    F: Fn(&RequestHead<'_>, Response<B>, &AuthError) -> Response<B> + Send + Sync,
{
    ResponseHookFn {
        f,
        _body: PhantomData,
    }
}

#[derive(Clone, Copy)]
pub struct HookFn<F> {
    f: F,
}

impl<F> BeforeHook for HookFn<F>
where
    F: Fn(&mut request::Parts, &DecodedToken) + Send + Sync,
{
    fn before(&self, request: &mut request::Parts, token: &DecodedToken) {
        (self.f)(request, token)
    }
}

impl<F> fmt::Debug for HookFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookFn").finish()
    }
}

/// A closure hook producing a `Response<B>`.
pub struct ResponseHookFn<F, B> {
    f: F,
    _body: PhantomData<fn(B) -> B>,
}

impl<F: Clone, B> Clone for ResponseHookFn<F, B> {
    fn clone(&self) -> Self {
        Self {
            f: self.f.clone(),
            _body: PhantomData,
        }
    }
}

impl<F, B> AfterHook<B> for ResponseHookFn<F, B>
where
    F: Fn(Response<B>, &DecodedToken) -> Response<B> + Send + Sync,
{
    fn after(&self, response: Response<B>, token: &DecodedToken) -> Response<B> {
        (self.f)(response, token)
    }
}

impl<F, B> ErrorHook<B> for ResponseHookFn<F, B>
where
    F: Fn(&RequestHead<'_>, Response<B>, &AuthError) -> Response<B> + Send + Sync,
{
    fn on_error(
        &self,
        request: &RequestHead<'_>,
        response: Response<B>,
        error: &AuthError,
    ) -> Response<B> {
        (self.f)(request, response, error)
    }
}

impl<F, B> fmt::Debug for ResponseHookFn<F, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseHookFn").finish()
    }
}
