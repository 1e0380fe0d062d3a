use std::{fmt, sync::Arc};

use http::{request::Parts, HeaderMap, Method, Request, Uri};
use regex::Regex;

use crate::error::ConfigurationError;

/// Borrowed view of the parts of a request that rules and hooks may inspect.
#[derive(Clone, Copy, Debug)]
pub struct RequestHead<'a> {
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub headers: &'a HeaderMap,
}

impl<'a> RequestHead<'a> {
    pub fn new(method: &'a Method, uri: &'a Uri, headers: &'a HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    pub fn from_request<B>(request: &'a Request<B>) -> Self {
        Self::new(request.method(), request.uri(), request.headers())
    }

    pub fn from_parts(parts: &'a Parts) -> Self {
        Self::new(&parts.method, &parts.uri, &parts.headers)
    }
}

/// Decides whether a request should be authenticated.
pub trait Rule: Send + Sync {
    fn evaluate(&self, request: &RequestHead<'_>) -> bool;
}

/// Returns a [Rule] backed by a closure.
pub fn rule_fn<F>(f: F) -> RuleFn<F>
where
    F: Fn(&RequestHead<'_>) -> bool + Send + Sync,
{
    RuleFn { f }
}

#[derive(Clone, Copy)]
pub struct RuleFn<F> {
    f: F,
}

impl<F> Rule for RuleFn<F>
where
    F: Fn(&RequestHead<'_>) -> bool + Send + Sync,
{
    fn evaluate(&self, request: &RequestHead<'_>) -> bool {
        (self.f)(request)
    }
}

impl<F> fmt::Debug for RuleFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleFn").finish()
    }
}

/// Skips authentication for the configured methods, `OPTIONS` by default.
#[derive(Clone, Debug)]
pub struct MethodRule {
    ignore: Vec<Method>,
}

impl MethodRule {
    pub fn new(ignore: impl IntoIterator<Item = Method>) -> Self {
        Self {
            ignore: ignore.into_iter().collect(),
        }
    }

    pub fn ignore(&self) -> &[Method] {
        &self.ignore
    }
}

impl Default for MethodRule {
    fn default() -> Self {
        Self::new([Method::OPTIONS])
    }
}

impl Rule for MethodRule {
    fn evaluate(&self, request: &RequestHead<'_>) -> bool {
        !self.ignore.contains(request.method)
    }
}

/// Authenticates requests below any of `path`, unless they are below one of `ignore`.
///
/// `ignore` entries are literal prefixes, `path` entries may contain regular expression syntax.
/// Both match whole path segments: `/api` covers `/api` and `/api/users` but not `/apis`.
#[derive(Clone)]
pub struct PathRule {
    path: Vec<String>,
    ignore: Vec<String>,
    patterns: Vec<Regex>,
}

impl PathRule {
    pub fn new<P, I>(path: P, ignore: I) -> Result<Self, ConfigurationError>
    where
        P: IntoIterator,
        P::Item: Into<String>,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let path: Vec<String> = path.into_iter().map(Into::into).collect();
        let ignore = ignore
            .into_iter()
            .map(|entry| entry.into().trim_end_matches('/').to_owned())
            .collect();
        let patterns = path
            .iter()
            .map(|entry| {
                let pattern = format!("^{}(/.*)?$", entry.trim_end_matches('/'));
                Regex::new(&pattern).map_err(|e| ConfigurationError::InvalidPath(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            path,
            ignore,
            patterns,
        })
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn ignore(&self) -> &[String] {
        &self.ignore
    }
}

impl Default for PathRule {
    fn default() -> Self {
        Self {
            path: vec!["/".to_owned()],
            ignore: Vec::new(),
            patterns: vec![Regex::new("^(/.*)?$").expect("static pattern")],
        }
    }
}

impl Rule for PathRule {
    fn evaluate(&self, request: &RequestHead<'_>) -> bool {
        let path = normalize_path(request.uri.path());

        let ignored = self.ignore.iter().any(|ignore| {
            path == *ignore
                || path
                    .strip_prefix(ignore.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        });
        if ignored {
            return false;
        }
        self.patterns.iter().any(|pattern| pattern.is_match(&path))
    }
}

impl fmt::Debug for PathRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathRule")
            .field("path", &self.path)
            .field("ignore", &self.ignore)
            .finish()
    }
}

fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    normalized.push('/');
    for segment in path.split('/').filter(|segment| !segment.is_empty()) {
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        normalized.push_str(segment);
    }
    if path.ends_with('/') && !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

/// Ordered rules that must all agree before a request is authenticated.
///
/// An empty stack authenticates every request.
#[derive(Clone, Default)]
pub struct RuleStack {
    rules: Vec<Arc<dyn Rule>>,
}

impl RuleStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: Arc<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn with(mut self, rule: impl Rule + 'static) -> Self {
        self.push(Arc::new(rule));
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn should_authenticate(&self, request: &RequestHead<'_>) -> bool {
        self.rules.iter().all(|rule| rule.evaluate(request))
    }
}

impl FromIterator<Arc<dyn Rule>> for RuleStack {
    fn from_iter<T: IntoIterator<Item = Arc<dyn Rule>>>(iter: T) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

impl fmt::Debug for RuleStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleStack")
            .field("len", &self.rules.len())
            .finish()
    }
}
