use http::{header::COOKIE, HeaderMap, HeaderName};
use regex::Regex;

use crate::jwt_unverified::UnverifiedJwt;

pub trait JwtExtractor {
    fn extract_jwt(&self, headers: &HeaderMap) -> Option<UnverifiedJwt>;
}

/// Looks for a token in a header first and in a cookie second.
///
/// A header value is only used when it matches `regexp`. A cookie value that
/// does not match `regexp` is used as is.
pub struct HeaderCookieJwtExtractor<'a> {
    pub header: &'a HeaderName,
    pub cookie: &'a str,
    pub regexp: &'a Regex,
}

impl JwtExtractor for HeaderCookieJwtExtractor<'_> {
    fn extract_jwt(&self, headers: &HeaderMap) -> Option<UnverifiedJwt> {
        if let Some(token) = headers
            .get(self.header)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .and_then(|value| capture(self.regexp, value))
        {
            return Some(UnverifiedJwt::new(token));
        }

        let value = find_cookie(headers, self.cookie)?;
        Some(UnverifiedJwt::new(
            capture(self.regexp, value).unwrap_or(value),
        ))
    }
}

fn capture<'v>(regexp: &Regex, value: &'v str) -> Option<&'v str> {
    regexp
        .captures(value)
        .and_then(|captures| captures.get(1))
        .map(|group| group.as_str())
}

fn find_cookie<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim())
}
