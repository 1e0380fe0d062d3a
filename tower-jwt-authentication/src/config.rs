use std::{fmt, sync::Arc};

use http::{header::AUTHORIZATION, HeaderName};
use jsonwebtoken::Algorithm;
use regex::Regex;
use serde::Deserialize;
use serde_with::{formats::PreferMany, serde_as, OneOrMany};

use crate::{
    error::ConfigurationError,
    hooks::{AfterHook, BeforeHook, DefaultResponseFactory, ErrorHook, NoopHook, ResponseFactory},
    rule::{MethodRule, PathRule, Rule, RuleStack},
    secret::{Secret, SecretResolver},
    verifier::{JsonWebTokenVerifier, TokenVerifier},
};

const DEFAULT_REGEXP: &str = r"(?i)Bearer\s+(.*)$";

/// Everything a [JwtAuthentication](crate::middleware::JwtAuthentication) instance needs.
///
/// A configuration is never modified in place. Every `with_*` method returns a new
/// configuration and leaves the one it was called on untouched.
pub struct Configuration<ResBody> {
    secret: Arc<dyn SecretResolver>,
    secure: bool,
    relaxed: Vec<String>,
    algorithm: Algorithm,
    header: HeaderName,
    regexp: Regex,
    cookie: String,
    attribute: String,
    path: Vec<String>,
    ignore: Vec<String>,
    rules: RuleStack,
    explicit_rules: bool,
    before: Arc<dyn BeforeHook>,
    after: Arc<dyn AfterHook<ResBody>>,
    error: Arc<dyn ErrorHook<ResBody>>,
    verifier: Arc<dyn TokenVerifier>,
    response_factory: Arc<dyn ResponseFactory<ResBody>>,
}

impl<ResBody> Configuration<ResBody>
where
    ResBody: Default,
{
    pub fn new(secret: impl Into<Secret>) -> Result<Self, ConfigurationError> {
        let path = vec!["/".to_owned()];
        let ignore = Vec::new();
        let rules = default_rules(&path, &ignore)?;
        Ok(Self {
            secret: secret.into().into_resolver()?,
            secure: true,
            relaxed: vec!["localhost".to_owned(), "127.0.0.1".to_owned()],
            algorithm: Algorithm::HS256,
            header: AUTHORIZATION,
            regexp: Regex::new(DEFAULT_REGEXP)
                .map_err(|e| ConfigurationError::InvalidRegexp(e.to_string()))?,
            cookie: "token".to_owned(),
            attribute: "token".to_owned(),
            path,
            ignore,
            rules,
            explicit_rules: false,
            before: Arc::new(NoopHook),
            after: Arc::new(NoopHook),
            error: Arc::new(NoopHook),
            verifier: Arc::new(JsonWebTokenVerifier::new()),
            response_factory: Arc::new(DefaultResponseFactory),
        })
    }

    pub fn from_options(options: Options) -> Result<Self, ConfigurationError> {
        let secret = options.secret.ok_or_else(|| {
            ConfigurationError::InvalidSecret("secret is required".to_owned())
        })?;
        let mut config = Self::new(secret)?;
        if let Some(secure) = options.secure {
            config = config.with_secure(secure);
        }
        if let Some(relaxed) = options.relaxed {
            config = config.with_relaxed(relaxed);
        }
        if let Some(algorithm) = options.algorithm {
            config = config.with_algorithm(algorithm);
        }
        if let Some(header) = options.header {
            config = config.with_header(&header)?;
        }
        if let Some(regexp) = options.regexp {
            config = config.with_regexp(&regexp)?;
        }
        if let Some(cookie) = options.cookie {
            config = config.with_cookie(cookie);
        }
        if let Some(attribute) = options.attribute {
            config = config.with_attribute(attribute);
        }
        if let Some(path) = options.path {
            config = config.with_path(path)?;
        }
        if let Some(ignore) = options.ignore {
            config = config.with_ignore(ignore)?;
        }
        if let Some(leeway) = options.leeway {
            config = config.with_verifier(JsonWebTokenVerifier::new().leeway(leeway));
        }
        Ok(config)
    }
}

impl<ResBody> Configuration<ResBody> {
    pub fn with_secret(&self, secret: impl Into<Secret>) -> Result<Self, ConfigurationError> {
        let mut next = self.clone();
        next.secret = secret.into().into_resolver()?;
        Ok(next)
    }

    /// Deny requests over plain HTTP unless the host is relaxed.
    pub fn with_secure(&self, secure: bool) -> Self {
        let mut next = self.clone();
        next.secure = secure;
        next
    }

    /// Hosts allowed to use plain HTTP even though `secure` is set.
    pub fn with_relaxed<I>(&self, relaxed: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut hosts: Vec<String> = Vec::new();
        for host in relaxed.into_iter().map(Into::into) {
            if !hosts.contains(&host) {
                hosts.push(host);
            }
        }
        let mut next = self.clone();
        next.relaxed = hosts;
        next
    }

    pub fn with_algorithm(&self, algorithm: Algorithm) -> Self {
        let mut next = self.clone();
        next.algorithm = algorithm;
        next
    }

    pub fn with_header(&self, header: &str) -> Result<Self, ConfigurationError> {
        let header = HeaderName::from_bytes(header.as_bytes())
            .map_err(|_| ConfigurationError::InvalidHeader(header.to_owned()))?;
        let mut next = self.clone();
        next.header = header;
        Ok(next)
    }

    /// Pattern extracting the token from the header or cookie value.
    ///
    /// Must contain exactly one capturing group.
    pub fn with_regexp(&self, regexp: &str) -> Result<Self, ConfigurationError> {
        let compiled =
            Regex::new(regexp).map_err(|e| ConfigurationError::InvalidRegexp(e.to_string()))?;
        if compiled.captures_len() != 2 {
            return Err(ConfigurationError::InvalidRegexp(format!(
                "'{}' must contain exactly one capturing group",
                regexp
            )));
        }
        let mut next = self.clone();
        next.regexp = compiled;
        Ok(next)
    }

    pub fn with_cookie(&self, cookie: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.cookie = cookie.into();
        next
    }

    pub fn with_attribute(&self, attribute: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.attribute = attribute.into();
        next
    }

    /// Paths that require authentication.
    ///
    /// Only used while no rules were set explicitly.
    pub fn with_path<I>(&self, path: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut next = self.clone();
        next.path = path.into_iter().map(Into::into).collect();
        next.refresh_default_rules()?;
        Ok(next)
    }

    /// Paths that never require authentication.
    ///
    /// Only used while no rules were set explicitly.
    pub fn with_ignore<I>(&self, ignore: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut next = self.clone();
        next.ignore = ignore.into_iter().map(Into::into).collect();
        next.refresh_default_rules()?;
        Ok(next)
    }

    /// Replaces the rule stack.
    pub fn with_rules(&self, rules: RuleStack) -> Self {
        let mut next = self.clone();
        next.rules = rules;
        next.explicit_rules = true;
        next
    }

    /// Pushes a rule on top of the current rule stack.
    pub fn with_rule(&self, rule: impl Rule + 'static) -> Self {
        let mut next = self.clone();
        next.rules.push(Arc::new(rule));
        next.explicit_rules = true;
        next
    }

    pub fn with_before(&self, before: impl BeforeHook + 'static) -> Self {
        let mut next = self.clone();
        next.before = Arc::new(before);
        next
    }

    pub fn with_after(&self, after: impl AfterHook<ResBody> + 'static) -> Self {
        let mut next = self.clone();
        next.after = Arc::new(after);
        next
    }

    pub fn with_error(&self, error: impl ErrorHook<ResBody> + 'static) -> Self {
        let mut next = self.clone();
        next.error = Arc::new(error);
        next
    }

    pub fn with_verifier(&self, verifier: impl TokenVerifier + 'static) -> Self {
        let mut next = self.clone();
        next.verifier = Arc::new(verifier);
        next
    }

    pub fn with_response_factory(
        &self,
        response_factory: impl ResponseFactory<ResBody> + 'static,
    ) -> Self {
        let mut next = self.clone();
        next.response_factory = Arc::new(response_factory);
        next
    }

    fn refresh_default_rules(&mut self) -> Result<(), ConfigurationError> {
        if !self.explicit_rules {
            self.rules = default_rules(&self.path, &self.ignore)?;
        }
        Ok(())
    }

    pub fn secret(&self) -> &Arc<dyn SecretResolver> {
        &self.secret
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn relaxed(&self) -> &[String] {
        &self.relaxed
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    pub fn regexp(&self) -> &Regex {
        &self.regexp
    }

    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn ignore(&self) -> &[String] {
        &self.ignore
    }

    /// The rule stack in effect.
    pub fn rules(&self) -> &RuleStack {
        &self.rules
    }

    pub fn before(&self) -> &Arc<dyn BeforeHook> {
        &self.before
    }

    pub fn after(&self) -> &Arc<dyn AfterHook<ResBody>> {
        &self.after
    }

    pub fn error(&self) -> &Arc<dyn ErrorHook<ResBody>> {
        &self.error
    }

    pub fn verifier(&self) -> &Arc<dyn TokenVerifier> {
        &self.verifier
    }

    pub fn response_factory(&self) -> &Arc<dyn ResponseFactory<ResBody>> {
        &self.response_factory
    }
}

fn default_rules(path: &[String], ignore: &[String]) -> Result<RuleStack, ConfigurationError> {
    Ok(RuleStack::new()
        .with(MethodRule::default())
        .with(PathRule::new(path.iter().cloned(), ignore.iter().cloned())?))
}

impl<ResBody> Clone for Configuration<ResBody> {
    fn clone(&self) -> Self {
        Self {
            secret: self.secret.clone(),
            secure: self.secure,
            relaxed: self.relaxed.clone(),
            algorithm: self.algorithm,
            header: self.header.clone(),
            regexp: self.regexp.clone(),
            cookie: self.cookie.clone(),
            attribute: self.attribute.clone(),
            path: self.path.clone(),
            ignore: self.ignore.clone(),
            rules: self.rules.clone(),
            explicit_rules: self.explicit_rules,
            before: self.before.clone(),
            after: self.after.clone(),
            error: self.error.clone(),
            verifier: self.verifier.clone(),
            response_factory: self.response_factory.clone(),
        }
    }
}

impl<ResBody> fmt::Debug for Configuration<ResBody> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("secret", &self.secret)
            .field("secure", &self.secure)
            .field("relaxed", &self.relaxed)
            .field("algorithm", &self.algorithm)
            .field("header", &self.header)
            .field("regexp", &self.regexp.as_str())
            .field("cookie", &self.cookie)
            .field("attribute", &self.attribute)
            .field("path", &self.path)
            .field("ignore", &self.ignore)
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

/// Serializable form of a [Configuration], for loading from a host application's config source.
///
/// `relaxed`, `path` and `ignore` accept a single string or a list.
#[serde_as]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    pub secret: Option<Secret>,
    pub secure: Option<bool>,
    #[serde_as(as = "Option<OneOrMany<_, PreferMany>>")]
    pub relaxed: Option<Vec<String>>,
    pub algorithm: Option<Algorithm>,
    pub header: Option<String>,
    pub regexp: Option<String>,
    pub cookie: Option<String>,
    pub attribute: Option<String>,
    #[serde_as(as = "Option<OneOrMany<_, PreferMany>>")]
    pub path: Option<Vec<String>>,
    #[serde_as(as = "Option<OneOrMany<_, PreferMany>>")]
    pub ignore: Option<Vec<String>>,
    pub leeway: Option<u64>,
}

#[cfg(test)]
mod tests {
    use http::{Method, Request};

    use super::*;
    use crate::{hooks::before_fn, rule::RequestHead};

    type Config = Configuration<String>;

    fn should_authenticate(config: &Config, method: Method, uri: &str) -> bool {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap();
        config
            .rules()
            .should_authenticate(&RequestHead::from_request(&request))
    }

    #[test]
    fn defaults() {
        let config = Config::new("supersecret").unwrap();
        assert!(config.secure());
        assert_eq!(config.relaxed(), &["localhost", "127.0.0.1"]);
        assert_eq!(config.algorithm(), Algorithm::HS256);
        assert_eq!(config.header(), &AUTHORIZATION);
        assert_eq!(config.cookie(), "token");
        assert_eq!(config.attribute(), "token");
        assert_eq!(config.path(), &["/"]);
        assert!(config.ignore().is_empty());
        assert_eq!(config.rules().len(), 2);
        assert!(config.regexp().is_match("Bearer abc"));
    }

    #[test]
    fn default_rules_skip_options() {
        let config = Config::new("supersecret").unwrap();
        assert!(!should_authenticate(&config, Method::OPTIONS, "/api"));
        assert!(should_authenticate(&config, Method::GET, "/api"));
    }

    #[test]
    fn with_leaves_original_untouched() {
        let original = Config::new("supersecret").unwrap();
        let changed = original
            .with_secure(false)
            .with_cookie("jwt")
            .with_attribute("claims")
            .with_algorithm(Algorithm::HS512);

        assert!(original.secure());
        assert_eq!(original.cookie(), "token");
        assert_eq!(original.attribute(), "token");
        assert_eq!(original.algorithm(), Algorithm::HS256);

        assert!(!changed.secure());
        assert_eq!(changed.cookie(), "jwt");
        assert_eq!(changed.attribute(), "claims");
        assert_eq!(changed.algorithm(), Algorithm::HS512);
    }

    #[test]
    fn hooks_are_shared_between_copies() {
        let original = Config::new("supersecret")
            .unwrap()
            .with_before(before_fn(|_, _| {}));
        let copy = original.with_secure(false);
        assert!(Arc::ptr_eq(original.before(), copy.before()));
        assert!(Arc::ptr_eq(original.secret(), copy.secret()));
    }

    #[test]
    fn before_and_after_are_independent() {
        let original = Config::new("supersecret").unwrap();
        let changed = original.with_before(before_fn(|_, _| {}));
        assert!(!Arc::ptr_eq(original.before(), changed.before()));
        assert!(Arc::ptr_eq(original.after(), changed.after()));
    }

    #[test]
    fn path_and_ignore_feed_default_rules() {
        let config = Config::new("supersecret")
            .unwrap()
            .with_path(["/api"])
            .unwrap()
            .with_ignore(["/api/token"])
            .unwrap();
        assert!(should_authenticate(&config, Method::GET, "/api/users"));
        assert!(!should_authenticate(&config, Method::GET, "/api/token"));
        assert!(!should_authenticate(&config, Method::GET, "/home"));
        assert!(!should_authenticate(&config, Method::OPTIONS, "/api/users"));
    }

    #[test]
    fn explicit_rules_replace_defaults() {
        let config = Config::new("supersecret")
            .unwrap()
            .with_rules(RuleStack::new())
            .with_path(["/api"])
            .unwrap();
        assert!(config.rules().is_empty());
        assert!(should_authenticate(&config, Method::OPTIONS, "/home"));
    }

    #[test]
    fn with_rule_pushes_onto_current_stack() {
        let config = Config::new("supersecret")
            .unwrap()
            .with_rule(MethodRule::new([Method::GET]));
        assert_eq!(config.rules().len(), 3);
        assert!(!should_authenticate(&config, Method::GET, "/api"));
        assert!(!should_authenticate(&config, Method::OPTIONS, "/api"));
        assert!(should_authenticate(&config, Method::POST, "/api"));
    }

    #[test]
    fn regexp_requires_one_group() {
        let config = Config::new("supersecret").unwrap();
        assert!(config.with_regexp("Token (.*)").is_ok());
        assert!(matches!(
            config.with_regexp("Token .*"),
            Err(ConfigurationError::InvalidRegexp(_))
        ));
        assert!(matches!(
            config.with_regexp("(Token) (.*)"),
            Err(ConfigurationError::InvalidRegexp(_))
        ));
        assert!(matches!(
            config.with_regexp("(unclosed"),
            Err(ConfigurationError::InvalidRegexp(_))
        ));
    }

    #[test]
    fn invalid_header() {
        let config = Config::new("supersecret").unwrap();
        assert_eq!(
            config.with_header("not a header").unwrap_err(),
            ConfigurationError::InvalidHeader("not a header".to_owned())
        );
        assert_eq!(
            config.with_header("X-Token").unwrap().header().as_str(),
            "x-token"
        );
    }

    #[test]
    fn relaxed_is_an_ordered_set() {
        let config = Config::new("supersecret")
            .unwrap()
            .with_relaxed(["dev.local", "localhost", "dev.local"]);
        assert_eq!(config.relaxed(), &["dev.local", "localhost"]);
    }

    #[test]
    fn from_options() {
        let options: Options = serde_json::from_str(
            r#"{
                "secret": {"alpha": "a-key", "beta": "b-key"},
                "secure": false,
                "relaxed": "dev.local",
                "algorithm": "HS512",
                "header": "X-Token",
                "regexp": "(.*)",
                "cookie": "jwt",
                "attribute": "claims",
                "path": "/api",
                "ignore": ["/api/token", "/api/health"],
                "leeway": 30
            }"#,
        )
        .unwrap();
        let config = Config::from_options(options).unwrap();
        assert!(!config.secure());
        assert_eq!(config.relaxed(), &["dev.local"]);
        assert_eq!(config.algorithm(), Algorithm::HS512);
        assert_eq!(config.header().as_str(), "x-token");
        assert_eq!(config.cookie(), "jwt");
        assert_eq!(config.attribute(), "claims");
        assert_eq!(config.path(), &["/api"]);
        assert_eq!(config.ignore(), &["/api/token", "/api/health"]);
        assert!(!should_authenticate(&config, Method::GET, "/api/health"));
    }

    #[test]
    fn from_options_requires_secret() {
        let options: Options = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            Config::from_options(options),
            Err(ConfigurationError::InvalidSecret(_))
        ));
        assert!(serde_json::from_str::<Options>(r#"{"unknown": 1}"#).is_err());
    }
}
