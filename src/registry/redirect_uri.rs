//! Redirect URI validation.
//!
//! The registry treats redirect URI syntax as a pluggable policy: anything that
//! implements [`RedirectUriValidator`] can be handed to the registry, including a
//! plain `Fn(&str) -> bool`. [`UriRedirectValidator`] is the default policy.

use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Out-of-band redirect URI used by native clients that cannot receive a callback
pub const DEFAULT_NATIVE_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Why a redirect URI was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectUriError {
    #[error("can't be blank")]
    Blank,

    #[error("must be a valid URI")]
    InvalidUri,

    #[error("cannot contain a fragment")]
    FragmentPresent,

    #[error("must be an absolute URI")]
    RelativeUri,

    #[error("must be an HTTPS/SSL URI")]
    SecuredUri,

    #[error("is not an allowed redirect URI")]
    Rejected,
}

/// Validates the redirect URI value of an application
pub trait RedirectUriValidator: Send + Sync {
    /// Check a redirect URI value, which may hold several whitespace-separated URIs
    fn validate(&self, redirect_uri: &str) -> Result<(), RedirectUriError>;
}

impl<F> RedirectUriValidator for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn validate(&self, redirect_uri: &str) -> Result<(), RedirectUriError> {
        if self(redirect_uri) {
            Ok(())
        } else {
            Err(RedirectUriError::Rejected)
        }
    }
}

/// Default redirect URI policy backed by the `url` crate
#[derive(Debug, Clone)]
pub struct UriRedirectValidator {
    /// Reject plain `http` URIs for non-loopback hosts
    force_ssl: bool,
    /// URI accepted verbatim without any further checks
    native_redirect_uri: Option<String>,
}

impl Default for UriRedirectValidator {
    fn default() -> Self {
        Self::new(true, Some(DEFAULT_NATIVE_REDIRECT_URI.to_string()))
    }
}

impl UriRedirectValidator {
    pub fn new(force_ssl: bool, native_redirect_uri: Option<String>) -> Self {
        Self {
            force_ssl,
            native_redirect_uri,
        }
    }

    fn is_native(&self, uri: &str) -> bool {
        self.native_redirect_uri.as_deref() == Some(uri)
    }

    fn validate_one(&self, uri: &str) -> Result<(), RedirectUriError> {
        if self.is_native(uri) {
            return Ok(());
        }

        let parsed = match Url::parse(uri) {
            Ok(parsed) => parsed,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                return Err(RedirectUriError::RelativeUri);
            }
            Err(_) => return Err(RedirectUriError::InvalidUri),
        };

        if parsed.fragment().is_some() {
            return Err(RedirectUriError::FragmentPresent);
        }

        let host = match parsed.host_str() {
            Some(host) if !host.is_empty() => host,
            _ => return Err(RedirectUriError::RelativeUri),
        };

        // Loopback callbacks are allowed over http for native and dev clients
        if self.force_ssl && parsed.scheme() == "http" && !is_loopback(host) {
            return Err(RedirectUriError::SecuredUri);
        }

        Ok(())
    }
}

impl RedirectUriValidator for UriRedirectValidator {
    fn validate(&self, redirect_uri: &str) -> Result<(), RedirectUriError> {
        if redirect_uri.trim().is_empty() {
            return Err(RedirectUriError::Blank);
        }

        for uri in redirect_uri.split_whitespace() {
            self.validate_one(uri)?;
        }

        Ok(())
    }
}

fn is_loopback(host: &str) -> bool {
    host == "localhost" || host == "127.0.0.1" || host == "[::1]"
}
