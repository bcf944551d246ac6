//! OAuth client application registry: credentials, validation and the registry service.

pub mod applications;
pub mod redirect_uri;
pub mod scopes;
pub mod token;
pub mod types;
pub mod validation;

pub use applications::ApplicationRegistry;
pub use redirect_uri::{RedirectUriError, RedirectUriValidator, UriRedirectValidator};
pub use scopes::Scopes;
pub use token::generate_token;
pub use types::{
    AccessGrant, AccessToken, Application, ApplicationAttributes, ApplicationUpdate,
    NewApplication,
};
pub use validation::{
    ConfiguredScopePolicy, Field, FieldError, Reason, ScopePolicy, ValidationErrors,
};
