//! authkeep core library.
//!
//! Client-side authentication session management:
//! - `api`: the identity backend (`IdentityClient` trait, reqwest `ApiClient`)
//! - `auth`: credential token persistence (`CredentialStore` and backends)
//! - `session`: observable session state and the `SessionManager`
//! - `models`: tokens, profiles and navigation routes
//! - `config`: configuration loading and store selection

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod session;

pub use api::{ApiClient, IdentityClient};
pub use auth::CredentialStore;
pub use config::{Config, CredentialBackend};
pub use models::{CredentialToken, Route, UserProfile};
pub use session::{ChannelNavigator, NavigationSink, SessionManager, SessionState, SessionWatcher};
