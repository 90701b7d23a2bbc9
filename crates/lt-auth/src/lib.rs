//! Microsoft account authentication for Minecraft launchers
//!
//! Implements the token chain a launcher walks to turn a Microsoft account
//! sign-in into a Minecraft bearer token:
//!
//! 1. OAuth2 authorization code flow with PKCE against the Microsoft
//!    identity platform (with silent refresh from a local token cache)
//! 2. Xbox Live user authentication
//! 3. XSTS authorization for the Minecraft relying party
//! 4. Minecraft services login
//!
//! The browser launch and the loopback redirect capture are capability
//! traits ([`BrowserOpener`], [`CodeListener`]); a tokio-based
//! [`LoopbackListener`] is included for desktop use.
//!
//! # Example
//!
//! ```no_run
//! use lt_auth::{AuthClient, AuthConfig, LoopbackListener, NullBrowserOpener, TokenCache};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let redirect_uri = Url::parse("http://127.0.0.1:43110/callback")?;
//!     let config = AuthConfig::new("your-azure-client-id", redirect_uri.clone())?;
//!     let cache = TokenCache::new(&config.cache_file);
//!     let capture_timeout = config.capture_timeout;
//!
//!     let client = AuthClient::new(config)?;
//!     let listener = LoopbackListener::bind(&redirect_uri, capture_timeout).await?;
//!
//!     // NullBrowserOpener: print the URL (or hand it to a GUI) yourself.
//!     let bearer = client
//!         .acquire_bearer_token(&NullBrowserOpener, &listener, &cache)
//!         .await?;
//!     println!("Minecraft bearer token: {bearer}");
//!
//!     Ok(())
//! }
//! ```
//!
//! Stage failures carry the preceding stage's payload and the raw response
//! body (see [`AuthError`]); only the silent-refresh step is non-fatal.
//! Tokens are cached as plain JSON at the configured path and are never
//! logged.

pub mod cache;
pub mod capture;
pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod pkce;

pub use cache::TokenCache;
pub use capture::{
    BrowserOpener, CodeListener, LoopbackListener, NullBrowserOpener, StaticCodeListener,
};
pub use client::AuthClient;
pub use config::{AuthConfig, Endpoints, HttpTimeouts};
pub use errors::{AuthError, Result, XstsError};
pub use models::{MsTokenResponse, XblAuthResponse};
pub use pkce::PkcePair;
