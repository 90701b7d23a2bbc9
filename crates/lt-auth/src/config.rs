use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::errors::{AuthError, Result};

/// Production endpoints for the Microsoft account flow
pub mod defaults {
    pub const MS_AUTHORIZE: &str =
        "https://login.microsoftonline.com/consumers/oauth2/v2.0/authorize";
    pub const MS_TOKEN: &str = "https://login.microsoftonline.com/consumers/oauth2/v2.0/token";
    pub const XBL_AUTHENTICATE: &str = "https://user.auth.xboxlive.com/user/authenticate";
    pub const XSTS_AUTHORIZE: &str = "https://xsts.auth.xboxlive.com/xsts/authorize";
    pub const MC_LOGIN: &str = "https://api.minecraftservices.com/authentication/login_with_xbox";

    /// Default name of the on-disk Microsoft token cache
    pub const CACHE_FILE_NAME: &str = "msa-auth.json";
}

/// OAuth scope requested from the Microsoft identity platform
pub const SCOPE: &str = "XboxLive.signin offline_access";

/// Cobrand identifier that makes the Microsoft login page show Minecraft branding
pub const COBRAND_ID: &str = "8058f65d-ce06-4c30-9559-473c9275a65d";

/// Relying parties
pub const RP_XBOXLIVE: &str = "http://auth.xboxlive.com";
pub const RP_MINECRAFT: &str = "rp://api.minecraftservices.com/";

/// Sandbox requested during XSTS authorization
pub const SANDBOX_RETAIL: &str = "RETAIL";

/// Endpoint set used by [`AuthClient`](crate::AuthClient)
///
/// Defaults to the production services; tests point these at a mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub ms_authorize: String,
    pub ms_token: String,
    pub xbl_authenticate: String,
    pub xsts_authorize: String,
    pub mc_login: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            ms_authorize: defaults::MS_AUTHORIZE.to_string(),
            ms_token: defaults::MS_TOKEN.to_string(),
            xbl_authenticate: defaults::XBL_AUTHENTICATE.to_string(),
            xsts_authorize: defaults::XSTS_AUTHORIZE.to_string(),
            mc_login: defaults::MC_LOGIN.to_string(),
        }
    }
}

impl Endpoints {
    /// Point every endpoint at `base_url` (used by tests against a mock server)
    pub fn with_base(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            ms_authorize: format!("{base}/oauth2/authorize"),
            ms_token: format!("{base}/oauth2/token"),
            xbl_authenticate: format!("{base}/user/authenticate"),
            xsts_authorize: format!("{base}/xsts/authorize"),
            mc_login: format!("{base}/authentication/login_with_xbox"),
        }
    }
}

/// HTTP client timeouts
#[derive(Debug, Clone)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            request: Duration::from_secs(30),
        }
    }
}

/// Configuration for [`AuthClient`](crate::AuthClient)
///
/// All state that the flow depends on is carried here explicitly; there are
/// no process-wide defaults.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// OAuth client ID of the registered Azure application
    pub client_id: String,

    /// OAuth redirect URI; must be a loopback address registered for the app
    pub redirect_uri: Url,

    /// Path of the Microsoft token cache file
    pub cache_file: PathBuf,

    /// Endpoint set (defaults to the production services)
    pub endpoints: Endpoints,

    /// HTTP client timeouts
    pub http_timeouts: HttpTimeouts,

    /// How long to wait for the browser redirect before giving up
    pub capture_timeout: Duration,

    /// Custom user agent (optional)
    pub user_agent: Option<String>,
}

impl AuthConfig {
    /// Create a config for `client_id` redirecting to `redirect_uri`,
    /// caching tokens at the platform default location
    pub fn new(client_id: impl Into<String>, redirect_uri: Url) -> Result<Self> {
        Ok(Self {
            client_id: client_id.into(),
            redirect_uri,
            cache_file: Self::default_cache_file()?,
            endpoints: Endpoints::default(),
            http_timeouts: HttpTimeouts::default(),
            capture_timeout: Duration::from_secs(120),
            user_agent: Some("lantern-mc".to_string()),
        })
    }

    /// Platform default location of the token cache file
    pub fn default_cache_file() -> Result<PathBuf> {
        let project_dirs = directories::ProjectDirs::from("", "", "lantern-mc").ok_or_else(|| {
            AuthError::InvalidResponse("could not determine config directory".to_string())
        })?;

        Ok(project_dirs.config_dir().join(defaults::CACHE_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_with_base_rewrites_all() {
        let endpoints = Endpoints::with_base("http://127.0.0.1:9000/");
        assert_eq!(endpoints.ms_token, "http://127.0.0.1:9000/oauth2/token");
        assert_eq!(
            endpoints.mc_login,
            "http://127.0.0.1:9000/authentication/login_with_xbox"
        );
    }

    #[test]
    fn default_endpoints_are_production() {
        let endpoints = Endpoints::default();
        assert!(endpoints.ms_authorize.starts_with("https://login.microsoftonline.com"));
        assert!(endpoints.xsts_authorize.starts_with("https://xsts.auth.xboxlive.com"));
    }
}
