use thiserror::Error;

/// Errors raised by the authentication pipeline
///
/// Each exchange stage has its own variant carrying the payload that fed the
/// failing request and the raw response body, so a failure can be diagnosed
/// without retrying the chain.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Microsoft token exchange failed for client {client_id} (HTTP {status}): {body}")]
    MicrosoftAuthentication {
        client_id: String,
        code: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Xbox Live authentication failed (HTTP {status}): {body}")]
    XboxLiveAuthentication {
        ms_access_token: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("XSTS authorization failed (HTTP {status}): {body}")]
    Xsts {
        xbl_token: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Minecraft login failed (HTTP {status}): {body}")]
    MinecraftBearer {
        xsts_token: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("XSTS authorization denied: {0}")]
    XstsDenied(#[from] XstsError),

    #[error("redirect carried no authorization code")]
    NoAuthorizationCode,

    #[error("timed out waiting for the browser redirect")]
    AuthorizationTimeout,

    #[error("user cancelled the authentication flow")]
    UserCancelled,

    #[error("OAuth state mismatch")]
    StateMismatch,

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// XSTS denial reasons decoded from the `XErr` field
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XstsError {
    #[error("account has no Xbox profile (XErr 2148916233)")]
    NoXboxAccount,

    #[error("Xbox Live is not available in this region (XErr 2148916235)")]
    RegionNotSupported,

    #[error("adult verification required (XErr 2148916236/2148916237)")]
    AdultVerificationRequired,

    #[error("child account must be added to a family (XErr 2148916238)")]
    ChildAccountRequiresFamily,

    #[error("unknown XSTS error code {0}")]
    Unknown(u64),
}

impl XstsError {
    pub fn from_xerr(code: u64) -> Self {
        match code {
            2148916233 => Self::NoXboxAccount,
            2148916235 => Self::RegionNotSupported,
            2148916236 | 2148916237 => Self::AdultVerificationRequired,
            2148916238 => Self::ChildAccountRequiresFamily,
            code => Self::Unknown(code),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
