use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::cache::TokenCache;
use crate::capture::{BrowserOpener, CodeListener};
use crate::config::{AuthConfig, COBRAND_ID, RP_MINECRAFT, RP_XBOXLIVE, SANDBOX_RETAIL, SCOPE};
use crate::errors::{AuthError, Result, XstsError};
use crate::models::*;
use crate::pkce::PkcePair;

/// Client for the Microsoft → Xbox Live → XSTS → Minecraft token chain
#[derive(Debug, Clone)]
pub struct AuthClient {
    config: AuthConfig,
    http: Client,
}

impl AuthClient {
    /// Create a new authentication client
    pub fn new(config: AuthConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.http_timeouts.connect)
            .timeout(config.http_timeouts.request)
            .user_agent(config.user_agent.as_deref().unwrap_or("lantern-mc"))
            .build()?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Build the authorization URL for the user to visit
    #[instrument(skip(self, pkce))]
    pub fn build_authorize_url(&self, pkce: &PkcePair, state: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.endpoints.ms_authorize)?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("scope", SCOPE)
            .append_pair("state", state)
            .append_pair("cobrandid", COBRAND_ID)
            .append_pair("prompt", "select_account")
            .append_pair("code_challenge", pkce.challenge())
            .append_pair("code_challenge_method", "S256");

        debug!("Built authorize URL");
        Ok(url)
    }

    /// Extract the authorization code from a captured redirect query string
    #[instrument(skip(self, query))]
    pub fn parse_authorization_code(&self, query: &str, expected_state: &str) -> Result<String> {
        let params: std::collections::HashMap<_, _> =
            url::form_urlencoded::parse(query.as_bytes()).collect();

        if let Some(error) = params.get("error") {
            if error == "access_denied" {
                return Err(AuthError::UserCancelled);
            }
            return Err(AuthError::InvalidResponse(format!(
                "authorization error: {error}"
            )));
        }

        let code = params
            .get("code")
            .map(|c| c.to_string())
            .ok_or(AuthError::NoAuthorizationCode)?;

        match params.get("state") {
            Some(actual) if actual == expected_state => {}
            _ => return Err(AuthError::StateMismatch),
        }

        Ok(code)
    }

    /// Exchange an authorization code for Microsoft tokens
    #[instrument(skip(self, code, verifier))]
    pub async fn exchange_code(&self, code: &str, verifier: &str) -> Result<MsTokenResponse> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code_verifier", verifier),
            ("client_id", &self.config.client_id),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        debug!("Exchanging authorization code for tokens");
        let response = self
            .http
            .post(&self.config.endpoints.ms_token)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::MicrosoftAuthentication {
                client_id: self.config.client_id.clone(),
                code: code.to_string(),
                status,
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Refresh the cached Microsoft token
    ///
    /// `Ok(None)` means "no usable cache entry": the file is absent, carries
    /// no refresh token, or the endpoint rejected the refresh. None of these
    /// abort the flow; the caller falls back to interactive login.
    #[instrument(skip(self, cache))]
    pub async fn refresh(&self, cache: &TokenCache) -> Result<Option<MsTokenResponse>> {
        let Some(cached) = cache.load().await? else {
            return Ok(None);
        };

        let Some(refresh_token) = cached.refresh_token else {
            debug!("Cached token has no refresh token");
            return Ok(None);
        };

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", &refresh_token),
            ("client_id", &self.config.client_id),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        debug!("Refreshing Microsoft access token");
        let response = self
            .http
            .post(&self.config.endpoints.ms_token)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            warn!("Token refresh rejected with HTTP {status}, treating as cache miss");
            return Ok(None);
        }

        let token: MsTokenResponse = response.json().await?;
        cache.store(&token).await?;
        Ok(Some(token))
    }

    /// Acquire a Microsoft token: silent refresh first, interactive login otherwise
    #[instrument(skip_all)]
    pub async fn acquire_microsoft_token(
        &self,
        browser: &dyn BrowserOpener,
        listener: &dyn CodeListener,
        cache: &TokenCache,
    ) -> Result<MsTokenResponse> {
        let pkce = PkcePair::generate();
        let state = random_state();

        if cache.exists() {
            match self.refresh(cache).await {
                Ok(Some(token)) => {
                    debug!("Silent refresh succeeded");
                    return Ok(token);
                }
                Ok(None) => debug!("Silent refresh unavailable, falling back to interactive login"),
                Err(e) => debug!("Silent refresh failed ({e}), falling back to interactive login"),
            }
        }

        let authorize_url = self.build_authorize_url(&pkce, &state)?;
        browser.open(&authorize_url).await?;

        let query = listener.capture_query().await?;
        let code = self.parse_authorization_code(&query, &state)?;

        let token = self.exchange_code(&code, pkce.verifier()).await?;
        cache.store(&token).await?;
        Ok(token)
    }

    /// Exchange a Microsoft access token for an Xbox Live user token
    #[instrument(skip(self, ms_access_token))]
    pub async fn xbl_authenticate(&self, ms_access_token: &str) -> Result<XblAuthResponse> {
        let request = XblAuthRequest {
            properties: XblAuthProperties {
                auth_method: "RPS".to_string(),
                site_name: "user.auth.xboxlive.com".to_string(),
                rps_ticket: format!("d={ms_access_token}"),
            },
            relying_party: RP_XBOXLIVE.to_string(),
            token_type: "JWT".to_string(),
        };

        debug!("Authenticating with Xbox Live");
        let response = self
            .http
            .post(&self.config.endpoints.xbl_authenticate)
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::XboxLiveAuthentication {
                ms_access_token: ms_access_token.to_string(),
                status,
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Exchange an Xbox Live token for an XSTS token scoped to Minecraft services
    #[instrument(skip(self, xbl))]
    pub async fn xsts_authorize(&self, xbl: &XblAuthResponse) -> Result<String> {
        let request = XstsAuthRequest {
            properties: XstsAuthProperties {
                sandbox_id: SANDBOX_RETAIL.to_string(),
                user_tokens: vec![xbl.token.clone()],
            },
            relying_party: RP_MINECRAFT.to_string(),
            token_type: "JWT".to_string(),
        };

        debug!("Authorizing with XSTS");
        let response = self
            .http
            .post(&self.config.endpoints.xsts_authorize)
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            // XSTS denials come back as 401 with a decodable XErr code
            if status == StatusCode::UNAUTHORIZED
                && let Ok(denial) = serde_json::from_str::<XstsErrorResponse>(&body)
            {
                return Err(XstsError::from_xerr(denial.xerr).into());
            }

            return Err(AuthError::Xsts {
                xbl_token: xbl.token.clone(),
                status,
                body,
            });
        }

        let xsts: XstsAuthResponse = response.json().await?;
        Ok(xsts.token)
    }

    /// Exchange the Xbox identity and XSTS token for a Minecraft bearer token
    #[instrument(skip(self, xbl, xsts_token))]
    pub async fn mc_login(&self, xbl: &XblAuthResponse, xsts_token: &str) -> Result<String> {
        let uhs = xbl
            .uhs()
            .ok_or_else(|| AuthError::InvalidResponse("missing XUI display claim".to_string()))?;

        let request = McLoginRequest {
            identity_token: format!("XBL3.0 x={uhs};{xsts_token}"),
            ensure_legacy_enabled: true,
        };

        debug!("Logging in to Minecraft services");
        let response = self
            .http
            .post(&self.config.endpoints.mc_login)
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::MinecraftBearer {
                xsts_token: xsts_token.to_string(),
                status,
                body,
            });
        }

        let login: McLoginResponse = response.json().await?;
        Ok(login.access_token)
    }

    /// Run the whole chain and return the Minecraft bearer access token
    ///
    /// The four exchanges run in strict sequence; the first failing stage
    /// aborts the chain with its typed error. No retries.
    #[instrument(skip_all)]
    pub async fn acquire_bearer_token(
        &self,
        browser: &dyn BrowserOpener,
        listener: &dyn CodeListener,
        cache: &TokenCache,
    ) -> Result<String> {
        let ms = self.acquire_microsoft_token(browser, listener, cache).await?;
        let xbl = self.xbl_authenticate(&ms.access_token).await?;
        let xsts = self.xsts_authorize(&xbl).await?;
        self.mc_login(&xbl, &xsts).await
    }
}

fn random_state() -> String {
    let mut bytes = [0u8; 16];
    getrandom::fill(&mut bytes).expect("operating system RNG");
    URL_SAFE_NO_PAD.encode(bytes)
}
