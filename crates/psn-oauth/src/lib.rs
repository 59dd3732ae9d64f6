mod error;

pub use error::{Error, Result};

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;

/// Fixed prefix of every generated device identifier.
pub const DUID_PREFIX: &str = "0000000700410080";

/// Production origin of the Sony authentication service.
pub const DEFAULT_AUTH_BASE: &str = "https://auth.api.sonyentertainmentnetwork.com";

/// OAuth endpoints and client credentials for one provider.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret, used for HTTP Basic auth at the token endpoint
    pub client_secret: String,
    /// Authorization endpoint the user logs in through
    pub auth_url: String,
    /// Token endpoint grants are exchanged at
    pub token_url: String,
    /// Redirect URI registered for the client
    pub redirect_uri: String,
    /// OAuth scope(s), space separated
    pub scope: String,
}

impl OAuthConfig {
    /// Configuration for the PSN Remote Play client.
    ///
    /// `base` overrides the authentication service origin; pass `None` for
    /// the production service.
    pub fn remote_play(base: Option<&str>) -> Self {
        let base = base.unwrap_or(DEFAULT_AUTH_BASE).trim_end_matches('/');
        Self {
            client_id: "ba495a24-818c-472b-b12d-ff231c1b5745".to_string(),
            client_secret: "mvaiZkRsAsI1IBkY".to_string(),
            auth_url: format!("{base}/2.0/oauth/authorize"),
            token_url: format!("{base}/2.0/oauth/token"),
            redirect_uri: "https://remoteplay.dl.playstation.net/remoteplay/redirect".to_string(),
            scope: "psn:clientapp referenceDataService:countryConfig.read \
                    pushNotification:webSocket.desktop.connect \
                    sessionManager:remotePlaySession.system.update"
                .to_string(),
        }
    }
}

/// Token set returned by the token endpoint.
///
/// Fields absent from the response decode to empty values; the endpoint is
/// expected to return all three on success.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenSet {
    /// Access token the streaming client authenticates API calls with
    #[serde(default)]
    pub access_token: String,
    /// Refresh token for obtaining new access tokens without a login
    #[serde(default)]
    pub refresh_token: String,
    /// Access token lifetime in seconds
    #[serde(default)]
    pub expires_in: u64,
}

/// Generate a pseudo-unique device identifier: the fixed prefix followed by
/// 16 bytes from the OS random source as lowercase hex, 48 characters total.
pub fn generate_duid() -> Result<String> {
    let mut bytes = [0u8; 16];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(format!("{DUID_PREFIX}{}", hex::encode(bytes)))
}

/// Build the authorization URL for the login page, with the device
/// identifier injected as a query parameter.
pub fn build_auth_url(config: &OAuthConfig, duid: &str) -> String {
    format!(
        "{}?service_entity=urn:service-entity:psn&\
        response_type=code&\
        client_id={}&\
        redirect_uri={}&\
        scope={}&\
        duid={}&\
        request_locale=en_US&\
        ui=pr&\
        service_logo=ps&\
        layout_type=popup&\
        smcid=remoteplay&\
        prompt=always&\
        PlatformPrivacyWs1=minimal",
        config.auth_url,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode(&config.scope),
        urlencoding::encode(duid),
    )
}

/// Extract the `code` query parameter from the redirect URL the login page
/// sent the user to.
///
/// This is the only validation the pasted line gets; it runs before any
/// network call.
pub fn authorization_code_from_redirect(redirect: &str) -> Result<String> {
    let url = url::Url::parse(redirect.trim())?;
    url.query_pairs()
        .find(|(key, value)| key == "code" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
        .ok_or(Error::MissingAuthorizationCode)
}

/// A grant exchangeable for a [`TokenSet`] at the token endpoint.
#[derive(Debug, Clone)]
pub enum TokenGrant {
    /// Authorization code extracted from the login redirect
    AuthorizationCode { code: String },
    /// Refresh token from an earlier authorization-code exchange
    RefreshToken { refresh_token: String },
}

impl TokenGrant {
    /// Form fields submitted for this grant.
    fn form(&self, config: &OAuthConfig) -> Vec<(&'static str, String)> {
        match self {
            TokenGrant::AuthorizationCode { code } => vec![
                ("grant_type", "authorization_code".to_string()),
                ("code", code.clone()),
                ("redirect_uri", config.redirect_uri.clone()),
            ],
            TokenGrant::RefreshToken { refresh_token } => vec![
                ("grant_type", "refresh_token".to_string()),
                ("refresh_token", refresh_token.clone()),
                ("scope", config.scope.clone()),
                ("redirect_uri", config.redirect_uri.clone()),
            ],
        }
    }
}

/// Exchange a grant for a token set.
///
/// POSTs the URL-encoded form to the token endpoint with HTTP Basic
/// authentication from the config's client credentials and decodes the JSON
/// response body. Any network failure, non-success status, or decode failure
/// is returned to the caller; nothing is retried.
pub async fn exchange_token(config: &OAuthConfig, grant: &TokenGrant) -> Result<TokenSet> {
    let client = reqwest::Client::new();
    let response = client
        .post(&config.token_url)
        .basic_auth(&config.client_id, Some(&config.client_secret))
        .form(&grant.form(config))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::TokenEndpoint(status));
    }

    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

/// Write the human-readable credentials file: access token, refresh token,
/// and expiry, one per line.
pub fn write_credentials(path: &Path, tokens: &TokenSet) -> Result<()> {
    persist(path, |writer| {
        writeln!(writer, "Access Token: {}", tokens.access_token)?;
        writeln!(writer, "Refresh Token: {}", tokens.refresh_token)?;
        writeln!(writer, "Expiry Date: {}", tokens.expires_in)
    })
}

/// Write the bare access-token file consumed by the streaming client.
pub fn write_access_token(path: &Path, tokens: &TokenSet) -> Result<()> {
    persist(path, |writer| writeln!(writer, "{}", tokens.access_token))
}

/// Truncate or create `path`, fill it through a buffered writer, and flush
/// before close. Re-running therefore overwrites rather than appends.
fn persist(path: &Path, fill: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>) -> Result<()> {
    let file = File::create(path).map_err(|source| Error::OutputFile {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    fill(&mut writer)
        .and_then(|()| writer.flush())
        .map_err(|source| Error::OutputFile {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_set(access: &str, refresh: &str, expires: u64) -> TokenSet {
        TokenSet {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            expires_in: expires,
        }
    }

    #[test]
    fn duid_has_the_fixed_prefix_and_length() {
        let duid = generate_duid().unwrap();
        assert_eq!(duid.len(), 48);
        assert!(duid.starts_with(DUID_PREFIX));
        assert!(
            duid.chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[test]
    fn duid_differs_between_runs() {
        assert_ne!(generate_duid().unwrap(), generate_duid().unwrap());
    }

    #[test]
    fn auth_url_carries_the_device_id() {
        let config = OAuthConfig::remote_play(None);
        let duid = generate_duid().unwrap();
        let auth_url = build_auth_url(&config, &duid);

        assert!(auth_url.starts_with(&format!("{}?", config.auth_url)));
        assert!(auth_url.contains("response_type=code"));
        assert!(auth_url.contains("client_id=ba495a24-818c-472b-b12d-ff231c1b5745"));

        let parsed = url::Url::parse(&auth_url).unwrap();
        let query: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(query.contains(&("duid".to_string(), duid)));
        assert!(query.contains(&("redirect_uri".to_string(), config.redirect_uri.clone())));
        assert!(query.contains(&("scope".to_string(), config.scope.clone())));
    }

    #[test]
    fn auth_base_override_rebuilds_both_endpoints() {
        let config = OAuthConfig::remote_play(Some("http://127.0.0.1:9000/"));
        assert_eq!(config.auth_url, "http://127.0.0.1:9000/2.0/oauth/authorize");
        assert_eq!(config.token_url, "http://127.0.0.1:9000/2.0/oauth/token");
    }

    #[test]
    fn redirect_code_is_extracted() {
        let code = authorization_code_from_redirect(
            "https://remoteplay.dl.playstation.net/remoteplay/redirect?code=ABC123&cid=xyz",
        )
        .unwrap();
        assert_eq!(code, "ABC123");
    }

    #[test]
    fn redirect_line_is_trimmed_before_parsing() {
        let code = authorization_code_from_redirect(
            " https://remoteplay.dl.playstation.net/remoteplay/redirect?code=ABC123\n",
        )
        .unwrap();
        assert_eq!(code, "ABC123");
    }

    #[test]
    fn redirect_without_code_is_rejected() {
        let err = authorization_code_from_redirect(
            "https://remoteplay.dl.playstation.net/remoteplay/redirect?cid=xyz",
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingAuthorizationCode));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn redirect_with_empty_code_is_rejected() {
        let err = authorization_code_from_redirect(
            "https://remoteplay.dl.playstation.net/remoteplay/redirect?code=",
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingAuthorizationCode));
    }

    #[test]
    fn unparsable_redirect_is_rejected() {
        let err = authorization_code_from_redirect("not a url").unwrap_err();
        assert!(matches!(err, Error::InvalidRedirectUrl(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn token_set_decodes_the_endpoint_response() {
        let tokens: TokenSet = serde_json::from_str(
            r#"{"access_token":"A","refresh_token":"B","expires_in":3600}"#,
        )
        .unwrap();
        assert_eq!(tokens.access_token, "A");
        assert_eq!(tokens.refresh_token, "B");
        assert_eq!(tokens.expires_in, 3600);
    }

    #[test]
    fn token_set_tolerates_missing_fields() {
        let tokens: TokenSet = serde_json::from_str(r#"{"refresh_token":"B"}"#).unwrap();
        assert_eq!(tokens.access_token, "");
        assert_eq!(tokens.refresh_token, "B");
        assert_eq!(tokens.expires_in, 0);
    }

    #[test]
    fn authorization_code_grant_form_fields() {
        let config = OAuthConfig::remote_play(None);
        let form = TokenGrant::AuthorizationCode {
            code: "ABC123".to_string(),
        }
        .form(&config);
        assert_eq!(
            form,
            vec![
                ("grant_type", "authorization_code".to_string()),
                ("code", "ABC123".to_string()),
                ("redirect_uri", config.redirect_uri.clone()),
            ]
        );
    }

    #[test]
    fn refresh_grant_form_fields() {
        let config = OAuthConfig::remote_play(None);
        let form = TokenGrant::RefreshToken {
            refresh_token: "R".to_string(),
        }
        .form(&config);
        assert_eq!(
            form,
            vec![
                ("grant_type", "refresh_token".to_string()),
                ("refresh_token", "R".to_string()),
                ("scope", config.scope.clone()),
                ("redirect_uri", config.redirect_uri.clone()),
            ]
        );
    }

    #[test]
    fn credentials_file_has_exactly_three_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.txt");
        write_credentials(&path, &token_set("A", "B", 3600)).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "Access Token: A\nRefresh Token: B\nExpiry Date: 3600\n");
    }

    #[test]
    fn token_file_holds_only_the_access_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.txt");
        write_access_token(&path, &token_set("A", "B", 3600)).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "A\n");
    }

    #[test]
    fn rewriting_overwrites_instead_of_appending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.txt");
        write_credentials(&path, &token_set("a-much-longer-first-token", "R1", 7200)).unwrap();
        write_credentials(&path, &token_set("A", "B", 3600)).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "Access Token: A\nRefresh Token: B\nExpiry Date: 3600\n");
    }

    #[test]
    fn unwritable_output_path_reports_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("credentials.txt");
        let err = write_credentials(&path, &token_set("A", "B", 3600)).unwrap_err();
        assert!(matches!(err, Error::OutputFile { .. }));
        assert_eq!(err.exit_code(), 3);
    }
}
