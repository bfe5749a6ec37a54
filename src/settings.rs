//! Resolution of an application token into upload settings.
use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::Deserialize;

use crate::{Error, Result};

/// Credentials presented to the join service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerCredentials {
    /// Application token, sent as a bearer token.
    Token(String),
    /// Storage connection string, used when the uploader was initialized without a token.
    ConnectionString(String),
}

/// Everything the uploader needs once initialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSettings {
    pub credentials: ServerCredentials,
    /// Connection descriptor of the overflow store.
    pub store_connection: String,
    /// How long the join service waits for observations of an experimental unit.
    pub experimental_unit_duration: Duration,
}

/// Turns an application token into [`ResolvedSettings`].
///
/// A successful resolution does not mean the join service will accept the credentials: that is
/// only known when the first batch is sent.
pub trait SettingsResolver {
    fn resolve(&self, token: &str) -> Result<ResolvedSettings>;
}

/// Default experimental unit duration if the settings document does not specify one.
pub const DEFAULT_EXPERIMENTAL_UNIT_DURATION: Duration = Duration::from_secs(60 * 60);

const METADATA_ENDPOINT: &str = "/Application/GetMetadata";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsDocument {
    connection_string: String,
    #[serde(default)]
    experimental_unit_duration_in_seconds: Option<i64>,
    #[serde(default)]
    join_server_token: Option<String>,
}

impl SettingsDocument {
    fn into_settings(self, token: &str) -> Result<ResolvedSettings> {
        let experimental_unit_duration = match self.experimental_unit_duration_in_seconds {
            None => DEFAULT_EXPERIMENTAL_UNIT_DURATION,
            Some(seconds) if seconds > 0 => Duration::from_secs(seconds as u64),
            Some(seconds) => return Err(Error::InvalidExperimentalUnitDuration(seconds)),
        };

        Ok(ResolvedSettings {
            credentials: ServerCredentials::Token(
                self.join_server_token.unwrap_or_else(|| token.to_owned()),
            ),
            store_connection: self.connection_string,
            experimental_unit_duration,
        })
    }
}

/// Resolves tokens against the settings service over HTTP.
///
/// The token is either an application id, looked up at the settings service, or a direct
/// `http(s)://` locator of a settings document.
pub struct HttpSettingsResolver {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpSettingsResolver {
    pub const DEFAULT_BASE_URL: &'static str = "https://mwtds.azurewebsites.net";

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<HttpSettingsResolver> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(HttpSettingsResolver {
            client,
            base_url: base_url.into(),
        })
    }

    fn settings_url(&self, token: &str) -> Result<Url> {
        if token.starts_with("http://") || token.starts_with("https://") {
            return Url::parse(token).map_err(Error::InvalidSettingsLocator);
        }

        Url::parse_with_params(
            &format!("{}{}", self.base_url, METADATA_ENDPOINT),
            &[("token", token)],
        )
        .map_err(Error::InvalidSettingsLocator)
    }
}

impl SettingsResolver for HttpSettingsResolver {
    fn resolve(&self, token: &str) -> Result<ResolvedSettings> {
        let url = self.settings_url(token)?;

        log::debug!(target: "mwt", "fetching upload settings");
        let response = self.client.get(url).send()?;

        let response = response.error_for_status().map_err(|err| {
            if matches!(
                err.status(),
                Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
            ) {
                log::warn!(target: "mwt", "settings service rejected the application token");
                Error::Unauthorized
            } else {
                log::warn!(target: "mwt", "received non-200 response while fetching upload settings: {:?}", err);
                Error::from(err)
            }
        })?;

        let document: SettingsDocument = response.json()?;
        let settings = document.into_settings(token)?;

        log::debug!(target: "mwt",
                    duration_seconds = settings.experimental_unit_duration.as_secs();
                    "resolved upload settings");

        Ok(settings)
    }
}
