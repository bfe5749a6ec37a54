//! Delivery of batches to the join service.
use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::Serialize;

use crate::{
    event::{EventBatch, Fragment},
    settings::{ResolvedSettings, ServerCredentials},
    Error, Result,
};

/// Sends a batch to the join service.
///
/// A call either succeeds or returns the error that prevented delivery. Implementations must not
/// retry internally: failed batches go to the overflow store instead.
pub trait Transport {
    fn send(&self, settings: &ResolvedSettings, batch: &EventBatch) -> Result<()>;
}

/// Header carrying the storage connection string when no application token is used.
pub const STORAGE_CONNECTION_HEADER: &str = "x-storage-connection";

const JOIN_ENDPOINT: &str = "/join";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JoinRequest<'a> {
    experimental_unit_duration_in_seconds: u64,
    fragments: &'a [Fragment],
}

/// [`Transport`] posting batches as JSON over HTTP.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    /// Parsed once. A malformed address fails every send without touching the network.
    endpoint: std::result::Result<Url, url::ParseError>,
}

impl HttpTransport {
    /// Default time after which a send is considered failed.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(address: &str, timeout: Duration) -> Result<HttpTransport> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        let endpoint = Url::parse(&format!(
            "{}{}",
            address.trim_end_matches('/'),
            JOIN_ENDPOINT
        ));
        if let Err(err) = &endpoint {
            log::warn!(target: "mwt", address = address; "join server address is invalid: {}", err);
        }

        Ok(HttpTransport { client, endpoint })
    }

    pub fn endpoint(&self) -> Result<&Url> {
        self.endpoint
            .as_ref()
            .map_err(|err| Error::InvalidJoinServerAddress(*err))
    }
}

impl Transport for HttpTransport {
    fn send(&self, settings: &ResolvedSettings, batch: &EventBatch) -> Result<()> {
        let url = self.endpoint()?.clone();

        let request = self.client.post(url).json(&JoinRequest {
            experimental_unit_duration_in_seconds: settings.experimental_unit_duration.as_secs(),
            fragments: &batch.fragments,
        });
        let request = match &settings.credentials {
            ServerCredentials::Token(token) => request.bearer_auth(token),
            ServerCredentials::ConnectionString(connection_string) => {
                request.header(STORAGE_CONNECTION_HEADER, connection_string)
            }
        };

        log::debug!(target: "mwt", fragments = batch.len(); "sending batch to join server");
        let response = request.send()?;

        response.error_for_status().map_err(|err| {
            if matches!(
                err.status(),
                Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
            ) {
                log::warn!(target: "mwt", "join server rejected credentials");
                Error::Unauthorized
            } else {
                log::warn!(target: "mwt", "received non-200 response from join server: {:?}", err);
                Error::from(err)
            }
        })?;

        Ok(())
    }
}
