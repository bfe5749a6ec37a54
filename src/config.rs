use std::{sync::Arc, time::Duration};

use crate::{
    listener::NoopPackageListener, BatchConfig, EventUploader, FileOverflowStore,
    HttpSettingsResolver, HttpTransport, OverflowStore, PackageListener, Result,
    SettingsResolver, Transport,
};

/// Configuration for [`EventUploader`].
///
/// # Examples
/// ```
/// # use mwt::{Notification, UploaderConfig};
/// let uploader = UploaderConfig::new("https://join.example.com")
///     .listener(|notification: Notification| {
///         println!("{:?}", notification);
///     })
///     .to_uploader()
///     .unwrap();
/// ```
pub struct UploaderConfig {
    pub(crate) join_server_address: String,
    pub(crate) batch_config: BatchConfig,
    pub(crate) send_timeout: Duration,
    pub(crate) settings_base_url: String,
    pub(crate) listener: Arc<dyn PackageListener + Send + Sync>,
    pub(crate) transport: Option<Arc<dyn Transport + Send + Sync>>,
    pub(crate) settings_resolver: Option<Arc<dyn SettingsResolver + Send + Sync>>,
    pub(crate) overflow_store: Arc<dyn OverflowStore + Send + Sync>,
}

impl UploaderConfig {
    /// Create a default configuration sending batches to the join service at
    /// `join_server_address`.
    pub fn new(join_server_address: impl Into<String>) -> Self {
        UploaderConfig {
            join_server_address: join_server_address.into(),
            batch_config: BatchConfig::default(),
            send_timeout: HttpTransport::DEFAULT_TIMEOUT,
            settings_base_url: HttpSettingsResolver::DEFAULT_BASE_URL.to_owned(),
            listener: Arc::new(NoopPackageListener),
            transport: None,
            settings_resolver: None,
            overflow_store: Arc::new(FileOverflowStore::new()),
        }
    }

    /// Set a listener that is notified once for every batch, whether it was sent or not.
    pub fn listener(
        &mut self,
        listener: impl PackageListener + Send + Sync + 'static,
    ) -> &mut Self {
        self.listener = Arc::new(listener);
        self
    }

    /// Override batching limits.
    pub fn batch_config(&mut self, batch_config: BatchConfig) -> &mut Self {
        self.batch_config = batch_config;
        self
    }

    /// Time after which an HTTP request is considered failed.
    pub fn send_timeout(&mut self, send_timeout: Duration) -> &mut Self {
        self.send_timeout = send_timeout;
        self
    }

    /// Override base URL of the settings service. Clients should use the default setting in most
    /// cases.
    pub fn settings_base_url(&mut self, settings_base_url: impl Into<String>) -> &mut Self {
        self.settings_base_url = settings_base_url.into();
        self
    }

    /// Replace the HTTP transport to the join service.
    pub fn transport(&mut self, transport: impl Transport + Send + Sync + 'static) -> &mut Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Replace the HTTP settings resolver used by
    /// [`EventUploader::initialize_with_token`].
    pub fn settings_resolver(
        &mut self,
        settings_resolver: impl SettingsResolver + Send + Sync + 'static,
    ) -> &mut Self {
        self.settings_resolver = Some(Arc::new(settings_resolver));
        self
    }

    /// Replace the file-based overflow store.
    pub fn overflow_store(
        &mut self,
        overflow_store: impl OverflowStore + Send + Sync + 'static,
    ) -> &mut Self {
        self.overflow_store = Arc::new(overflow_store);
        self
    }

    /// Create a new [`EventUploader`] using this configuration. The uploader still needs to be
    /// initialized before it accepts events.
    pub fn to_uploader(&self) -> Result<EventUploader> {
        EventUploader::new(self)
    }
}
