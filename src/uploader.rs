use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    batch::BatchAccumulator,
    flush_thread::FlushThread,
    settings::{ResolvedSettings, ServerCredentials},
    BatchConfig, Error, Event, EventBatch, HttpSettingsResolver, HttpTransport, Notification,
    OverflowStore, PackageListener, Result, SettingsResolver, Transport, UploaderConfig,
};

/// Lifecycle of an [`EventUploader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploaderState {
    /// Created but not initialized yet, or the last initialization attempt failed.
    Uninitialized,
    /// Accepting events.
    Ready,
    /// Shut down. Every event accepted before has been sent or written to the overflow store.
    Disposed,
}

enum Lifecycle {
    Uninitialized,
    Ready(Running),
    Disposed,
}

struct Running {
    pipeline: Arc<Pipeline>,
    flush_thread: FlushThread,
}

/// Uploads interactions and observations to the join service.
///
/// Events are serialized and buffered by [`EventUploader::upload`], which never blocks on the
/// network. A background thread sends batches to the join service. A batch the join service does
/// not accept is written to the overflow store. Either way, the configured [`PackageListener`] is
/// notified exactly once per batch.
///
/// The uploader must be initialized with [`EventUploader::initialize_with_token`] or
/// [`EventUploader::initialize_with_connection_string`] before it accepts events. Dropping the
/// uploader (or calling [`EventUploader::shutdown`]) flushes every buffered event.
///
/// # Examples
/// ```no_run
/// # use mwt::{Interaction, UploaderConfig};
/// let mut uploader = UploaderConfig::new("https://join.example.com")
///     .to_uploader()
///     .unwrap();
/// uploader.initialize_with_token("application-token").unwrap();
/// # let interaction: Interaction = unimplemented!();
/// uploader.upload(interaction).unwrap();
/// uploader.shutdown().unwrap();
/// ```
pub struct EventUploader {
    batch_config: BatchConfig,
    listener: Arc<dyn PackageListener + Send + Sync>,
    transport: Arc<dyn Transport + Send + Sync>,
    settings_resolver: Arc<dyn SettingsResolver + Send + Sync>,
    overflow_store: Arc<dyn OverflowStore + Send + Sync>,
    lifecycle: Lifecycle,
}

impl EventUploader {
    /// Create a new `EventUploader` using the specified configuration.
    pub fn new(config: &UploaderConfig) -> Result<EventUploader> {
        let transport = match &config.transport {
            Some(transport) => Arc::clone(transport),
            None => Arc::new(HttpTransport::new(
                &config.join_server_address,
                config.send_timeout,
            )?),
        };
        let settings_resolver = match &config.settings_resolver {
            Some(settings_resolver) => Arc::clone(settings_resolver),
            None => Arc::new(HttpSettingsResolver::new(
                config.settings_base_url.as_str(),
                config.send_timeout,
            )?),
        };

        Ok(EventUploader {
            batch_config: config.batch_config.clone(),
            listener: Arc::clone(&config.listener),
            transport,
            settings_resolver,
            overflow_store: Arc::clone(&config.overflow_store),
            lifecycle: Lifecycle::Uninitialized,
        })
    }

    pub fn state(&self) -> UploaderState {
        match self.lifecycle {
            Lifecycle::Uninitialized => UploaderState::Uninitialized,
            Lifecycle::Ready(_) => UploaderState::Ready,
            Lifecycle::Disposed => UploaderState::Disposed,
        }
    }

    /// Initialize the uploader with an application token.
    ///
    /// The token is resolved into upload settings by the settings resolver. Whether the join
    /// service accepts the token is not checked here: a rejected token shows up as
    /// [`Notification::PackageSendFailed`] once batches are sent.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the uploader has already been initialized or disposed.
    /// - Any error returned by the settings resolver. The uploader stays uninitialized.
    pub fn initialize_with_token(&mut self, token: &str) -> Result<()> {
        self.ensure_uninitialized()?;

        log::debug!(target: "mwt", "initializing uploader with application token");
        let settings = self.settings_resolver.resolve(token).inspect_err(|err| {
            log::warn!(target: "mwt", "failed to resolve upload settings: {:?}", err);
        })?;

        self.start(settings)
    }

    /// Initialize the uploader with an explicit overflow store connection string and
    /// experimental unit duration, without contacting the settings service.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the uploader has already been initialized or disposed.
    /// - [`Error::InvalidExperimentalUnitDuration`] if `experimental_unit_duration_seconds` is
    ///   not positive.
    pub fn initialize_with_connection_string(
        &mut self,
        connection_string: &str,
        experimental_unit_duration_seconds: i64,
    ) -> Result<()> {
        self.ensure_uninitialized()?;

        if experimental_unit_duration_seconds <= 0 {
            return Err(Error::InvalidExperimentalUnitDuration(
                experimental_unit_duration_seconds,
            ));
        }

        log::debug!(target: "mwt",
                    duration_seconds = experimental_unit_duration_seconds;
                    "initializing uploader with connection string");
        self.start(ResolvedSettings {
            credentials: ServerCredentials::ConnectionString(connection_string.to_owned()),
            store_connection: connection_string.to_owned(),
            experimental_unit_duration: Duration::from_secs(
                experimental_unit_duration_seconds as u64,
            ),
        })
    }

    /// Queue an event for upload. Returns as soon as the event is buffered.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if the uploader is not ready.
    /// - [`Error::Serialization`] if the event cannot be serialized.
    pub fn upload(&self, event: impl Into<Event>) -> Result<()> {
        let Lifecycle::Ready(running) = &self.lifecycle else {
            return Err(Error::InvalidState(self.state()));
        };

        let event = event.into();
        let fragment = event.to_fragment()?;

        log::trace!(target: "mwt", key = event.key(); "enqueueing event");
        if running.pipeline.accumulator.enqueue(fragment) {
            running.flush_thread.wake();
        }

        Ok(())
    }

    /// Send every buffered event now, on the calling thread.
    ///
    /// Listener notifications for the flushed batches are delivered before this returns.
    pub fn flush(&self) -> Result<()> {
        let Lifecycle::Ready(running) = &self.lifecycle else {
            return Err(Error::InvalidState(self.state()));
        };

        running.pipeline.flush_all();
        Ok(())
    }

    /// Flush every buffered event, stop the flush thread and block waiting for it to exit.
    ///
    /// Dropping the uploader does the same, but ignores errors.
    pub fn shutdown(mut self) -> Result<()> {
        self.dispose()
    }

    fn dispose(&mut self) -> Result<()> {
        let Lifecycle::Ready(running) =
            std::mem::replace(&mut self.lifecycle, Lifecycle::Disposed)
        else {
            return Ok(());
        };

        log::debug!(target: "mwt", "disposing uploader");
        let result = running.flush_thread.shutdown();
        // The flush thread drains everything on exit. If it panicked, make sure nothing that was
        // buffered is left behind.
        running.pipeline.flush_all();
        result
    }

    fn ensure_uninitialized(&self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Uninitialized => Ok(()),
            _ => Err(Error::InvalidState(self.state())),
        }
    }

    fn start(&mut self, settings: ResolvedSettings) -> Result<()> {
        let pipeline = Arc::new(Pipeline {
            settings,
            accumulator: BatchAccumulator::new(self.batch_config.clone()),
            transport: Arc::clone(&self.transport),
            overflow_store: Arc::clone(&self.overflow_store),
            listener: Arc::clone(&self.listener),
        });
        let flush_thread = FlushThread::start(Arc::clone(&pipeline))?;

        self.lifecycle = Lifecycle::Ready(Running {
            pipeline,
            flush_thread,
        });
        log::debug!(target: "mwt", "uploader is ready");
        Ok(())
    }
}

impl Drop for EventUploader {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            log::error!(target: "mwt", "error while disposing uploader: {:?}", err);
        }
    }
}

/// Everything needed to deliver a batch, shared between the uploader and its flush thread.
pub(crate) struct Pipeline {
    settings: ResolvedSettings,
    accumulator: BatchAccumulator,
    transport: Arc<dyn Transport + Send + Sync>,
    overflow_store: Arc<dyn OverflowStore + Send + Sync>,
    listener: Arc<dyn PackageListener + Send + Sync>,
}

impl Pipeline {
    pub(crate) fn time_until_ready(&self, now: Instant) -> Option<Duration> {
        self.accumulator.time_until_ready(now)
    }

    pub(crate) fn flush_ready(&self, now: Instant) {
        for batch in self.accumulator.drain_ready(now) {
            self.deliver(batch);
        }
    }

    pub(crate) fn flush_all(&self) {
        for batch in self.accumulator.drain_all() {
            self.deliver(batch);
        }
    }

    /// Send `batch`, falling back to the overflow store, and notify the listener exactly once.
    fn deliver(&self, batch: EventBatch) {
        let batch = Arc::new(batch);

        let notification = match self.transport.send(&self.settings, &batch) {
            Ok(()) => {
                log::debug!(target: "mwt", fragments = batch.len(); "batch sent");
                Notification::PackageSent { batch }
            }
            Err(send_error) => {
                log::warn!(target: "mwt",
                           fragments = batch.len();
                           "failed to send batch, writing it to the overflow store: {}", send_error);

                let error = match self
                    .overflow_store
                    .write(&self.settings.store_connection, &batch)
                {
                    Ok(()) => send_error,
                    Err(store_error) => {
                        log::error!(target: "mwt",
                                    fragments = batch.len();
                                    "failed to write batch to the overflow store: {}", store_error);
                        Error::OverflowWriteFailed {
                            send_error: Box::new(send_error),
                            store_error: Box::new(store_error),
                        }
                    }
                };
                Notification::PackageSendFailed { batch, error }
            }
        };

        let notified = catch_unwind(AssertUnwindSafe(|| self.listener.notify(notification)));
        if notified.is_err() {
            log::error!(target: "mwt", "package listener panicked");
        }
    }
}
