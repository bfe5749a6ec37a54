use std::sync::Arc;

use crate::{Error, EventBatch};

/// Outcome of one batch, reported to a [`PackageListener`].
#[derive(Debug, Clone)]
pub enum Notification {
    /// The batch has been accepted by the join service.
    PackageSent { batch: Arc<EventBatch> },
    /// The batch could not be sent. It has been written to the overflow store, unless `error` is
    /// [`Error::OverflowWriteFailed`].
    PackageSendFailed { batch: Arc<EventBatch>, error: Error },
}

impl Notification {
    pub fn batch(&self) -> &EventBatch {
        match self {
            Notification::PackageSent { batch } => batch,
            Notification::PackageSendFailed { batch, .. } => batch,
        }
    }
}

/// Receives exactly one notification for every batch the uploader handles.
///
/// Notifications are delivered from the uploader's flush thread (or from the thread calling
/// [`EventUploader::flush`](crate::EventUploader::flush)), so implementations should return
/// quickly.
pub trait PackageListener {
    fn notify(&self, notification: Notification);
}

pub(crate) struct NoopPackageListener;
impl PackageListener for NoopPackageListener {
    fn notify(&self, _notification: Notification) {}
}

impl<T: Fn(Notification)> PackageListener for T {
    fn notify(&self, notification: Notification) {
        self(notification);
    }
}
