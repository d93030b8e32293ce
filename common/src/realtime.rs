//! Realtime capability: subscribe to row inserts on a channel.

use std::fmt;

use futures::channel::mpsc::UnboundedReceiver;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::backend::BackendError;
use crate::project::ProjectId;

/// Which inserted rows a channel should deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertFilter {
    pub schema: String,
    pub table: String,
    /// Row filter in `column=eq.value` form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl InsertFilter {
    /// New rows of the `messages` table for one project.
    pub fn messages_for(project_id: &ProjectId) -> Self {
        Self {
            schema: "public".into(),
            table: "messages".into(),
            filter: Some(format!("project_id=eq.{project_id}")),
        }
    }
}

/// A row insert delivered by the realtime feed.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertEvent {
    pub table: String,
    pub record: serde_json::Value,
}

impl InsertEvent {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, BackendError> {
        Ok(serde_json::from_value(self.record.clone())?)
    }
}

/// Handle to one open realtime channel.
///
/// The channel is released exactly once: by [`Subscription::close`] or on
/// drop, whichever happens first.
pub struct Subscription {
    channel: String,
    events: UnboundedReceiver<InsertEvent>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        channel: impl Into<String>,
        events: UnboundedReceiver<InsertEvent>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            channel: channel.into(),
            events,
            release: Some(Box::new(release)),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next insert, or `None` once the feed closes the channel.
    pub async fn next_event(&mut self) -> Option<InsertEvent> {
        self.events.next().await
    }

    pub fn close(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if let Some(release) = self.release.take() {
            tracing::debug!("Releasing realtime channel {}", self.channel);
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("released", &self.release.is_none())
            .finish()
    }
}

/// Opens realtime channels.
#[allow(async_fn_in_trait)]
pub trait RealtimeFeed {
    async fn subscribe(
        &self,
        channel: &str,
        filter: InsertFilter,
    ) -> Result<Subscription, BackendError>;
}

impl<R: RealtimeFeed + ?Sized> RealtimeFeed for &R {
    async fn subscribe(
        &self,
        channel: &str,
        filter: InsertFilter,
    ) -> Result<Subscription, BackendError> {
        (**self).subscribe(channel, filter).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use futures::channel::mpsc;

    use super::*;

    fn counted(releases: &Arc<AtomicUsize>) -> (mpsc::UnboundedSender<InsertEvent>, Subscription) {
        let (tx, rx) = mpsc::unbounded();
        let counter = releases.clone();
        let sub = Subscription::new("project-p1", rx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (tx, sub)
    }

    #[test]
    fn close_releases_once() {
        let releases = Arc::new(AtomicUsize::new(0));
        let (_tx, sub) = counted(&releases);
        sub.close();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases_once() {
        let releases = Arc::new(AtomicUsize::new(0));
        {
            let (_tx, _sub) = counted(&releases);
        }
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn events_flow_until_sender_closes() {
        let releases = Arc::new(AtomicUsize::new(0));
        let (tx, mut sub) = counted(&releases);
        tx.unbounded_send(InsertEvent {
            table: "messages".into(),
            record: serde_json::json!({"id": "m1"}),
        })
        .unwrap();
        drop(tx);

        futures::executor::block_on(async {
            let event = sub.next_event().await.unwrap();
            assert_eq!(event.record["id"], "m1");
            assert!(sub.next_event().await.is_none());
        });
    }

    #[test]
    fn message_filter_targets_project() {
        let filter = InsertFilter::messages_for(&ProjectId::from("p9"));
        assert_eq!(filter.table, "messages");
        assert_eq!(filter.filter.as_deref(), Some("project_id=eq.p9"));
    }
}
