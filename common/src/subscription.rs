//! Ownership of the project chat subscription.
//!
//! The page holds at most one realtime handle, keyed by
//! `(project id, chat permission)`. The handle is opened when the key is
//! acquired with chat allowed and released when the key changes.

use crate::backend::BackendError;
use crate::project::ProjectId;
use crate::realtime::{InsertEvent, InsertFilter, RealtimeFeed, Subscription};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub project_id: ProjectId,
    pub can_chat: bool,
}

impl SubscriptionKey {
    pub fn new(project_id: ProjectId, can_chat: bool) -> Self {
        Self {
            project_id,
            can_chat,
        }
    }

    /// Realtime channel name for this project.
    pub fn channel(&self) -> String {
        format!("project-{}", self.project_id)
    }
}

/// What [`ChatSubscription::ensure`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotChange {
    /// Key unchanged; the existing handle (or its absence) was kept.
    Unchanged,
    /// A new handle was opened, after releasing any previous one.
    Opened,
    /// The previous handle was released and none is needed for the new key.
    Released,
}

#[derive(Debug, Default)]
pub struct ChatSubscription {
    key: Option<SubscriptionKey>,
    handle: Option<Subscription>,
}

impl ChatSubscription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(&self) -> Option<&SubscriptionKey> {
        self.key.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Move the slot to `desired`.
    ///
    /// Same key: nothing happens, so an active handle is never re-opened.
    /// Different key: the old handle is released first, then a new one is opened
    /// if the new key allows chat. If opening fails the slot still records the new
    /// key, so the failed open is not retried for that key.
    pub async fn ensure<R: RealtimeFeed>(
        &mut self,
        desired: SubscriptionKey,
        feed: &R,
    ) -> Result<SlotChange, BackendError> {
        if self.key.as_ref() == Some(&desired) {
            return Ok(SlotChange::Unchanged);
        }

        let had_handle = self.handle.is_some();
        self.release();
        self.key = Some(desired.clone());

        if !desired.can_chat {
            return Ok(if had_handle {
                SlotChange::Released
            } else {
                SlotChange::Unchanged
            });
        }

        let filter = InsertFilter::messages_for(&desired.project_id);
        let handle = feed.subscribe(&desired.channel(), filter).await?;
        tracing::info!("Subscribed to {}", handle.channel());
        self.handle = Some(handle);
        Ok(SlotChange::Opened)
    }

    /// Release the handle, if any. The key is kept.
    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
    }

    /// Release the handle and forget the key.
    pub fn reset(&mut self) {
        self.release();
        self.key = None;
    }

    /// Next event from the active handle. Pends forever when there is none, so it
    /// can sit in a `select!` next to other sources.
    pub async fn next_event(&mut self) -> Option<InsertEvent> {
        match self.handle.as_mut() {
            Some(handle) => handle.next_event().await,
            None => futures::future::pending().await,
        }
    }
}
