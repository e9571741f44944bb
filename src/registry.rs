//! Tag registry actor
//!
//! The registry task is the only owner of the tag collection. Producers (the
//! management channel, the simulator) send [`TagCommand`]s through a
//! [`TagRegistryHandle`] and wait on a one-shot reply. Every change is
//! published as a fresh immutable snapshot on a `watch` channel, and every
//! connection holds its own receiver, so all of them observe the latest set.

use crate::tag::{Tag, index_of};
use crate::{EmulatorError, Result};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

const COMMAND_BUFFER: usize = 64;

/// Immutable point-in-time view of the tag collection.
pub type TagSnapshot = Arc<[Tag]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagAction {
    Add,
    Delete,
    Retrieve,
}

impl fmt::Display for TagAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagAction::Add => f.write_str("add"),
            TagAction::Delete => f.write_str("delete"),
            TagAction::Retrieve => f.write_str("retrieve"),
        }
    }
}

/// A request to the registry with its dedicated reply channel.
#[derive(Debug)]
pub struct TagCommand {
    pub action: TagAction,
    pub tags: Vec<Tag>,
    pub reply: oneshot::Sender<Vec<Tag>>,
}

/// Apply one action to the collection.
///
/// Returns the tags echoed back to the requester and whether the collection
/// changed. Add echoes the tags it appended, Delete the tags it removed and
/// Retrieve the whole collection.
pub fn apply(collection: &mut Vec<Tag>, action: TagAction, tags: Vec<Tag>) -> (Vec<Tag>, bool) {
    match action {
        TagAction::Add => {
            let mut added = Vec::new();
            for tag in tags {
                if index_of(collection, &tag).is_none() {
                    collection.push(tag.clone());
                    added.push(tag);
                }
            }
            let changed = !added.is_empty();
            (added, changed)
        }
        TagAction::Delete => {
            let mut removed = Vec::new();
            for tag in &tags {
                if let Some(i) = index_of(collection, tag) {
                    removed.push(collection.remove(i));
                }
            }
            let changed = !removed.is_empty();
            (removed, changed)
        }
        TagAction::Retrieve => (collection.clone(), false),
    }
}

/// Spawns the registry task.
pub struct TagRegistry;

impl TagRegistry {
    /// Start the registry with `initial` tags (duplicates dropped).
    ///
    /// The task ends when `cancel` fires or every handle is dropped.
    pub fn spawn(initial: Vec<Tag>, cancel: CancellationToken) -> TagRegistryHandle {
        let mut collection = Vec::with_capacity(initial.len());
        apply(&mut collection, TagAction::Add, initial);

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(TagSnapshot::from(collection.as_slice()));

        tokio::spawn(async move {
            Self::run(collection, command_rx, snapshot_tx, cancel).await;
        });

        TagRegistryHandle { commands: command_tx, snapshots: snapshot_rx }
    }

    async fn run(
        mut collection: Vec<Tag>,
        mut commands: mpsc::Receiver<TagCommand>,
        snapshots: watch::Sender<TagSnapshot>,
        cancel: CancellationToken,
    ) {
        info!(tags = collection.len(), "Tag registry started");

        loop {
            let command = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Tag registry cancelled");
                    break;
                }
                command = commands.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };

            let TagCommand { action, tags, reply } = command;
            let requested = tags.len();
            let (result, changed) = apply(&mut collection, action, tags);
            trace!(%action, requested, affected = result.len(), total = collection.len(), "Tag command applied");

            if changed {
                snapshots.send_replace(TagSnapshot::from(collection.as_slice()));
                debug!(
                    %action,
                    tags = collection.len(),
                    subscribers = snapshots.receiver_count(),
                    "Tag set updated"
                );
            }

            // Requester may have given up waiting
            let _ = reply.send(result);
        }

        info!(tags = collection.len(), "Tag registry stopped");
    }
}

/// Cloneable access to a running registry.
#[derive(Debug, Clone)]
pub struct TagRegistryHandle {
    commands: mpsc::Sender<TagCommand>,
    snapshots: watch::Receiver<TagSnapshot>,
}

impl TagRegistryHandle {
    pub async fn request(&self, action: TagAction, tags: Vec<Tag>) -> Result<Vec<Tag>> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(TagCommand { action, tags, reply })
            .await
            .map_err(|_| EmulatorError::RegistryClosed)?;
        response.await.map_err(|_| EmulatorError::RegistryClosed)
    }

    /// Add tags not already present; returns the ones added.
    pub async fn add(&self, tags: Vec<Tag>) -> Result<Vec<Tag>> {
        self.request(TagAction::Add, tags).await
    }

    /// Remove tags present by EPC; returns the ones removed.
    pub async fn delete(&self, tags: Vec<Tag>) -> Result<Vec<Tag>> {
        self.request(TagAction::Delete, tags).await
    }

    pub async fn retrieve(&self) -> Result<Vec<Tag>> {
        self.request(TagAction::Retrieve, Vec::new()).await
    }

    /// A new receiver of tag-set snapshots, starting at the current one.
    pub fn subscribe(&self) -> watch::Receiver<TagSnapshot> {
        let mut rx = self.snapshots.clone();
        rx.mark_unchanged();
        rx
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> TagSnapshot {
        self.snapshots.borrow().clone()
    }
}
