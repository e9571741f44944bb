//! Simulation: replaying event cycles into the tag registry
//!
//! A [`TagSource`] yields whole tag sets ("event cycles"). The [`Simulator`]
//! pulls one cycle per interval and applies it to the registry as a delete of
//! every tag that left the field followed by an add of the new set, so
//! simulated changes reach connections through the same actor as any other
//! producer.

use crate::registry::TagRegistryHandle;
use crate::tag::{Tag, index_of, store};
use crate::{EmulatorError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A source of successive tag sets.
#[async_trait::async_trait]
pub trait TagSource: Send + 'static {
    /// The next event cycle.
    ///
    /// - `Ok(Some(tags))` - the tag set for this cycle
    /// - `Ok(None)` - the source is exhausted
    /// - `Err(e)` - this cycle could not be produced
    async fn next_cycle(&mut self) -> Result<Option<Vec<Tag>>>;
}

/// Binary event-cycle files from one directory, replayed in name order.
#[derive(Debug, Clone)]
pub struct EventCycleSource {
    files: Vec<PathBuf>,
    position: usize,
    looping: bool,
}

impl EventCycleSource {
    /// Collect every `*.bin` file in `dir`. Replay loops by default.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| EmulatorError::file_error(dir, e))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "bin"))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(EmulatorError::config(format!(
                "no event cycle files (*.bin) in {}",
                dir.display()
            )));
        }
        info!(dir = %dir.display(), cycles = files.len(), "Found event cycle files");
        Ok(Self { files, position: 0, looping: true })
    }

    /// Stop after the last file instead of starting over.
    pub fn once(mut self) -> Self {
        self.looping = false;
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait::async_trait]
impl TagSource for EventCycleSource {
    async fn next_cycle(&mut self) -> Result<Option<Vec<Tag>>> {
        if self.position == self.files.len() {
            if !self.looping {
                return Ok(None);
            }
            self.position = 0;
        }
        let path = self.files[self.position].clone();
        self.position += 1;

        debug!(file = %path.display(), "Loading event cycle");
        tokio::task::spawn_blocking(move || store::load_binary(&path))
            .await
            .map_err(|e| EmulatorError::parse("event cycle", e.to_string()))?
            .map(Some)
    }
}

/// Spawns the simulation task.
pub struct Simulator;

impl Simulator {
    pub fn spawn<S>(
        source: S,
        registry: TagRegistryHandle,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()>
    where
        S: TagSource,
    {
        tokio::spawn(async move {
            Self::run(source, registry, interval, cancel).await;
        })
    }

    async fn run<S>(mut source: S, registry: TagRegistryHandle, interval: Duration, cancel: CancellationToken)
    where
        S: TagSource,
    {
        info!(interval = ?interval, "Simulator started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0u64;
        let mut error_count = 0u32;
        const MAX_ERRORS: u32 = 10;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Simulator cancelled");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let result = match source.next_cycle().await {
                Ok(Some(tags)) => apply_cycle(&registry, tags).await,
                Ok(None) => {
                    info!("Event cycles exhausted after {} cycles", cycles);
                    break;
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    cycles += 1;
                    error_count = 0;
                }
                Err(EmulatorError::RegistryClosed) => {
                    debug!("Tag registry stopped, ending simulation");
                    break;
                }
                Err(e) => {
                    error_count += 1;
                    error!("Simulation error ({}/{}): {}", error_count, MAX_ERRORS, e);
                    if error_count >= MAX_ERRORS {
                        error!("Too many simulation errors, stopping");
                        break;
                    }
                }
            }
        }

        info!("Simulator ended ({} cycles applied)", cycles);
    }
}

/// Replace the registry contents with `tags` through delete + add.
pub async fn apply_cycle(registry: &TagRegistryHandle, tags: Vec<Tag>) -> Result<()> {
    let current = registry.retrieve().await?;
    let gone: Vec<Tag> = current.into_iter().filter(|tag| index_of(&tags, tag).is_none()).collect();

    let removed = if gone.is_empty() { 0 } else { registry.delete(gone).await?.len() };
    let added = registry.add(tags).await?.len();
    if removed > 0 || added > 0 {
        info!(added, removed, "Applied event cycle");
    } else {
        warn!("Event cycle identical to the current tag set");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TagRegistry;
    use crate::test_utils::{legacy_fixture_tags, sequential_tags, write_event_cycles};

    struct ScriptedSource(std::vec::IntoIter<Result<Option<Vec<Tag>>>>);

    #[async_trait::async_trait]
    impl TagSource for ScriptedSource {
        async fn next_cycle(&mut self) -> Result<Option<Vec<Tag>>> {
            self.0.next().unwrap_or(Ok(None))
        }
    }

    #[test]
    fn from_dir_requires_cycle_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a cycle").unwrap();
        assert!(matches!(EventCycleSource::from_dir(dir.path()), Err(EmulatorError::Config { .. })));
        assert!(matches!(
            EventCycleSource::from_dir(dir.path().join("missing")),
            Err(EmulatorError::File { .. })
        ));
    }

    #[tokio::test]
    async fn cycles_replay_in_name_order_and_loop() {
        let dir = tempfile::tempdir().unwrap();
        write_event_cycles(dir.path(), &[sequential_tags(1), sequential_tags(2), sequential_tags(3)]);

        let mut source = EventCycleSource::from_dir(dir.path()).unwrap();
        assert_eq!(source.len(), 3);
        let lens: Vec<usize> = {
            let mut lens = Vec::new();
            for _ in 0..4 {
                lens.push(source.next_cycle().await.unwrap().unwrap().len());
            }
            lens
        };
        assert_eq!(lens, vec![1, 2, 3, 1]);

        let mut once = EventCycleSource::from_dir(dir.path()).unwrap().once();
        for _ in 0..3 {
            assert!(once.next_cycle().await.unwrap().is_some());
        }
        assert!(once.next_cycle().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn apply_cycle_replaces_tag_set() {
        let registry = TagRegistry::spawn(legacy_fixture_tags(), CancellationToken::new());
        let mut next = sequential_tags(2);
        next.push(legacy_fixture_tags()[0].clone());

        apply_cycle(&registry, next.clone()).await.unwrap();
        let current = registry.retrieve().await.unwrap();
        assert_eq!(current.len(), 3);
        for tag in &next {
            assert!(index_of(&current, tag).is_some());
        }
    }

    #[tokio::test]
    async fn simulator_drives_registry_until_exhausted() {
        let registry = TagRegistry::spawn(Vec::new(), CancellationToken::new());
        let mut updates = registry.subscribe();
        let source = ScriptedSource(
            vec![
                Ok(Some(sequential_tags(4))),
                Err(EmulatorError::parse("event cycle", "corrupt")),
                Ok(Some(sequential_tags(2))),
            ]
            .into_iter(),
        );

        let handle = Simulator::spawn(source, registry.clone(), Duration::from_millis(5), CancellationToken::new());
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();

        assert!(updates.has_changed().unwrap());
        assert_eq!(updates.borrow_and_update().len(), 2);
        assert_eq!(registry.retrieve().await.unwrap(), sequential_tags(2));
    }

    #[tokio::test]
    async fn simulator_stops_on_cancel() {
        let registry = TagRegistry::spawn(Vec::new(), CancellationToken::new());
        let dir = tempfile::tempdir().unwrap();
        write_event_cycles(dir.path(), &[sequential_tags(1)]);
        let source = EventCycleSource::from_dir(dir.path()).unwrap();

        let cancel = CancellationToken::new();
        let handle = Simulator::spawn(source, registry, Duration::from_millis(10), cancel.clone());
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
    }
}
