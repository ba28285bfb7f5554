//! `SyncManager` (§4.G/§6.5): the single object a host embedding talks to.
//! Owns the scheduler state and every collaborator the push/pull/prune
//! pipelines need, with `sync::manager` and `sync::scheduler` kept as
//! sibling modules.

use std::sync::Arc;

use tokio::time::Instant;

use crate::config::SyncConfig;
use crate::media::MediaUploader;
use crate::notify::Notifier;
use crate::remote::RemoteStore;
use crate::store::LocalStore;
use crate::sync::prune::{self, PruneStats};
use crate::sync::pull::{self, PullStats};
use crate::sync::push::{self, PushStats};
use crate::sync::scheduler::{Admission, Scheduler};

pub struct SyncManager {
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    uploader: MediaUploader,
    notifier: Notifier,
    config: SyncConfig,
    scheduler: Scheduler,
}

impl SyncManager {
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        uploader: MediaUploader,
        config: SyncConfig,
    ) -> Self {
        let scheduler = Scheduler::new(&config);
        Self {
            store,
            remote,
            uploader,
            notifier: Notifier::new(),
            config,
            scheduler,
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Run a push cycle now, subject to the cooldown and single-flight
    /// guard (§4.G). Returns `None` if the scheduler declined to admit it.
    pub async fn trigger_push(&self) -> Option<PushStats> {
        match self.scheduler.try_start_push(Instant::now()) {
            Admission::Go => {}
            Admission::AlreadyRunning => {
                tracing::debug!("push already in flight, skipping");
                return None;
            }
            Admission::Cooldown => {
                tracing::debug!("push requested within cooldown window, skipping");
                return None;
            }
        }

        let stats = push::run(
            &self.store,
            &self.remote,
            &self.uploader,
            &self.notifier,
            &self.config,
        )
        .await;
        self.scheduler.finish();
        Some(stats)
    }

    /// Run a pull cycle. Unlike push, pull has no cooldown — §4.E is
    /// expected to be driven by the host's own polling cadence or by
    /// [`Self::background_tick`].
    pub async fn pull(&self) -> PullStats {
        pull::run(&self.store, &self.remote, &self.notifier, &self.config).await
    }

    pub async fn prune(&self, now: chrono::DateTime<chrono::Utc>) -> PruneStats {
        prune::run(&self.store, &self.notifier, &self.config, now).await
    }

    /// Entry point for a periodic background timer (§6.5): push, then
    /// pull, then prune — the same order as an interactive connectivity
    /// restoration. Connectivity loss, cooldown, and the single-flight
    /// guard all degrade this to a partial no-op rather than an error.
    pub async fn background_tick(&self, now: chrono::DateTime<chrono::Utc>) {
        self.trigger_push().await;
        self.pull().await;
        self.prune(now).await;
    }

    /// §4.G — connectivity regained: push immediately rather than waiting
    /// for the next scheduled tick, then pull so remote changes show up
    /// without waiting on the background timer too. Still subject to
    /// push's cooldown/single-flight guard.
    pub async fn on_connectivity_restored(&self) {
        tracing::debug!("connectivity restored, triggering push");
        self.trigger_push().await;
        self.pull().await;
    }
}
