use crate::db::models::Role;
use crate::db::repositories::VoteRepository;
use crate::error::StoreError;
use crate::stats::aggregator::{Stats, compute};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Last-known aggregate and the bookkeeping that decides which of several
/// racing results may replace it.
#[derive(Debug, Default)]
struct Cache {
    stats: Option<Stats>,
    /// Last value delivered to subscribers.
    notified: Option<Stats>,
    /// Bumped on every notification.
    revision: u64,
    /// Ticket of the newest full recomputation reflected in `stats`.
    fetched: u64,
    next_ticket: u64,
}

/// Taken before a full recomputation starts reading the vote set.
#[derive(Debug, Clone, Copy)]
struct Fetch {
    ticket: u64,
    revision: u64,
}

impl Cache {
    fn begin_fetch(&mut self) -> Fetch {
        self.next_ticket += 1;
        Fetch {
            ticket: self.next_ticket,
            revision: self.revision,
        }
    }

    /// Caches a recomputed aggregate unless it is already outdated: a
    /// notification went out after the fetch began, or a later fetch landed.
    fn absorb(&mut self, fetch: Fetch, stats: Stats) -> bool {
        if fetch.revision != self.revision || fetch.ticket < self.fetched {
            return false;
        }
        self.stats = Some(stats);
        self.fetched = fetch.ticket;
        true
    }
}

/// One delivered snapshot, tagged with the revision it was published at.
#[derive(Debug, Clone)]
struct Notification {
    revision: u64,
    stats: Stats,
}

struct Inner {
    repo: Arc<dyn VoteRepository>,
    cache: Mutex<Cache>,
    sender: broadcast::Sender<Notification>,
    pending: watch::Sender<usize>,
    closed: watch::Sender<bool>,
}

impl Inner {
    fn cache(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_fetch(&self) -> Fetch {
        self.cache().begin_fetch()
    }

    /// Caches `stats` and notifies subscribers. Callers hold the cache lock,
    /// so delivery order always matches replacement order.
    fn notify(&self, cache: &mut Cache, stats: Stats) -> u64 {
        cache.stats = Some(stats.clone());
        cache.notified = Some(stats.clone());
        cache.revision += 1;
        let _ = self.sender.send(Notification {
            revision: cache.revision,
            stats,
        });
        cache.revision
    }

    fn publish(&self, stats: Stats) {
        let mut cache = self.cache();
        self.notify(&mut cache, stats);
    }

    /// Folds a recomputation into the cache, then notifies if subscribers
    /// have not yet seen the freshest cached value. Returns that value.
    fn settle(&self, fetch: Fetch, canonical: Stats) -> Stats {
        let mut cache = self.cache();
        if !cache.absorb(fetch, canonical.clone()) {
            debug!(
                ticket = fetch.ticket,
                revision = cache.revision,
                "newer stats cached, keeping them"
            );
        }
        let current = cache.stats.clone().unwrap_or(canonical);
        if cache.notified.as_ref() != Some(&current) {
            let revision = self.notify(&mut cache, current.clone());
            debug!(revision, "published recomputed stats");
        }
        current
    }
}

/// Holds the cached aggregate and fans every new snapshot out to live
/// subscribers. Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct StatsStore {
    inner: Arc<Inner>,
}

impl StatsStore {
    pub fn new(repo: Arc<dyn VoteRepository>, subscriber_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(subscriber_capacity.max(1));
        let (pending, _) = watch::channel(0);
        let (closed, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                repo,
                cache: Mutex::new(Cache::default()),
                sender,
                pending,
                closed,
            }),
        }
    }

    #[cfg(test)]
    pub fn cached(&self) -> Option<Stats> {
        self.inner.cache().stats.clone()
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }

    /// Persists a vote and returns the aggregate that includes it.
    ///
    /// With a warm cache the vote is folded into the cached aggregate and
    /// published right away; a background task then recomputes from the full
    /// vote set and publishes again only if the result differs from what
    /// subscribers last saw. With a cold cache the full recomputation happens
    /// inline.
    ///
    /// `role` and `value` must already be validated.
    pub async fn add_vote(&self, role: Role, value: i32) -> Result<Stats, StoreError> {
        self.inner.repo.create(role, value).await?;

        let optimistic = {
            let mut cache = self.inner.cache();
            match cache.stats.clone() {
                Some(previous) => {
                    let next = previous.with_vote(role, value);
                    let revision = self.inner.notify(&mut cache, next.clone());
                    Some((next, revision))
                }
                None => None,
            }
        };

        match optimistic {
            Some((stats, revision)) => {
                debug!(%role, value, revision, "published optimistic stats");
                self.spawn_reconcile();
                Ok(stats)
            }
            None => {
                let fetch = self.inner.begin_fetch();
                let votes = self.inner.repo.list_all().await?;
                let stats = self.inner.settle(fetch, compute(&votes));
                info!(total_votes = stats.total_votes, "stats cache populated");
                Ok(stats)
            }
        }
    }

    /// Recomputes from the full vote set and caches the result without
    /// notifying subscribers.
    ///
    /// Returns the freshest cached aggregate, which is the recomputed one
    /// unless a vote was published while the vote set was being read.
    pub async fn get_snapshot(&self) -> Result<Stats, StoreError> {
        self.snapshot_with_revision()
            .await
            .map(|(stats, _)| stats)
    }

    /// Like [`get_snapshot`](Self::get_snapshot), also returning the revision
    /// of the last notification the snapshot already reflects.
    pub async fn snapshot_with_revision(&self) -> Result<(Stats, u64), StoreError> {
        let fetch = self.inner.begin_fetch();
        let votes = self.inner.repo.list_all().await?;
        let stats = compute(&votes);

        let mut cache = self.inner.cache();
        cache.absorb(fetch, stats.clone());
        Ok((cache.stats.clone().unwrap_or(stats), cache.revision))
    }

    /// Like [`get_snapshot`](Self::get_snapshot), but always notifies
    /// subscribers, even when the aggregate is unchanged.
    pub async fn refresh_and_notify(&self) -> Result<Stats, StoreError> {
        let fetch = self.inner.begin_fetch();
        let votes = self.inner.repo.list_all().await?;
        let stats = compute(&votes);

        let mut cache = self.inner.cache();
        cache.fetched = cache.fetched.max(fetch.ticket);
        self.inner.notify(&mut cache, stats.clone());
        Ok(stats)
    }

    /// Deletes every vote and forces all subscribers to the new aggregate.
    pub async fn reset(&self) -> Result<Stats, StoreError> {
        self.inner.repo.delete_all().await?;
        match self.refresh_and_notify().await {
            Ok(stats) => Ok(stats),
            Err(e) => {
                warn!(error = %e, "refresh after reset failed, publishing empty stats");
                let empty = Stats::empty();
                self.inner.publish(empty.clone());
                Ok(empty)
            }
        }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.inner.sender.subscribe(),
            closed: self.inner.closed.subscribe(),
            seen: 0,
        }
    }

    /// Ends every current and future subscription. Used on shutdown so live
    /// streams finish and their connections can drain.
    pub fn close(&self) {
        self.inner.closed.send_replace(true);
    }

    /// Resolves once no reconciliation task is outstanding.
    pub async fn wait_idle(&self) {
        let mut pending = self.inner.pending.subscribe();
        let _ = pending.wait_for(|n| *n == 0).await;
    }

    fn spawn_reconcile(&self) {
        let guard = PendingGuard::new(Arc::clone(&self.inner));
        tokio::spawn(async move {
            reconcile(&guard.0).await;
            drop(guard);
        });
    }
}

async fn reconcile(inner: &Inner) {
    let fetch = inner.begin_fetch();
    let votes = match inner.repo.list_all().await {
        Ok(votes) => votes,
        Err(e) => {
            warn!(error = %e, ticket = fetch.ticket, "stats reconciliation failed");
            return;
        }
    };
    inner.settle(fetch, compute(&votes));
}

/// Counts a reconciliation task as outstanding for as long as it lives.
struct PendingGuard(Arc<Inner>);

impl PendingGuard {
    fn new(inner: Arc<Inner>) -> Self {
        inner.pending.send_modify(|n| *n += 1);
        Self(inner)
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.pending.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// A live registration with [`StatsStore`]. Dropping it removes exactly this
/// registration.
///
/// Each subscription buffers a bounded number of snapshots. A subscriber that
/// falls further behind loses the oldest ones and resumes from the newest.
pub struct Subscription {
    receiver: broadcast::Receiver<Notification>,
    closed: watch::Receiver<bool>,
    seen: u64,
}

impl Subscription {
    /// Skips queued snapshots published at or before `revision`, typically
    /// because a snapshot taken at that revision was already shown.
    pub fn skip_through(&mut self, revision: u64) {
        self.seen = self.seen.max(revision);
    }

    /// Next published snapshot, or `None` once the store is closed.
    pub async fn recv(&mut self) -> Option<Stats> {
        loop {
            let result = tokio::select! {
                biased;
                _ = self.closed.wait_for(|closed| *closed) => return None,
                result = self.receiver.recv() => result,
            };
            match result {
                Ok(notification) if notification.revision <= self.seen => {}
                Ok(notification) => {
                    self.seen = notification.revision;
                    return Some(notification.stats);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "stats subscriber lagged, dropping oldest snapshots");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    #[cfg(test)]
    pub fn try_recv(&mut self) -> Option<Stats> {
        loop {
            let notification = self.receiver.try_recv().ok()?;
            if notification.revision > self.seen {
                self.seen = notification.revision;
                return Some(notification.stats);
            }
        }
    }
}
