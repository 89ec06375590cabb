use chrono::{DateTime, Duration, TimeZone, Utc};
use rocket::{
    fairing::{Fairing, Info, Kind},
    futures::future::{BoxFuture, FutureExt},
    tokio::{self, sync::Mutex, task::JoinHandle},
    Build, Rocket,
};

use crate::{
    error::Result,
    model::{
        common::election::Phase,
        db::election::{Election, ElectionData},
        store::Store,
    },
};

/// Seconds to wait before retrying a closer that failed to persist.
const RETRY_INTERVAL_SECONDS: i64 = 30;

/// Ends voting once the scheduled end time has passed, without waiting for
/// the next ballot or an admin refresh.
///
/// There is at most one pending closer. Scheduling replaces it.
pub struct VotingCloser {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl VotingCloser {
    pub fn new() -> Self {
        Self {
            task: Mutex::new(None),
        }
    }

    /// (Re)schedule the closer for the given election. Any pending closer is
    /// cancelled; a new one is only started while voting is open with an
    /// end time set.
    pub async fn schedule(&self, store: Store<ElectionData>, election: &Election) {
        let mut task = self.task.lock().await;
        if let Some(pending) = task.take() {
            pending.abort();
            trace!("Cancelled pending voting closer");
        }
        if election.phase != Phase::Voting || election.voting_ends_at == 0 {
            return;
        }
        // Voting stays open during the final second.
        let run_at = election
            .voting_ends_at
            .checked_add(1)
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
        let Some(run_at) = run_at else {
            warn!("Voting end time {} is out of range", election.voting_ends_at);
            return;
        };
        debug!("Voting closer scheduled for {run_at}");
        *task = Some(tokio::spawn(Self::closer(store, run_at)));
    }

    /// Is a closer waiting to run?
    #[cfg(test)]
    pub async fn is_pending(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .map_or(false, |task| !task.is_finished())
    }

    /// Sleep until `run_at`, then end voting if it is due. Retries until the
    /// change is persisted. Since this is a recursive async function, we must
    /// use `BoxFuture` to avoid an infinitely-sized state machine.
    fn closer(store: Store<ElectionData>, run_at: DateTime<Utc>) -> BoxFuture<'static, ()> {
        async fn close(store: &Store<ElectionData>) -> Result<()> {
            let mut data = store.write().await;
            if data.expire_if_due(Utc::now()) {
                data.commit().await?;
                info!("Voting window ended, election closed");
            } else {
                debug!("Voting closer had nothing to do");
            }
            Ok(())
        }

        async move {
            let wait = (run_at - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            if let Err(e) = close(&store).await {
                error!("Voting closer failed: {e}");
                warn!("Failed closer will be retried in {RETRY_INTERVAL_SECONDS} seconds");
                let retry_at = Utc::now() + Duration::seconds(RETRY_INTERVAL_SECONDS);
                Self::closer(store, retry_at).await;
            }
        }
        .boxed()
    }
}

impl Default for VotingCloser {
    fn default() -> Self {
        Self::new()
    }
}

/// A fairing that schedules the voting closer for the stored election during
/// ignition, and places a `VotingCloser` into managed state.
/// Must be attached after the fairing that opens the stores.
pub struct VotingCloserFairing;

#[rocket::async_trait]
impl Fairing for VotingCloserFairing {
    fn info(&self) -> Info {
        Info {
            name: "Voting Closer",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let store = match rocket.state::<Store<ElectionData>>() {
            Some(store) => store.clone(),
            None => {
                error!("Election store was not available when scheduling the voting closer");
                return Err(rocket);
            }
        };
        let closer = VotingCloser::new();
        let election = store.read().await.election.clone();
        closer.schedule(store, &election).await;
        Ok(rocket.manage(closer))
    }
}
