use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;
use uuid::Uuid;

/// Published after every structural change to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationEvent {
    /// Monotonic, starts at 1.
    pub seq: u64,
    /// Environment whose routes changed, `None` for collection-level changes.
    pub environment: Option<Uuid>,
}

/// Everything received between the first event and the end of the quiet window.
#[derive(Debug, Default)]
pub(crate) struct Burst {
    pub last_seq: u64,
    pub environments: HashSet<Uuid>,
    /// Events were dropped by the channel, consumers must treat the whole
    /// collection as touched.
    pub lagged: bool,
    pub events: usize,
}

impl Burst {
    fn absorb(&mut self, event: MutationEvent) {
        self.last_seq = self.last_seq.max(event.seq);
        if let Some(uuid) = event.environment {
            self.environments.insert(uuid);
        }
        self.events += 1;
    }

    fn is_empty(&self) -> bool {
        self.events == 0 && !self.lagged
    }
}

pub(crate) enum Next {
    Fire(Burst),
    /// Fire once more, then exit.
    FireAndStop(Burst),
    Stop,
}

fn drain(events: &mut broadcast::Receiver<MutationEvent>, burst: &mut Burst) {
    loop {
        match events.try_recv() {
            Ok(event) => burst.absorb(event),
            Err(TryRecvError::Lagged(_)) => burst.lagged = true,
            Err(_) => break,
        }
    }
}

/// Trailing-edge debounce: waits for a first event, then keeps collecting
/// until `window` elapses without a new one.
pub(crate) async fn next_burst(
    name: &'static str,
    events: &mut broadcast::Receiver<MutationEvent>,
    shutdown: &mut broadcast::Receiver<()>,
    window: Duration,
) -> Next {
    let mut burst = Burst::default();

    // idle
    tokio::select! {
        biased;
        _ = shutdown.recv() => {
            drain(events, &mut burst);
            return if burst.is_empty() { Next::Stop } else { Next::FireAndStop(burst) };
        }
        received = events.recv() => match received {
            Ok(event) => burst.absorb(event),
            Err(RecvError::Lagged(skipped)) => {
                warn!("{name}: {skipped} mutation events dropped, recomputing everything");
                burst.lagged = true;
            }
            Err(RecvError::Closed) => return Next::Stop,
        },
    }

    // quiet window, restarted by every event
    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                drain(events, &mut burst);
                return Next::FireAndStop(burst);
            }
            received = events.recv() => match received {
                Ok(event) => burst.absorb(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("{name}: {skipped} mutation events dropped, recomputing everything");
                    burst.lagged = true;
                }
                Err(RecvError::Closed) => return Next::FireAndStop(burst),
            },
            _ = tokio::time::sleep(window) => return Next::Fire(burst),
        }
    }
}
