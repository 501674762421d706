//! Session-token renewal coordination.
//!
//! When an authenticated call comes back 401, the transport hands the
//! failure to the [`RenewalCoordinator`]. The coordinator guarantees that a
//! single underlying renewal exchange runs per cycle no matter how many
//! requests failed at the same time: the first failure flips the state from
//! idle to renewing and performs the exchange; every later failure parks on
//! a waiter that resolves when that one exchange finishes. Waiters are
//! released in enqueue order, each receiving the renewed access token to
//! replay its original request with.
//!
//! A failed exchange ends the session: waiters are rejected, the stored
//! credential triple is purged, and [`SessionEvent::Ended`] is broadcast.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::models::AuthPayload;

use super::credentials::{CredentialStore, REFRESH_TOKEN_KEY};
use super::session::{self, SessionEvent, SESSION_EVENT_CAPACITY};

/// Renewal failed and the session has been torn down.
///
/// Callers holding a 401 response treat this as terminal and surface their
/// original failure; the credential store has already been cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEnded;

type Waiter = oneshot::Sender<Result<String, SessionEnded>>;

enum RenewalState {
    Idle,
    Renewing { waiters: Vec<Waiter> },
}

/// Serializes token renewal across concurrent request failures.
pub struct RenewalCoordinator {
    store: Arc<dyn CredentialStore>,
    events: broadcast::Sender<SessionEvent>,
    state: Mutex<RenewalState>,
}

impl RenewalCoordinator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Self {
            store,
            events,
            state: Mutex::new(RenewalState::Idle),
        }
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Obtain a fresh access token after an authentication failure.
    ///
    /// The first caller of a cycle runs `exchange` with the stored refresh
    /// token; concurrent callers wait on that one exchange and receive the
    /// same token. The renewing flag is flipped under the lock, before the
    /// first await, so two failures observed in the same scheduling tick
    /// cannot both start an exchange.
    pub async fn renew<F, Fut>(&self, exchange: F) -> Result<String, SessionEnded>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<AuthPayload, ApiError>>,
    {
        let rx = {
            let mut state = self.state.lock().expect("renewal state lock poisoned");
            match &mut *state {
                RenewalState::Renewing { waiters } => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                RenewalState::Idle => {
                    *state = RenewalState::Renewing {
                        waiters: Vec::new(),
                    };
                    None
                }
            }
        };

        if let Some(rx) = rx {
            debug!("renewal already in flight, queueing");
            return match rx.await {
                Ok(outcome) => outcome,
                // Leader dropped without resolving the cycle.
                Err(_) => Err(SessionEnded),
            };
        }

        info!("access token rejected, starting session renewal");
        match self.run_exchange(exchange).await {
            Ok(payload) => {
                // The new pair must be readable before anyone replays.
                if let Err(e) = session::persist(self.store.as_ref(), &payload).await {
                    warn!(error = %e, "failed to persist renewed credentials");
                    self.fail_cycle().await;
                    return Err(SessionEnded);
                }
                let token = payload.access_token;
                for waiter in self.finish_cycle() {
                    let _ = waiter.send(Ok(token.clone()));
                }
                info!("session renewed");
                Ok(token)
            }
            Err(e) => {
                warn!(error = %e, "session renewal failed, ending session");
                self.fail_cycle().await;
                Err(SessionEnded)
            }
        }
    }

    async fn run_exchange<F, Fut>(&self, exchange: F) -> Result<AuthPayload, ApiError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<AuthPayload, ApiError>>,
    {
        let refresh_token = match self.store.get(REFRESH_TOKEN_KEY).await {
            Ok(Some(token)) => token,
            // No refresh token is the same terminal condition as a rejected one.
            Ok(None) => return Err(ApiError::SessionExpired),
            Err(e) => {
                warn!(error = %e, "could not read stored refresh token");
                return Err(ApiError::SessionExpired);
            }
        };
        exchange(refresh_token).await
    }

    /// Swap back to idle and take the queued waiters, preserving enqueue order.
    fn finish_cycle(&self) -> Vec<Waiter> {
        let mut state = self.state.lock().expect("renewal state lock poisoned");
        match std::mem::replace(&mut *state, RenewalState::Idle) {
            RenewalState::Renewing { waiters } => waiters,
            RenewalState::Idle => Vec::new(),
        }
    }

    async fn fail_cycle(&self) {
        for waiter in self.finish_cycle() {
            let _ = waiter.send(Err(SessionEnded));
        }
        session::clear(self.store.as_ref()).await;
        let _ = self.events.send(SessionEvent::Ended);
    }
}
