/// Shared Connection Guard
///
/// Owns one lazily-connected, long-lived external resource and hands the same
/// client handle to every caller. Concurrent callers that arrive while a
/// connect is in flight join that attempt instead of starting another one.
///
/// State machine:
/// - `Disconnected`: the next `acquire()` starts exactly one connect attempt
/// - `Connecting`: callers await the pending attempt (a shared future)
/// - `Connected`: callers receive a clone of the client without suspending
///
/// The pending attempt settles the state itself before any waiter observes its
/// output, so a failed attempt is never handed to a caller that arrives after
/// the state went back to `Disconnected`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Something that can open a connection to an external resource.
///
/// The returned client must be cheap to clone and safe to share between tasks;
/// every caller of [`SharedConnection::acquire`] receives a clone of it.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Client: Clone + Send + Sync + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a new connection. Called at most once per connect attempt.
    async fn connect(&self) -> Result<Self::Client, Self::Error>;

    /// Short label used in log lines.
    fn resource(&self) -> &'static str {
        "resource"
    }
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// The shared connect attempt failed. Every waiter of that attempt receives
/// the same cause.
#[derive(Debug, Error)]
#[error("connect failed: {0}")]
pub struct ConnectFailed<E: std::error::Error + 'static>(#[source] pub Arc<E>);

impl<E: std::error::Error + 'static> Clone for ConnectFailed<E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

type AttemptOutput<C> = Result<<C as Connector>::Client, Arc<<C as Connector>::Error>>;
type Attempt<C> = Shared<BoxFuture<'static, AttemptOutput<C>>>;

enum State<C: Connector> {
    Disconnected,
    Connecting(Attempt<C>),
    Connected(C::Client),
}

/// Lazily connected, process-shared client handle.
///
/// Construct one per external resource and pass it around behind an `Arc`.
pub struct SharedConnection<C: Connector> {
    connector: Arc<C>,
    state: Arc<Mutex<State<C>>>,
}

impl<C: Connector> SharedConnection<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector: Arc::new(connector),
            state: Arc::new(Mutex::new(State::Disconnected)),
        }
    }

    /// Return the shared client, connecting first if needed.
    ///
    /// # Errors
    /// Returns [`ConnectFailed`] when the connect attempt this call started or
    /// joined fails. The guard is back in `Disconnected` by then, so the next
    /// call retries.
    pub async fn acquire(&self) -> Result<C::Client, ConnectFailed<C::Error>> {
        let attempt = {
            let mut state = lock(&self.state);
            match &*state {
                State::Connected(client) => return Ok(client.clone()),
                State::Connecting(attempt) => {
                    debug!(resource = self.connector.resource(), "joining in-flight connect");
                    attempt.clone()
                }
                State::Disconnected => {
                    let attempt = self.start_attempt();
                    *state = State::Connecting(attempt.clone());
                    attempt
                }
            }
        };

        attempt.await.map_err(ConnectFailed)
    }

    /// Current state of the guard.
    pub fn status(&self) -> ConnectionStatus {
        match &*lock(&self.state) {
            State::Disconnected => ConnectionStatus::Disconnected,
            State::Connecting(_) => ConnectionStatus::Connecting,
            State::Connected(_) => ConnectionStatus::Connected,
        }
    }

    /// Drop the guard's client handle so the next `acquire()` reconnects.
    ///
    /// Clones already handed out stay usable until their holders drop them.
    /// An in-flight attempt is left alone. Returns whether a connected client
    /// was released.
    pub fn disconnect(&self) -> bool {
        let mut state = lock(&self.state);
        if matches!(*state, State::Connected(_)) {
            *state = State::Disconnected;
            info!(resource = self.connector.resource(), "released shared connection");
            true
        } else {
            false
        }
    }

    fn start_attempt(&self) -> Attempt<C> {
        let connector = Arc::clone(&self.connector);
        let state = Arc::clone(&self.state);
        let resource = connector.resource();
        debug!(resource, "starting connect attempt");

        async move {
            let outcome = connector.connect().await.map_err(Arc::new);
            let mut current = lock(&state);
            *current = match &outcome {
                Ok(client) => {
                    info!(resource, "connected");
                    State::Connected(client.clone())
                }
                Err(err) => {
                    warn!(resource, error = %err, "connect attempt failed");
                    State::Disconnected
                }
            };
            outcome
        }
        .boxed()
        .shared()
    }
}

// The lock is never held across an await and no code under it can panic
// while the state is half-written.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
