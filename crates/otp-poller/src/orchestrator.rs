//! Single-writer event loop driving rental sessions to their OTP.
//!
//! ```text
//! rent command → create (requested → requesting) → spawn create call
//! create result → patch (allocated) → reconcile → poll timer starts
//! timer tick → one check in flight per session → check result → patch
//!            → dispatcher observes the change → reconcile stops the timer
//! ```
//!
//! Network calls run in spawned tasks and report back through the event
//! channel, so every store write happens on the loop.

use crate::config::PollerConfig;
use crate::error::PollerError;
use crate::fetcher::{CheckResult, OtpFetcher};
use crate::heartbeat::Heartbeat;
use crate::notify::NotificationDispatcher;
use crate::scheduler::PollTimers;
use chrono::Utc;
use rental_client::{
    CreateRentalRequest, CreateRentalResponse, RemoteSession, RentalApiError, RentalBackend,
};
use rental_store::{
    resolve_carrier, Carrier, Provider, RentalSession, SessionChange, SessionId, SessionPatch,
    SessionStatus, SessionStore,
};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

type Reply<T> = oneshot::Sender<Result<T, PollerError>>;

/// Operator requests.
pub(crate) enum Command {
    Rent {
        provider: Provider,
        carrier: Option<Carrier>,
        reply: Reply<SessionId>,
    },
    Cancel {
        session_id: SessionId,
        reply: Reply<()>,
    },
    Complete {
        session_id: SessionId,
        reply: Reply<()>,
    },
    Shutdown,
}

/// Everything the loop reacts to.
pub(crate) enum Event {
    Command(Command),
    Tick(SessionId),
    CheckDone {
        session_id: SessionId,
        result: CheckResult,
    },
    RentalCreated {
        session_id: SessionId,
        result: Result<CreateRentalResponse, RentalApiError>,
    },
    Heartbeat,
    Refreshed(Result<Vec<RemoteSession>, RentalApiError>),
}

/// Owns the session store's write side, the poll timers and the notifier.
pub struct OtpOrchestrator {
    store: SessionStore,
    backend: Arc<dyn RentalBackend>,
    fetcher: OtpFetcher,
    dispatcher: NotificationDispatcher,
    timers: PollTimers,
    heartbeat: Heartbeat,
    in_flight: HashSet<SessionId>,
    /// Sessions whose create call has not answered yet.
    creating: HashSet<SessionId>,
    refreshing: bool,
    checks_started: u64,
    max_retries: u32,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
}

impl OtpOrchestrator {
    pub fn new(
        backend: Arc<dyn RentalBackend>,
        store: SessionStore,
        dispatcher: NotificationDispatcher,
        config: &PollerConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            store,
            fetcher: OtpFetcher::new(backend.clone()),
            backend,
            dispatcher,
            timers: PollTimers::new(config.poll_interval, events_tx.clone()),
            heartbeat: Heartbeat::new(
                config.heartbeat_enabled,
                config.heartbeat_interval,
                events_tx.clone(),
            ),
            in_flight: HashSet::new(),
            creating: HashSet::new(),
            refreshing: false,
            checks_started: 0,
            max_retries: config.max_retries,
            events_tx,
            events_rx,
        }
    }

    /// A cloneable handle for issuing commands.
    pub fn handle(&self) -> OrchestratorHandle {
        OrchestratorHandle {
            events: self.events_tx.clone(),
            store: self.store.clone(),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn timers(&self) -> &PollTimers {
        &self.timers
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat.is_running()
    }

    pub fn is_in_flight(&self, session_id: &str) -> bool {
        self.in_flight.contains(session_id)
    }

    /// OTP checks dispatched so far.
    pub fn checks_started(&self) -> u64 {
        self.checks_started
    }

    /// Run until shutdown, then cancel every timer and release numbers
    /// whose create call was still pending.
    pub async fn run(mut self) {
        info!("OTP orchestrator started");
        while self.step().await {}
        self.shutdown();
        self.release_pending_creates().await;
        info!("OTP orchestrator stopped");
    }

    /// Wait for outstanding create calls and cancel every number they
    /// allocated. Other events are dropped.
    async fn release_pending_creates(&mut self) {
        if !self.creating.is_empty() {
            info!("Waiting for {} pending rentals to release", self.creating.len());
        }

        while !self.creating.is_empty() {
            let Some(event) = self.events_rx.recv().await else {
                break;
            };
            let Event::RentalCreated { session_id, result } = event else {
                continue;
            };
            self.creating.remove(&session_id);

            let Ok(created) = result else {
                continue;
            };
            match self
                .store
                .patch(&session_id, &SessionPatch::status(SessionStatus::Cancelled))
                .await
            {
                Ok(change) => self.record(change),
                Err(e) => error!(%session_id, "Failed to cancel session: {}", e),
            }
            if let Err(e) = self.backend.cancel_rental(&created.session_id).await {
                warn!(request_id = %created.session_id, "Provider cancel failed: {}", e);
            }
        }
    }

    /// Handle the next event. Returns false once shutdown was requested.
    pub async fn step(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(Event::Command(Command::Shutdown)) | None => false,
            Some(event) => {
                self.handle_event(event).await;
                true
            }
        }
    }

    /// Stop all poll timers and the heartbeat.
    pub fn shutdown(&mut self) {
        let stopped = self.timers.len();
        self.timers.stop_all();
        self.heartbeat.stop();
        debug!("Stopped {} poll timers", stopped);
    }

    pub(crate) async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Command(Command::Rent {
                provider,
                carrier,
                reply,
            }) => {
                let _ = reply.send(self.rent(provider, carrier).await);
            }
            Event::Command(Command::Cancel { session_id, reply }) => {
                let _ = reply.send(self.cancel(&session_id).await);
            }
            Event::Command(Command::Complete { session_id, reply }) => {
                let _ = reply.send(self.complete(&session_id).await);
            }
            Event::Command(Command::Shutdown) => self.shutdown(),
            Event::Tick(session_id) => self.on_tick(session_id).await,
            Event::CheckDone { session_id, result } => {
                self.on_check_done(&session_id, result).await;
            }
            Event::RentalCreated { session_id, result } => {
                self.on_rental_created(&session_id, result).await;
            }
            Event::Heartbeat => self.on_heartbeat(),
            Event::Refreshed(result) => self.on_refreshed(result).await,
        }
    }

    /// Bring timers and the heartbeat in line with the current sessions.
    ///
    /// Sessions still waiting past the age ceiling are expired first.
    pub async fn reconcile(&mut self) {
        let now = Utc::now();
        let aged_out: Vec<SessionId> = self
            .store
            .all()
            .await
            .into_iter()
            .filter(|s| {
                s.status.is_awaiting_otp() && !s.has_otp() && !s.is_within_age_ceiling(now)
            })
            .map(|s| s.session_id)
            .collect();
        for session_id in aged_out {
            let patch =
                SessionPatch::failed(SessionStatus::Expired, "no code within the rental window");
            match self.store.patch(&session_id, &patch).await {
                Ok(change) => self.record(change),
                Err(e) => error!(%session_id, "Failed to expire session: {}", e),
            }
        }

        let sessions = self.store.all().await;
        let outcome = self.timers.reconcile(&sessions, now);
        if !outcome.started.is_empty() || !outcome.stopped.is_empty() {
            debug!(
                "Reconciled timers: {} started, {} stopped, {} active",
                outcome.started.len(),
                outcome.stopped.len(),
                self.timers.len()
            );
        }
        self.heartbeat.update(&sessions);
    }

    /// Run network work off the loop and feed its outcome back as an event.
    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = Option<Event>> + Send + 'static,
    {
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            if let Some(event) = task.await {
                // Send fails only once the loop is gone.
                let _ = events.send(event);
            }
        });
    }

    fn record(&mut self, change: SessionChange) {
        self.dispatcher.observe(&change);
    }

    async fn rent(
        &mut self,
        provider: Provider,
        carrier: Option<Carrier>,
    ) -> Result<SessionId, PollerError> {
        let carrier = resolve_carrier(provider, carrier)?;

        let session =
            RentalSession::requested(provider, Some(carrier)).with_max_retries(self.max_retries);
        let session_id = session.session_id.clone();
        self.store.create(session).await?;
        let change = self
            .store
            .patch(&session_id, &SessionPatch::status(SessionStatus::Requesting))
            .await?;
        self.record(change);

        info!(%session_id, "Renting a {} number from {}", carrier, provider);
        self.creating.insert(session_id.clone());

        let backend = self.backend.clone();
        let id = session_id.clone();
        self.spawn(async move {
            let request = CreateRentalRequest::new(provider, carrier);
            let result = backend.create_rental(&request).await;
            Some(Event::RentalCreated {
                session_id: id,
                result,
            })
        });

        Ok(session_id)
    }

    async fn on_rental_created(
        &mut self,
        session_id: &str,
        result: Result<CreateRentalResponse, RentalApiError>,
    ) {
        self.creating.remove(session_id);

        let cancelled = self
            .store
            .get(session_id)
            .await
            .is_some_and(|s| s.status == SessionStatus::Cancelled);
        if cancelled {
            // Cancelled before the provider answered; give the number back.
            if let Ok(created) = result {
                info!(session_id, "Releasing {} allocated after cancel", created.phone_number);
                self.release(created.session_id);
            }
            return;
        }

        let patch = match result {
            Ok(created) => {
                info!(session_id, "Allocated {} ({})", created.phone_number, created.session_id);
                SessionPatch {
                    status: Some(SessionStatus::Allocated),
                    phone_number: Some(created.phone_number),
                    provider_request_id: Some(created.session_id),
                    price: created.price,
                    ..Default::default()
                }
            }
            Err(e) => {
                let e = PollerError::from(e);
                warn!(session_id, "Rental failed: {}", e);
                SessionPatch::failed(SessionStatus::Error, e.to_string())
            }
        };

        match self.store.patch(session_id, &patch).await {
            Ok(change) => self.record(change),
            Err(e) => error!(session_id, "Dropping create result: {}", e),
        }
        self.reconcile().await;
    }

    async fn on_tick(&mut self, session_id: SessionId) {
        if !self.timers.is_active(&session_id) {
            debug!(%session_id, "Tick for a stopped timer");
            return;
        }
        if self.in_flight.contains(&session_id) {
            debug!(%session_id, "Previous check still in flight, skipping tick");
            return;
        }
        let Some(session) = self.store.get(&session_id).await else {
            return;
        };
        if !session.needs_poll(Utc::now()) {
            self.reconcile().await;
            return;
        }

        self.in_flight.insert(session_id.clone());
        self.checks_started += 1;

        let fetcher = self.fetcher.clone();
        self.spawn(async move {
            let result = fetcher.check(&session).await;
            Some(Event::CheckDone {
                session_id: session.session_id,
                result,
            })
        });
    }

    async fn on_check_done(&mut self, session_id: &str, result: CheckResult) {
        self.in_flight.remove(session_id);

        if result.is_transient() {
            debug!(
                session_id,
                "Check failed transiently: {}",
                result.message.as_deref().unwrap_or("")
            );
        }

        match self.store.patch(session_id, &result.to_patch(Utc::now())).await {
            Ok(change) => {
                if change.changed() && change.current.status != SessionStatus::WaitingOtp {
                    info!(session_id, "Session is now {}", change.current.status);
                }
                self.record(change);
            }
            Err(e) => error!(session_id, "Dropping check result: {}", e),
        }
        self.reconcile().await;
    }

    fn on_heartbeat(&mut self) {
        if self.refreshing {
            debug!("Refresh still in flight, skipping heartbeat");
            return;
        }
        self.refreshing = true;

        let backend = self.backend.clone();
        self.spawn(async move { Some(Event::Refreshed(backend.list_sessions().await)) });
    }

    async fn on_refreshed(&mut self, result: Result<Vec<RemoteSession>, RentalApiError>) {
        self.refreshing = false;

        let remote_sessions = match result {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!("Rental list refresh failed: {}", e);
                return;
            }
        };

        for remote in remote_sessions {
            let Some(local) = self.store.find_by_request_id(&remote.session_id).await else {
                continue;
            };

            let mut snapshot = local.clone();
            snapshot.status = remote.status;
            snapshot.phone_number = remote.phone_number.or(local.phone_number);
            snapshot.otp_code = remote.otp_code.or(local.otp_code);

            let change = self.store.upsert(snapshot).await;
            self.record(change);
        }
        self.reconcile().await;
    }

    async fn cancel(&mut self, session_id: &str) -> Result<(), PollerError> {
        let session = self
            .store
            .get(session_id)
            .await
            .ok_or_else(|| PollerError::Session(format!("unknown session {session_id}")))?;

        if session.status.is_terminal() || session.has_otp() {
            return Err(PollerError::Session(format!(
                "session {} is already {}",
                session_id, session.status
            )));
        }

        let change = self
            .store
            .patch(session_id, &SessionPatch::status(SessionStatus::Cancelled))
            .await?;
        self.record(change);
        self.reconcile().await;
        info!(session_id, "Session cancelled");

        // Without a request id the create call is still out; its result
        // releases the number.
        if let Some(request_id) = session.provider_request_id {
            self.release(request_id);
        }
        Ok(())
    }

    /// Best-effort provider cancel.
    fn release(&self, request_id: String) {
        let backend = self.backend.clone();
        self.spawn(async move {
            if let Err(e) = backend.cancel_rental(&request_id).await {
                warn!(%request_id, "Provider cancel failed: {}", e);
            }
            None
        });
    }

    async fn complete(&mut self, session_id: &str) -> Result<(), PollerError> {
        let session = self
            .store
            .get(session_id)
            .await
            .ok_or_else(|| PollerError::Session(format!("unknown session {session_id}")))?;

        if session.status != SessionStatus::OtpReceived {
            return Err(PollerError::Session(format!(
                "session {} has no code to complete ({})",
                session_id, session.status
            )));
        }

        let change = self
            .store
            .patch(session_id, &SessionPatch::status(SessionStatus::Completed))
            .await?;
        self.record(change);
        self.reconcile().await;
        Ok(())
    }
}

/// Command side of a running [`OtpOrchestrator`].
#[derive(Clone)]
pub struct OrchestratorHandle {
    events: mpsc::UnboundedSender<Event>,
    store: SessionStore,
}

impl OrchestratorHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, PollerError> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(Event::Command(build(reply)))
            .map_err(|_| PollerError::Stopped)?;
        response.await.map_err(|_| PollerError::Stopped)?
    }

    /// Start a rental. Returns the new session id once it is in the store.
    pub async fn rent(
        &self,
        provider: Provider,
        carrier: Option<Carrier>,
    ) -> Result<SessionId, PollerError> {
        self.request(|reply| Command::Rent {
            provider,
            carrier,
            reply,
        })
        .await
    }

    pub async fn cancel(&self, session_id: impl Into<SessionId>) -> Result<(), PollerError> {
        let session_id = session_id.into();
        self.request(|reply| Command::Cancel { session_id, reply })
            .await
    }

    /// Acknowledge a received code.
    pub async fn complete(&self, session_id: impl Into<SessionId>) -> Result<(), PollerError> {
        let session_id = session_id.into();
        self.request(|reply| Command::Complete { session_id, reply })
            .await
    }

    pub fn shutdown(&self) {
        let _ = self.events.send(Event::Command(Command::Shutdown));
    }

    /// Snapshot of every session.
    pub async fn sessions(&self) -> Vec<RentalSession> {
        self.store.all().await
    }
}
