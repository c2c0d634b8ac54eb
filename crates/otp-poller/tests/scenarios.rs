//! End-to-end rental flows against a scripted rental API.

use async_trait::async_trait;
use otp_poller::{
    FailureNotice, NotificationChannel, NotificationDispatcher, NotifyError, OtpNotification,
    OtpOrchestrator, PollerConfig,
};
use rental_client::{
    CheckOtpResponse, CreateRentalRequest, CreateRentalResponse, RemoteSession, RentalApiError,
    RentalBackend,
};
use rental_store::{Carrier, Provider, SessionStatus, SessionStore};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Default)]
struct ScriptedApi {
    created: Mutex<Vec<CreateRentalRequest>>,
    checks: Mutex<VecDeque<serde_json::Value>>,
    check_times: Mutex<Vec<Instant>>,
}

impl ScriptedApi {
    fn with_checks(responses: Vec<serde_json::Value>) -> Self {
        Self {
            checks: Mutex::new(responses.into()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl RentalBackend for ScriptedApi {
    async fn create_rental(
        &self,
        request: &CreateRentalRequest,
    ) -> Result<CreateRentalResponse, RentalApiError> {
        self.created.lock().unwrap().push(request.clone());
        Ok(CreateRentalResponse {
            success: true,
            session_id: "viotp-778".into(),
            phone_number: "0987654321".into(),
            provider: request.provider,
            carrier: request.carrier.clone(),
            price: Some(1500.0),
        })
    }

    async fn check_otp(&self, request_id: &str) -> Result<CheckOtpResponse, RentalApiError> {
        assert_eq!(request_id, "viotp-778");
        self.check_times.lock().unwrap().push(Instant::now());
        let next = self
            .checks
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| serde_json::json!({ "success": true, "state": "waiting" }));
        Ok(serde_json::from_value(next)?)
    }

    async fn get_session(&self, request_id: &str) -> Result<RemoteSession, RentalApiError> {
        Err(RentalApiError::NotFound(request_id.into()))
    }

    async fn list_sessions(&self) -> Result<Vec<RemoteSession>, RentalApiError> {
        Ok(Vec::new())
    }

    async fn cancel_rental(&self, _request_id: &str) -> Result<(), RentalApiError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
struct Recorder {
    codes: Arc<Mutex<Vec<OtpNotification>>>,
    failures: Arc<Mutex<Vec<FailureNotice>>>,
}

impl NotificationChannel for Recorder {
    fn name(&self) -> &'static str {
        "recorder"
    }

    fn otp_received(&self, notification: &OtpNotification) -> Result<(), NotifyError> {
        self.codes.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn session_failed(&self, notice: &FailureNotice) -> Result<(), NotifyError> {
        self.failures.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

fn setup(api: Arc<ScriptedApi>) -> (OtpOrchestrator, Recorder) {
    let recorder = Recorder::default();
    let dispatcher = NotificationDispatcher::new(vec![Box::new(recorder.clone())]);
    let orch = OtpOrchestrator::new(api, SessionStore::new(), dispatcher, &PollerConfig::default());
    (orch, recorder)
}

/// Process one tick and the check it triggers.
async fn poll_once(orch: &mut OtpOrchestrator) {
    assert!(orch.step().await, "tick");
    assert!(orch.step().await, "check result");
}

async fn assert_quiet(orch: &mut OtpOrchestrator) {
    let next = tokio::time::timeout(Duration::from_secs(30), orch.step()).await;
    assert!(next.is_err(), "no further events once polling stopped");
}

#[tokio::test(start_paused = true)]
async fn test_rent_allocates_and_polls_every_two_seconds() {
    let api = Arc::new(ScriptedApi::default());
    let (mut orch, _) = setup(api.clone());
    let handle = orch.handle();

    let (id, _) = tokio::join!(
        handle.rent(Provider::Viotp, Some(Carrier::Random)),
        orch.step()
    );
    let id = id.unwrap();

    let pending = orch.store().get(&id).await.unwrap();
    assert_eq!(pending.status, SessionStatus::Requesting);
    assert!(pending.phone_number.is_none());

    assert!(orch.step().await);
    let session = orch.store().get(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Allocated);
    assert_eq!(session.phone_number.as_deref(), Some("0987654321"));
    assert_eq!(session.provider_request_id.as_deref(), Some("viotp-778"));
    assert_eq!(session.carrier, Some(Carrier::Random));
    assert!(orch.timers().is_active(&id));

    let created = api.created.lock().unwrap().clone();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].provider, Provider::Viotp);
    assert!(created[0].carrier.is_none(), "random lets the provider pick");

    let start = Instant::now();
    for _ in 0..3 {
        poll_once(&mut orch).await;
    }

    let times = api.check_times.lock().unwrap().clone();
    let offsets: Vec<Duration> = times.iter().map(|t| t.duration_since(start)).collect();
    assert_eq!(
        offsets,
        vec![
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(6)
        ]
    );

    let session = orch.store().get(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::WaitingOtp);
    assert_eq!(session.retry_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_code_after_waiting_notifies_once_and_stops() {
    let mut checks = vec![serde_json::json!({ "success": true, "state": "waiting" }); 5];
    checks.push(serde_json::json!({
        "success": true,
        "state": "completed",
        "otp": "123456",
        "charged": true,
        "chargeAmount": 100
    }));
    let api = Arc::new(ScriptedApi::with_checks(checks));
    let (mut orch, recorder) = setup(api.clone());
    let handle = orch.handle();

    let (id, _) = tokio::join!(handle.rent(Provider::Viotp, None), orch.step());
    let id = id.unwrap();
    assert!(orch.step().await);

    for _ in 0..5 {
        poll_once(&mut orch).await;
        let session = orch.store().get(&id).await.unwrap();
        assert_eq!(session.status, SessionStatus::WaitingOtp);
        assert!(recorder.codes.lock().unwrap().is_empty());
    }

    poll_once(&mut orch).await;

    let session = orch.store().get(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::OtpReceived);
    assert_eq!(session.otp_code.as_deref(), Some("123456"));
    assert!(session.otp_received_at.is_some());
    assert!(session.charged);
    assert_eq!(session.charge_amount, Some(100.0));

    let codes = recorder.codes.lock().unwrap().clone();
    assert_eq!(codes.len(), 1);
    assert_eq!(codes[0].otp_code, "123456");
    assert_eq!(codes[0].phone_number.as_deref(), Some("0987654321"));

    assert!(!orch.timers().is_active(&id));
    assert_quiet(&mut orch).await;
    assert_eq!(api.check_times.lock().unwrap().len(), 6);
    assert_eq!(recorder.codes.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_rental_stops_without_notification() {
    let api = Arc::new(ScriptedApi::with_checks(vec![serde_json::json!({
        "success": true,
        "state": "expired"
    })]));
    let (mut orch, recorder) = setup(api.clone());
    let handle = orch.handle();

    let (id, _) = tokio::join!(handle.rent(Provider::CodeSim, None), orch.step());
    let id = id.unwrap();
    assert!(orch.step().await);

    poll_once(&mut orch).await;

    let session = orch.store().get(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Expired);
    assert!(session.otp_code.is_none());
    assert!(!session.charged);
    assert!(session.charge_amount.is_none());
    assert!(session.error_message.is_some());

    assert!(!orch.timers().is_active(&id));
    assert!(recorder.codes.lock().unwrap().is_empty());

    let failures = recorder.failures.lock().unwrap().clone();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].status, SessionStatus::Expired);

    assert_quiet(&mut orch).await;
    assert_eq!(api.check_times.lock().unwrap().len(), 1);
}
