//! Integration tests for podwatch

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use podwatch::client::{ClientError, KubeClient, PendingPods, PodRecord};
use podwatch::config::TelegramSettings;
use podwatch::notify::{Dispatcher, Notification, Notifier, NotifyError, TelegramNotifier};
use podwatch::telemetry::MonitorMetrics;
use podwatch::watcher::PendingWatcher;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Replays a scripted sequence of pending counts
struct ScriptedPods {
    script: Mutex<VecDeque<Result<usize, ()>>>,
}

impl ScriptedPods {
    fn new(script: Vec<Result<usize, ()>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
        })
    }
}

#[async_trait]
impl PendingPods for ScriptedPods {
    async fn pending_pods(&self) -> Result<Vec<PodRecord>, ClientError> {
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(count)) => Ok((0..count)
                .map(|i| PodRecord {
                    name: format!("pod-{i}"),
                    namespace: "default".to_string(),
                    status: "Pending".to_string(),
                })
                .collect()),
            Some(Err(())) => Err(ClientError::Api {
                status: 500,
                message: "scripted failure".to_string(),
            }),
            None => panic!("script exhausted"),
        }
    }
}

/// Records every delivered notification
struct RecordingChannel {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingChannel {
    fn new() -> (Self, Arc<Mutex<Vec<Notification>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                seen: Arc::clone(&seen),
            },
            seen,
        )
    }
}

#[async_trait]
impl Notifier for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn deliver(&self, note: &Notification) -> Result<(), NotifyError> {
        self.seen.lock().unwrap().push(note.clone());
        Ok(())
    }
}

fn telegram_settings(chat_ids: &[&str]) -> TelegramSettings {
    TelegramSettings::from_parts(
        Some("TESTTOKEN".to_string()),
        Some(chat_ids.join(",")),
    )
    .unwrap()
}

#[tokio::test]
async fn test_telegram_delivers_to_every_recipient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTESTTOKEN/sendMessage"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let notifier =
        TelegramNotifier::new(telegram_settings(&["1", "2"]), false).with_api_base(server.uri());
    let note = Notification::new("Hey, there are 4 pending pods in your cluster.", 4);

    assert!(notifier.deliver(&note).await.is_ok());
}

#[tokio::test]
async fn test_telegram_sends_form_encoded_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTESTTOKEN/sendMessage"))
        .and(body_string_contains("chat_id=7"))
        .and(body_string_contains("Pending+pods%3A+4"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let notifier =
        TelegramNotifier::new(telegram_settings(&["7"]), false).with_api_base(server.uri());
    let note = Notification::new("Hey, there are 4 pending pods in your cluster.", 4);

    assert!(notifier.deliver(&note).await.is_ok());
}

#[tokio::test]
async fn test_telegram_fail_fast_skips_remaining_recipients() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTESTTOKEN/sendMessage"))
        .and(body_string_contains("chat_id=1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/botTESTTOKEN/sendMessage"))
        .and(body_string_contains("chat_id=2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    // Recipient 3 must never be contacted under fail-fast.
    Mock::given(method("POST"))
        .and(path("/botTESTTOKEN/sendMessage"))
        .and(body_string_contains("chat_id=3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new(telegram_settings(&["1", "2", "3"]), true)
        .with_api_base(server.uri());
    let note = Notification::new("Hey, there are 2 pending pods in your cluster.", 2);

    let err = notifier.deliver(&note).await.unwrap_err();
    assert!(matches!(err, NotifyError::Rejected { status: 500, .. }));
}

#[tokio::test]
async fn test_telegram_aggregate_attempts_all_recipients() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTESTTOKEN/sendMessage"))
        .and(body_string_contains("chat_id=2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/botTESTTOKEN/sendMessage"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let notifier = TelegramNotifier::new(telegram_settings(&["1", "2", "3"]), false)
        .with_api_base(server.uri());
    let note = Notification::new("Hey, there are 2 pending pods in your cluster.", 2);

    let err = notifier.deliver(&note).await.unwrap_err();
    match err {
        NotifyError::Recipients {
            failed, attempted, ..
        } => {
            assert_eq!(failed, 1);
            assert_eq!(attempted, 3);
        }
        other => panic!("expected recipient aggregate error, got {other}"),
    }
}

#[tokio::test]
async fn test_kube_client_lists_pending_pods() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/pods"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                {"metadata": {"name": "web-1", "namespace": "default"}, "status": {"phase": "Pending"}},
                {"metadata": {"name": "web-2", "namespace": "jobs"}, "status": {"phase": "Pending"}}
            ]
        })))
        .mount(&server)
        .await;

    let client = KubeClient::with_base_url(server.uri());
    let pods = client.pending_pods().await.unwrap();

    assert_eq!(pods.len(), 2);
    assert_eq!(pods[0].name, "web-1");
    assert_eq!(pods[1].namespace, "jobs");
}

#[tokio::test]
async fn test_kube_client_treats_api_failure_as_error_not_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/pods"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let client = KubeClient::with_base_url(server.uri());
    let err = client.pending_pods().await.unwrap_err();

    assert!(matches!(err, ClientError::Api { status: 403, .. }));
}

#[tokio::test]
async fn test_end_to_end_transition_scenario() {
    // Poll sequence: 0 (idle), 4 (alert), 4 (quiet), 0 (resolved).
    let pods = ScriptedPods::new(vec![Ok(0), Ok(4), Ok(4), Ok(0)]);
    let (channel, seen) = RecordingChannel::new();
    let metrics = Arc::new(MonitorMetrics::new().unwrap());
    let dispatcher =
        Dispatcher::new(vec![Box::new(channel)], false).with_metrics(Arc::clone(&metrics));
    let mut watcher = PendingWatcher::new(
        pods,
        dispatcher,
        Arc::clone(&metrics),
        Duration::from_secs(60),
    );

    watcher.tick().await;
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(watcher.previous(), 0);

    watcher.tick().await;
    {
        let log = seen.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(
            log[0].message,
            "Hey, there are 4 pending pods in your cluster."
        );
        assert_eq!(log[0].pending, 4);
    }
    assert_eq!(watcher.previous(), 4);

    watcher.tick().await;
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(watcher.previous(), 4);

    watcher.tick().await;
    {
        let log = seen.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(
            log[1].message,
            "Good news! All pending pods have been resolved."
        );
        assert_eq!(log[1].pending, 0);
    }
    assert_eq!(watcher.previous(), 0);

    // The gauge reflects the last successful poll.
    let text = metrics.encode_text().unwrap();
    assert!(text.contains("pending_count 0"));
}

#[tokio::test]
async fn test_watcher_with_telegram_channel_over_wiremock() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTESTTOKEN/sendMessage"))
        .and(body_string_contains("chat_id=9"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let metrics = Arc::new(MonitorMetrics::new().unwrap());
    let telegram = TelegramNotifier::new(telegram_settings(&["9"]), false)
        .with_api_base(server.uri())
        .with_metrics(Arc::clone(&metrics));
    let dispatcher =
        Dispatcher::new(vec![Box::new(telegram)], false).with_metrics(Arc::clone(&metrics));
    let mut watcher = PendingWatcher::new(
        ScriptedPods::new(vec![Ok(1)]),
        dispatcher,
        metrics,
        Duration::from_secs(60),
    );

    watcher.tick().await;

    assert_eq!(watcher.previous(), 1);
}
