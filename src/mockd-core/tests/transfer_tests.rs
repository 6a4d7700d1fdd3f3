use std::sync::Arc;
use std::time::Duration;

use mockd_core::{
    AlertLevel, Alerts, DetachedRuntime, Environment, EnvironmentsService, Memory, ServiceConfig, ServiceError,
    TransferError, EXPORT_ID, IMPORT_CHECKSUM_FAILURE, IMPORT_READ_FAILURE, IMPORT_SUCCESS,
};
use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct RecordingAlerts {
    seen: Mutex<Vec<(AlertLevel, String)>>,
}

impl Alerts for RecordingAlerts {
    fn show_alert(&self, level: AlertLevel, message: &str) {
        self.seen.lock().push((level, message.to_string()));
    }
}

impl RecordingAlerts {
    fn last(&self) -> Option<(AlertLevel, String)> {
        self.seen.lock().last().cloned()
    }
}

fn start(alerts: Arc<RecordingAlerts>) -> EnvironmentsService {
    EnvironmentsService::start(
        ServiceConfig {
            duplicates_window: Duration::from_millis(20),
            persist_window: Duration::from_millis(50),
            export_passphrase: "transfer-tests".into(),
            ..ServiceConfig::default()
        },
        Arc::new(Memory::memory()),
        Arc::new(DetachedRuntime),
        alerts,
    )
}

#[tokio::test]
async fn export_then_import_appends_copies_with_fresh_uuids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    let alerts = Arc::new(RecordingAlerts::default());
    let service = start(alerts.clone());

    let env = service.add_environment();
    let uuid = service.environment_at(env.output).unwrap().uuid;
    service.add_route(&uuid).unwrap();
    service.mark_started(&uuid, "instance-1").unwrap();

    assert_eq!(service.export_environments(&path).await.unwrap(), 1);
    assert_eq!(
        alerts.last(),
        Some((AlertLevel::Success, "Environments have been successfully exported".into()))
    );

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["id"], EXPORT_ID);
    assert!(written["checksum"].as_str().is_some_and(|c| !c.is_empty()));
    assert!(written["data"][0].get("runtime").is_none());

    let imported = service.import_environments(&path).await.unwrap();
    assert_eq!(imported.output, vec![1]);
    assert_eq!(alerts.last(), Some((AlertLevel::Success, IMPORT_SUCCESS.into())));

    let snapshot = service.snapshot();
    let (original, copy) = (&snapshot[0], &snapshot[1]);
    assert_ne!(copy.uuid, original.uuid);
    assert_eq!(copy.name, original.name);
    assert_eq!(copy.routes.len(), 2);
    for (a, b) in copy.routes.iter().zip(&original.routes) {
        assert_ne!(a.uuid, b.uuid);
        assert_eq!(a.signature(), b.signature());
    }
    assert!(!copy.runtime.running);

    imported.receipt.reconciled().await.unwrap();
    assert_eq!(service.snapshot()[1].duplicates, vec![0]);
    imported.receipt.persisted().await.unwrap();
    service.shutdown().await;
}

#[tokio::test]
async fn tampered_export_is_rejected_without_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    let alerts = Arc::new(RecordingAlerts::default());
    let service = start(alerts.clone());
    service.add_environment();
    service.export_environments(&path).await.unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"port\": 3000"));
    std::fs::write(&path, text.replace("\"port\": 3000", "\"port\": 3999")).unwrap();

    let before = service.snapshot();
    let err = service.import_environments(&path).await.unwrap_err();
    assert!(matches!(err, ServiceError::Transfer(TransferError::ChecksumMismatch)));
    assert_eq!(service.snapshot(), before);
    assert_eq!(
        alerts.last(),
        Some((AlertLevel::Error, IMPORT_CHECKSUM_FAILURE.into()))
    );
    service.shutdown().await;
}

#[tokio::test]
async fn unreadable_files_report_a_read_failure() {
    let dir = tempfile::tempdir().unwrap();
    let alerts = Arc::new(RecordingAlerts::default());
    let service = start(alerts.clone());

    let missing = service
        .import_environments(dir.path().join("missing.json"))
        .await
        .unwrap_err();
    assert!(matches!(missing, ServiceError::Transfer(TransferError::Read { .. })));
    assert_eq!(alerts.last(), Some((AlertLevel::Error, IMPORT_READ_FAILURE.into())));

    let garbage = dir.path().join("garbage.json");
    std::fs::write(&garbage, "{ definitely not an export").unwrap();
    let malformed = service.import_environments(&garbage).await.unwrap_err();
    assert!(matches!(malformed, ServiceError::Transfer(TransferError::Parse(_))));
    assert_eq!(alerts.last(), Some((AlertLevel::Error, IMPORT_READ_FAILURE.into())));
    assert!(service.is_empty());
    service.shutdown().await;
}

#[tokio::test]
async fn export_to_a_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let alerts = Arc::new(RecordingAlerts::default());
    let service = start(alerts.clone());
    service.add_environment();

    let err = service
        .export_environments(dir.path().join("nope").join("export.json"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Transfer(TransferError::Write { .. })));
    assert_eq!(
        alerts.last(),
        Some((AlertLevel::Error, "Error while exporting environments".into()))
    );
    service.shutdown().await;
}

#[tokio::test]
async fn exports_from_another_passphrase_do_not_verify() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    let service = start(Arc::new(RecordingAlerts::default()));
    service.add_environment();
    service.export_environments(&path).await.unwrap();
    service.shutdown().await;

    let other = EnvironmentsService::start(
        ServiceConfig {
            export_passphrase: "someone else".into(),
            ..ServiceConfig::default()
        },
        Arc::new(Memory::memory()),
        Arc::new(DetachedRuntime),
        Arc::new(RecordingAlerts::default()),
    );
    assert!(matches!(
        other.import_environments(&path).await,
        Err(ServiceError::Transfer(TransferError::ChecksumMismatch))
    ));
    other.shutdown().await;
}

fn without_uuids(mut environment: Environment) -> Environment {
    environment.uuid = Uuid::nil();
    for route in &mut environment.routes {
        route.uuid = Uuid::nil();
        for header in &mut route.custom_headers {
            header.uuid = Uuid::nil();
        }
    }
    environment
}

#[tokio::test]
async fn import_into_an_empty_service_reproduces_the_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    let source = start(Arc::new(RecordingAlerts::default()));
    let env = source.add_environment();
    let uuid = source.environment_at(env.output).unwrap().uuid;
    source
        .update_environment(&uuid, |e| {
            e.latency = 7;
            e.port = 4100;
        })
        .unwrap();
    let route = source.environment(&uuid).unwrap().routes[0].uuid;
    source.update_route(&uuid, &route, |r| r.status_code = 418).unwrap();
    source.export_environments(&path).await.unwrap();

    let target = start(Arc::new(RecordingAlerts::default()));
    let imported = target.import_environments(&path).await.unwrap();
    assert_eq!(imported.output, vec![0]);

    let exported = source.environment(&uuid).unwrap().sanitized();
    let copy = target.environment_at(0).unwrap();
    assert_ne!(copy.uuid, exported.uuid);
    for (a, b) in copy.routes.iter().zip(&exported.routes) {
        assert_ne!(a.uuid, b.uuid);
        for (ha, hb) in a.custom_headers.iter().zip(&b.custom_headers) {
            assert_ne!(ha.uuid, hb.uuid);
        }
    }
    assert_eq!((copy.latency, copy.port), (7, 4100));
    assert_eq!(copy.routes[0].status_code, 418);
    assert_eq!(without_uuids(copy), without_uuids(exported));

    source.shutdown().await;
    target.shutdown().await;
}
