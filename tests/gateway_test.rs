mod fixtures;
mod helpers;

use std::sync::Arc;

use tokio_test::{assert_err, assert_ok};

use fixtures::*;
use helpers::*;
use tryon_jobs::models::job::JobKind;
use tryon_jobs::models::payload::{AvatarRequest, SubmitPayload, TryOnRequest};
use tryon_jobs::services::gateway::{JobGateway, SubmitError};
use tryon_jobs::services::pipeline::OfflineBackend;

#[tokio::test]
async fn test_primary_accepts() {
    let primary = RecordingBackend::new("edge", Behavior::Accept);
    let fallback = RecordingBackend::new("pipeline", Behavior::Accept);
    let gateway = JobGateway::with_fallback(primary.clone(), fallback.clone());

    let handle = assert_ok!(gateway.submit(JobKind::VirtualTryon, &tryon_payload()).await);

    assert_eq!(handle.id.as_str(), "edge-job-1");
    assert_eq!(primary.calls(), 1);
    assert_eq!(fallback.calls(), 0);
}

#[tokio::test]
async fn test_transport_failure_falls_back_once_with_same_payload() {
    let primary = RecordingBackend::new("edge", Behavior::Unreachable);
    let fallback = RecordingBackend::new("pipeline", Behavior::Accept);
    let gateway = JobGateway::with_fallback(primary.clone(), fallback.clone());

    let handle = assert_ok!(gateway.submit(JobKind::AvatarCreation, &avatar_payload()).await);

    assert_eq!(handle.id.as_str(), "pipeline-job-1");
    assert_eq!(primary.calls(), 1);
    assert_eq!(fallback.calls(), 1);
    assert_eq!(primary.payloads(), fallback.payloads());
}

#[tokio::test]
async fn test_authorization_failure_does_not_fall_back() {
    let primary = RecordingBackend::new("edge", Behavior::Unauthorized);
    let fallback = RecordingBackend::new("pipeline", Behavior::Accept);
    let gateway = JobGateway::with_fallback(primary.clone(), fallback.clone());

    let err = assert_err!(gateway.submit(JobKind::VirtualTryon, &tryon_payload()).await);

    assert!(matches!(err, SubmitError::Unauthorized { ref backend, .. } if backend == "edge"));
    assert!(!err.is_retryable());
    assert_eq!(fallback.calls(), 0);
}

#[tokio::test]
async fn test_validation_rejection_does_not_fall_back() {
    let primary = RecordingBackend::new("edge", Behavior::Reject);
    let fallback = RecordingBackend::new("pipeline", Behavior::Accept);
    let gateway = JobGateway::with_fallback(primary.clone(), fallback.clone());

    let err = assert_err!(gateway.submit(JobKind::VirtualTryon, &tryon_payload()).await);

    assert!(matches!(err, SubmitError::Rejected { status: 422, .. }));
    assert_eq!(fallback.calls(), 0);
}

#[tokio::test]
async fn test_all_backends_unreachable() {
    let primary = RecordingBackend::new("edge", Behavior::Unreachable);
    let fallback = RecordingBackend::new("pipeline", Behavior::Unreachable);
    let gateway = JobGateway::with_fallback(primary.clone(), fallback.clone());

    let err = assert_err!(gateway.submit(JobKind::AvatarCreation, &avatar_payload()).await);

    assert!(err.is_retryable());
    assert_eq!(primary.calls(), 1);
    assert_eq!(fallback.calls(), 1);
}

#[tokio::test]
async fn test_missing_required_field_never_reaches_backend() {
    let primary = RecordingBackend::new("edge", Behavior::Accept);
    let gateway = JobGateway::new(vec![primary.clone()]);

    let payload = SubmitPayload::from(TryOnRequest {
        user_id: "user-42".to_string(),
        avatar_id: String::new(),
        garment_image_url: "https://cdn.example.com/garments/1.png".to_string(),
        garment_category: None,
    });

    let err = assert_err!(gateway.submit(JobKind::VirtualTryon, &payload).await);
    assert!(matches!(err, SubmitError::Invalid(_)));
    assert_eq!(primary.calls(), 0);
}

#[tokio::test]
async fn test_storage_path_image_reference_is_forwarded() {
    let primary = RecordingBackend::new("edge", Behavior::Accept);
    let gateway = JobGateway::new(vec![primary.clone()]);

    let payload = SubmitPayload::from(AvatarRequest {
        user_id: "user-42".to_string(),
        source_image_url: "avatars/u1/selfie.jpg".to_string(),
        body_type: None,
    });

    assert_ok!(gateway.submit(JobKind::AvatarCreation, &payload).await);
    assert_eq!(primary.calls(), 1);
    assert_eq!(primary.payloads()[0]["source_image_url"], "avatars/u1/selfie.jpg");
}

#[tokio::test]
async fn test_payload_kind_must_match() {
    let primary = RecordingBackend::new("edge", Behavior::Accept);
    let gateway = JobGateway::new(vec![primary.clone()]);

    let err = assert_err!(gateway.submit(JobKind::VirtualTryon, &avatar_payload()).await);
    assert!(matches!(
        err,
        SubmitError::KindMismatch {
            expected: JobKind::VirtualTryon,
            actual: JobKind::AvatarCreation
        }
    ));
    assert_eq!(primary.calls(), 0);
}

#[tokio::test]
async fn test_each_submit_creates_a_new_job() {
    let primary = RecordingBackend::new("edge", Behavior::Accept);
    let gateway = JobGateway::new(vec![primary.clone()]);

    let first = assert_ok!(gateway.submit(JobKind::VirtualTryon, &tryon_payload()).await);
    let second = assert_ok!(gateway.submit(JobKind::VirtualTryon, &tryon_payload()).await);

    assert_ne!(first.id, second.id);
    assert_eq!(primary.calls(), 2);
}

#[tokio::test]
async fn test_no_backends() {
    let gateway = JobGateway::new(Vec::new());
    let err = assert_err!(gateway.submit(JobKind::VirtualTryon, &tryon_payload()).await);
    assert!(matches!(err, SubmitError::NoBackends));
}

#[tokio::test]
async fn test_offline_gateway_mints_synthetic_ids() {
    let gateway = JobGateway::new(vec![Arc::new(OfflineBackend)]);
    let handle = assert_ok!(gateway.submit(JobKind::AvatarCreation, &avatar_payload()).await);
    assert!(handle.id.is_synthetic());
}
