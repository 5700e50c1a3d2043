use anyhow::Result;
use models::service_history::ServiceHistoryChanges;
use models::{service_history, service_history_image};

use crate::errors::ServiceError;
use crate::storage::StorageKind;
use crate::test_support::{harness, new_history, png};
use crate::upload::UploadFile;

#[tokio::test]
async fn create_keeps_record_when_images_fail() -> Result<()> {
    let h = harness(StorageKind::Remote).await?;

    let created = h
        .records
        .create(new_history(), vec![png("a.png"), UploadFile::new("a.bmp", b"x".to_vec())])
        .await?;
    assert_eq!(created.attach.created.len(), 1);
    assert_eq!(created.attach.failed.len(), 1);

    h.remote.set_fail_store(true);
    let created = h.records.create(new_history(), vec![png("b.png")]).await?;
    assert!(created.attach.created.is_empty());
    assert!(service_history::find(&h.db, created.record.id).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn create_rejects_invalid_fields_before_storing() -> Result<()> {
    let h = harness(StorageKind::Remote).await?;
    let mut input = new_history();
    input.price = -5.0;
    let err = h.records.create(input, vec![png("a.png")]).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert!(h.remote.is_empty());
    Ok(())
}

#[tokio::test]
async fn update_removes_listed_images_and_skips_unknown() -> Result<()> {
    let h = harness(StorageKind::Remote).await?;
    let record = h.records.create(new_history(), vec![png("a.png"), png("b.png")]).await?.record;
    let rows = service_history_image::list_by_history(&h.db, record.id).await?;

    let changes = ServiceHistoryChanges { notes: Some("follow-up in 3 weeks".into()), ..Default::default() };
    let updated = h.records.update(record.id, &changes, &[rows[0].id, 777]).await?;
    assert_eq!(updated.record.notes.as_deref(), Some("follow-up in 3 weeks"));
    assert_eq!(updated.removed, vec![rows[0].id]);
    assert_eq!(updated.backend_failures, 0);

    let left = h.records.get(record.id).await?;
    assert_eq!(left.images.len(), 1);
    assert_eq!(left.images[0].id, rows[1].id);
    assert_eq!(h.remote.len(), 1);
    Ok(())
}

#[tokio::test]
async fn update_with_foreign_image_changes_nothing() -> Result<()> {
    let h = harness(StorageKind::Remote).await?;
    let first = h.records.create(new_history(), vec![png("a.png")]).await?.record;
    let second = h.records.create(new_history(), vec![png("b.png")]).await?.record;
    let own = service_history_image::list_by_history(&h.db, first.id).await?.remove(0);
    let foreign = service_history_image::list_by_history(&h.db, second.id).await?.remove(0);

    let changes = ServiceHistoryChanges { price: Some(1.0), ..Default::default() };
    let err = h.records.update(first.id, &changes, &[own.id, foreign.id]).await.unwrap_err();
    assert!(matches!(err, ServiceError::Ownership { .. }));

    let unchanged = service_history::find(&h.db, first.id).await?.expect("record kept");
    assert_eq!(unchanged.price, first.price);
    assert_eq!(service_history_image::count_by_history(&h.db, first.id).await?, 1);
    assert_eq!(h.remote.len(), 2);
    Ok(())
}

#[tokio::test]
async fn delete_cascades_even_when_backend_fails() -> Result<()> {
    let h = harness(StorageKind::Remote).await?;
    let record = h.records.create(new_history(), vec![png("a.png"), png("b.png"), png("c.png")]).await?.record;

    h.remote.set_fail_delete(true);
    let summary = h.records.delete(record.id).await?;
    assert_eq!(summary.images_removed, 3);
    assert_eq!(summary.backend_failures, 3);
    assert_eq!(service_history_image::count_by_history(&h.db, record.id).await?, 0);
    assert!(service_history::find(&h.db, record.id).await?.is_none());

    assert!(matches!(h.records.delete(record.id).await, Err(ServiceError::NotFound(_))));
    Ok(())
}

/// Upload two, replace one, delete the other, then drop the record.
#[tokio::test]
async fn full_image_lifecycle() -> Result<()> {
    let h = harness(StorageKind::Remote).await?;
    let record = h.records.create(new_history(), vec![]).await?.record;

    let attached = h.images.attach(record.id, vec![png("a.png"), png("b.png")]).await?;
    assert_eq!(attached.created.len(), 2);
    let (a, b) = (attached.created[0].clone(), attached.created[1].clone());

    let c = h.images.replace(record.id, a.id, png("c.png")).await?;
    assert_eq!(c.id, a.id);
    h.images.delete(record.id, b.id).await?;

    let listed = h.images.list(record.id).await?;
    assert_eq!(listed, vec![c.clone()]);
    assert_eq!(h.remote.len(), 1);

    let summary = h.records.delete(record.id).await?;
    assert_eq!(summary.images_removed, 1);
    assert_eq!(summary.backend_failures, 0);
    assert!(h.remote.is_empty());
    assert!(matches!(h.records.get(record.id).await, Err(ServiceError::NotFound(_))));
    Ok(())
}
