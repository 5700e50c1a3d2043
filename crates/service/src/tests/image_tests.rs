use std::sync::Arc;

use anyhow::Result;
use models::service_history_image;

use crate::errors::ServiceError;
use crate::images::ImageAssetManager;
use crate::storage::{InMemoryStorage, StorageBackend, StorageKind, StorageSet, StoredRef};
use crate::test_support::{harness, new_history, png};
use crate::upload::{FileErrorKind, UploadFile, UploadPolicy};

#[tokio::test]
async fn attach_keeps_going_past_bad_files() -> Result<()> {
    let h = harness(StorageKind::Remote).await?;
    let record = h.records.create(new_history(), vec![]).await?.record;

    let files = vec![png("a.png"), UploadFile::new("notes.txt", b"hi".to_vec()), png("b.JPG")];
    let result = h.images.attach(record.id, files).await?;

    assert_eq!(result.created.len(), 2);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].filename, "notes.txt");
    assert_eq!(result.failed[0].kind, FileErrorKind::Validation);
    assert_eq!(service_history_image::count_by_history(&h.db, record.id).await?, 2);
    assert_eq!(h.remote.len(), 2);
    for asset in &result.created {
        assert!(asset.public_id.is_some());
    }
    Ok(())
}

#[tokio::test]
async fn attach_to_missing_record_stores_nothing() -> Result<()> {
    let h = harness(StorageKind::Remote).await?;
    let err = h.images.attach(4242, vec![png("a.png")]).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
    assert!(h.remote.is_empty());
    Ok(())
}

#[tokio::test]
async fn attach_store_failure_creates_no_row() -> Result<()> {
    let h = harness(StorageKind::Remote).await?;
    let record = h.records.create(new_history(), vec![]).await?.record;

    h.remote.set_fail_store(true);
    let result = h.images.attach(record.id, vec![png("a.png"), png("b.png")]).await?;
    assert!(result.created.is_empty());
    assert!(result.failed.iter().all(|f| f.kind == FileErrorKind::Storage));
    assert!(result.all_failed_in_backend());
    assert!(!result.all_rejected());
    assert_eq!(service_history_image::count_by_history(&h.db, record.id).await?, 0);
    Ok(())
}

#[tokio::test]
async fn local_attach_writes_under_upload_root() -> Result<()> {
    let h = harness(StorageKind::Local).await?;
    let record = h.records.create(new_history(), vec![]).await?.record;

    let result = h.images.attach(record.id, vec![png("a.png")]).await?;
    let asset = &result.created[0];
    assert!(asset.public_id.is_none());
    assert!(asset.image_url.starts_with("/static/uploads/"));
    let path = h.local.path_for(&asset.image_url)?;
    assert_eq!(std::fs::read(&path)?, b"png:a.png");

    h.images.delete(record.id, asset.id).await?;
    assert!(!path.exists());
    Ok(())
}

#[tokio::test]
async fn replace_swaps_object_and_keeps_siblings() -> Result<()> {
    let h = harness(StorageKind::Remote).await?;
    let record = h.records.create(new_history(), vec![png("a.png"), png("b.png")]).await?.record;
    let rows = service_history_image::list_by_history(&h.db, record.id).await?;
    let (a, b) = (rows[0].clone(), rows[1].clone());

    let replaced = h.images.replace(record.id, a.id, png("c.png")).await?;
    assert_eq!(replaced.id, a.id);
    assert_ne!(replaced.public_id, a.public_id);
    assert!(!h.remote.contains(&StoredRef::from(&a)));

    let new_ref = StoredRef::from(&service_history_image::find(&h.db, a.id).await?.expect("row kept"));
    assert_eq!(h.remote.get(&new_ref).as_deref(), Some(&b"png:c.png"[..]));

    let b_after = service_history_image::find(&h.db, b.id).await?.expect("sibling kept");
    assert_eq!(b_after, b);
    assert!(h.remote.contains(&StoredRef::from(&b)));
    Ok(())
}

#[tokio::test]
async fn replace_succeeds_when_old_object_cannot_be_deleted() -> Result<()> {
    let h = harness(StorageKind::Remote).await?;
    let record = h.records.create(new_history(), vec![png("a.png")]).await?.record;
    let old = service_history_image::list_by_history(&h.db, record.id).await?.remove(0);

    h.remote.set_fail_delete(true);
    let replaced = h.images.replace(record.id, old.id, png("c.png")).await?;
    assert_ne!(replaced.public_id, old.public_id);
    // old object is an accepted leak
    assert!(h.remote.contains(&StoredRef::from(&old)));
    assert_eq!(h.remote.len(), 2);
    Ok(())
}

#[tokio::test]
async fn replace_store_failure_leaves_row_untouched() -> Result<()> {
    let h = harness(StorageKind::Remote).await?;
    let record = h.records.create(new_history(), vec![png("a.png")]).await?.record;
    let old = service_history_image::list_by_history(&h.db, record.id).await?.remove(0);

    h.remote.set_fail_store(true);
    let err = h.images.replace(record.id, old.id, png("c.png")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Storage(_)));
    assert_eq!(service_history_image::find(&h.db, old.id).await?, Some(old));
    Ok(())
}

#[tokio::test]
async fn replace_checks_validation_then_ownership() -> Result<()> {
    let h = harness(StorageKind::Remote).await?;
    let first = h.records.create(new_history(), vec![png("a.png")]).await?.record;
    let second = h.records.create(new_history(), vec![]).await?.record;
    let img = service_history_image::list_by_history(&h.db, first.id).await?.remove(0);

    let bad = UploadFile::new("evil.exe", b"MZ".to_vec());
    assert!(matches!(h.images.replace(9999, 9999, bad).await, Err(ServiceError::Validation(_))));
    assert!(matches!(h.images.replace(9999, img.id, png("c.png")).await, Err(ServiceError::NotFound(_))));
    assert!(matches!(h.images.replace(first.id, 9999, png("c.png")).await, Err(ServiceError::NotFound(_))));

    let err = h.images.replace(second.id, img.id, png("c.png")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Ownership { image_id, record_id } if image_id == img.id && record_id == second.id));
    // nothing uploaded for rejected calls
    assert_eq!(h.remote.len(), 1);
    Ok(())
}

#[tokio::test]
async fn replace_picks_old_backend_from_public_id() -> Result<()> {
    let h = harness(StorageKind::Local).await?;
    let record = h.records.create(new_history(), vec![png("a.png")]).await?.record;
    let old = service_history_image::list_by_history(&h.db, record.id).await?.remove(0);
    let old_path = h.local.path_for(&old.image_url)?;
    assert!(old_path.exists());

    let remote_active = StorageSet::new(h.local.clone(), Some(h.remote.clone() as Arc<dyn StorageBackend>), StorageKind::Remote)?;
    let manager = Arc::new(ImageAssetManager::new(
        h.db.clone(),
        remote_active,
        UploadPolicy::new(["png"], 1024),
    ));
    let replaced = manager.replace(record.id, old.id, png("c.png")).await?;
    assert!(replaced.public_id.is_some());
    assert!(!old_path.exists());
    Ok(())
}

#[tokio::test]
async fn delete_twice_is_not_found() -> Result<()> {
    let h = harness(StorageKind::Remote).await?;
    let record = h.records.create(new_history(), vec![png("a.png")]).await?.record;
    let img = service_history_image::list_by_history(&h.db, record.id).await?.remove(0);

    h.images.delete(record.id, img.id).await?;
    assert!(h.remote.is_empty());
    assert!(matches!(h.images.delete(record.id, img.id).await, Err(ServiceError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn delete_removes_row_even_if_backend_fails() -> Result<()> {
    let h = harness(StorageKind::Remote).await?;
    let record = h.records.create(new_history(), vec![png("a.png")]).await?.record;
    let img = service_history_image::list_by_history(&h.db, record.id).await?.remove(0);

    h.remote.set_fail_delete(true);
    h.images.delete(record.id, img.id).await?;
    assert!(service_history_image::find(&h.db, img.id).await?.is_none());
    assert_eq!(h.remote.len(), 1);
    Ok(())
}

#[tokio::test]
async fn delete_rejects_foreign_image() -> Result<()> {
    let h = harness(StorageKind::Remote).await?;
    let first = h.records.create(new_history(), vec![png("a.png")]).await?.record;
    let second = h.records.create(new_history(), vec![]).await?.record;
    let img = service_history_image::list_by_history(&h.db, first.id).await?.remove(0);

    let err = h.images.delete(second.id, img.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Ownership { .. }));
    assert!(service_history_image::find(&h.db, img.id).await?.is_some());
    assert_eq!(h.remote.len(), 1);
    Ok(())
}

#[tokio::test]
async fn attach_row_failure_releases_stored_object() -> Result<()> {
    let h = harness(StorageKind::Remote).await?;
    let record = h.records.create(new_history(), vec![]).await?.record;

    // Issued URLs longer than the image_url column allows make the row insert fail
    let remote = Arc::new(InMemoryStorage::new_remote(&format!("https://cdn.test/{}", "x".repeat(600))));
    let storage = StorageSet::new(h.local.clone(), Some(remote.clone() as Arc<dyn StorageBackend>), StorageKind::Remote)?;
    let images = ImageAssetManager::new(h.db.clone(), storage, UploadPolicy::new(["png"], 1024));

    let result = images.attach(record.id, vec![png("a.png")]).await?;
    assert!(result.created.is_empty());
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].kind, FileErrorKind::Persistence);
    assert!(remote.is_empty());
    assert_eq!(service_history_image::count_by_history(&h.db, record.id).await?, 0);
    Ok(())
}

#[tokio::test]
async fn attach_with_declared_content_type() -> Result<()> {
    let h = harness(StorageKind::Local).await?;
    let record = h.records.create(new_history(), vec![]).await?.record;

    let file = UploadFile { content_type: Some("image/png".into()), ..png("a.png") };
    let result = h.images.attach(record.id, vec![file, png("b.png")]).await?;
    assert_eq!(result.created.len(), 2);
    assert!(result.failed.is_empty());
    Ok(())
}
