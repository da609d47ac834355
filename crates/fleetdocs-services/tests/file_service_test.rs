//! File management tests: downloads, metadata edits and the delete flavours.
//!
//! Run with: `cargo test -p fleetdocs-services --test file_service_test`

mod helpers;

use std::sync::Arc;

use fleetdocs_core::models::{EntityType, FileFilters, Page, RecordScope};
use fleetdocs_core::AppError;
use fleetdocs_services::{FileRecordStore, FileService, InMemoryFileRecordStore, LocalStorage, UploadOrchestrator};
use futures::StreamExt;
use helpers::{count_files, pdf_bytes, pdf_file, png_file, request, setup_test_app, Fault, FlakyStorage};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_download_streams_original_bytes() {
    let app = setup_test_app().await;
    let service = FileService::new(app.storage.clone(), app.records.clone());

    let response = app
        .orchestrator
        .upload(request(
            "ACME1",
            "driver",
            Some("D1"),
            "certificat_medical",
            vec![pdf_file("certificat.pdf")],
        ))
        .await
        .unwrap();
    let id = response.files_data[0].db_id.unwrap();

    let (record, mut stream) = service.download(id).await.unwrap();
    let mut bytes = Vec::new();
    while let Some(chunk) = stream.next().await {
        bytes.extend_from_slice(&chunk.unwrap());
    }

    assert_eq!(record.original_name, "certificat.pdf");
    assert_eq!(bytes, pdf_bytes().to_vec());
}

#[tokio::test]
async fn test_soft_delete_hides_record_but_keeps_object() {
    let app = setup_test_app().await;
    let service = FileService::new(app.storage.clone(), app.records.clone());

    let response = app
        .orchestrator
        .upload(request(
            "ACME1",
            "staff",
            Some("S1"),
            "cmu",
            vec![pdf_file("cmu.pdf")],
        ))
        .await
        .unwrap();
    let id = response.files_data[0].db_id.unwrap();

    service.delete(id).await.unwrap();

    assert!(matches!(service.get(id).await, Err(AppError::NotFound(_))));
    assert!(matches!(service.delete(id).await, Err(AppError::NotFound(_))));
    assert!(service
        .list_entity("ACME1", EntityType::Staff, "S1", Page::default())
        .await
        .unwrap()
        .is_empty());
    let inactive = app
        .records
        .find_by_id(id, RecordScope::IncludeInactive)
        .await
        .unwrap()
        .unwrap();
    assert!(!inactive.is_active);
    assert_eq!(count_files(app.root()), 1);
}

#[tokio::test]
async fn test_hard_delete_removes_record_and_objects() {
    let app = setup_test_app().await;
    let service = FileService::new(app.storage.clone(), app.records.clone());

    let response = app
        .orchestrator
        .upload(request(
            "ACME1",
            "company",
            None,
            "logo",
            vec![png_file("logo.png")],
        ))
        .await
        .unwrap();
    let id = response.files_data[0].db_id.unwrap();
    assert_eq!(count_files(app.root()), 2);

    service.hard_delete(id).await.unwrap();

    assert!(app
        .records
        .find_by_id(id, RecordScope::IncludeInactive)
        .await
        .unwrap()
        .is_none());
    assert_eq!(count_files(app.root()), 0);
    assert!(matches!(
        service.hard_delete(id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_hard_delete_tolerates_object_failures() {
    let dir = tempfile::tempdir().unwrap();
    let local = LocalStorage::new(dir.path(), "/public".to_string())
        .await
        .unwrap();
    let storage = Arc::new(FlakyStorage::new(local, "/original/", Fault::WriteError));
    let records = Arc::new(InMemoryFileRecordStore::new());

    // Write through the plain local backend so the original exists.
    let orchestrator = UploadOrchestrator::new(
        Arc::new(
            LocalStorage::new(dir.path(), "/public".to_string())
                .await
                .unwrap(),
        ),
        records.clone(),
    );
    let response = orchestrator
        .upload(request(
            "ACME1",
            "staff",
            Some("S1"),
            "photo",
            vec![png_file("me.png")],
        ))
        .await
        .unwrap();
    let id = response.files_data[0].db_id.unwrap();

    let service = FileService::new(storage, records.clone());
    service.hard_delete(id).await.unwrap();

    // The record is gone; the original survived its failed delete, the thumbnail did not.
    assert!(records.is_empty().await);
    let folder = dir.path().join("company/ACME1/staff/S1/documents");
    assert_eq!(count_files(&folder.join("original")), 1);
    assert_eq!(count_files(&folder.join("thumb")), 0);
}

#[tokio::test]
async fn test_update_metadata_replaces_map() {
    let app = setup_test_app().await;
    let service = FileService::new(app.storage.clone(), app.records.clone());

    let response = app
        .orchestrator
        .upload(request(
            "ACME1",
            "passenger",
            Some("P1"),
            "passeport",
            vec![pdf_file("passeport.pdf")],
        ))
        .await
        .unwrap();
    let id = response.files_data[0].db_id.unwrap();

    let updated = service
        .update_metadata(id, json!({"verified": true}))
        .await
        .unwrap();
    assert_eq!(updated.metadata, json!({"verified": true}));

    assert!(matches!(
        service.update_metadata(id, json!(["not", "a", "map"])).await,
        Err(AppError::InvalidInput(_))
    ));
    assert!(matches!(
        service.update_metadata(Uuid::new_v4(), json!({})).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_listing_search_and_stats() {
    let app = setup_test_app().await;
    let service = FileService::new(app.storage.clone(), app.records.clone());

    app.orchestrator
        .upload(request(
            "ACME1",
            "company",
            None,
            "logo",
            vec![png_file("logo.png")],
        ))
        .await
        .unwrap();
    app.orchestrator
        .upload(request(
            "ACME1",
            "driver",
            Some("D1"),
            "permis_conduite",
            vec![pdf_file("recto.pdf"), pdf_file("verso.pdf")],
        ))
        .await
        .unwrap();

    assert_eq!(service.company_logos("ACME1").await.unwrap().len(), 1);
    assert_eq!(
        service
            .list_company("ACME1", Page::default())
            .await
            .unwrap()
            .len(),
        3
    );
    assert_eq!(
        service
            .list_document_type("ACME1", "permis_conduite", Page::default())
            .await
            .unwrap()
            .len(),
        2
    );

    let filters = FileFilters {
        company_id: Some("ACME1".to_string()),
        entity_type: Some(EntityType::Driver),
        entity_id: Some("D1".to_string()),
        ..Default::default()
    };
    assert_eq!(
        service
            .search(&filters, Page::new(1, 0))
            .await
            .unwrap()
            .len(),
        1
    );

    let stats = service.stats("ACME1").await.unwrap();
    assert_eq!(stats.total_files, 3);
    assert_eq!(stats.files_by_entity.get("company"), Some(&1));
    assert_eq!(stats.files_by_type.get("permis_conduite"), Some(&2));
    assert_eq!(stats.recent_uploads, 3);
}
