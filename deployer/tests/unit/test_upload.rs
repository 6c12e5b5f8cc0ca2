//! Validation and upload fan-out tests

use std::sync::Arc;

use stackdeploy::deploy::bundle::TemplateBundle;
use stackdeploy::deploy::upload::{upload_templates, validate_templates, UploadPlan};
use stackdeploy::errors::DeployError;

use crate::support::{write_bundle, FakeObjectStorage, FakeStackService, BROKEN};

const FILES: &[(&str, &str)] = &[
    ("Stack.json", "{}"),
    ("nested/db.json", "{}"),
    ("nested/queue.json", "{}"),
    ("alarms.json", "{}"),
];

async fn bundle(files: &[(&str, &str)]) -> (tempfile::TempDir, TemplateBundle) {
    let root = tempfile::tempdir().unwrap();
    write_bundle(root.path(), files);
    let bundle = TemplateBundle::resolve(root.path(), "Stack.json").await.unwrap();
    (root, bundle)
}

#[tokio::test]
async fn test_upload_plan_keys_keep_relative_paths() {
    let (_root, bundle) = bundle(FILES).await;
    let plan = UploadPlan::new("templates", "ops/web/abcd1234/templates", &bundle);

    let keys: Vec<_> = plan.items.iter().map(|i| i.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "ops/web/abcd1234/templates/Stack.json",
            "ops/web/abcd1234/templates/alarms.json",
            "ops/web/abcd1234/templates/nested/db.json",
            "ops/web/abcd1234/templates/nested/queue.json",
        ]
    );
}

#[tokio::test]
async fn test_upload_aggregates_every_failure() {
    let (_root, bundle) = bundle(FILES).await;
    let plan = UploadPlan::new("templates", "web/v1/templates", &bundle);
    let storage = Arc::new(FakeObjectStorage::failing(&["nested/"]));

    let results = upload_templates(storage.clone(), &plan).await;

    assert_eq!(results.len(), 4);
    assert!(results.has_errors());
    assert_eq!(results.successes().count(), 2);
    assert!(results.successes().all(|r| r.url.starts_with("https://templates.objects.test/")));
    assert!(results.failures().all(|r| r.url.is_empty()));

    match results.ensure_success() {
        Err(e @ DeployError::UploadFailed { failed: 2, total: 4, .. }) => {
            let message = e.to_string();
            assert!(message.contains("db.json"));
            assert!(message.contains("queue.json"));
        }
        other => panic!("expected aggregated upload failure, got {:?}", other),
    }
    assert!(results.main_template_url(bundle.main_template()).is_err());
}

#[tokio::test]
async fn test_main_template_url_after_full_success() {
    let (_root, bundle) = bundle(FILES).await;
    let plan = UploadPlan::new("templates", "web/v1/templates", &bundle);
    let storage = Arc::new(FakeObjectStorage::new());

    let results = upload_templates(storage.clone(), &plan).await;

    assert_eq!(storage.keys().len(), 4);
    assert_eq!(
        results.main_template_url(bundle.main_template()).unwrap(),
        "https://templates.objects.test/web/v1/templates/Stack.json"
    );
    assert!(matches!(
        results.main_template_url(&bundle.root().join("Other.json")),
        Err(DeployError::MainTemplateUrlNotFound(_))
    ));
}

#[tokio::test]
async fn test_validation_checks_every_file_and_lists_failures() {
    let (_root, bundle) = bundle(&[
        ("Stack.json", "{}"),
        ("nested/db.json", BROKEN),
        ("nested/queue.json", BROKEN),
    ])
    .await;
    let stacks = Arc::new(FakeStackService::new());

    let result = validate_templates(stacks.clone(), &bundle.paths()).await;

    assert_eq!(stacks.validated.lock().unwrap().len(), 3);
    match result {
        Err(e @ DeployError::ValidationFailed { failed: 2, .. }) => {
            let message = e.to_string();
            assert!(message.contains("db.json"));
            assert!(message.contains("queue.json"));
            assert!(!message.contains("Stack.json"));
        }
        other => panic!("expected validation failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_validation_passes_clean_bundle() {
    let (_root, bundle) = bundle(FILES).await;
    let stacks = Arc::new(FakeStackService::new());

    validate_templates(stacks.clone(), &bundle.paths()).await.unwrap();
    assert_eq!(stacks.validated.lock().unwrap().len(), FILES.len());
}
