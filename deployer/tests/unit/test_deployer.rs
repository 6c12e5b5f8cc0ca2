//! End-to-end deployer tests against in-memory services

use std::path::Path;
use std::sync::{Arc, Mutex};

use stack_models::{StackRequest, StackStatus};
use stackdeploy::app::options::DeployOptions;
use stackdeploy::deploy::bundle::TemplateBundle;
use stackdeploy::deploy::events::{EventObserver, TailObservation};
use stackdeploy::deploy::executor::{stack_exists, Deployer};
use stackdeploy::deploy::request::{
    DeploymentRequest, StackOperation, TEMPLATE_BASE_URL_PARAM, VERSION_PARAM,
};
use stackdeploy::errors::DeployError;

use crate::support::{event, summary, write_bundle, FakeObjectStorage, FakeStackService, BROKEN};

const BUNDLE: &[(&str, &str)] = &[
    ("Stack.json", r#"{"Resources": {"Db": {"Type": "Nested"}}}"#),
    ("nested/db.json", r#"{"Resources": {"Table": {}}}"#),
];

fn request(root: &Path) -> DeploymentRequest {
    DeploymentRequest {
        stack_name: "web".to_string(),
        template_folder: root.to_path_buf(),
        main_template: "Stack.json".to_string(),
        region: "ap-southeast-2".to_string(),
        bucket: "artifacts".to_string(),
        bucket_folder: Some("ops".to_string()),
        parameters: "Version=mine,Env=prod".parse().unwrap(),
        tags: "team=web".parse().unwrap(),
    }
}

async fn version_of(root: &Path) -> String {
    TemplateBundle::resolve(root, "Stack.json")
        .await
        .unwrap()
        .version()
        .await
        .unwrap()
}

fn parameter<'a>(request: &'a StackRequest, key: &str) -> Option<&'a str> {
    request
        .parameters
        .iter()
        .find(|p| p.parameter_key == key)
        .map(|p| p.parameter_value.as_str())
}

fn deployer(stacks: &Arc<FakeStackService>, objects: &Arc<FakeObjectStorage>) -> Deployer {
    Deployer::new(stacks.clone(), objects.clone(), DeployOptions::default())
}

#[tokio::test(start_paused = true)]
async fn test_deploy_creates_missing_stack() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), BUNDLE);
    let version = version_of(dir.path()).await;

    let stacks = Arc::new(FakeStackService::new().with_describe(vec![
        vec![summary("web", StackStatus::CreateInProgress)],
        vec![summary("web", StackStatus::CreateComplete)],
    ]));
    let objects = Arc::new(FakeObjectStorage::new());

    let outcome = deployer(&stacks, &objects)
        .deploy(&request(dir.path()), None)
        .await
        .unwrap();

    assert_eq!(outcome.operation, StackOperation::Create);
    assert_eq!(outcome.status, StackStatus::CreateComplete);
    assert_eq!(outcome.version, version);
    assert!(outcome.succeeded());

    let prefix = format!("ops/web/{}/templates", version);
    assert_eq!(
        objects.keys(),
        vec![
            format!("{}/Stack.json", prefix),
            format!("{}/nested/db.json", prefix),
        ]
    );
    assert_eq!(
        outcome.template_url,
        format!("https://artifacts.objects.test/{}/Stack.json", prefix)
    );

    let created = stacks.created.lock().unwrap();
    assert_eq!(created.len(), 1);
    let sent = &created[0];
    assert_eq!(sent.stack_name, "web");
    assert_eq!(sent.template_url, outcome.template_url);
    assert_eq!(parameter(sent, VERSION_PARAM), Some(version.as_str()));
    assert_eq!(
        parameter(sent, TEMPLATE_BASE_URL_PARAM),
        Some(format!("https://artifacts.objects.test/{}/", prefix).as_str())
    );
    assert_eq!(parameter(sent, "Env"), Some("prod"));
    assert_eq!(sent.tags.len(), 1);
    assert_eq!(sent.tags[0].key, "team");
    assert_eq!(sent.tags[0].value, "web");

    assert_eq!(stacks.validated.lock().unwrap().len(), 2);
    assert!(stacks.updated.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_deploy_updates_stack_found_on_later_page() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), BUNDLE);

    let stacks = Arc::new(
        FakeStackService::new()
            .with_list_pages(vec![
                vec![summary("api", StackStatus::CreateComplete)],
                vec![summary("web", StackStatus::UpdateRollbackComplete)],
            ])
            .with_describe(vec![vec![summary("web", StackStatus::UpdateComplete)]]),
    );
    let objects = Arc::new(FakeObjectStorage::new());

    let outcome = deployer(&stacks, &objects)
        .deploy(&request(dir.path()), None)
        .await
        .unwrap();

    assert_eq!(outcome.operation, StackOperation::Update);
    assert_eq!(outcome.status, StackStatus::UpdateComplete);
    assert_eq!(
        *stacks.list_calls.lock().unwrap(),
        vec![None, Some("1".to_string())]
    );
    assert_eq!(stacks.updated.lock().unwrap().len(), 1);
    assert!(stacks.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_stack_exists_stops_at_last_page() {
    let stacks = FakeStackService::new().with_list_pages(vec![
        vec![summary("api", StackStatus::CreateComplete)],
        vec![summary("worker", StackStatus::RollbackComplete)],
    ]);

    assert!(!stack_exists(&stacks, "web").await.unwrap());
    assert!(stack_exists(&stacks, "worker").await.unwrap());
    assert_eq!(stacks.list_calls.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn test_invalid_template_stops_before_upload() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(
        dir.path(),
        &[
            ("Stack.json", "{}"),
            ("nested/db.json", BROKEN),
            ("nested/queue.json", "{}"),
        ],
    );

    let stacks = Arc::new(FakeStackService::new());
    let objects = Arc::new(FakeObjectStorage::new());

    let err = deployer(&stacks, &objects)
        .deploy(&request(dir.path()), None)
        .await
        .unwrap_err();

    match err {
        DeployError::ValidationFailed { failed, causes } => {
            assert_eq!(failed, 1);
            assert!(causes.contains("db.json"));
        }
        other => panic!("expected validation failure, got {:?}", other),
    }
    assert_eq!(stacks.validated.lock().unwrap().len(), 3);
    assert!(objects.keys().is_empty());
    assert!(stacks.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_upload_stops_before_stack_call() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), BUNDLE);

    let stacks = Arc::new(FakeStackService::new());
    let objects = Arc::new(FakeObjectStorage::failing(&["nested/"]));

    let err = deployer(&stacks, &objects)
        .deploy(&request(dir.path()), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DeployError::UploadFailed {
            failed: 1,
            total: 2,
            ..
        }
    ));
    assert!(stacks.list_calls.lock().unwrap().is_empty());
    assert!(stacks.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_main_template() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), &[("nested/db.json", "{}")]);

    let stacks = Arc::new(FakeStackService::new());
    let objects = Arc::new(FakeObjectStorage::new());

    let err = deployer(&stacks, &objects)
        .deploy(&request(dir.path()), None)
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::MainTemplateMissing(_)));
    assert!(stacks.validated.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rollback_is_reported_and_events_are_streamed() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), BUNDLE);

    let stacks = Arc::new(
        FakeStackService::new()
            .with_describe(vec![
                vec![summary("web", StackStatus::CreateInProgress)],
                vec![summary("web", StackStatus::RollbackComplete)],
            ])
            .with_events(vec![
                Ok(vec![event("e1", 1)]),
                Ok(vec![event("e2", 2), event("e1", 1)]),
            ]),
    );
    let objects = Arc::new(FakeObjectStorage::new());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let observer: EventObserver = Box::new(move |observation| {
        if let TailObservation::Event(e) = observation {
            sink.lock().unwrap().push(e.event_id);
        }
    });

    let err = deployer(&stacks, &objects)
        .deploy(&request(dir.path()), Some(observer))
        .await
        .unwrap_err();

    match err {
        DeployError::UnexpectedStatus {
            expected, actual, ..
        } => {
            assert_eq!(expected, StackStatus::CreateComplete);
            assert_eq!(actual, StackStatus::RollbackComplete);
        }
        other => panic!("expected unexpected status, got {:?}", other),
    }
    assert_eq!(seen.lock().unwrap().first().map(String::as_str), Some("e1"));
}

#[tokio::test(start_paused = true)]
async fn test_event_tailing_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), BUNDLE);

    let stacks = Arc::new(
        FakeStackService::new()
            .with_describe(vec![vec![summary("web", StackStatus::CreateComplete)]])
            .with_events(vec![Ok(vec![event("e1", 1)])]),
    );
    let objects = Arc::new(FakeObjectStorage::new());

    let seen = Arc::new(Mutex::new(0u32));
    let sink = seen.clone();
    let observer: EventObserver = Box::new(move |_| *sink.lock().unwrap() += 1);

    let options = DeployOptions {
        tail_events: false,
        ..DeployOptions::default()
    };
    let deployer = Deployer::new(stacks.clone(), objects.clone(), options);
    assert!(!deployer.options().tail_events);

    deployer
        .deploy(&request(dir.path()), Some(observer))
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), 0);
}
