use axum::body::to_bytes;
use axum::http::StatusCode;
use polycluster_apiserver::config::ApiServerConfig;
use polycluster_apiserver::inventory::builtin_inventory;
use polycluster_apiserver::server::ApiServer;
use polycluster_kernel::apis::{GroupResource, GroupVersionResource};
use polycluster_testing::{
    FailingStorageFactory, InventoryBuilder, RecordingStorageFactory, deployment, pod, request,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

async fn call(app: axum::Router, uri: &str, accept: Option<&str>) -> (StatusCode, Value) {
    let resp = app.oneshot(request(uri, accept)).await.unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_storage_is_built_once_per_resource_version() {
    let factory = RecordingStorageFactory::new();
    let server = ApiServer::new(
        ApiServerConfig::default(),
        Arc::new(factory.clone()),
        &builtin_inventory(),
    );
    let inventory = InventoryBuilder::new()
        .resource("apps", "v1", "deployments", "Deployment", true)
        .resource("apps", "v1", "deployments/status", "Deployment", true)
        .resource("example.io", "v1", "widgets", "Widget", true)
        .build();

    server.set_cluster_resources("east", &inventory);
    server.set_cluster_resources("west", &inventory);
    server.set_cluster_resources("east", &inventory);

    assert_eq!(
        factory.built_resources(),
        vec![GroupVersionResource::new("apps", "v1", "deployments")]
    );
    assert!(
        !server
            .discovery()
            .resource_enabled("", &GroupVersionResource::new("example.io", "v1", "widgets"))
    );
}

#[tokio::test]
async fn test_requests_reach_storage_with_cluster_scope() {
    let factory = RecordingStorageFactory::new();
    let server = ApiServer::new(
        ApiServerConfig::default(),
        Arc::new(factory.clone()),
        &builtin_inventory(),
    );
    let inventory = InventoryBuilder::new()
        .resource("", "v1", "pods", "Pod", true)
        .resource("apps", "v1", "deployments", "Deployment", true)
        .build();
    server.set_cluster_resources("east", &inventory);
    server.set_cluster_resources("west", &inventory);

    let pods = GroupResource::new("", "pods");
    factory.store().insert("east", pods.clone(), pod("default", "a", "n1")).unwrap();
    factory.store().insert("west", pods, pod("default", "b", "n2")).unwrap();
    factory
        .store()
        .insert("west", GroupResource::new("apps", "deployments"), deployment("prod", "api", 3))
        .unwrap();

    let app = server.build_app();
    let (status, body) = call(app.clone(), "/clusters/west/api/v1/pods", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["metadata"]["name"], "b");

    let (status, body) = call(app.clone(), "/api/v1/pods", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);

    let (status, body) = call(
        app,
        "/apis/apps/v1/namespaces/prod/deployments",
        Some("application/json;as=Table;v=v1;g=meta.k8s.io"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows"][0]["cells"][0], "west");
    assert_eq!(body["rows"][0]["cells"][2], "3/3");

    polycluster_testing::assert_storage_called!(factory, 3);
    let calls = factory.calls.lock();
    assert_eq!(calls[0].1.cluster.as_deref(), Some("west"));
    assert_eq!(calls[1].1.cluster, None);
    assert_eq!(calls[2].1.namespace.as_deref(), Some("prod"));
}

#[tokio::test]
async fn test_registered_only_resources_answer_not_implemented() {
    let server = ApiServer::new(
        ApiServerConfig::default(),
        Arc::new(FailingStorageFactory::new().failing_on("pods")),
        &builtin_inventory(),
    );
    let inventory = InventoryBuilder::new()
        .resource("", "v1", "pods", "Pod", true)
        .resource("", "v1", "services", "Service", true)
        .build();
    server.set_cluster_resources("east", &inventory);

    let pods = GroupVersionResource::new("", "v1", "pods");
    assert!(server.discovery().resource_enabled("east", &pods));
    assert!(server.rest_manager().rest_resource_info(&pods).is_registered_only());

    let app = server.build_app();
    let (status, body) = call(app.clone(), "/api/v1/pods", None).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body["kind"], "Status");

    let (status, body) = call(app, "/api/v1/services", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "ServiceList");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_see_whole_snapshots_during_rebuilds() {
    let server = Arc::new(ApiServer::new(
        ApiServerConfig::default(),
        Arc::new(RecordingStorageFactory::new()),
        &builtin_inventory(),
    ));
    let small = InventoryBuilder::new()
        .resource("apps", "v1", "deployments", "Deployment", true)
        .build();
    let large = InventoryBuilder::new()
        .resource("apps", "v1", "deployments", "Deployment", true)
        .resource("apps", "v1", "statefulsets", "StatefulSet", true)
        .resource("batch", "v1", "jobs", "Job", true)
        .build();
    server.set_cluster_resources("east", &small);
    let app = server.build_app();

    let writer = {
        let server = server.clone();
        tokio::spawn(async move {
            for i in 0..200 {
                let inventory = if i % 2 == 0 { &large } else { &small };
                server.set_cluster_resources("east", inventory);
                tokio::task::yield_now().await;
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let app = app.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..100 {
                let (status, body) = call(app.clone(), "/clusters/east/apis", None).await;
                assert_eq!(status, StatusCode::OK);
                let groups: Vec<_> = body["groups"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|g| g["name"].as_str().unwrap().to_string())
                    .collect();
                assert!(
                    groups == ["apps"] || groups == ["apps", "batch"],
                    "torn group list: {groups:?}"
                );

                let (status, body) = call(app.clone(), "/clusters/east/apis/apps/v1", None).await;
                assert_eq!(status, StatusCode::OK);
                let count = body["resources"].as_array().unwrap().len();
                assert!(count == 1 || count == 2, "torn resource list: {count}");
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}
