//! ECS adapter request shaping and response decoding against a stub
//! HTTP server.

use nodelift_provision::provider::ecs::EcsClient;
use nodelift_provision::provider::{LoginMethod, ProviderError, ProviderGateway, ProvisionRequest};
use serde_json::json;
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> ProvisionRequest {
    ProvisionRequest {
        template_id: "lt-test".to_string(),
        count: 2,
        period: None,
        period_unit: None,
        login: LoginMethod::KeyPair("k1".to_string()),
        instance_name: "worker-2019-11-06-15-04-[2,3]".to_string(),
        host_name: "worker-2019-11-06-15-04-[2,3]".to_string(),
        client_token: "2019-11-06-15-04".to_string(),
        dry_run: false,
    }
}

async fn client(server: &MockServer) -> EcsClient {
    EcsClient::with_endpoint(server.uri(), "cn-test", "ak", "secret").unwrap()
}

#[tokio::test]
async fn create_instances_shapes_the_run_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("x-acs-action", "RunInstances"))
        .and(header("x-acs-version", "2014-05-26"))
        .and(header_exists("Authorization"))
        .and(query_param("RegionId", "cn-test"))
        .and(query_param("LaunchTemplateId", "lt-test"))
        .and(query_param("Amount", "2"))
        .and(query_param("KeyPairName", "k1"))
        .and(query_param("ClientToken", "2019-11-06-15-04"))
        .and(query_param("InstanceName", "worker-2019-11-06-15-04-[2,3]"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "RequestId": "req-1",
            "InstanceIdSets": { "InstanceIdSet": ["i-1", "i-2"] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ids = client(&server).await.create_instances(&request()).await.unwrap();
    assert_eq!(ids, ["i-1", "i-2"]);
}

#[tokio::test]
async fn password_login_and_dry_run_are_forwarded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("x-acs-action", "RunInstances"))
        .and(query_param("Password", "hunter2"))
        .and(query_param("DryRun", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "RequestId": "req-1",
            "InstanceIdSets": { "InstanceIdSet": [] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut req = request();
    req.login = LoginMethod::Password("hunter2".to_string());
    req.dry_run = true;

    let ids = client(&server).await.create_instances(&req).await.unwrap();
    assert!(ids.is_empty());
}

#[tokio::test]
async fn provider_rejection_surfaces_as_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("x-acs-action", "RunInstances"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "Code": "InvalidTemplate.NotFound",
            "Message": "The specified launch template does not exist.",
            "RequestId": "req-err"
        })))
        .mount(&server)
        .await;

    let err = client(&server).await.create_instances(&request()).await.unwrap_err();
    match err {
        ProviderError::Api { code, request_id, .. } => {
            assert_eq!(code, "InvalidTemplate.NotFound");
            assert_eq!(request_id.as_deref(), Some("req-err"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn describe_instances_decodes_node_details() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("x-acs-action", "DescribeInstances"))
        .and(query_param("RegionId", "cn-test"))
        .and(query_param("InstanceIds", r#"["i-1","i-2"]"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "RequestId": "req-2",
            "Instances": { "Instance": [
                {
                    "InstanceId": "i-1",
                    "HostName": "worker-1",
                    "CreationTime": "2019-11-06T09:22Z",
                    "InnerIpAddress": { "IpAddress": ["10.0.0.5"] }
                },
                {
                    "InstanceId": "i-2",
                    "HostName": "worker-2",
                    "CreationTime": "2019-11-06T09:22Z",
                    "InnerIpAddress": { "IpAddress": [] },
                    "VpcAttributes": { "PrivateIpAddress": { "IpAddress": ["172.16.0.6"] } }
                }
            ] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let described = client(&server)
        .await
        .describe_instances(&["i-1".to_string(), "i-2".to_string()])
        .await
        .unwrap();

    assert_eq!(described.len(), 2);
    assert_eq!(described[0].instance_id, "i-1");
    assert_eq!(described[0].private_ips, ["10.0.0.5"]);
    assert_eq!(described[0].host_name, "worker-1");
    assert!(described[0].created_at.is_some());

    // VPC private address is the fallback when no inner address exists.
    assert_eq!(described[1].private_ips, ["172.16.0.6"]);
}

#[tokio::test]
async fn unparseable_error_body_keeps_the_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client(&server).await.create_instances(&request()).await.unwrap_err();
    match err {
        ProviderError::Api { code, message, .. } => {
            assert_eq!(code, "HTTP 502");
            assert_eq!(message, "bad gateway");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}
