//! Secret-aware variable gateway tests.
//!
//! Run with: `cargo test -p weave-tests --test variables_tests`

use pretty_assertions::assert_eq;
use weave_core::Error;
use weave_core::ports::VariableGateway;
use weave_core::variables::{
    CallerIdentity, PASSWORD_PLACEHOLDER, VariableRef, VariableScope, VariableType,
};
use weave_secrets::{GatewayConfig, NativeVault, SecretVariableGateway};
use weave_tests::{OWNER_GROUP, init_test_logging};

fn gateway() -> SecretVariableGateway {
    init_test_logging();
    SecretVariableGateway::new(
        NativeVault::from_master_key("integration-master-key"),
        GatewayConfig::default().with_authorised_group(OWNER_GROUP),
    )
}

#[tokio::test]
async fn test_application_variables_round_trip() {
    let gateway = gateway();
    let owner = CallerIdentity::user("alice").with_group(OWNER_GROUP);

    gateway
        .insert(&VariableRef::application("my-app", "region"), VariableType::String, "eu-west", &owner)
        .await
        .unwrap();
    gateway
        .insert(&VariableRef::application("my-app", "token"), VariableType::Secret, "s3cr3t", &owner)
        .await
        .unwrap();
    gateway
        .insert(&VariableRef::application("my-app", "deploy_key"), VariableType::Key, "-----BEGIN KEY-----", &owner)
        .await
        .unwrap();

    let masked = gateway.list_masked(VariableScope::Application, "my-app").await.unwrap();
    let values: Vec<(&str, &str)> = masked.iter().map(|v| (v.name.as_str(), v.value.as_str())).collect();
    assert_eq!(
        values,
        vec![
            ("region", "eu-west"),
            ("token", PASSWORD_PLACEHOLDER),
            ("deploy_key", PASSWORD_PLACEHOLDER),
        ]
    );

    let clear = gateway
        .list_decrypted(VariableScope::Application, "my-app", &owner)
        .await
        .unwrap();
    assert_eq!(clear[1].value, "s3cr3t");
    assert_eq!(clear[2].value, "-----BEGIN KEY-----");
}

#[tokio::test]
async fn test_secret_survives_masked_edit() {
    let gateway = gateway();
    let owner = CallerIdentity::user("alice").with_group(OWNER_GROUP);
    let token = VariableRef::application("my-app", "token");

    gateway.insert(&token, VariableType::Secret, "s3cr3t", &owner).await.unwrap();

    // A UI round-trip sends the placeholder back unchanged
    let shown = gateway.get_masked(&token).await.unwrap();
    gateway
        .update(&token, VariableType::Secret, &shown.value, &owner)
        .await
        .unwrap();
    assert_eq!(gateway.get_decrypted(&token, &owner).await.unwrap().value, "s3cr3t");

    gateway.update(&token, VariableType::Secret, "rotated", &owner).await.unwrap();
    assert_eq!(gateway.get_decrypted(&token, &owner).await.unwrap().value, "rotated");
}

#[tokio::test]
async fn test_clear_values_need_an_authorised_caller() {
    let gateway = gateway();
    let owner = CallerIdentity::user("alice").with_group(OWNER_GROUP);
    let token = VariableRef::project("WEAVE", "token");
    gateway.insert(&token, VariableType::Secret, "s3cr3t", &owner).await.unwrap();

    assert!(matches!(
        gateway.get_decrypted(&token, &CallerIdentity::anonymous()).await,
        Err(Error::PermissionDenied(_))
    ));
    assert!(matches!(
        gateway.get_decrypted(&token, &CallerIdentity::user("bob")).await,
        Err(Error::PermissionDenied(_))
    ));
}

#[tokio::test]
async fn test_scopes_are_isolated() {
    let gateway = gateway();
    let owner = CallerIdentity::user("alice").with_group(OWNER_GROUP);

    gateway
        .insert(&VariableRef::project("WEAVE", "token"), VariableType::Secret, "project", &owner)
        .await
        .unwrap();
    gateway
        .insert(&VariableRef::application("WEAVE", "token"), VariableType::Secret, "app", &owner)
        .await
        .unwrap();

    let project = gateway
        .get_decrypted(&VariableRef::project("WEAVE", "token"), &owner)
        .await
        .unwrap();
    assert_eq!(project.value, "project");

    assert!(matches!(
        gateway
            .delete(&VariableRef::application("WEAVE", "token"), &CallerIdentity::anonymous())
            .await,
        Err(Error::PermissionDenied(_))
    ));
    gateway
        .delete(&VariableRef::application("WEAVE", "token"), &owner)
        .await
        .unwrap();
    assert!(matches!(
        gateway.get_masked(&VariableRef::application("WEAVE", "token")).await,
        Err(Error::VariableNotFound(_))
    ));
    assert!(gateway.get_masked(&VariableRef::project("WEAVE", "token")).await.is_ok());
}
