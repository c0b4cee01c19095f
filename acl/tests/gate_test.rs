//! Gate integration and boundary checks.

mod helpers;

use acl::permissions::{
    authorize_any_permission, authorize_any_role, register_permissions, AclError, AclResult,
    BeforeHook, Gate,
};
use async_trait::async_trait;
use helpers::{Fixture, User};

fn gate(fx: &Fixture) -> Gate<User> {
    let mut gate = Gate::new();
    register_permissions(&mut gate, fx.acl.clone());
    gate
}

struct DenyEverything;

#[async_trait]
impl BeforeHook<User> for DenyEverything {
    async fn before(&self, _user: &User, _ability: &str) -> AclResult<Option<bool>> {
        Ok(Some(false))
    }
}

#[tokio::test]
async fn test_gate_allows_granted_permissions() {
    let fx = Fixture::new().await;
    let gate = gate(&fx);

    assert!(!gate.allows(&fx.user, "edit-articles").await.unwrap());

    fx.acl
        .give_permission_to(&fx.user, &["edit-articles".into()])
        .await
        .unwrap();
    assert!(gate.allows(&fx.user, "edit-articles").await.unwrap());
    assert!(gate.denies(&fx.user, "edit-news").await.unwrap());
}

#[tokio::test]
async fn test_gate_allows_permissions_via_roles() {
    let fx = Fixture::new().await;
    let gate = gate(&fx);

    fx.acl
        .give_permission_to_role(&fx.user_role, &["edit-news".into()])
        .await
        .unwrap();
    fx.acl.assign_role(&fx.user, "testRole").await.unwrap();

    assert!(gate.allows(&fx.user, "edit-news").await.unwrap());
}

#[tokio::test]
async fn test_unknown_permission_defers_to_abilities() {
    let fx = Fixture::new().await;
    let mut gate = gate(&fx);
    gate.define("publish", |_: &User| true);

    assert!(gate.allows(&fx.user, "publish").await.unwrap());
    assert!(!gate.allows(&fx.user, "not-a-permission").await.unwrap());
}

#[tokio::test]
async fn test_missing_permission_abstains_rather_than_denies() {
    let fx = Fixture::new().await;
    let mut gate = gate(&fx);
    gate.define("edit-articles", |_: &User| true);

    // No grant, so the ability check decides
    assert!(gate.allows(&fx.user, "edit-articles").await.unwrap());
}

#[tokio::test]
async fn test_earlier_denial_is_not_overridden() {
    let fx = Fixture::new().await;
    let mut gate = Gate::new();
    gate.before(DenyEverything);
    register_permissions(&mut gate, fx.acl.clone());

    fx.acl
        .give_permission_to(&fx.user, &["edit-articles".into()])
        .await
        .unwrap();
    assert!(!gate.allows(&fx.user, "edit-articles").await.unwrap());
}

#[tokio::test]
async fn test_authorize_any_permission() {
    let fx = Fixture::new().await;
    let gate = gate(&fx);

    let err = authorize_any_permission(&fx.acl, &gate, None, "edit-articles")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "User is not logged in.");

    let err = authorize_any_permission(&fx.acl, &gate, Some(&fx.user), "edit-articles|edit-news")
        .await
        .unwrap_err();
    let unauthorized = match err {
        AclError::Unauthorized(unauthorized) => unauthorized,
        other => panic!("expected Unauthorized, got {other:?}"),
    };
    assert_eq!(unauthorized.to_string(), "User does not have the right permissions.");
    assert_eq!(
        unauthorized.required_permissions(),
        ["edit-articles", "edit-news"]
    );

    fx.acl
        .give_permission_to(&fx.user, &["edit-news".into()])
        .await
        .unwrap();
    authorize_any_permission(&fx.acl, &gate, Some(&fx.user), "edit-articles|edit-news")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_authorize_any_permission_can_list_requirements() {
    let fx = Fixture::with_display(true).await;
    let gate = gate(&fx);

    let err = authorize_any_permission(&fx.acl, &gate, Some(&fx.user), "edit-articles|edit-news")
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "User does not have the right permissions. Necessary permissions are edit-articles, edit-news"
    );
}

#[tokio::test]
async fn test_authorize_any_role() {
    let fx = Fixture::with_display(true).await;

    let err = authorize_any_role::<User>(&fx.acl, None, "testRole")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "User is not logged in.");

    let err = authorize_any_role(&fx.acl, Some(&fx.user), "testRole|testRole2")
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "User does not have the right roles. Necessary roles are testRole, testRole2"
    );

    fx.acl.assign_role(&fx.user, "testRole2").await.unwrap();
    authorize_any_role(&fx.acl, Some(&fx.user), "testRole|testRole2")
        .await
        .unwrap();
}
