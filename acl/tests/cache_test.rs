//! Permission cache behaviour as seen through the engine.
//!
//! `Fixture::loads` counts how often the full permission set was read from
//! the backing store.

mod helpers;

use acl::permissions::Deletion;
use futures::future::join_all;
use helpers::{Fixture, User};

#[tokio::test]
async fn test_permissions_are_cached() {
    let fx = Fixture::new().await;
    let before = fx.loads();

    let first = fx.acl.get_permissions().await.unwrap();
    assert_eq!(fx.loads(), before + 1);

    let second = fx.acl.get_permissions().await.unwrap();
    assert_eq!(fx.loads(), before + 1);
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[tokio::test]
async fn test_creating_permission_flushes_cache() {
    let fx = Fixture::new().await;
    fx.acl.get_permissions().await.unwrap();

    fx.acl.create_permission("new", None).await.unwrap();
    let before = fx.loads();

    let snapshot = fx.acl.get_permissions().await.unwrap();
    fx.acl.get_permissions().await.unwrap();

    assert_eq!(fx.loads(), before + 1);
    assert!(snapshot.find_by_name("new", "web").is_some());
}

#[tokio::test]
async fn test_creating_role_flushes_cache() {
    let fx = Fixture::new().await;
    fx.acl.get_permissions().await.unwrap();

    fx.acl.create_role("new", None).await.unwrap();
    let before = fx.loads();

    fx.acl.get_permissions().await.unwrap();
    assert_eq!(fx.loads(), before + 1);
}

#[tokio::test]
async fn test_updating_role_flushes_cache() {
    let fx = Fixture::new().await;
    let role = fx.acl.create_role("new", None).await.unwrap();
    fx.acl.get_permissions().await.unwrap();

    fx.acl.rename_role(&role, "other name").await.unwrap();
    let before = fx.loads();

    fx.acl.get_permissions().await.unwrap();
    assert_eq!(fx.loads(), before + 1);
}

#[tokio::test]
async fn test_deleting_permission_flushes_cache() {
    let fx = Fixture::new().await;
    fx.acl.get_permissions().await.unwrap();

    fx.acl.delete_permission(&fx.user_permission2).await.unwrap();
    let before = fx.loads();

    let snapshot = fx.acl.get_permissions().await.unwrap();
    assert_eq!(fx.loads(), before + 1);
    assert!(snapshot.find_by_name("edit-news", "web").is_none());
}

#[tokio::test]
async fn test_subject_deletion_does_not_flush_cache() {
    let fx = Fixture::new().await;
    fx.acl.get_permissions().await.unwrap();
    let before = fx.loads();

    fx.acl
        .delete_subject(&User::new(), Deletion::Hard)
        .await
        .unwrap();

    fx.acl.get_permissions().await.unwrap();
    assert_eq!(fx.loads(), before);
}

#[tokio::test]
async fn test_giving_permission_to_role_flushes_cache() {
    let fx = Fixture::new().await;

    fx.acl
        .give_permission_to_role(&fx.user_role, &[(&fx.user_permission).into()])
        .await
        .unwrap();
    let before = fx.loads();

    let snapshot = fx.acl.get_permissions().await.unwrap();
    assert_eq!(fx.loads(), before + 1);

    let cached = snapshot.find_by_id(fx.user_permission.id).unwrap();
    assert!(cached.granted_to_role(fx.user_role.id));
}

#[tokio::test]
async fn test_has_permission_to_uses_the_cache() {
    let fx = Fixture::new().await;

    fx.acl
        .give_permission_to_role(&fx.user_role, &["edit-articles".into(), "edit-news".into()])
        .await
        .unwrap();
    fx.acl.assign_role(&fx.user, "testRole").await.unwrap();
    let before = fx.loads();

    assert!(fx
        .acl
        .has_permission_to(&fx.user, "edit-articles", None)
        .await
        .unwrap());
    assert_eq!(fx.loads(), before + 1);

    assert!(fx
        .acl
        .has_permission_to(&fx.user, "edit-news", None)
        .await
        .unwrap());
    assert!(fx
        .acl
        .has_permission_to(&fx.user, "edit-articles", None)
        .await
        .unwrap());
    assert_eq!(fx.loads(), before + 1);
}

#[tokio::test]
async fn test_read_after_grant_sees_the_grant() {
    let fx = Fixture::new().await;
    fx.acl.assign_role(&fx.user, "testRole").await.unwrap();

    // Populate the cache before the grant
    assert!(!fx
        .acl
        .has_permission_to(&fx.user, "edit-articles", None)
        .await
        .unwrap());

    fx.acl
        .give_permission_to_role(&fx.user_role, &["edit-articles".into()])
        .await
        .unwrap();

    assert!(fx
        .acl
        .has_permission_to(&fx.user, "edit-articles", None)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_concurrent_misses_agree() {
    let fx = Fixture::new().await;
    let before = fx.loads();

    let snapshots = join_all((0..8).map(|_| fx.acl.get_permissions())).await;

    let first = snapshots[0].as_ref().unwrap();
    for snapshot in &snapshots {
        assert_eq!(snapshot.as_ref().unwrap(), first);
    }
    assert!(fx.loads() > before);

    // Once populated, nobody goes back to the store
    let settled = fx.loads();
    fx.acl.get_permissions().await.unwrap();
    assert_eq!(fx.loads(), settled);
}

#[tokio::test]
async fn test_forget_cached_permissions() {
    let fx = Fixture::new().await;
    fx.acl.get_permissions().await.unwrap();

    fx.acl.forget_cached_permissions().await.unwrap();
    let before = fx.loads();

    fx.acl.get_permissions().await.unwrap();
    assert_eq!(fx.loads(), before + 1);
}
