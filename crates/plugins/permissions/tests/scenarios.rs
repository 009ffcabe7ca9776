//! End-to-end permission scenarios against the memory adapter.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tree_acl_adapter_memory::{MemoryAdapter, MemoryCache};
use tree_acl_core::{
    AclError, AclResult, AclSettings, CrudFlags, MembershipProvider, NodeId, PermissionRecord,
    PermissionStore, ROLES_MODEL, RoleReference, TreeKind, TreeNode, TreeStore, USERS_MODEL,
};
use tree_acl_permissions::{AclPermissions, FormatOptions};

const INDEX: NodeId = 4;

/// Resources: `Api(1)` and `Controllers(2) -> Pages(3) -> index(4)`.
/// Subjects: roles 1 (superadmin), 2 and 3, user 7 below role 3.
async fn seeded() -> Arc<MemoryAdapter> {
    let adapter = Arc::new(MemoryAdapter::new());

    for node in [
        TreeNode::new(1, "Api"),
        TreeNode::new(2, "Controllers"),
        TreeNode::new(3, "Pages").parent(2),
        TreeNode::new(INDEX, "index").parent(3),
    ] {
        adapter.save_node(TreeKind::Aco, &node).await.unwrap();
    }

    for node in [
        TreeNode::new(1, "Role-superadmin").owner(ROLES_MODEL, 1),
        TreeNode::new(10, "Role-editor").owner(ROLES_MODEL, 2),
        TreeNode::new(11, "Role-author").owner(ROLES_MODEL, 3),
        TreeNode::new(20, "User-7").parent(11).owner(USERS_MODEL, 7),
    ] {
        adapter.save_node(TreeKind::Aro, &node).await.unwrap();
    }

    adapter
}

fn acl(adapter: &Arc<MemoryAdapter>, settings: AclSettings) -> (AclPermissions, Arc<MemoryCache>) {
    let cache = Arc::new(MemoryCache::from_settings(&settings.cache));
    let acl = AclPermissions::builder()
        .tree_store(adapter.clone())
        .permission_store(adapter.clone())
        .membership(adapter.clone())
        .cache(cache.clone())
        .settings(Arc::new(settings))
        .build()
        .unwrap();
    (acl, cache)
}

async fn insert(adapter: &MemoryAdapter, aro_id: NodeId, aco_id: NodeId, flags: CrudFlags) -> i64 {
    adapter
        .create_permission(&PermissionRecord::new(aro_id, aco_id, flags))
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn full_grant_resolves_to_alias_path() {
    let adapter = seeded().await;
    insert(&adapter, 10, INDEX, CrudFlags::all()).await;
    let (acl, _) = acl(&adapter, AclSettings::default());

    let paths = acl.allowed_actions_by_role_id(2).await.unwrap();
    assert_eq!(paths, vec!["Controllers/Pages/index"]);
}

#[tokio::test]
async fn partial_grant_is_not_an_allowed_action() {
    let adapter = seeded().await;
    let flags = CrudFlags {
        read: true,
        update: true,
        delete: true,
        create: false,
    };
    insert(&adapter, 10, INDEX, flags).await;
    let (acl, _) = acl(&adapter, AclSettings::default());

    assert!(acl.allowed_actions_by_role_id(2).await.unwrap().is_empty());
}

#[tokio::test]
async fn identical_paths_are_reported_once() {
    let adapter = seeded().await;
    adapter
        .save_node(TreeKind::Aco, &TreeNode::new(5, "index").parent(3))
        .await
        .unwrap();
    insert(&adapter, 10, INDEX, CrudFlags::all()).await;
    insert(&adapter, 10, 5, CrudFlags::all()).await;
    insert(&adapter, 10, 1, CrudFlags::all()).await;
    let (acl, _) = acl(&adapter, AclSettings::default());

    let paths = acl.allowed_actions_by_role_id(2).await.unwrap();
    assert_eq!(paths, vec!["Controllers/Pages/index", "Api"]);
}

#[tokio::test]
async fn subjects_without_nodes_have_no_actions() {
    let adapter = seeded().await;
    insert(&adapter, 10, INDEX, CrudFlags::all()).await;
    let (acl, _) = acl(&adapter, AclSettings::default().with_multi_role(true));

    assert!(acl.allowed_actions_by_role_id(42).await.unwrap().is_empty());
    assert!(acl.allowed_actions_by_user_id(42).await.unwrap().is_empty());
}

#[tokio::test]
async fn multi_role_user_receives_union_of_roles() {
    let adapter = seeded().await;
    insert(&adapter, 10, INDEX, CrudFlags::all()).await;
    insert(&adapter, 11, INDEX, CrudFlags::all()).await;
    insert(&adapter, 11, 3, CrudFlags::all()).await;
    insert(&adapter, 20, 1, CrudFlags::all()).await;
    adapter.add_role_membership(7, 10).await;
    adapter.add_role_membership(7, 11).await;

    let (single, _) = acl(&adapter, AclSettings::default());
    assert_eq!(single.allowed_actions_by_user_id(7).await.unwrap(), vec!["Api"]);

    let (multi, _) = acl(&adapter, AclSettings::default().with_multi_role(true));
    let mut paths = multi.allowed_actions_by_user_id(7).await.unwrap();
    paths.sort();
    assert_eq!(paths, vec!["Api", "Controllers/Pages", "Controllers/Pages/index"]);
}

#[tokio::test]
async fn failing_membership_lookup_is_an_error() {
    struct Offline;

    #[async_trait]
    impl MembershipProvider for Offline {
        async fn roles_for_user(&self, _user_id: i64) -> AclResult<Vec<NodeId>> {
            Err(AclError::database("users_roles table unavailable"))
        }
    }

    let adapter = seeded().await;
    let acl = AclPermissions::builder()
        .tree_store(adapter.clone())
        .permission_store(adapter)
        .membership(Arc::new(Offline))
        .settings(Arc::new(AclSettings::default().with_multi_role(true)))
        .build()
        .unwrap();

    let err = acl.allowed_actions_by_user_id(7).await.unwrap_err();
    assert!(matches!(err, AclError::MembershipUnavailable { .. }));
    assert_eq!(err.status_code(), 503);
}

#[tokio::test]
async fn orphaned_records_are_skipped() {
    let adapter = seeded().await;
    insert(&adapter, 10, 1, CrudFlags::all()).await;
    insert(&adapter, 10, INDEX, CrudFlags::all()).await;
    adapter.delete_node(TreeKind::Aco, 3).await.unwrap();
    let (acl, _) = acl(&adapter, AclSettings::default());

    assert_eq!(acl.allowed_actions_by_role_id(2).await.unwrap(), vec!["Api"]);
}

#[tokio::test]
async fn writes_are_visible_on_the_next_read() {
    let adapter = seeded().await;
    let (acl, cache) = acl(&adapter, AclSettings::default());

    assert!(acl.allowed_actions_by_role_id(2).await.unwrap().is_empty());

    // Bypassing the writer leaves the cached answer in place.
    let id = insert(&adapter, 10, INDEX, CrudFlags::all()).await;
    assert!(acl.allowed_actions_by_role_id(2).await.unwrap().is_empty());

    acl.on_permission_persisted().await.unwrap();
    assert_eq!(
        acl.allowed_actions_by_role_id(2).await.unwrap(),
        vec!["Controllers/Pages/index"]
    );

    acl.delete(id).await.unwrap();
    assert!(acl.allowed_actions_by_role_id(2).await.unwrap().is_empty());

    acl.save(&PermissionRecord::new(10, 1, CrudFlags::all()))
        .await
        .unwrap();
    assert_eq!(acl.allowed_actions_by_role_id(2).await.unwrap(), vec!["Api"]);
    assert_eq!(cache.generation("permissions").await, 3);
}

#[tokio::test]
async fn structural_changes_are_visible_after_the_structure_hook() {
    let adapter = seeded().await;
    insert(&adapter, 10, INDEX, CrudFlags::all()).await;
    let (acl, _) = acl(&adapter, AclSettings::default().with_multi_role(true));

    assert_eq!(
        acl.allowed_actions_by_role_id(2).await.unwrap(),
        vec!["Controllers/Pages/index"]
    );
    assert!(acl.allowed_actions_by_user_id(7).await.unwrap().is_empty());

    adapter
        .save_node(TreeKind::Aco, &TreeNode::new(3, "Articles").parent(2))
        .await
        .unwrap();
    adapter.add_role_membership(7, 10).await;

    // Tree and membership writes never reach the cache on their own.
    assert_eq!(
        acl.allowed_actions_by_role_id(2).await.unwrap(),
        vec!["Controllers/Pages/index"]
    );
    assert!(acl.allowed_actions_by_user_id(7).await.unwrap().is_empty());

    acl.on_structure_changed().await.unwrap();
    assert_eq!(
        acl.allowed_actions_by_role_id(2).await.unwrap(),
        vec!["Controllers/Articles/index"]
    );
    assert_eq!(
        acl.allowed_actions_by_user_id(7).await.unwrap(),
        vec!["Controllers/Articles/index"]
    );
}

#[tokio::test]
async fn disabled_cache_always_reads_through() {
    let adapter = seeded().await;
    let settings = AclSettings::from_toml_str("[cache]\nenabled = false\n").unwrap();
    let (acl, cache) = acl(&adapter, settings);

    assert!(acl.allowed_actions_by_role_id(2).await.unwrap().is_empty());
    insert(&adapter, 10, INDEX, CrudFlags::all()).await;
    assert_eq!(acl.allowed_actions_by_role_id(2).await.unwrap().len(), 1);
    assert_eq!(cache.len("permissions").await, 0);
}

#[tokio::test]
async fn matrix_reports_every_role() {
    let adapter = seeded().await;
    insert(&adapter, 10, 3, CrudFlags::all()).await;
    insert(&adapter, 11, INDEX, CrudFlags::read_only()).await;
    let (acl, _) = acl(&adapter, AclSettings::default());

    let acos = vec![
        adapter.get_node(TreeKind::Aco, 2).await.unwrap().unwrap(),
        adapter.get_node(TreeKind::Aco, INDEX).await.unwrap().unwrap(),
    ];
    let aros = BTreeMap::from([(1, 1), (2, 10), (3, 11)]);

    let matrix = acl.format(&acos, &aros, &FormatOptions::default()).await.unwrap();
    assert_eq!(matrix[&2].alias, "Controllers");
    assert_eq!(matrix[&2].children, 2);
    assert_eq!(matrix[&2].roles, Some(BTreeMap::from([(1, 1), (2, 0), (3, 0)])));
    assert_eq!(matrix[&INDEX].depth, 2);
    assert_eq!(matrix[&INDEX].roles, Some(BTreeMap::from([(1, 1), (2, 1), (3, 0)])));

    let bare = acl
        .format(&acos, &aros, &FormatOptions::new().include_perms(false))
        .await
        .unwrap();
    assert!(bare.values().all(|entry| entry.roles.is_none()));

    let json = serde_json::to_value(&bare).unwrap();
    assert!(json["2"].get("roles").is_none());
}

#[tokio::test]
async fn superadmin_is_granted_without_records() {
    let adapter = seeded().await;
    let (acl, _) = acl(&adapter, AclSettings::default());

    let acos = vec![adapter.get_node(TreeKind::Aco, INDEX).await.unwrap().unwrap()];
    let aros = BTreeMap::from([(1, 1)]);

    let matrix = acl.format(&acos, &aros, &FormatOptions::default()).await.unwrap();
    assert_eq!(matrix[&INDEX].roles, Some(BTreeMap::from([(1, 1)])));
    assert!(!acl.check(&RoleReference::role(1), "Controllers/Pages/index").await.unwrap());
}
