// ABOUTME: Integration tests for tenant-scope confinement at the repository layer
// ABOUTME: Verifies reads, counts, and writes never cross a tenant boundary under a scoped call
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{create_password_user, create_tenant, create_test_repository, TEST_PASSWORD};
use tenauth::database::{IdentityRepository, TenantScope};
use tenauth::models::UserRole;
use uuid::Uuid;

#[tokio::test]
async fn scoped_get_user_cannot_cross_tenants() {
    let repository = create_test_repository().await.unwrap();
    let acme = create_tenant(&repository, "acme").await.unwrap();
    let beta = create_tenant(&repository, "beta").await.unwrap();
    let acme_user = create_password_user(&repository, &acme, "a@x.com", TEST_PASSWORD)
        .await
        .unwrap();

    // Visible from the owning tenant's scope
    let found = repository
        .get_user(TenantScope::Tenant(acme.id), acme_user.id)
        .await
        .unwrap();
    assert!(found.is_some());

    // Invisible from another tenant's scope, even by exact id
    let hidden = repository
        .get_user(TenantScope::Tenant(beta.id), acme_user.id)
        .await
        .unwrap();
    assert!(hidden.is_none());
}

#[tokio::test]
async fn email_lookup_is_first_match_within_the_scope() {
    let repository = create_test_repository().await.unwrap();
    let acme = create_tenant(&repository, "acme").await.unwrap();
    let beta = create_tenant(&repository, "beta").await.unwrap();
    let acme_user = create_password_user(&repository, &acme, "b@x.com", TEST_PASSWORD)
        .await
        .unwrap();
    let beta_user = create_password_user(&repository, &beta, "b@x.com", TEST_PASSWORD)
        .await
        .unwrap();

    let in_acme = repository
        .get_user_by_email(TenantScope::Tenant(acme.id), "b@x.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(in_acme.id, acme_user.id);

    let in_beta = repository
        .get_user_by_email(TenantScope::Tenant(beta.id), "b@x.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(in_beta.id, beta_user.id);
}

#[tokio::test]
async fn list_and_count_are_confined_to_the_scope() {
    let repository = create_test_repository().await.unwrap();
    let acme = create_tenant(&repository, "acme").await.unwrap();
    let beta = create_tenant(&repository, "beta").await.unwrap();
    create_password_user(&repository, &acme, "a1@x.com", TEST_PASSWORD)
        .await
        .unwrap();
    create_password_user(&repository, &acme, "a2@x.com", TEST_PASSWORD)
        .await
        .unwrap();
    create_password_user(&repository, &beta, "b1@x.com", TEST_PASSWORD)
        .await
        .unwrap();

    let acme_users = repository.list_users(TenantScope::Tenant(acme.id)).await.unwrap();
    assert_eq!(acme_users.len(), 2);
    assert!(acme_users.iter().all(|u| u.tenant_id == acme.id));

    assert_eq!(
        repository.count_users(TenantScope::Tenant(beta.id)).await.unwrap(),
        1
    );

    // Unscoped sees everything
    assert_eq!(repository.count_users(TenantScope::Unscoped).await.unwrap(), 3);
}

#[tokio::test]
async fn scoped_writes_affect_zero_rows_across_the_boundary() {
    let repository = create_test_repository().await.unwrap();
    let acme = create_tenant(&repository, "acme").await.unwrap();
    let beta = create_tenant(&repository, "beta").await.unwrap();
    let acme_user = create_password_user(&repository, &acme, "a@x.com", TEST_PASSWORD)
        .await
        .unwrap();

    let cross = repository
        .update_user_password(TenantScope::Tenant(beta.id), acme_user.id, "$2b$04$new")
        .await
        .unwrap();
    assert_eq!(cross, 0);

    let cross_mfa = repository
        .update_user_mfa(TenantScope::Tenant(beta.id), acme_user.id, true, Some("S3CRET"))
        .await
        .unwrap();
    assert_eq!(cross_mfa, 0);

    // The row is untouched
    let reloaded = repository
        .get_user(TenantScope::Tenant(acme.id), acme_user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.password_hash, acme_user.password_hash);
    assert!(!reloaded.mfa_enabled);
}

#[tokio::test]
async fn unscoped_writes_reach_any_tenant() {
    let repository = create_test_repository().await.unwrap();
    let acme = create_tenant(&repository, "acme").await.unwrap();
    let user = create_password_user(&repository, &acme, "a@x.com", TEST_PASSWORD)
        .await
        .unwrap();

    let updated = repository
        .update_user_password(TenantScope::Unscoped, user.id, "$2b$04$replaced")
        .await
        .unwrap();
    assert_eq!(updated, 1);
}

#[tokio::test]
async fn scope_derivation_follows_role() {
    let tenant_id = Uuid::new_v4();
    assert_eq!(
        TenantScope::for_caller(UserRole::User, tenant_id),
        TenantScope::Tenant(tenant_id)
    );
    assert_eq!(
        TenantScope::for_caller(UserRole::Admin, tenant_id),
        TenantScope::Tenant(tenant_id)
    );
    assert_eq!(
        TenantScope::for_caller(UserRole::SuperAdmin, tenant_id),
        TenantScope::Unscoped
    );
}

#[tokio::test]
async fn login_candidate_lookup_sees_across_tenants() {
    let repository = create_test_repository().await.unwrap();
    let acme = create_tenant(&repository, "acme").await.unwrap();
    let beta = create_tenant(&repository, "beta").await.unwrap();
    create_password_user(&repository, &acme, "b@x.com", TEST_PASSWORD)
        .await
        .unwrap();
    create_password_user(&repository, &beta, "b@x.com", TEST_PASSWORD)
        .await
        .unwrap();

    let candidates = repository.find_login_candidates_by_email("b@x.com").await.unwrap();
    assert_eq!(candidates.len(), 2);
    let tenant_ids: Vec<Uuid> = candidates.iter().map(|(_, t)| t.id).collect();
    assert!(tenant_ids.contains(&acme.id));
    assert!(tenant_ids.contains(&beta.id));
}
