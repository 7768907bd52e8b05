// ABOUTME: Integration tests for tenant disambiguation and selection tokens
// ABOUTME: Covers multi-tenant principals, hints, single-use sessions, and shape rejection
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{
    create_password_user, create_tenant, create_tenant_with_status, create_test_issuer,
    create_test_service, TEST_PASSWORD,
};
use tenauth::auth::{LoginOutcome, SelectionChallenge};
use tenauth::errors::AuthError;
use tenauth::models::TenantStatus;
use uuid::Uuid;

async fn multi_tenant_login(
    service: &tenauth::auth::AuthService,
    hint: Option<&str>,
) -> SelectionChallenge {
    match service.login("b@x.com", TEST_PASSWORD, hint).await.unwrap() {
        LoginOutcome::SelectionRequired(challenge) => challenge,
        other => panic!("expected selection challenge, got {other:?}"),
    }
}

#[tokio::test]
async fn multi_tenant_principal_gets_selection_challenge() {
    let (service, repository) = create_test_service().await.unwrap();
    let acme = create_tenant(&repository, "acme").await.unwrap();
    let beta = create_tenant(&repository, "beta").await.unwrap();
    create_password_user(&repository, &acme, "b@x.com", TEST_PASSWORD)
        .await
        .unwrap();
    create_password_user(&repository, &beta, "b@x.com", TEST_PASSWORD)
        .await
        .unwrap();

    let challenge = multi_tenant_login(&service, None).await;
    assert_eq!(challenge.tenants.len(), 2);
    let slugs: Vec<&str> = challenge.tenants.iter().map(|t| t.slug.as_str()).collect();
    assert!(slugs.contains(&"acme"));
    assert!(slugs.contains(&"beta"));
    assert_eq!(challenge.suggested_tenant_id, None);
}

#[tokio::test]
async fn select_tenant_completes_the_login() {
    let (service, repository) = create_test_service().await.unwrap();
    let acme = create_tenant(&repository, "acme").await.unwrap();
    let beta = create_tenant(&repository, "beta").await.unwrap();
    create_password_user(&repository, &acme, "b@x.com", TEST_PASSWORD)
        .await
        .unwrap();
    let beta_user = create_password_user(&repository, &beta, "b@x.com", TEST_PASSWORD)
        .await
        .unwrap();

    let challenge = multi_tenant_login(&service, None).await;
    let outcome = service
        .select_tenant(&challenge.selection_token, beta.id)
        .await
        .unwrap();
    match outcome {
        LoginOutcome::Authenticated(bundle) => {
            assert_eq!(bundle.tenant_id, beta.id);
            assert_eq!(bundle.user_id, beta_user.id);
        }
        other => panic!("expected full token, got {other:?}"),
    }
}

#[tokio::test]
async fn tenant_hint_only_suggests_never_skips() {
    let (service, repository) = create_test_service().await.unwrap();
    let acme = create_tenant(&repository, "acme").await.unwrap();
    let beta = create_tenant(&repository, "beta").await.unwrap();
    create_password_user(&repository, &acme, "b@x.com", TEST_PASSWORD)
        .await
        .unwrap();
    create_password_user(&repository, &beta, "b@x.com", TEST_PASSWORD)
        .await
        .unwrap();

    let challenge = multi_tenant_login(&service, Some("beta")).await;
    // Still a challenge with the full list, plus the suggestion
    assert_eq!(challenge.tenants.len(), 2);
    assert_eq!(challenge.suggested_tenant_id, Some(beta.id));
}

#[tokio::test]
async fn selection_token_is_single_use() {
    let (service, repository) = create_test_service().await.unwrap();
    let acme = create_tenant(&repository, "acme").await.unwrap();
    let beta = create_tenant(&repository, "beta").await.unwrap();
    create_password_user(&repository, &acme, "b@x.com", TEST_PASSWORD)
        .await
        .unwrap();
    create_password_user(&repository, &beta, "b@x.com", TEST_PASSWORD)
        .await
        .unwrap();

    let challenge = multi_tenant_login(&service, None).await;
    service
        .select_tenant(&challenge.selection_token, acme.id)
        .await
        .unwrap();

    let err = service
        .select_tenant(&challenge.selection_token, beta.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidOrExpiredToken));
}

#[tokio::test]
async fn tenant_outside_candidate_list_is_rejected() {
    let (service, repository) = create_test_service().await.unwrap();
    let acme = create_tenant(&repository, "acme").await.unwrap();
    let beta = create_tenant(&repository, "beta").await.unwrap();
    create_tenant(&repository, "gamma").await.unwrap();
    create_password_user(&repository, &acme, "b@x.com", TEST_PASSWORD)
        .await
        .unwrap();
    create_password_user(&repository, &beta, "b@x.com", TEST_PASSWORD)
        .await
        .unwrap();

    let challenge = multi_tenant_login(&service, None).await;
    let err = service
        .select_tenant(&challenge.selection_token, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized));
}

#[tokio::test]
async fn selection_token_is_not_an_access_token() {
    let (service, repository) = create_test_service().await.unwrap();
    let acme = create_tenant(&repository, "acme").await.unwrap();
    let beta = create_tenant(&repository, "beta").await.unwrap();
    create_password_user(&repository, &acme, "b@x.com", TEST_PASSWORD)
        .await
        .unwrap();
    create_password_user(&repository, &beta, "b@x.com", TEST_PASSWORD)
        .await
        .unwrap();

    let challenge = multi_tenant_login(&service, None).await;

    // The decode path for full tokens must reject the selection shape
    let err = create_test_issuer()
        .decode_full_token(&challenge.selection_token)
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidOrExpiredToken));

    // And it cannot be refreshed into one either
    let err = service
        .refresh_token(&challenge.selection_token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidOrExpiredToken));
}

#[tokio::test]
async fn full_token_is_rejected_by_select_tenant() {
    let (service, repository) = create_test_service().await.unwrap();
    let acme = create_tenant(&repository, "acme").await.unwrap();
    create_password_user(&repository, &acme, "a@x.com", TEST_PASSWORD)
        .await
        .unwrap();

    let outcome = service.login("a@x.com", TEST_PASSWORD, None).await.unwrap();
    let full_token = outcome.access_token().unwrap().to_string();

    let err = service.select_tenant(&full_token, acme.id).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidOrExpiredToken));
}

#[tokio::test]
async fn switch_tenant_issues_fresh_scoped_token() {
    let (service, repository) = create_test_service().await.unwrap();
    let acme = create_tenant(&repository, "acme").await.unwrap();
    let beta = create_tenant(&repository, "beta").await.unwrap();
    create_password_user(&repository, &acme, "b@x.com", TEST_PASSWORD)
        .await
        .unwrap();
    let beta_user = create_password_user(&repository, &beta, "b@x.com", TEST_PASSWORD)
        .await
        .unwrap();

    let challenge = multi_tenant_login(&service, None).await;
    let outcome = service
        .select_tenant(&challenge.selection_token, acme.id)
        .await
        .unwrap();
    let acme_token = outcome.access_token().unwrap().to_string();

    let switched = service.switch_tenant(&acme_token, beta.id).await.unwrap();
    match switched {
        LoginOutcome::Authenticated(bundle) => {
            assert_eq!(bundle.tenant_id, beta.id);
            assert_eq!(bundle.user_id, beta_user.id);
        }
        other => panic!("expected full token, got {other:?}"),
    }
}

#[tokio::test]
async fn switch_tenant_requires_membership() {
    let (service, repository) = create_test_service().await.unwrap();
    let acme = create_tenant(&repository, "acme").await.unwrap();
    let beta = create_tenant(&repository, "beta").await.unwrap();
    create_password_user(&repository, &acme, "only-acme@x.com", TEST_PASSWORD)
        .await
        .unwrap();

    let outcome = service
        .login("only-acme@x.com", TEST_PASSWORD, None)
        .await
        .unwrap();
    let token = outcome.access_token().unwrap().to_string();

    let err = service.switch_tenant(&token, beta.id).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn switch_tenant_rejects_paused_and_deleted_targets() {
    let (service, repository) = create_test_service().await.unwrap();
    let acme = create_tenant(&repository, "acme").await.unwrap();
    let frozen = create_tenant_with_status(&repository, "frozen", TenantStatus::Paused)
        .await
        .unwrap();
    let gone = create_tenant_with_status(&repository, "gone", TenantStatus::Deleted)
        .await
        .unwrap();
    create_password_user(&repository, &acme, "multi@x.com", TEST_PASSWORD)
        .await
        .unwrap();
    create_password_user(&repository, &frozen, "multi@x.com", TEST_PASSWORD)
        .await
        .unwrap();
    create_password_user(&repository, &gone, "multi@x.com", TEST_PASSWORD)
        .await
        .unwrap();

    // Only the active tenant is a login candidate, so no selection step
    let outcome = service.login("multi@x.com", TEST_PASSWORD, None).await.unwrap();
    let token = outcome.access_token().unwrap().to_string();

    // Membership exists in both targets; the tenant status alone blocks
    let paused = service.switch_tenant(&token, frozen.id).await.unwrap_err();
    assert!(matches!(paused, AuthError::AccountOrTenantInactive));

    let deleted = service.switch_tenant(&token, gone.id).await.unwrap_err();
    assert!(matches!(deleted, AuthError::AccountOrTenantInactive));
}
