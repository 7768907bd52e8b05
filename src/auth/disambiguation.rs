// ABOUTME: Tenant disambiguation for principals whose credentials match in several tenants
// ABOUTME: Selection sessions are consume-once ephemeral records referenced by a selection token
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

use crate::auth::SelectionChallenge;
use crate::constants::ttl;
use crate::errors::{AuthError, AuthResult};
use crate::models::{SelectionCandidate, SelectionSession, Tenant, TenantChoice, User};
use crate::store::{EphemeralStore, Namespace, StoreKey};
use crate::tokens::TokenIssuer;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// How a candidate set resolves.
pub enum Resolution {
    /// Exactly one eligible pair; continue straight to MFA or issuance
    Single(Box<(User, Tenant)>),
    /// Several pairs; the caller must pick one
    Challenge(SelectionChallenge),
}

/// Turns a verified candidate list into either a direct continuation or a
/// tenant-selection challenge.
pub struct TenantDisambiguator {
    store: EphemeralStore,
    issuer: Arc<TokenIssuer>,
}

impl TenantDisambiguator {
    #[must_use]
    pub fn new(store: EphemeralStore, issuer: Arc<TokenIssuer>) -> Self {
        Self { store, issuer }
    }

    fn hint_matches(hint: &str, tenant: &Tenant) -> bool {
        tenant.slug == hint || tenant.id.to_string() == hint
    }

    /// Resolve a non-empty candidate list.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an empty list; the
    /// caller cannot distinguish "unknown email" from "all candidates
    /// filtered out".
    pub async fn resolve(
        &self,
        email: &str,
        mut candidates: Vec<(User, Tenant)>,
        tenant_hint: Option<&str>,
    ) -> AuthResult<Resolution> {
        match candidates.len() {
            0 => Err(AuthError::InvalidCredentials),
            1 => {
                let pair = candidates.remove(0);
                Ok(Resolution::Single(Box::new(pair)))
            }
            n => {
                debug!("Principal resolves to {} tenants, issuing selection challenge", n);
                self.challenge(email, &candidates, tenant_hint)
                    .await
                    .map(Resolution::Challenge)
            }
        }
    }

    async fn challenge(
        &self,
        email: &str,
        candidates: &[(User, Tenant)],
        tenant_hint: Option<&str>,
    ) -> AuthResult<SelectionChallenge> {
        let session_id = Uuid::new_v4().to_string();
        let session = SelectionSession {
            email: email.to_string(),
            candidates: candidates
                .iter()
                .map(|(user, tenant)| SelectionCandidate {
                    user_id: user.id,
                    tenant_id: tenant.id,
                })
                .collect(),
        };

        let key = StoreKey::new(Namespace::TenantSelection, &session_id);
        self.store
            .set(
                &key,
                &session,
                Duration::from_secs(u64::from(ttl::TENANT_SELECTION_SECS)),
            )
            .await?;

        let (selection_token, expires_at) = self.issuer.issue_selection_token(&session_id, email)?;

        let suggested_tenant_id = tenant_hint.and_then(|hint| {
            candidates
                .iter()
                .find(|(_, tenant)| Self::hint_matches(hint, tenant))
                .map(|(_, tenant)| tenant.id)
        });

        Ok(SelectionChallenge {
            selection_token,
            tenants: candidates
                .iter()
                .map(|(_, tenant)| TenantChoice {
                    id: tenant.id,
                    name: tenant.name.clone(),
                    slug: tenant.slug.clone(),
                })
                .collect(),
            suggested_tenant_id,
            expires_at,
        })
    }

    /// Redeem a selection token for the chosen candidate.
    ///
    /// The stored session is consumed before the choice is validated, so a
    /// wrong choice burns the token as the session is single use either way.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidOrExpiredToken`] when the token is invalid or
    ///   the session expired or was already consumed.
    /// - [`AuthError::Unauthorized`] when the chosen tenant is not in the
    ///   stored candidate list.
    pub async fn consume_selection(
        &self,
        selection_token: &str,
        chosen_tenant_id: Uuid,
    ) -> AuthResult<SelectionCandidate> {
        let claims = self.issuer.decode_selection_token(selection_token)?;

        let key = StoreKey::new(Namespace::TenantSelection, &claims.sub);
        let session: SelectionSession = self
            .store
            .take(&key)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        session
            .candidates
            .into_iter()
            .find(|candidate| candidate.tenant_id == chosen_tenant_id)
            .ok_or(AuthError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{UserRole, UserStatus};
    use crate::store::StoreConfig;

    fn pair(email: &str, slug: &str) -> (User, Tenant) {
        let tenant = Tenant::new(slug.to_uppercase(), slug.to_string());
        let user = User::new(
            tenant.id,
            email.to_string(),
            Some("$2b$12$hash".to_string()),
            UserRole::User,
            UserStatus::Active,
        );
        (user, tenant)
    }

    async fn disambiguator() -> TenantDisambiguator {
        let config = StoreConfig {
            enable_background_cleanup: false,
            ..StoreConfig::default()
        };
        let store = EphemeralStore::from_config(config).await.unwrap();
        let issuer = Arc::new(TokenIssuer::new(b"selection-test-secret", None, 24));
        TenantDisambiguator::new(store, issuer)
    }

    #[tokio::test]
    async fn empty_candidate_list_reads_as_invalid_credentials() {
        let d = disambiguator().await;
        assert!(matches!(
            d.resolve("a@x.com", vec![], None).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn single_candidate_passes_through() {
        let d = disambiguator().await;
        let (user, tenant) = pair("a@x.com", "acme");
        let resolution = d
            .resolve("a@x.com", vec![(user.clone(), tenant.clone())], None)
            .await
            .unwrap();
        match resolution {
            Resolution::Single(p) => {
                assert_eq!(p.0.id, user.id);
                assert_eq!(p.1.id, tenant.id);
            }
            Resolution::Challenge(_) => panic!("expected direct continuation"),
        }
    }

    #[tokio::test]
    async fn hint_marks_suggested_tenant() {
        let d = disambiguator().await;
        let acme = pair("b@x.com", "acme");
        let beta = pair("b@x.com", "beta");
        let beta_id = beta.1.id;

        let resolution = d
            .resolve("b@x.com", vec![acme, beta], Some("beta"))
            .await
            .unwrap();
        match resolution {
            Resolution::Challenge(challenge) => {
                assert_eq!(challenge.tenants.len(), 2);
                assert_eq!(challenge.suggested_tenant_id, Some(beta_id));
            }
            Resolution::Single(_) => panic!("expected selection challenge"),
        }
    }

    #[tokio::test]
    async fn selection_session_is_single_use() {
        let d = disambiguator().await;
        let acme = pair("b@x.com", "acme");
        let beta = pair("b@x.com", "beta");
        let beta_id = beta.1.id;

        let challenge = match d.resolve("b@x.com", vec![acme, beta], None).await.unwrap() {
            Resolution::Challenge(c) => c,
            Resolution::Single(_) => panic!("expected selection challenge"),
        };

        let chosen = d
            .consume_selection(&challenge.selection_token, beta_id)
            .await
            .unwrap();
        assert_eq!(chosen.tenant_id, beta_id);

        assert!(matches!(
            d.consume_selection(&challenge.selection_token, beta_id).await,
            Err(AuthError::InvalidOrExpiredToken)
        ));
    }

    #[tokio::test]
    async fn tenant_outside_candidate_list_is_unauthorized() {
        let d = disambiguator().await;
        let acme = pair("b@x.com", "acme");
        let beta = pair("b@x.com", "beta");

        let challenge = match d.resolve("b@x.com", vec![acme, beta], None).await.unwrap() {
            Resolution::Challenge(c) => c,
            Resolution::Single(_) => panic!("expected selection challenge"),
        };

        assert!(matches!(
            d.consume_selection(&challenge.selection_token, Uuid::new_v4())
                .await,
            Err(AuthError::Unauthorized)
        ));
    }
}
