//! Access checks and signed URL issuance.
//!
//! Authorization lives outside this pipeline; [`AccessChecker`] is the
//! seam through which the ticketing side answers "may this user see
//! this content". Non-public content is only ever handed out through a
//! short-lived HMAC-signed URL.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use greenroom_core::{ContentItem, MediaError, MediaResult, SignedUrlClaims, SignerConfig, UrlSigner};
use std::sync::Arc;
use uuid::Uuid;

/// Answers whether a user may access a content item.
#[async_trait]
pub trait AccessChecker: Send + Sync {
    async fn has_access(&self, user_id: Uuid, content: &ContentItem) -> MediaResult<bool>;
}

/// Checker that grants everything. For tests and local development.
pub struct AllowAll;

#[async_trait]
impl AccessChecker for AllowAll {
    async fn has_access(&self, _user_id: Uuid, _content: &ContentItem) -> MediaResult<bool> {
        Ok(true)
    }
}

/// Issues signed URLs after consulting the access checker.
pub struct UrlIssuer {
    signer: UrlSigner,
    checker: Arc<dyn AccessChecker>,
    config: SignerConfig,
}

impl UrlIssuer {
    pub fn new(checker: Arc<dyn AccessChecker>, config: SignerConfig) -> Self {
        Self {
            signer: UrlSigner::new(config.secret.as_bytes()),
            checker,
            config,
        }
    }

    /// Produce an access URL for the item.
    ///
    /// Public content returns the plain URL. Gated and private content
    /// requires the checker's approval and gets a token appended, valid
    /// for the configured TTL.
    pub async fn issue(
        &self,
        item: &ContentItem,
        user_id: Uuid,
        ticket_id: Option<String>,
        now: DateTime<Utc>,
    ) -> MediaResult<String> {
        if item.access_level.is_public() {
            return Ok(item.url.clone());
        }
        if !self.checker.has_access(user_id, item).await? {
            tracing::debug!(
                content_id = %item.id,
                user_id = %user_id,
                "Access denied for content"
            );
            return Err(MediaError::Unauthorized(format!(
                "user {} may not access content {}",
                user_id, item.id
            )));
        }
        let claims = SignedUrlClaims {
            content_id: item.id,
            user_id,
            expires_at: now + Duration::seconds(self.config.default_ttl_secs as i64),
            ticket_id,
        };
        let token = self.signer.sign(&claims);
        Ok(format!("{}?token={}", item.url, token))
    }

    /// Verify a previously issued token.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> MediaResult<SignedUrlClaims> {
        self.signer
            .verify(token, now)
            .map_err(|e| MediaError::Unauthorized(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenroom_core::{
        AccessLevel, LifecycleStatus, MediaType, ProcessingStatus, StorageClass,
    };

    struct DenyAll;

    #[async_trait]
    impl AccessChecker for DenyAll {
        async fn has_access(&self, _user_id: Uuid, _content: &ContentItem) -> MediaResult<bool> {
            Ok(false)
        }
    }

    fn item(access_level: AccessLevel) -> ContentItem {
        ContentItem {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            media_type: MediaType::Video,
            title: "backstage cut".into(),
            access_level,
            original_filename: "cut.mp4".into(),
            mime_type: "video/mp4".into(),
            storage_key: "owner/1_ab_cut.mp4".into(),
            storage_class: StorageClass::Standard,
            url: "memory://cut.mp4".into(),
            content_hash: "00ff".into(),
            size: 100,
            uploaded_at: Utc::now(),
            updated_at: Utc::now(),
            processing_status: ProcessingStatus::Completed,
            lifecycle_status: LifecycleStatus::Active,
            soft_deleted_at: None,
            purge_after: None,
            duplicate_of: None,
            priority: false,
            variants: vec![],
            backups: vec![],
        }
    }

    fn config() -> SignerConfig {
        SignerConfig {
            secret: "test-secret".into(),
            default_ttl_secs: 900,
        }
    }

    #[tokio::test]
    async fn test_public_content_needs_no_token() {
        let issuer = UrlIssuer::new(Arc::new(DenyAll), config());
        let url = issuer
            .issue(&item(AccessLevel::Public), Uuid::new_v4(), None, Utc::now())
            .await
            .unwrap();
        assert_eq!(url, "memory://cut.mp4");
    }

    #[tokio::test]
    async fn test_gated_content_gets_verifiable_token() {
        let issuer = UrlIssuer::new(Arc::new(AllowAll), config());
        let user_id = Uuid::new_v4();
        let it = item(AccessLevel::TicketGated);
        let now = Utc::now();
        let url = issuer
            .issue(&it, user_id, Some("ticket-42".into()), now)
            .await
            .unwrap();
        let token = url.split("?token=").nth(1).unwrap();
        let claims = issuer.verify(token, now).unwrap();
        assert_eq!(claims.content_id, it.id);
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.ticket_id.as_deref(), Some("ticket-42"));
    }

    #[tokio::test]
    async fn test_denied_user_gets_unauthorized() {
        let issuer = UrlIssuer::new(Arc::new(DenyAll), config());
        let err = issuer
            .issue(
                &item(AccessLevel::TicketGated),
                Uuid::new_v4(),
                None,
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let issuer = UrlIssuer::new(Arc::new(AllowAll), config());
        let it = item(AccessLevel::Private);
        let now = Utc::now();
        let url = issuer.issue(&it, Uuid::new_v4(), None, now).await.unwrap();
        let token = url.split("?token=").nth(1).unwrap();
        let later = now + Duration::seconds(901);
        assert!(issuer.verify(token, later).is_err());
    }
}
