//! Webhook-triggered redeploys
//!
//! The raw request body is authenticated with HMAC-SHA256 against the
//! app's stored secret before anything else happens; a bad or missing
//! signature leaves the app completely untouched.

use deckhand_core::{AppKind, Config, DeployMethod, Error, GitSource, Result};
use deckhand_deploy::{git, install_dependencies, VersionStore};
use deckhand_logs::{AppLog, LogHub, LogSource, RotationConfig};
use deckhand_registry::Registry;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use tracing::info;

use crate::supervisor::Supervisor;

type HmacSha256 = Hmac<Sha256>;

/// Verify an `X-Hub-Signature-256` header value (`sha256=<hex>`) against
/// the raw body. The comparison is constant time.
pub fn verify_signature(secret: &[u8], body: &[u8], signature: Option<&str>) -> Result<()> {
    let header = signature.ok_or(Error::InvalidWebhookSignature)?;
    let hex_digest = header
        .strip_prefix("sha256=")
        .ok_or(Error::InvalidWebhookSignature)?;
    let expected = hex::decode(hex_digest).map_err(|_| Error::InvalidWebhookSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|_| Error::InvalidWebhookSignature)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| Error::InvalidWebhookSignature)
}

pub struct WebhookRedeployer {
    config: Config,
    registry: Arc<Registry>,
    supervisor: Supervisor,
    hub: Arc<LogHub>,
}

impl WebhookRedeployer {
    pub fn new(
        config: Config,
        registry: Arc<Registry>,
        supervisor: Supervisor,
        hub: Arc<LogHub>,
    ) -> Self {
        Self {
            config,
            registry,
            supervisor,
            hub,
        }
    }

    /// Authenticate the push event, then stop, pull, reinstall, snapshot,
    /// and start. The body itself is opaque beyond the signature.
    pub async fn redeploy(
        &self,
        name: &str,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<()> {
        let app = self.registry.get(name)?;
        let secret = app
            .webhook_secret
            .clone()
            .ok_or_else(|| Error::WebhookNotConfigured(name.to_string()))?;
        verify_signature(&secret, body, signature)?;

        let source = app
            .source
            .clone()
            .ok_or_else(|| Error::CloneFailed("app has no recorded git source".to_string()))?;

        info!(name, branch = %source.branch, "webhook accepted, redeploying");
        let _guard = self.supervisor.op_lock(name).await;

        if self.supervisor.is_running(name) {
            self.supervisor.stop_inner(name).await?;
        }

        git::pull(&app.workdir, &source.branch).await?;
        let commit = git::short_commit(&app.workdir).await?;
        let new_source = GitSource {
            commit: Some(commit),
            ..source
        };

        if app.kind == AppKind::Node {
            let topic = self.hub.topic(name);
            let rotation =
                RotationConfig::new(self.config.log_max_size, self.config.log_max_files);
            let log = Arc::new(AppLog::open(self.config.log_path(name), rotation, topic)?);
            log.write(LogSource::System, "installing dependencies");
            install_dependencies(&app.workdir, log).await?;
        }

        let store = VersionStore::new(self.config.versions_dir(name));
        let version = store.snapshot(&app.workdir, DeployMethod::Webhook, Some(new_source.clone()))?;

        self.registry.update(name, |a| {
            a.current_version = version.id.clone();
            a.versions.push(version.clone());
            a.source = Some(new_source.clone());
        })?;

        self.supervisor.start_inner(name).await?;
        info!(name, version = %version.id, "webhook redeploy complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &[u8], body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature_accepted() {
        let secret = b"abc";
        let body = b"{\"ref\":\"refs/heads/main\"}";
        let header = sign(secret, body);
        assert!(verify_signature(secret, body, Some(&header)).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = b"{\"ref\":\"refs/heads/main\"}";
        let header = sign(b"zzz", body);
        let err = verify_signature(b"abc", body, Some(&header)).unwrap_err();
        assert!(matches!(err, Error::InvalidWebhookSignature));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let secret = b"abc";
        let header = sign(secret, b"original body");
        let err = verify_signature(secret, b"tampered body", Some(&header)).unwrap_err();
        assert!(matches!(err, Error::InvalidWebhookSignature));
    }

    #[test]
    fn test_missing_signature_rejected() {
        let err = verify_signature(b"abc", b"body", None).unwrap_err();
        assert!(matches!(err, Error::InvalidWebhookSignature));
    }

    #[test]
    fn test_malformed_header_rejected() {
        let secret = b"abc";
        let body = b"body";
        assert!(verify_signature(secret, body, Some("md5=abcdef")).is_err());
        assert!(verify_signature(secret, body, Some("sha256=nothex!")).is_err());
        assert!(verify_signature(secret, body, Some("")).is_err());
    }

    #[test]
    fn test_known_vector() {
        // RFC 2104 style check against a fixed digest
        let secret = b"key";
        let body = b"The quick brown fox jumps over the lazy dog";
        let header = "sha256=f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8";
        assert!(verify_signature(secret, body, Some(header)).is_ok());
    }
}
