//! Runtime feature switches, held in memory and editable by admins.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Features {
    pub enable_webhooks: bool,
    pub enable_csv_import: bool,
    pub enable_pdf_export: bool,
    pub enable_audit_logs: bool,
    pub maintenance_mode: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            enable_webhooks: true,
            enable_csv_import: true,
            enable_pdf_export: true,
            enable_audit_logs: true,
            maintenance_mode: false,
        }
    }
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct FeaturesUpdate {
    pub enable_webhooks: Option<bool>,
    pub enable_csv_import: Option<bool>,
    pub enable_pdf_export: Option<bool>,
    pub enable_audit_logs: Option<bool>,
    pub maintenance_mode: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct FeatureFlags {
    inner: Arc<RwLock<Features>>,
}

impl FeatureFlags {
    pub fn new(initial: Features) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub async fn snapshot(&self) -> Features {
        self.inner.read().await.clone()
    }

    pub async fn update(&self, update: FeaturesUpdate) -> Features {
        let mut features = self.inner.write().await;
        let merge = |slot: &mut bool, value: Option<bool>| {
            if let Some(v) = value {
                *slot = v;
            }
        };
        merge(&mut features.enable_webhooks, update.enable_webhooks);
        merge(&mut features.enable_csv_import, update.enable_csv_import);
        merge(&mut features.enable_pdf_export, update.enable_pdf_export);
        merge(&mut features.enable_audit_logs, update.enable_audit_logs);
        merge(&mut features.maintenance_mode, update.maintenance_mode);
        info!(features = ?*features, "Feature flags updated");
        features.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_merges_only_given_fields() {
        let flags = FeatureFlags::default();
        let updated = flags
            .update(FeaturesUpdate {
                enable_webhooks: Some(false),
                maintenance_mode: Some(true),
                ..Default::default()
            })
            .await;

        assert!(!updated.enable_webhooks);
        assert!(updated.maintenance_mode);
        assert!(updated.enable_csv_import);
        assert_eq!(flags.snapshot().await, updated);
    }
}
