//! Script retrieval trait.
//!
//! Scripts are authored and stored elsewhere; the sandbox only consumes
//! them through a [`ScriptProvider`].

use crate::{Result, ScriptId, ScriptSource, TenantId};
use async_trait::async_trait;

/// Fetches tenant script bodies.
///
/// Implementations must be `Send + Sync` so one provider can serve
/// concurrent form sessions.
///
/// # Examples
///
/// ```
/// use tenant_script_core::traits::ScriptProvider;
/// use tenant_script_core::{Error, Result, ScriptId, ScriptSource, TenantId};
/// use async_trait::async_trait;
///
/// struct Fixed;
///
/// #[async_trait]
/// impl ScriptProvider for Fixed {
///     async fn fetch(&self, tenant: &TenantId, script_id: &ScriptId) -> Result<ScriptSource> {
///         Ok(ScriptSource::inline("const a = 1;")
///             .with_identity(tenant.clone(), script_id.clone()))
///     }
/// }
/// ```
#[async_trait]
pub trait ScriptProvider: Send + Sync {
    /// Fetches the script `script_id` owned by `tenant`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScriptNotFound`](crate::Error::ScriptNotFound) when the
    /// script does not exist and
    /// [`Error::SourceError`](crate::Error::SourceError) when retrieval fails.
    async fn fetch(&self, tenant: &TenantId, script_id: &ScriptId) -> Result<ScriptSource>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    struct Missing;

    #[async_trait]
    impl ScriptProvider for Missing {
        async fn fetch(&self, tenant: &TenantId, script_id: &ScriptId) -> Result<ScriptSource> {
            Err(Error::ScriptNotFound {
                tenant_id: tenant.to_string(),
                script_id: script_id.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_provider_object_safety() {
        let provider: Box<dyn ScriptProvider> = Box::new(Missing);
        let err = provider
            .fetch(&TenantId::new("acme"), &ScriptId::new("s1"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
