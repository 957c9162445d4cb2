//! Validator for deployments that attach no rule sets to their stores.

use async_trait::async_trait;
use depot_core::{PromoteRequestRef, PromotionValidator, ValidationError, ValidationResult};
use tracing::debug;

/// Accepts every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllValidator;

#[async_trait]
impl PromotionValidator for AllowAllValidator {
    async fn validate(
        &self,
        request: PromoteRequestRef<'_>,
        _base_url: Option<&str>,
    ) -> Result<ValidationResult, ValidationError> {
        debug!(
            promotion_id = request.promotion_id(),
            source = %request.source(),
            "no validation rules configured"
        );
        Ok(ValidationResult::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::{PathsPromoteRequest, StoreKey};

    #[tokio::test]
    async fn every_request_is_valid() -> anyhow::Result<()> {
        let request = PathsPromoteRequest::new(
            StoreKey::hosted("npm", "staging"),
            StoreKey::hosted("npm", "releases"),
        );
        let result = AllowAllValidator
            .validate(PromoteRequestRef::Paths(&request), None)
            .await?;
        assert!(result.is_valid());
        Ok(())
    }
}
