//! Request service abstraction layer.
//!
//! Lets the bridge surface depend on a trait rather than on the concrete
//! executor, so handlers can be exercised with a mock.

use super::executor::RequestExecutor;
use super::types::RequestSpec;
use std::future::Future;
use std::pin::Pin;

/// Future returned by [`RequestService::perform`].
pub type PerformFuture<'a> = Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;

/// Trait for services that perform one request and hand back its body.
pub trait RequestService: Send + Sync {
    /// Performs `request`, resolving to the response body or `None` on any
    /// failure.
    fn perform(&self, request: RequestSpec) -> PerformFuture<'_>;
}

impl RequestService for RequestExecutor {
    fn perform(&self, request: RequestSpec) -> PerformFuture<'_> {
        Box::pin(async move { RequestExecutor::perform(self, &request).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tls::{ConnectorFactory, TrustPolicy};
    use crate::TlsVersions;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_executor_behind_trait_object() {
        let policy = Arc::new(TrustPolicy::webpki_roots(TlsVersions::default()).unwrap());
        let executor = RequestExecutor::new(Arc::new(ConnectorFactory::new(Some(policy)).unwrap()));
        let service: Arc<dyn RequestService> = Arc::new(executor);

        let result = service
            .perform(RequestSpec::new("not a url", "GET", None))
            .await;
        assert_eq!(result, None);
    }
}
