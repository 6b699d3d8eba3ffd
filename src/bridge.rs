//! The host-facing bridge.
//!
//! A [`Bridge`] is built once by the embedding application. Building it
//! installs the trust-all policy for the whole process; afterwards
//! [`Bridge::perform_request`] is the blocking entry point the scripting
//! layer calls.

use crate::config::Config;
use crate::error::BridgeError;
use crate::infra::dns::{DnsResolver, SystemDnsResolver};
use crate::infra::tls::{install_trust_all_policy_with, ConnectorFactory, TrustPolicy};
use crate::request::{RequestExecutor, RequestSpec};
use std::sync::Arc;
use tokio::runtime::{self, Runtime};

/// Installs the trust-all policy and builds an executor bound to it.
///
/// Async hosts use the executor directly; [`Bridge`] wraps it for
/// synchronous callers.
pub fn build_executor(
    config: &Config,
    resolver: Arc<dyn DnsResolver>,
) -> Result<RequestExecutor, BridgeError> {
    install_and_build(config, resolver).map(|(_, executor)| executor)
}

fn install_and_build(
    config: &Config,
    resolver: Arc<dyn DnsResolver>,
) -> Result<(Arc<TrustPolicy>, RequestExecutor), BridgeError> {
    let policy = install_trust_all_policy_with(config.tls_versions)?;
    let factory = ConnectorFactory::new(Some(policy.clone()))?;
    let executor = RequestExecutor::new(Arc::new(factory))
        .with_resolver(resolver)
        .with_line_mode(config.line_mode);
    Ok((policy, executor))
}

pub struct Bridge {
    executor: RequestExecutor,
    policy: Arc<TrustPolicy>,
    /// Always `Some` until the bridge is dropped.
    runtime: Option<Runtime>,
}

impl Bridge {
    pub fn new(config: &Config) -> Result<Self, BridgeError> {
        Self::with_resolver(config, Arc::new(SystemDnsResolver::new()))
    }

    pub fn with_resolver(
        config: &Config,
        resolver: Arc<dyn DnsResolver>,
    ) -> Result<Self, BridgeError> {
        let (policy, executor) = install_and_build(config, resolver)?;

        let runtime = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(BridgeError::Runtime)?;

        tracing::debug!(line_mode = ?config.line_mode, "Bridge ready");

        Ok(Self {
            executor,
            policy,
            runtime: Some(runtime),
        })
    }

    /// The trust policy this bridge installed.
    pub fn policy(&self) -> &Arc<TrustPolicy> {
        &self.policy
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Performs one request, blocking the calling thread until the response
    /// has been read or the request has failed.
    ///
    /// There is no timeout; an unresponsive server blocks forever. Call this
    /// off any latency-sensitive thread. When called from inside an async
    /// runtime the request is driven on a scoped helper thread instead, so
    /// the caller still blocks but the runtime is not re-entered. On a
    /// current-thread runtime every other task of that runtime stalls until
    /// the helper thread finishes.
    pub fn perform_request(&self, url: &str, method: &str, body: Option<&str>) -> Option<String> {
        let spec = RequestSpec::new(url, method, body);
        let rt = self.runtime.as_ref()?;

        if runtime::Handle::try_current().is_err() {
            return rt.block_on(self.executor.perform(&spec));
        }

        std::thread::scope(|scope| {
            scope
                .spawn(|| rt.block_on(self.executor.perform(&spec)))
                .join()
                .unwrap_or_else(|_| {
                    tracing::error!(url, method, "Request thread panicked");
                    None
                })
        })
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        // A blocking shutdown panics when the bridge is dropped inside an
        // async context.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
