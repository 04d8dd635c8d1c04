use arb_chain::{BoxLogStream, EventFilters, SubscriptionError, UpstreamEventSource};

/// Placeholder [`UpstreamEventSource`]: wrapping a concrete EVM/Solana RPC
/// subscription is an external collaborator, so this binary ships
/// wiring only. Swap this for a real adapter before pointing it at a chain.
pub struct UnconfiguredUpstream;

#[async_trait::async_trait]
impl UpstreamEventSource for UnconfiguredUpstream {
    async fn connect(&self, endpoint: &str, _filters: &EventFilters) -> eyre::Result<BoxLogStream> {
        Err(SubscriptionError::Other(format!(
            "no upstream event source configured for endpoint {endpoint}; plug in a real UpstreamEventSource"
        ))
        .into())
    }
}
