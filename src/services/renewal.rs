use crate::services::Service;
use crate::session::RenewalLoop;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Keeps cached identity sessions warm in the background.
pub struct RenewalService {
    renewal: RenewalLoop,
}

impl RenewalService {
    pub fn new(renewal: RenewalLoop) -> Self {
        Self { renewal }
    }
}

#[async_trait]
impl Service for RenewalService {
    fn name(&self) -> &'static str {
        "renewal"
    }

    async fn run(self: Box<Self>, cancel: CancellationToken) -> anyhow::Result<()> {
        self.renewal.run(cancel).await;
        Ok(())
    }
}
