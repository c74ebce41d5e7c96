//! Long-running services and their lifecycle.

pub mod manager;
pub mod renewal;
pub mod signals;
pub mod web;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A background service. `run` returns when `cancel` fires or the service fails.
#[async_trait]
pub trait Service: Send {
    fn name(&self) -> &'static str;

    async fn run(self: Box<Self>, cancel: CancellationToken) -> anyhow::Result<()>;
}
