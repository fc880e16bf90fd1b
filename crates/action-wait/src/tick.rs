use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use dom_port::{DomPort, MutationStream};

/// Wakes the poller before each re-evaluation.
#[async_trait]
pub trait TickSource: Send {
    /// Returns `false` once the source can no longer produce ticks.
    async fn tick(&mut self) -> bool;
}

pub struct TimerTicks {
    interval: Duration,
}

impl TimerTicks {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

#[async_trait]
impl TickSource for TimerTicks {
    async fn tick(&mut self) -> bool {
        tokio::time::sleep(self.interval).await;
        true
    }
}

pub struct FrameTicks<'a> {
    port: &'a dyn DomPort,
}

impl<'a> FrameTicks<'a> {
    pub fn new(port: &'a dyn DomPort) -> Self {
        Self { port }
    }
}

#[async_trait]
impl<'a> TickSource for FrameTicks<'a> {
    async fn tick(&mut self) -> bool {
        match self.port.next_frame().await {
            Ok(()) => true,
            Err(err) => {
                debug!(error = %err, "animation frame wait failed");
                false
            }
        }
    }
}

/// Ticks once per mutation batch. Dropping it disconnects the observer.
pub struct MutationTicks {
    stream: MutationStream,
}

impl MutationTicks {
    pub fn new(stream: MutationStream) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl TickSource for MutationTicks {
    async fn tick(&mut self) -> bool {
        self.stream.next().await.is_some()
    }
}
