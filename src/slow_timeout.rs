//! Background timer that ages a reassembly table
//!
//! * [SlowTimeout] calls [ReassemblyEngine::slow_timeout] once per tick of the
//!   engine's policy until stopped.

use super::*;
use stop_token::future::FutureExt as _;
use stop_token::StopSource;

cfg_if! {
    if #[cfg(feature="rt-async-std")] {
        type LowLevelJoinHandle = async_std::task::JoinHandle<()>;

        async fn sleep(duration: Duration) {
            async_std::task::sleep(duration).await;
        }

        fn spawn(future: impl Future<Output = ()> + Send + 'static) -> LowLevelJoinHandle {
            async_std::task::spawn(future)
        }

        async fn join(handle: LowLevelJoinHandle) {
            handle.await;
        }
    } else if #[cfg(feature="rt-tokio")] {
        type LowLevelJoinHandle = tokio::task::JoinHandle<()>;

        async fn sleep(duration: Duration) {
            tokio::time::sleep(duration).await;
        }

        fn spawn(future: impl Future<Output = ()> + Send + 'static) -> LowLevelJoinHandle {
            tokio::task::spawn(future)
        }

        async fn join(handle: LowLevelJoinHandle) {
            if let Err(e) = handle.await {
                log_frag!(error "slow timeout task failed: {}", e);
            }
        }
    }
}

/// Handle to a running timer task
///
/// Dropping the handle stops the timer without waiting for it.
pub struct SlowTimeout {
    stop_source: Option<StopSource>,
    join_handle: Option<LowLevelJoinHandle>,
}

impl SlowTimeout {
    /// Spawn the timer on the current runtime
    pub fn start<B: PacketBuffer + Send + 'static>(engine: ReassemblyEngine<B>) -> Self {
        let stop_source = StopSource::new();
        let stop_token = stop_source.token();
        let family = engine.policy().family;
        let period = engine.policy().tick_duration();

        let join_handle = spawn(async move {
            log_frag!(debug "{} slow timeout started, period {:?}", family, period);
            while sleep(period).timeout_at(stop_token.clone()).await.is_ok() {
                engine.slow_timeout();
            }
            log_frag!(debug "{} slow timeout stopped", family);
        });

        Self {
            stop_source: Some(stop_source),
            join_handle: Some(join_handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.stop_source.is_some()
    }

    /// Stop the timer and wait for its task to finish
    pub async fn stop(&mut self) {
        drop(self.stop_source.take());
        if let Some(join_handle) = self.join_handle.take() {
            join(join_handle).await;
        }
    }
}

impl<B: PacketBuffer + Send + 'static> NetReassembly<B> {
    /// Start one timer per protocol
    pub fn start_slow_timeouts(&self) -> [SlowTimeout; 2] {
        [
            SlowTimeout::start(self.ipv4().clone()),
            SlowTimeout::start(self.ipv6().clone()),
        ]
    }
}
