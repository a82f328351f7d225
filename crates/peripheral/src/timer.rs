//! Timers for the service loop.
//!
//! Two independent timers, both delivering ticks as commands on the
//! service loop: a resettable single-shot timer armed on behalf of the
//! authentication engine, and a coarse periodic tick that recycles the
//! advertisement. Arming the single-shot timer cancels any outstanding
//! one, so at most one expiry is ever in flight.

use crate::service::ServiceCommand;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Timer service bound to one service loop.
#[derive(Debug)]
pub struct TimerService {
    commands: mpsc::UnboundedSender<ServiceCommand>,
    fsm_timer: Option<JoinHandle<()>>,
    recycle_timer: Option<JoinHandle<()>>,
}

impl TimerService {
    /// Create a timer service feeding `commands`.
    pub fn new(commands: mpsc::UnboundedSender<ServiceCommand>) -> Self {
        Self {
            commands,
            fsm_timer: None,
            recycle_timer: None,
        }
    }

    /// Arm the single-shot timer, replacing any outstanding one.
    pub fn set_fsm_timeout(&mut self, timeout: Duration) {
        self.cancel_fsm_timeout();

        let commands = self.commands.clone();
        self.fsm_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = commands.send(ServiceCommand::FsmTimeout);
        }));
    }

    /// Cancel the single-shot timer if armed.
    pub fn cancel_fsm_timeout(&mut self) {
        if let Some(timer) = self.fsm_timer.take() {
            timer.abort();
        }
    }

    /// Arm the periodic recycle tick.
    pub fn arm_recycle(&mut self, period: Duration) {
        self.disarm_recycle();

        let commands = self.commands.clone();
        self.recycle_timer = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick of a tokio interval fires immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if commands.send(ServiceCommand::RecycleTick).is_err() {
                    break;
                }
            }
        }));
    }

    /// Disarm the periodic recycle tick.
    pub fn disarm_recycle(&mut self) {
        if let Some(timer) = self.recycle_timer.take() {
            timer.abort();
        }
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.cancel_fsm_timeout();
        self.disarm_recycle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, Instant};

    #[tokio::test(start_paused = true)]
    async fn test_rearming_replaces_the_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerService::new(tx);

        // Arm for 500 ms, then immediately rearm for 100 ms.
        timers.set_fsm_timeout(Duration::from_millis(500));
        timers.set_fsm_timeout(Duration::from_millis(100));

        let armed_at = Instant::now();
        let command = rx.recv().await.unwrap();
        assert!(matches!(command, ServiceCommand::FsmTimeout));
        assert_eq!(armed_at.elapsed(), Duration::from_millis(100));

        // The replaced timer never fires.
        advance(Duration::from_millis(1000)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerService::new(tx);

        timers.set_fsm_timeout(Duration::from_millis(50));
        timers.cancel_fsm_timeout();

        advance(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recycle_ticks_periodically() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerService::new(tx);

        timers.arm_recycle(Duration::from_secs(10));

        for _ in 0..3 {
            let command = rx.recv().await.unwrap();
            assert!(matches!(command, ServiceCommand::RecycleTick));
        }

        timers.disarm_recycle();
        advance(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
    }
}
