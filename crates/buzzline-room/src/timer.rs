//! The room's single question countdown.

use std::time::Duration;

use buzzline_protocol::QuestionId;
use buzzline_timer::{Countdown, CountdownConfig, Tick};

struct QuestionTimer {
    question_id: QuestionId,
    countdown: Countdown,
}

/// Holds at most one running countdown per room. Starting a new one
/// replaces (and thereby cancels) the old.
pub struct TimerSlot {
    current: Option<QuestionTimer>,
    config: CountdownConfig,
}

impl TimerSlot {
    pub fn new(config: CountdownConfig) -> Self {
        Self { current: None, config }
    }

    pub fn start(&mut self, question_id: impl Into<QuestionId>, limit: Duration) {
        let question_id = question_id.into();
        if let Some(old) = &self.current {
            tracing::debug!(replaced = %old.question_id, question = %question_id, "replacing countdown");
        }
        self.current = Some(QuestionTimer { question_id, countdown: Countdown::start(limit, self.config.clone()) });
    }

    pub fn cancel(&mut self) {
        self.current = None;
    }

    /// `false` when nothing is running or it is already paused.
    pub fn pause(&mut self) -> bool {
        self.current.as_mut().is_some_and(|t| t.countdown.pause())
    }

    pub fn resume(&mut self) -> bool {
        self.current.as_mut().is_some_and(|t| t.countdown.resume())
    }

    pub fn is_paused(&self) -> bool {
        self.current.as_ref().is_some_and(|t| t.countdown.is_paused())
    }

    /// Running means present and not yet at zero.
    pub fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(|t| !t.countdown.is_finished())
    }

    pub fn remaining_ms(&self) -> Option<u64> {
        self.current.as_ref().map(|t| t.countdown.remaining_ms())
    }

    pub fn question_id(&self) -> Option<&str> {
        self.current.as_ref().map(|t| t.question_id.as_str())
    }

    /// Next tick of the current countdown. Pends while empty, paused or
    /// finished.
    pub async fn next_tick(&mut self) -> (QuestionId, Tick) {
        match &mut self.current {
            Some(timer) => {
                let tick = timer.countdown.wait_for_tick().await;
                (timer.question_id.clone(), tick)
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_replace_restarts_countdown() {
        let mut slot = TimerSlot::new(CountdownConfig::default());
        slot.start("q1", Duration::from_secs(20));
        let (qid, tick) = slot.next_tick().await;
        assert_eq!((qid.as_str(), tick.remaining_ms()), ("q1", 19_750));

        slot.start("q2", Duration::from_secs(5));
        let (qid, tick) = slot.next_tick().await;
        assert_eq!((qid.as_str(), tick.remaining_ms()), ("q2", 4_750));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_slot_pends() {
        let mut slot = TimerSlot::new(CountdownConfig::default());
        let res = tokio::time::timeout(Duration::from_secs(60), slot.next_tick()).await;
        assert!(res.is_err());
        assert!(!slot.pause());
        assert_eq!(slot.remaining_ms(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_resume_through_slot() {
        let mut slot = TimerSlot::new(CountdownConfig::default());
        slot.start("q1", Duration::from_secs(10));
        assert!(slot.pause());
        assert!(slot.is_paused());
        assert!(!slot.pause());
        assert!(slot.resume());
        assert!(!slot.is_paused());
        slot.cancel();
        assert!(!slot.is_running());
    }
}
