//! Step queue feeding the session
//!
//! A single unbounded queue with one consumer: steps are applied strictly in
//! the order they were queued, one at a time, and a later step always sees
//! the overlay exactly as the previous one left it.

use anyhow::{Result, anyhow};
use tokio::sync::mpsc;

use super::scenario::{Scenario, ScenarioStep};

/// Events consumed by the session loop
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Apply one scenario step
    Step(ScenarioStep),
    /// Stop after the steps queued so far
    ShutdownRequested,
}

/// Queue handle. Clones share the sender; only the original can receive.
pub struct ActionChannel {
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,
}

impl Clone for ActionChannel {
    fn clone(&self) -> Self {
        Self {
            event_tx: self.event_tx.clone(),
            event_rx: None,
        }
    }
}

impl ActionChannel {
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    pub fn send_event(&self, event: SessionEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .map_err(|e| anyhow!("Session queue closed: {:?}", e.0))
    }

    pub fn send_step(&self, step: ScenarioStep) -> Result<()> {
        self.send_event(SessionEvent::Step(step))
    }

    /// Queue every step of `scenario` followed by a shutdown
    pub fn send_scenario(&self, scenario: &Scenario) -> Result<usize> {
        for step in &scenario.steps {
            self.send_step(step.clone())?;
        }
        self.request_shutdown()?;
        Ok(scenario.steps.len())
    }

    pub fn request_shutdown(&self) -> Result<()> {
        self.send_event(SessionEvent::ShutdownRequested)
    }

    /// Next queued event; `None` on a clone or once every sender is gone
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        match self.event_rx.as_mut() {
            Some(event_rx) => event_rx.recv().await,
            None => None,
        }
    }
}

impl Default for ActionChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_send_order() {
        let mut channel = ActionChannel::new();
        let sender = channel.clone();

        sender.send_step(ScenarioStep::Ready).unwrap();
        sender.send_step(ScenarioStep::Resync).unwrap();
        sender.request_shutdown().unwrap();

        assert!(matches!(
            channel.next_event().await,
            Some(SessionEvent::Step(ScenarioStep::Ready))
        ));
        assert!(matches!(
            channel.next_event().await,
            Some(SessionEvent::Step(ScenarioStep::Resync))
        ));
        assert!(matches!(
            channel.next_event().await,
            Some(SessionEvent::ShutdownRequested)
        ));
    }

    #[tokio::test]
    async fn test_send_scenario_ends_with_shutdown() {
        let mut channel = ActionChannel::new();
        let queued = channel.send_scenario(&Scenario::demo()).unwrap();
        assert_eq!(queued, Scenario::demo().steps.len());

        let mut steps = 0;
        while let Some(event) = channel.next_event().await {
            match event {
                SessionEvent::Step(_) => steps += 1,
                SessionEvent::ShutdownRequested => break,
            }
        }
        assert_eq!(steps, queued);
    }

    #[tokio::test]
    async fn test_clone_has_no_receiver() {
        let channel = ActionChannel::new();
        let mut cloned = channel.clone();
        assert!(cloned.next_event().await.is_none());
    }
}
