use crate::culture::Dimension;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Actions a human reviewer can take while a run is paused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HumanAction {
    /// Let the pipeline proceed with the queen's decision.
    Approve,
    /// Override the decision and stop the run.
    Reject { reason: String },
    /// Override the decision and accept this round's named candidate.
    ForceAccept { candidate_id: String },
    /// Lock a dimension: it is treated as settled and never re-escalated.
    LockDimension { dimension: Dimension },
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionReceipt {
    pub accepted: bool,
    pub message: String,
}

/// Gate between reviewer and run worker. Actions are honored only while the
/// worker is parked in the waiting state; anything submitted outside that
/// window is refused with an explanatory receipt, never queued.
#[derive(Debug)]
pub struct HitlGate {
    waiting: AtomicBool,
    tx: mpsc::Sender<HumanAction>,
}

impl HitlGate {
    pub fn channel() -> (Self, mpsc::Receiver<HumanAction>) {
        let (tx, rx) = mpsc::channel(1);
        (
            Self {
                waiting: AtomicBool::new(false),
                tx,
            },
            rx,
        )
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Worker side: open or close the acceptance window.
    pub fn set_waiting(&self, waiting: bool) {
        self.waiting.store(waiting, Ordering::SeqCst);
    }

    /// Reviewer side: submit an action.
    pub fn submit(&self, action: HumanAction) -> ActionReceipt {
        if !self.is_waiting() {
            return ActionReceipt {
                accepted: false,
                message: "run is not waiting for a human action".into(),
            };
        }
        match self.tx.try_send(action) {
            Ok(()) => ActionReceipt {
                accepted: true,
                message: "action delivered".into(),
            },
            Err(mpsc::error::TrySendError::Full(_)) => ActionReceipt {
                accepted: false,
                message: "an action is already pending".into(),
            },
            Err(mpsc::error::TrySendError::Closed(_)) => ActionReceipt {
                accepted: false,
                message: "run has already finished".into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_refused_outside_waiting_window() {
        let (gate, mut rx) = HitlGate::channel();
        let receipt = gate.submit(HumanAction::Approve);
        assert!(!receipt.accepted);
        assert!(rx.try_recv().is_err(), "refused action must not be queued");
    }

    #[test]
    fn actions_delivered_while_waiting() {
        let (gate, mut rx) = HitlGate::channel();
        gate.set_waiting(true);
        let receipt = gate.submit(HumanAction::Reject {
            reason: "composition drifts from the brief".into(),
        });
        assert!(receipt.accepted);
        assert!(matches!(
            rx.try_recv().unwrap(),
            HumanAction::Reject { .. }
        ));
    }

    #[test]
    fn second_action_in_window_is_refused() {
        let (gate, _rx) = HitlGate::channel();
        gate.set_waiting(true);
        assert!(gate.submit(HumanAction::Approve).accepted);
        let second = gate.submit(HumanAction::Approve);
        assert!(!second.accepted);
        assert!(second.message.contains("pending"));
    }

    #[test]
    fn closed_run_reports_finished() {
        let (gate, rx) = HitlGate::channel();
        gate.set_waiting(true);
        drop(rx);
        let receipt = gate.submit(HumanAction::Abort);
        assert!(!receipt.accepted);
        assert!(receipt.message.contains("finished"));
    }
}
