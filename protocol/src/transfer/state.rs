//! # Transfer State Machine
//!
//! Tracks one side of one transfer attempt. The giver and the receiver walk
//! different halves of the same graph:
//!
//! ```text
//! giver:     Idle -> OfferBuilt -------------------------> AckVerified -> Finalized
//! receiver:  Idle -> OfferConsumed -> ChallengeSigned -> AckBuilt
//!                          |                                 ^
//!                          +------------ (decline) ----------+
//!
//! any non-terminal state -> Failed
//! ```
//!
//! Terminal states are immutable. Asking for an edge that isn't in the graph
//! is a programming error and comes back as `InvalidState`, never a panic.

use std::fmt;

use uuid::Uuid;

use super::error::TransferError;

/// Which side of the exchange this machine tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferRole {
    Giver,
    Receiver,
}

/// A point in the transfer flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    /// Giver: Offer encoded, lock taken, QR on screen.
    OfferBuilt,
    /// Receiver: Offer scanned and decoded.
    OfferConsumed,
    /// Receiver: key rebuilt, challenge signed, key wiped.
    ChallengeSigned,
    /// Receiver: Ack encoded, QR on screen. Terminal for the receiver.
    AckBuilt,
    /// Giver: Ack signature checked.
    AckVerified,
    /// Giver: voucher marked spent. Terminal.
    Finalized,
    /// Terminal, with the reason.
    Failed(String),
}

impl TransferState {
    pub fn name(&self) -> &'static str {
        match self {
            TransferState::Idle => "idle",
            TransferState::OfferBuilt => "offer_built",
            TransferState::OfferConsumed => "offer_consumed",
            TransferState::ChallengeSigned => "challenge_signed",
            TransferState::AckBuilt => "ack_built",
            TransferState::AckVerified => "ack_verified",
            TransferState::Finalized => "finalized",
            TransferState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::AckBuilt | TransferState::Finalized | TransferState::Failed(_)
        )
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferState::Failed(reason) => write!(f, "failed: {reason}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Lifecycle of a single transfer attempt on one device.
#[derive(Debug)]
pub struct TransferStateMachine {
    attempt_id: Uuid,
    role: TransferRole,
    state: TransferState,
    history: Vec<TransferState>,
}

impl TransferStateMachine {
    pub fn new(role: TransferRole) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            role,
            state: TransferState::Idle,
            history: Vec::new(),
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn role(&self) -> TransferRole {
        self.role
    }

    pub fn state(&self) -> &TransferState {
        &self.state
    }

    /// Every state left behind, oldest first.
    pub fn history(&self) -> &[TransferState] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn edge_allowed(&self, next: &TransferState) -> bool {
        use TransferState::*;
        match self.role {
            TransferRole::Giver => matches!(
                (&self.state, next),
                (Idle, OfferBuilt) | (OfferBuilt, AckVerified) | (AckVerified, Finalized)
            ),
            TransferRole::Receiver => matches!(
                (&self.state, next),
                (Idle, OfferConsumed)
                    | (OfferConsumed, ChallengeSigned)
                    | (OfferConsumed, AckBuilt)
                    | (ChallengeSigned, AckBuilt)
            ),
        }
    }

    /// Move along a valid edge.
    pub fn advance(&mut self, next: TransferState) -> Result<(), TransferError> {
        if matches!(next, TransferState::Failed(_)) {
            self.fail("failed");
            return Ok(());
        }
        if !self.edge_allowed(&next) {
            return Err(TransferError::InvalidState(format!(
                "{:?} cannot go from {} to {}",
                self.role,
                self.state.name(),
                next.name()
            )));
        }
        let previous = std::mem::replace(&mut self.state, next);
        self.history.push(previous);
        Ok(())
    }

    /// Move to `Failed` from any non-terminal state. No-op once terminal.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        let previous = std::mem::replace(&mut self.state, TransferState::Failed(reason.into()));
        self.history.push(previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn giver_happy_path() {
        let mut m = TransferStateMachine::new(TransferRole::Giver);
        m.advance(TransferState::OfferBuilt).unwrap();
        m.advance(TransferState::AckVerified).unwrap();
        m.advance(TransferState::Finalized).unwrap();
        assert!(m.is_terminal());
        assert_eq!(
            m.history(),
            &[
                TransferState::Idle,
                TransferState::OfferBuilt,
                TransferState::AckVerified
            ]
        );
    }

    #[test]
    fn receiver_happy_path() {
        let mut m = TransferStateMachine::new(TransferRole::Receiver);
        m.advance(TransferState::OfferConsumed).unwrap();
        m.advance(TransferState::ChallengeSigned).unwrap();
        m.advance(TransferState::AckBuilt).unwrap();
        assert!(m.is_terminal());
    }

    #[test]
    fn receiver_can_decline_after_consuming() {
        let mut m = TransferStateMachine::new(TransferRole::Receiver);
        m.advance(TransferState::OfferConsumed).unwrap();
        m.advance(TransferState::AckBuilt).unwrap();
        assert_eq!(m.state(), &TransferState::AckBuilt);
    }

    #[test]
    fn skipping_states_is_rejected() {
        let mut m = TransferStateMachine::new(TransferRole::Giver);
        assert!(matches!(
            m.advance(TransferState::Finalized),
            Err(TransferError::InvalidState(_))
        ));
        assert_eq!(m.state(), &TransferState::Idle);
    }

    #[test]
    fn roles_do_not_mix() {
        let mut m = TransferStateMachine::new(TransferRole::Giver);
        assert!(m.advance(TransferState::OfferConsumed).is_err());
    }

    #[test]
    fn failed_reachable_from_any_live_state() {
        for steps in 0..3 {
            let mut m = TransferStateMachine::new(TransferRole::Giver);
            let path = [
                TransferState::OfferBuilt,
                TransferState::AckVerified,
                TransferState::Finalized,
            ];
            for s in path.iter().take(steps) {
                m.advance(s.clone()).unwrap();
            }
            m.fail("scan timeout");
            assert_eq!(m.state(), &TransferState::Failed("scan timeout".into()));
        }
    }

    #[test]
    fn terminal_states_are_immutable() {
        let mut m = TransferStateMachine::new(TransferRole::Giver);
        m.fail("first");
        m.fail("second");
        assert_eq!(m.state(), &TransferState::Failed("first".into()));
        assert!(m.advance(TransferState::OfferBuilt).is_err());
    }

    #[test]
    fn attempts_have_distinct_ids() {
        let a = TransferStateMachine::new(TransferRole::Giver);
        let b = TransferStateMachine::new(TransferRole::Giver);
        assert_ne!(a.attempt_id(), b.attempt_id());
    }
}
