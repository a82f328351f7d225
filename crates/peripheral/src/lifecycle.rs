//! Advertising lifecycle state machine with validated transitions.
//!
//! The peripheral cycles through initialisation, advertising, connection
//! and teardown; a periodic recycle restarts the advertisement with a
//! freshly derived UUID. Transitions outside the table below are rejected
//! so late async completions cannot corrupt the lifecycle.

use crate::error::{PeripheralError, Result};

/// Lifecycle states of the peripheral service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Nothing acquired yet
    Dormant,

    /// Acquiring the bus, manager proxies and object roots
    Initialising,

    /// Host handles held, nothing advertised
    Initialised,

    /// Advertising the discoverable (new pairing) UUID
    Advertising,

    /// Advertising the continuous (session resumption) UUID
    AdvertisingContinuous,

    /// A central has written to the incoming characteristic
    Connected,

    /// Teardown in progress: unregistering application and advertisement
    Unadvertising,

    /// Teardown complete, host handles still held
    Unadvertised,

    /// Releasing every host handle
    Finalising,

    /// Terminal state when not recycling
    Finalised,
}

/// Lifecycle transition triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Begin (or restart) an advertise cycle
    Start,

    /// Bus acquired, manager proxies created, object roots exported
    HostReady,

    /// Begin advertising with the given continuity
    Advertise {
        /// Whether to derive the session-resumption UUID
        continuous: bool,
    },

    /// A central wrote to the incoming characteristic
    CentralWrote,

    /// Teardown requested
    Stop,

    /// Unregistration of application and advertisement completed
    TeardownComplete,

    /// Proceed from teardown to full finalisation
    Finalise,

    /// Every host handle has been released
    Released,
}

impl Trigger {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::HostReady => "host-ready",
            Self::Advertise { .. } => "advertise",
            Self::CentralWrote => "central-wrote",
            Self::Stop => "stop",
            Self::TeardownComplete => "teardown-complete",
            Self::Finalise => "finalise",
            Self::Released => "released",
        }
    }
}

/// Lifecycle state machine.
///
/// Starts in [`LifecycleState::Dormant`]; [`LifecycleState::Finalised`] is
/// terminal unless a new advertise cycle is started.
#[derive(Debug)]
pub struct LifecycleMachine {
    current: LifecycleState,
}

impl LifecycleMachine {
    /// Create a machine in the `Dormant` state.
    pub fn new() -> Self {
        Self {
            current: LifecycleState::Dormant,
        }
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        self.current
    }

    /// Whether the machine has reached the terminal state.
    pub fn is_finalised(&self) -> bool {
        self.current == LifecycleState::Finalised
    }

    /// Attempt a transition.
    ///
    /// # Errors
    ///
    /// Returns [`PeripheralError::InvalidTransition`] when `trigger` is not
    /// valid in the current state; the state is left unchanged.
    pub fn transition(&mut self, trigger: Trigger) -> Result<LifecycleState> {
        use LifecycleState::*;

        let next = match (self.current, trigger) {
            (Dormant, Trigger::Start) => Initialising,
            // A recycle re-enters the initialise path for a fresh cycle.
            (Unadvertised, Trigger::Start) => Initialising,

            (Initialising, Trigger::HostReady) => Initialised,

            (Initialised, Trigger::Advertise { continuous: false }) => Advertising,
            (Initialised, Trigger::Advertise { continuous: true }) => AdvertisingContinuous,

            (Advertising, Trigger::CentralWrote) => Connected,
            (AdvertisingContinuous, Trigger::CentralWrote) => Connected,

            (Advertising, Trigger::Stop) => Unadvertising,
            (AdvertisingContinuous, Trigger::Stop) => Unadvertising,
            (Connected, Trigger::Stop) => Unadvertising,

            (Unadvertising, Trigger::TeardownComplete) => Unadvertised,

            (Unadvertised, Trigger::Finalise) => Finalising,

            (Finalising, Trigger::Released) => Finalised,

            (from, trigger) => {
                return Err(PeripheralError::InvalidTransition {
                    from,
                    trigger: trigger.name(),
                });
            }
        };

        self.current = next;
        Ok(next)
    }

    /// Whether `trigger` would be accepted in the current state.
    pub fn can_transition(&self, trigger: Trigger) -> bool {
        use LifecycleState::*;

        matches!(
            (self.current, trigger),
            (Dormant, Trigger::Start)
                | (Unadvertised, Trigger::Start)
                | (Initialising, Trigger::HostReady)
                | (Initialised, Trigger::Advertise { .. })
                | (Advertising, Trigger::CentralWrote)
                | (AdvertisingContinuous, Trigger::CentralWrote)
                | (Advertising, Trigger::Stop)
                | (AdvertisingContinuous, Trigger::Stop)
                | (Connected, Trigger::Stop)
                | (Unadvertising, Trigger::TeardownComplete)
                | (Unadvertised, Trigger::Finalise)
                | (Finalising, Trigger::Released)
        )
    }
}

impl Default for LifecycleMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let machine = LifecycleMachine::new();
        assert_eq!(machine.state(), LifecycleState::Dormant);
        assert!(!machine.is_finalised());
    }

    #[test]
    fn test_full_advertise_cycle() {
        let mut machine = LifecycleMachine::new();

        assert!(machine.transition(Trigger::Start).is_ok());
        assert!(machine.transition(Trigger::HostReady).is_ok());
        assert!(machine
            .transition(Trigger::Advertise { continuous: false })
            .is_ok());
        assert_eq!(machine.state(), LifecycleState::Advertising);

        assert!(machine.transition(Trigger::CentralWrote).is_ok());
        assert_eq!(machine.state(), LifecycleState::Connected);

        assert!(machine.transition(Trigger::Stop).is_ok());
        assert!(machine.transition(Trigger::TeardownComplete).is_ok());
        assert!(machine.transition(Trigger::Finalise).is_ok());
        assert!(machine.transition(Trigger::Released).is_ok());
        assert!(machine.is_finalised());
    }

    #[test]
    fn test_continuous_advertising_path() {
        let mut machine = LifecycleMachine::new();
        machine.transition(Trigger::Start).unwrap();
        machine.transition(Trigger::HostReady).unwrap();
        machine
            .transition(Trigger::Advertise { continuous: true })
            .unwrap();

        assert_eq!(machine.state(), LifecycleState::AdvertisingContinuous);
        assert!(machine.can_transition(Trigger::CentralWrote));
        assert!(machine.can_transition(Trigger::Stop));
    }

    #[test]
    fn test_recycle_reenters_initialising() {
        let mut machine = LifecycleMachine::new();
        machine.transition(Trigger::Start).unwrap();
        machine.transition(Trigger::HostReady).unwrap();
        machine
            .transition(Trigger::Advertise { continuous: false })
            .unwrap();
        machine.transition(Trigger::Stop).unwrap();
        machine.transition(Trigger::TeardownComplete).unwrap();
        assert_eq!(machine.state(), LifecycleState::Unadvertised);

        // A new cycle instead of finalisation.
        assert!(machine.transition(Trigger::Start).is_ok());
        assert_eq!(machine.state(), LifecycleState::Initialising);
    }

    #[test]
    fn test_invalid_transition_preserves_state() {
        let mut machine = LifecycleMachine::new();

        let result = machine.transition(Trigger::Stop);
        match result {
            Err(PeripheralError::InvalidTransition { from, trigger }) => {
                assert_eq!(from, LifecycleState::Dormant);
                assert_eq!(trigger, "stop");
            }
            other => panic!("expected InvalidTransition, got {:?}", other),
        }
        assert_eq!(machine.state(), LifecycleState::Dormant);
    }

    #[test]
    fn test_finalised_is_terminal() {
        let mut machine = LifecycleMachine::new();
        machine.transition(Trigger::Start).unwrap();
        machine.transition(Trigger::HostReady).unwrap();
        machine
            .transition(Trigger::Advertise { continuous: false })
            .unwrap();
        machine.transition(Trigger::Stop).unwrap();
        machine.transition(Trigger::TeardownComplete).unwrap();
        machine.transition(Trigger::Finalise).unwrap();
        machine.transition(Trigger::Released).unwrap();

        assert!(machine.transition(Trigger::Start).is_err());
        assert!(machine.transition(Trigger::Advertise { continuous: false }).is_err());
        assert!(machine.is_finalised());
    }

    #[test]
    fn test_can_transition_matches_transition() {
        let machine = LifecycleMachine::new();
        assert!(machine.can_transition(Trigger::Start));
        assert!(!machine.can_transition(Trigger::HostReady));
        assert!(!machine.can_transition(Trigger::CentralWrote));
    }
}
