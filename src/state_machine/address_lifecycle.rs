// Copyright (c) 2025 - Cowboy AI, Inc.
//! Address Lifecycle State Machine
//!
//! Binary FSM for a pool entry: `Free → Assigned → Free …`.
//!
//! # Inputs
//!
//! - Assign(host): Free → Assigned; re-assigning to the same host is a no-op
//! - Release: Assigned → Free; releasing a free entry is a no-op
//!
//! # Outputs
//!
//! The effect on the host side, so the allocator knows which host record
//! to touch.

use super::{StateMachine, TransitionError, TransitionResult};
use crate::domain::{AddressState, HostId};

/// Allocator command (FSM input)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressCommand {
    Assign(HostId),
    Release,
}

/// Effect of a transition on host bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressEffect {
    Bound(HostId),
    Released(HostId),
    Unchanged,
}

impl StateMachine for AddressState {
    type Input = AddressCommand;
    type Output = AddressEffect;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use AddressCommand::*;

        match (*self, *input) {
            (AddressState::Free, Assign(host)) => {
                Ok((AddressState::Assigned { host }, AddressEffect::Bound(host)))
            }
            (AddressState::Assigned { host }, Assign(requested)) if host == requested => {
                Ok((*self, AddressEffect::Unchanged))
            }
            (AddressState::Assigned { host }, Assign(requested)) => {
                Err(TransitionError::new(
                    format!("assigned to {}", host),
                    format!("assigned to {}", requested),
                ))
            }
            (AddressState::Assigned { host }, Release) => {
                Ok((AddressState::Free, AddressEffect::Released(host)))
            }
            (AddressState::Free, Release) => Ok((AddressState::Free, AddressEffect::Unchanged)),
        }
    }
}
