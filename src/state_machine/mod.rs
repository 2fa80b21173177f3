// Copyright (c) 2025 - Cowboy AI, Inc.
//! Record Lifecycles
//!
//! A lifecycle is a pure function from `(state, command)` to the next state
//! plus an effect the caller must carry out elsewhere. Nothing here touches
//! a transaction; the allocator applies the results.
//!
//! ```text
//! (State, Command) → Result<(State, Effect), TransitionError>
//! ```

pub mod address_lifecycle;

pub use address_lifecycle::{AddressCommand, AddressEffect};

pub type TransitionResult<S> = Result<S, TransitionError>;

/// A command the current state does not accept
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot go from {from} to {to}")]
pub struct TransitionError {
    pub from: String,
    pub to: String,
}

impl TransitionError {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// States driven by a closed set of commands
pub trait StateMachine: Sized + Copy {
    type Input;
    type Output;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)>;

    fn accepts(&self, input: &Self::Input) -> bool {
        self.transition(input).is_ok()
    }
}
