// Copyright (c) The CilLift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Lift failure taxonomy.
//!
//! Resolution failures are not errors; they null-propagate as `Option` and
//! show up as untyped expressions. Everything here is fatal for one
//! method's lift and must not abort sibling lifts.

use cil_model::{CodeOffset, Opcode};
use thiserror::Error;

/// Structurally invalid method bodies. Each case is detected and reported
/// explicitly instead of being left to panic mid-simulation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedBody {
    #[error("branch at offset {offset} targets offset {target}, which is not an instruction")]
    BranchTargetOutOfBounds {
        offset: CodeOffset,
        target: CodeOffset,
    },
    #[error("branch at offset {offset} targets offset {target}, which is not a registered block leader")]
    UnregisteredBranchTarget {
        offset: CodeOffset,
        target: CodeOffset,
    },
    #[error("local slot {slot} out of range at offset {offset}")]
    LocalOutOfRange { slot: u16, offset: CodeOffset },
    #[error("parameter {index} out of range at offset {offset}")]
    ParameterOutOfRange { index: u16, offset: CodeOffset },
    #[error("operand stack underflow at offset {offset}")]
    StackUnderflow { offset: CodeOffset },
    #[error("{opcode:?} at offset {offset} carries an unexpected operand")]
    OperandMismatch { opcode: Opcode, offset: CodeOffset },
    #[error("method reference at offset {offset} does not resolve")]
    UnresolvedMethod { offset: CodeOffset },
}

/// Why one method's lift failed. No partial block list escapes a failed
/// lift.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiftError {
    #[error("method has no body")]
    NoBody,
    #[error("method reference does not resolve")]
    NoSuchMethod,
    #[error("{opcode:?} at offset {offset} is not implemented by this lifter")]
    NotImplemented { opcode: Opcode, offset: CodeOffset },
    #[error("malformed method body: {0}")]
    Malformed(#[from] MalformedBody),
    #[error("lift exceeded the configured step limit of {limit}")]
    StepLimitExceeded { limit: usize },
}
