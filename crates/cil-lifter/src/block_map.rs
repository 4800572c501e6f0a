// Copyright (c) The CilLift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Basic-block leader discovery.
//!
//! A single pre-pass over the instruction stream registers a leader for the
//! entry offset and for every branch, leave, and switch target, short and
//! long forms alike. The result is immutable: the parser consumes a map
//! that can no longer grow, so its target lookups are a precondition
//! enforced by construction rather than a race.

use crate::errors::MalformedBody;
use cil_model::{CodeOffset, CodeStream};
use itertools::Itertools;
use log::debug;
use std::collections::BTreeSet;

/// The completed leader set of one method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMap {
    leaders: BTreeSet<CodeOffset>,
    end: CodeOffset,
}

impl BlockMap {
    /// Scan every instruction and register block leaders. Registration is
    /// idempotent; a target seen twice still yields one leader. Targets
    /// that do not land on an instruction are rejected here so the parser
    /// never has to recover from them.
    pub fn build(code: &CodeStream) -> Result<Self, MalformedBody> {
        let mut leaders = BTreeSet::new();
        if let Some(first) = code.first() {
            leaders.insert(first.offset);
        }
        for instr in code.iter() {
            for target in instr.branch_targets() {
                if !code.is_valid_offset(target) {
                    return Err(MalformedBody::BranchTargetOutOfBounds {
                        offset: instr.offset,
                        target,
                    });
                }
                leaders.insert(target);
            }
        }
        debug!(
            "block map: {} leaders at [{}], end {}",
            leaders.len(),
            leaders.iter().join(", "),
            code.end_offset()
        );
        Ok(Self {
            leaders,
            end: code.end_offset(),
        })
    }

    pub fn is_leader(&self, offset: CodeOffset) -> bool {
        self.leaders.contains(&offset)
    }

    pub fn leaders(&self) -> impl Iterator<Item = CodeOffset> + '_ {
        self.leaders.iter().copied()
    }

    /// One past the last instruction; where the sentinel block lives.
    pub fn end_offset(&self) -> CodeOffset {
        self.end
    }
}
