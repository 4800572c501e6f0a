// Copyright (c) The CilLift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Flat CIL instruction stream model.
//!
//! Instructions are immutable and externally owned; the lifter only reads
//! them. `CodeStream` keeps the decoded instructions of one method body in
//! offset order together with an offset index for random access.

use crate::module::{MethodHandle, TypeHandle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Byte offset of an instruction inside one method body.
pub type CodeOffset = u32;

/// The opcodes this model decodes. Roughly half of the CIL opcode space is
/// represented; families the lifter recognizes but does not translate (field,
/// element, indirection, box/cast and a few others) are still listed so a
/// decode can report them instead of failing on an unknown byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Nop,
    // Argument and local loads/stores.
    Ldarg0,
    Ldarg1,
    Ldarg2,
    Ldarg3,
    LdargS,
    Ldloc0,
    Ldloc1,
    Ldloc2,
    Ldloc3,
    LdlocS,
    Stloc0,
    Stloc1,
    Stloc2,
    Stloc3,
    StlocS,
    StargS,
    // Address-of forms. Recognized, but the lifter aborts on them.
    LdargaS,
    LdlocaS,
    // Constants.
    Ldnull,
    LdcI4M1,
    LdcI40,
    LdcI41,
    LdcI42,
    LdcI43,
    LdcI44,
    LdcI45,
    LdcI46,
    LdcI47,
    LdcI48,
    LdcI4S,
    LdcI4,
    LdcI8,
    LdcR4,
    LdcR8,
    Ldstr,
    // Stack manipulation.
    Dup,
    Pop,
    // Calls.
    Call,
    Callvirt,
    Newobj,
    Ret,
    // Unconditional and conditional branches.
    Br,
    BrS,
    Brfalse,
    BrfalseS,
    Brtrue,
    BrtrueS,
    Beq,
    BeqS,
    Bge,
    BgeS,
    BgeUn,
    BgeUnS,
    Bgt,
    BgtS,
    BgtUn,
    BgtUnS,
    Ble,
    BleS,
    BleUn,
    BleUnS,
    Blt,
    BltS,
    BltUn,
    BltUnS,
    BneUn,
    BneUnS,
    Switch,
    // Arithmetic, bitwise, shifts.
    Add,
    Sub,
    Mul,
    Div,
    DivUn,
    Rem,
    RemUn,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    ShrUn,
    Neg,
    Not,
    // Comparisons.
    Ceq,
    Cgt,
    CgtUn,
    Clt,
    CltUn,
    // Conversions.
    ConvI1,
    ConvI2,
    ConvI4,
    ConvI8,
    ConvR4,
    ConvR8,
    ConvU1,
    ConvU2,
    ConvU4,
    ConvU8,
    ConvI,
    ConvU,
    // Exception-region control transfer.
    Leave,
    LeaveS,
    Endfinally,
    Throw,
    Rethrow,
    Endfilter,
    // Recognized-but-untranslated families.
    Ldfld,
    Ldflda,
    Stfld,
    Ldsfld,
    Ldsflda,
    Stsfld,
    LdindRef,
    StindRef,
    LdelemRef,
    StelemRef,
    Ldlen,
    Newarr,
    Box,
    Unbox,
    UnboxAny,
    Castclass,
    Isinst,
    Initobj,
    Ldtoken,
    Ldftn,
    Ldvirtftn,
}

impl Opcode {
    /// Whether this is the short (`.s`) encoding of a branch or leave.
    pub fn is_short_form(self) -> bool {
        matches!(
            self,
            Opcode::BrS
                | Opcode::BrfalseS
                | Opcode::BrtrueS
                | Opcode::BeqS
                | Opcode::BgeS
                | Opcode::BgeUnS
                | Opcode::BgtS
                | Opcode::BgtUnS
                | Opcode::BleS
                | Opcode::BleUnS
                | Opcode::BltS
                | Opcode::BltUnS
                | Opcode::BneUnS
                | Opcode::LeaveS
        )
    }

    /// Whether this is an unsigned (`.un`) comparison or branch form.
    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            Opcode::BgeUn
                | Opcode::BgeUnS
                | Opcode::BgtUn
                | Opcode::BgtUnS
                | Opcode::BleUn
                | Opcode::BleUnS
                | Opcode::BltUn
                | Opcode::BltUnS
                | Opcode::BneUn
                | Opcode::BneUnS
                | Opcode::DivUn
                | Opcode::RemUn
                | Opcode::ShrUn
                | Opcode::CgtUn
                | Opcode::CltUn
        )
    }

    /// Whether this opcode transfers control out of an exception region.
    pub fn is_leave(self) -> bool {
        matches!(self, Opcode::Leave | Opcode::LeaveS)
    }

    /// Whether this opcode carries a branch-target operand (including the
    /// switch table and the leave forms).
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            Opcode::Br
                | Opcode::BrS
                | Opcode::Brfalse
                | Opcode::BrfalseS
                | Opcode::Brtrue
                | Opcode::BrtrueS
                | Opcode::Beq
                | Opcode::BeqS
                | Opcode::Bge
                | Opcode::BgeS
                | Opcode::BgeUn
                | Opcode::BgeUnS
                | Opcode::Bgt
                | Opcode::BgtS
                | Opcode::BgtUn
                | Opcode::BgtUnS
                | Opcode::Ble
                | Opcode::BleS
                | Opcode::BleUn
                | Opcode::BleUnS
                | Opcode::Blt
                | Opcode::BltS
                | Opcode::BltUn
                | Opcode::BltUnS
                | Opcode::BneUn
                | Opcode::BneUnS
                | Opcode::Switch
                | Opcode::Leave
                | Opcode::LeaveS
        )
    }
}

/// Decoded operand of one instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    None,
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Str(String),
    /// Local variable slot.
    Local(u16),
    /// Formal parameter index as encoded (for instance methods slot 0 is
    /// the receiver).
    Param(u16),
    Method(MethodHandle),
    Type(TypeHandle),
    /// Branch or leave target offset.
    Target(CodeOffset),
    /// Switch jump table, one target per case.
    Table(Vec<CodeOffset>),
}

/// One decoded instruction. `next` is the offset of the following
/// instruction, or one past the body end for the last one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: Operand,
    pub offset: CodeOffset,
    pub next: CodeOffset,
}

impl Instruction {
    /// All branch targets this instruction can transfer control to,
    /// in operand order. Empty for non-branch instructions.
    pub fn branch_targets(&self) -> Vec<CodeOffset> {
        if !self.opcode.is_branch() {
            return vec![];
        }
        match &self.operand {
            Operand::Target(target) => vec![*target],
            Operand::Table(targets) => targets.clone(),
            _ => vec![],
        }
    }
}

/// The ordered instruction stream of one method body.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeStream {
    instructions: Vec<Instruction>,
    by_offset: BTreeMap<CodeOffset, usize>,
}

impl CodeStream {
    /// Wrap an already-decoded instruction list. The list must be sorted by
    /// offset; the index is built eagerly so offset lookups are cheap.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        let by_offset = instructions
            .iter()
            .enumerate()
            .map(|(index, instr)| (instr.offset, index))
            .collect();
        Self {
            instructions,
            by_offset,
        }
    }

    /// Build a stream from bare opcode/operand pairs, assigning each
    /// instruction a unit-width offset. Convenient for embedders and tests
    /// that do not care about byte-accurate encodings.
    pub fn assemble(ops: Vec<(Opcode, Operand)>) -> Self {
        let instructions = ops
            .into_iter()
            .enumerate()
            .map(|(index, (opcode, operand))| Instruction {
                opcode,
                operand,
                offset: index as CodeOffset,
                next: index as CodeOffset + 1,
            })
            .collect();
        Self::new(instructions)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }

    pub fn at_offset(&self, offset: CodeOffset) -> Option<&Instruction> {
        self.by_offset
            .get(&offset)
            .map(|&index| &self.instructions[index])
    }

    pub fn is_valid_offset(&self, offset: CodeOffset) -> bool {
        self.by_offset.contains_key(&offset)
    }

    pub fn first(&self) -> Option<&Instruction> {
        self.instructions.first()
    }

    /// One past the last instruction; the lifter's sentinel block leader.
    pub fn end_offset(&self) -> CodeOffset {
        self.instructions.last().map(|instr| instr.next).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assemble_assigns_unit_offsets() {
        let code = CodeStream::assemble(vec![
            (Opcode::LdcI41, Operand::None),
            (Opcode::LdcI42, Operand::None),
            (Opcode::Add, Operand::None),
            (Opcode::Ret, Operand::None),
        ]);
        assert_eq!(code.len(), 4);
        assert_eq!(code.at_offset(2).unwrap().opcode, Opcode::Add);
        assert_eq!(code.at_offset(2).unwrap().next, 3);
        assert_eq!(code.end_offset(), 4);
        assert!(code.at_offset(4).is_none());
    }

    #[test]
    fn branch_targets_cover_switch_tables() {
        let branch = Instruction {
            opcode: Opcode::BrtrueS,
            operand: Operand::Target(7),
            offset: 0,
            next: 1,
        };
        assert_eq!(branch.branch_targets(), vec![7]);

        let table = Instruction {
            opcode: Opcode::Switch,
            operand: Operand::Table(vec![3, 5, 9]),
            offset: 1,
            next: 2,
        };
        assert_eq!(table.branch_targets(), vec![3, 5, 9]);

        let plain = Instruction {
            opcode: Opcode::Add,
            operand: Operand::None,
            offset: 2,
            next: 3,
        };
        assert!(plain.branch_targets().is_empty());
    }

    #[test]
    fn short_and_unsigned_flags() {
        assert!(Opcode::BltUnS.is_short_form());
        assert!(Opcode::BltUnS.is_unsigned());
        assert!(!Opcode::Blt.is_short_form());
        assert!(!Opcode::Blt.is_unsigned());
        assert!(Opcode::LeaveS.is_leave());
        assert!(Opcode::LeaveS.is_branch());
    }
}
