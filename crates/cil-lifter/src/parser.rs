// Copyright (c) The CilLift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stack-simulating statement parser.
//!
//! Walks one method's instruction stream front to back, simulating the CLI
//! operand stack per basic block and emitting statements into the block
//! that owns the current offset. The simulated stack is ephemeral: it
//! starts empty at every block leader and never appears in the output.
//!
//! Decoding is a closed function. Every instruction becomes a pushed
//! value, a produced statement, or a visible `Unsupported` marker; the two
//! address-of short forms abort the method's lift. Roughly half the opcode
//! space falls in the unsupported bucket, a documented limitation.

use crate::ast::{
    BinaryOp, Block, CallKind, ConstantValue, Expression, MemberBinding, ParameterRef, Statement,
    UnaryOp,
};
use crate::block_map::BlockMap;
use crate::errors::{LiftError, MalformedBody};
use crate::options::LiftOptions;
use cil_model::{
    CodeStream, Instruction, MethodDecl, MethodHandle, Opcode, Operand, TypeNode, TypeSystem,
};
use log::debug;

/// Lift one method body into its basic-block statement list.
///
/// The result covers the whole body: one `Statement::Block` per leader in
/// offset order, closed by an empty sentinel block one offset past the
/// last instruction.
pub fn parse_blocks(
    ts: &TypeSystem,
    method: MethodHandle,
    options: &LiftOptions,
) -> Result<Vec<Statement>, LiftError> {
    let decl = ts
        .module()
        .method_decl(method)
        .ok_or(LiftError::NoSuchMethod)?;
    let code = decl.code.as_ref().ok_or(LiftError::NoBody)?;
    let map = BlockMap::build(code)?;
    StatementParser::new(ts, decl, code, &map, options).run()
}

/// Closed decode result. Dropped opcode families surface as `Unsupported`
/// instead of disappearing; fatal cases are ordinary `Err` values.
enum Decoded {
    Value(Expression),
    Statement(Statement),
    Unsupported,
}

/// Condition shape of a branch family.
enum BranchCond {
    None,
    WhenTrue,
    WhenFalse,
    Compare(BinaryOp),
}

struct StatementParser<'a> {
    ts: &'a TypeSystem<'a>,
    method: &'a MethodDecl,
    code: &'a CodeStream,
    map: &'a BlockMap,
    options: &'a LiftOptions,
    stack: Vec<Expression>,
}

impl<'a> StatementParser<'a> {
    fn new(
        ts: &'a TypeSystem<'a>,
        method: &'a MethodDecl,
        code: &'a CodeStream,
        map: &'a BlockMap,
        options: &'a LiftOptions,
    ) -> Self {
        Self {
            ts,
            method,
            code,
            map,
            options,
            stack: vec![],
        }
    }

    fn run(mut self) -> Result<Vec<Statement>, LiftError> {
        let mut out = Vec::new();
        let end = self.map.end_offset();
        let mut current = Block::new(self.code.first().map(|i| i.offset).unwrap_or(end));
        let mut steps = 0usize;

        for instr in self.code.iter() {
            steps += 1;
            if let Some(limit) = self.options.step_limit {
                if steps > limit {
                    return Err(LiftError::StepLimitExceeded { limit });
                }
            }

            match self.decode(instr)? {
                Decoded::Value(value) => self.stack.push(value),
                Decoded::Statement(stmt) => {
                    if stmt.is_terminator() {
                        self.drop_residual(instr);
                        current.statements.push(stmt);
                        debug!(
                            "closing block at leader {} ({} statements)",
                            current.leader,
                            current.statements.len()
                        );
                        out.push(Statement::Block(current));
                        current = Block::new(instr.next);
                        continue;
                    }
                    current.statements.push(stmt);
                }
                Decoded::Unsupported => {
                    current.statements.push(Statement::Unsupported {
                        opcode: instr.opcode,
                    });
                }
            }

            // Forced termination: the next offset is a registered leader,
            // so the run ends here even without an explicit terminator.
            if instr.next < end && self.map.is_leader(instr.next) {
                self.flush_residual(&mut current);
                out.push(Statement::Block(current));
                current = Block::new(instr.next);
            }
        }

        // A body that falls off the end without a terminator can still
        // hold residual values; flush them like any other boundary.
        self.flush_residual(&mut current);
        if current.leader < end || !current.is_empty() {
            out.push(Statement::Block(current));
        }
        // Sentinel block one offset past the last instruction.
        out.push(Statement::Block(Block::new(end)));
        Ok(out)
    }

    /// Residual values at a forced block boundary become standalone
    /// expression statements, in source order by default. The legacy LIFO
    /// pop order, which reverses source order, stays available behind
    /// `compat_lifo_flush`.
    fn flush_residual(&mut self, current: &mut Block) {
        if self.stack.is_empty() {
            return;
        }
        debug!(
            "flushing {} residual stack values at block boundary (leader {})",
            self.stack.len(),
            current.leader
        );
        let values: Vec<Expression> = if self.options.compat_lifo_flush {
            let mut drained: Vec<_> = self.stack.drain(..).collect();
            drained.reverse();
            drained
        } else {
            self.stack.drain(..).collect()
        };
        current
            .statements
            .extend(values.into_iter().map(Statement::Expression));
    }

    /// Values still on the stack at an explicit terminator are
    /// unobservable past this point; drop them, loudly.
    fn drop_residual(&mut self, instr: &Instruction) {
        if !self.stack.is_empty() {
            debug!(
                "dropping {} residual stack values at {:?} (offset {})",
                self.stack.len(),
                instr.opcode,
                instr.offset
            );
            self.stack.clear();
        }
    }

    fn decode(&mut self, instr: &Instruction) -> Result<Decoded, LiftError> {
        use Opcode::*;
        let decoded = match instr.opcode {
            Nop => Decoded::Statement(Statement::Nop),

            Ldarg0 => Decoded::Value(self.param_ref(0, instr)?),
            Ldarg1 => Decoded::Value(self.param_ref(1, instr)?),
            Ldarg2 => Decoded::Value(self.param_ref(2, instr)?),
            Ldarg3 => Decoded::Value(self.param_ref(3, instr)?),
            LdargS => {
                let index = self.param_operand(instr)?;
                Decoded::Value(self.param_ref(index, instr)?)
            }
            Ldloc0 => Decoded::Value(self.local_ref(0, instr)?),
            Ldloc1 => Decoded::Value(self.local_ref(1, instr)?),
            Ldloc2 => Decoded::Value(self.local_ref(2, instr)?),
            Ldloc3 => Decoded::Value(self.local_ref(3, instr)?),
            LdlocS => {
                let slot = self.local_operand(instr)?;
                Decoded::Value(self.local_ref(slot, instr)?)
            }

            Stloc0 => self.store_local(0, instr)?,
            Stloc1 => self.store_local(1, instr)?,
            Stloc2 => self.store_local(2, instr)?,
            Stloc3 => self.store_local(3, instr)?,
            StlocS => {
                let slot = self.local_operand(instr)?;
                self.store_local(slot, instr)?
            }
            StargS => {
                let index = self.param_operand(instr)?;
                let target = self.param_ref(index, instr)?;
                let value = self.pop(instr)?;
                Decoded::Statement(Statement::Assignment { target, value })
            }

            // Address-of short forms are not modeled; they abort the
            // whole method's lift.
            LdargaS | LdlocaS => {
                return Err(LiftError::NotImplemented {
                    opcode: instr.opcode,
                    offset: instr.offset,
                })
            }

            Ldnull => Decoded::Value(Expression::Literal {
                value: ConstantValue::Null,
                ty: self.ts.object().cloned(),
            }),
            LdcI4M1 => Decoded::Value(self.int32_literal(-1)),
            LdcI40 => Decoded::Value(self.int32_literal(0)),
            LdcI41 => Decoded::Value(self.int32_literal(1)),
            LdcI42 => Decoded::Value(self.int32_literal(2)),
            LdcI43 => Decoded::Value(self.int32_literal(3)),
            LdcI44 => Decoded::Value(self.int32_literal(4)),
            LdcI45 => Decoded::Value(self.int32_literal(5)),
            LdcI46 => Decoded::Value(self.int32_literal(6)),
            LdcI47 => Decoded::Value(self.int32_literal(7)),
            LdcI48 => Decoded::Value(self.int32_literal(8)),
            LdcI4S | LdcI4 => match instr.operand {
                Operand::Int32(value) => Decoded::Value(self.int32_literal(value)),
                _ => return Err(self.operand_mismatch(instr)),
            },
            LdcI8 => match instr.operand {
                Operand::Int64(value) => Decoded::Value(Expression::Literal {
                    value: ConstantValue::Int64(value),
                    ty: self.ts.int64().cloned(),
                }),
                _ => return Err(self.operand_mismatch(instr)),
            },
            LdcR4 => match instr.operand {
                Operand::Float32(value) => Decoded::Value(Expression::Literal {
                    value: ConstantValue::Float32(value),
                    ty: self.ts.single().cloned(),
                }),
                _ => return Err(self.operand_mismatch(instr)),
            },
            LdcR8 => match instr.operand {
                Operand::Float64(value) => Decoded::Value(Expression::Literal {
                    value: ConstantValue::Float64(value),
                    ty: self.ts.double().cloned(),
                }),
                _ => return Err(self.operand_mismatch(instr)),
            },
            Ldstr => match &instr.operand {
                Operand::Str(value) => Decoded::Value(Expression::Literal {
                    value: ConstantValue::Str(value.clone()),
                    ty: self.ts.string().cloned(),
                }),
                _ => return Err(self.operand_mismatch(instr)),
            },

            // A discard is a visible side effect, not a silent drop.
            Pop => {
                let value = self.pop(instr)?;
                Decoded::Statement(Statement::Expression(value))
            }

            Add => self.binary(BinaryOp::Add, instr)?,
            Sub => self.binary(BinaryOp::Sub, instr)?,
            Mul => self.binary(BinaryOp::Mul, instr)?,
            Div | DivUn => self.binary(BinaryOp::Div, instr)?,
            Rem | RemUn => self.binary(BinaryOp::Rem, instr)?,
            And => self.binary(BinaryOp::BitAnd, instr)?,
            Or => self.binary(BinaryOp::BitOr, instr)?,
            Xor => self.binary(BinaryOp::BitXor, instr)?,
            Shl => self.binary(BinaryOp::Shl, instr)?,
            Shr | ShrUn => self.binary(BinaryOp::Shr, instr)?,

            Neg => self.unary(UnaryOp::Neg, instr)?,
            Not => self.unary(UnaryOp::BitNot, instr)?,

            Ceq => self.compare(BinaryOp::Eq, instr)?,
            Cgt | CgtUn => self.compare(BinaryOp::Gt, instr)?,
            Clt | CltUn => self.compare(BinaryOp::Lt, instr)?,

            ConvI1 => self.convert(self.ts.int8().cloned(), instr)?,
            ConvI2 => self.convert(self.ts.int16().cloned(), instr)?,
            ConvI4 => self.convert(self.ts.int32().cloned(), instr)?,
            ConvI8 => self.convert(self.ts.int64().cloned(), instr)?,
            ConvR4 => self.convert(self.ts.single().cloned(), instr)?,
            ConvR8 => self.convert(self.ts.double().cloned(), instr)?,
            ConvU1 => self.convert(self.ts.uint8().cloned(), instr)?,
            ConvU2 => self.convert(self.ts.uint16().cloned(), instr)?,
            ConvU4 => self.convert(self.ts.uint32().cloned(), instr)?,
            ConvU8 => self.convert(self.ts.uint64().cloned(), instr)?,
            ConvI => self.convert(self.ts.int_ptr().cloned(), instr)?,
            ConvU => self.convert(self.ts.uint_ptr().cloned(), instr)?,

            Call => self.call(instr, false)?,
            Callvirt => self.call(instr, true)?,
            Newobj => self.construct(instr)?,

            Ret => {
                let returns_value = self
                    .method
                    .return_type
                    .is_some_and(|handle| !self.ts.is_void(handle));
                let value = if returns_value {
                    Some(self.pop(instr)?)
                } else {
                    None
                };
                Decoded::Statement(Statement::Return(value))
            }

            Br | BrS => self.branch(instr, BranchCond::None)?,
            Brtrue | BrtrueS => self.branch(instr, BranchCond::WhenTrue)?,
            Brfalse | BrfalseS => self.branch(instr, BranchCond::WhenFalse)?,
            Beq | BeqS => self.branch(instr, BranchCond::Compare(BinaryOp::Eq))?,
            BneUn | BneUnS => self.branch(instr, BranchCond::Compare(BinaryOp::Ne))?,
            Bge | BgeS | BgeUn | BgeUnS => self.branch(instr, BranchCond::Compare(BinaryOp::Ge))?,
            Bgt | BgtS | BgtUn | BgtUnS => self.branch(instr, BranchCond::Compare(BinaryOp::Gt))?,
            Ble | BleS | BleUn | BleUnS => self.branch(instr, BranchCond::Compare(BinaryOp::Le))?,
            Blt | BltS | BltUn | BltUnS => self.branch(instr, BranchCond::Compare(BinaryOp::Lt))?,
            Leave | LeaveS => self.branch(instr, BranchCond::None)?,

            Throw => {
                let value = self.pop(instr)?;
                Decoded::Statement(Statement::Throw(Some(value)))
            }
            Rethrow => Decoded::Statement(Statement::Throw(None)),
            Endfinally => Decoded::Statement(Statement::EndFinally),
            Endfilter => {
                let value = self.pop(instr)?;
                Decoded::Statement(Statement::EndFilter(value))
            }

            // Recognized families without a translation. No stack effect;
            // the marker keeps them visible in the output.
            Dup | Switch | Ldfld | Ldflda | Stfld | Ldsfld | Ldsflda | Stsfld | LdindRef
            | StindRef | LdelemRef | StelemRef | Ldlen | Newarr | Box | Unbox | UnboxAny
            | Castclass | Isinst | Initobj | Ldtoken | Ldftn | Ldvirtftn => Decoded::Unsupported,
        };
        Ok(decoded)
    }

    fn pop(&mut self, instr: &Instruction) -> Result<Expression, LiftError> {
        self.stack.pop().ok_or_else(|| {
            MalformedBody::StackUnderflow {
                offset: instr.offset,
            }
            .into()
        })
    }

    fn operand_mismatch(&self, instr: &Instruction) -> LiftError {
        MalformedBody::OperandMismatch {
            opcode: instr.opcode,
            offset: instr.offset,
        }
        .into()
    }

    fn param_operand(&self, instr: &Instruction) -> Result<u16, LiftError> {
        match instr.operand {
            Operand::Param(index) => Ok(index),
            _ => Err(self.operand_mismatch(instr)),
        }
    }

    fn local_operand(&self, instr: &Instruction) -> Result<u16, LiftError> {
        match instr.operand {
            Operand::Local(slot) => Ok(slot),
            _ => Err(self.operand_mismatch(instr)),
        }
    }

    /// Map a raw argument slot to a parameter reference. For instance
    /// methods slot 0 is the receiver and the formals shift down by one.
    fn param_ref(&self, raw: u16, instr: &Instruction) -> Result<Expression, LiftError> {
        let reference = if self.method.is_static {
            if raw as usize >= self.method.params.len() {
                return Err(MalformedBody::ParameterOutOfRange {
                    index: raw,
                    offset: instr.offset,
                }
                .into());
            }
            ParameterRef::Positional(raw)
        } else if raw == 0 {
            ParameterRef::This
        } else {
            let index = raw - 1;
            if index as usize >= self.method.params.len() {
                return Err(MalformedBody::ParameterOutOfRange {
                    index: raw,
                    offset: instr.offset,
                }
                .into());
            }
            ParameterRef::Positional(index)
        };
        Ok(Expression::Parameter(reference))
    }

    fn local_ref(&self, slot: u16, instr: &Instruction) -> Result<Expression, LiftError> {
        if slot as usize >= self.method.locals.len() {
            return Err(MalformedBody::LocalOutOfRange {
                slot,
                offset: instr.offset,
            }
            .into());
        }
        Ok(Expression::Local(slot))
    }

    fn store_local(&mut self, slot: u16, instr: &Instruction) -> Result<Decoded, LiftError> {
        let target = self.local_ref(slot, instr)?;
        let value = self.pop(instr)?;
        Ok(Decoded::Statement(Statement::Assignment { target, value }))
    }

    fn int32_literal(&self, value: i32) -> Expression {
        Expression::Literal {
            value: ConstantValue::Int32(value),
            ty: self.ts.int32().cloned(),
        }
    }

    /// Arithmetic result type is the left operand's, falling back to the
    /// right's. A documented simplification, not CLI numeric promotion.
    fn binary(&mut self, op: BinaryOp, instr: &Instruction) -> Result<Decoded, LiftError> {
        let right = self.pop(instr)?;
        let left = self.pop(instr)?;
        let ty = left.ty().cloned().or_else(|| right.ty().cloned());
        Ok(Decoded::Value(Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty,
        }))
    }

    fn unary(&mut self, op: UnaryOp, instr: &Instruction) -> Result<Decoded, LiftError> {
        let operand = self.pop(instr)?;
        let ty = operand.ty().cloned();
        Ok(Decoded::Value(Expression::Unary {
            op,
            operand: Box::new(operand),
            ty,
        }))
    }

    /// Comparisons are typed as unsigned int8, CIL's bool-as-int8
    /// convention.
    fn compare(&mut self, op: BinaryOp, instr: &Instruction) -> Result<Decoded, LiftError> {
        let right = self.pop(instr)?;
        let left = self.pop(instr)?;
        Ok(Decoded::Value(Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty: self.ts.uint8().cloned(),
        }))
    }

    fn convert(
        &mut self,
        target: Option<TypeNode>,
        instr: &Instruction,
    ) -> Result<Decoded, LiftError> {
        let operand = self.pop(instr)?;
        Ok(Decoded::Value(Expression::Unary {
            op: UnaryOp::Convert,
            operand: Box::new(operand),
            ty: target,
        }))
    }

    /// Pop `argc` operands in reverse index order so the argument list
    /// reads in source order, then the receiver for instance calls.
    fn pop_args(&mut self, argc: usize, instr: &Instruction) -> Result<Vec<Expression>, LiftError> {
        let mut args = Vec::with_capacity(argc);
        for _ in 0..argc {
            args.push(self.pop(instr)?);
        }
        args.reverse();
        Ok(args)
    }

    fn call(&mut self, instr: &Instruction, virtual_call: bool) -> Result<Decoded, LiftError> {
        let Operand::Method(handle) = instr.operand else {
            return Err(self.operand_mismatch(instr));
        };
        let module = self.ts.module();
        let callee = module.method_decl(handle).ok_or(LiftError::Malformed(
            MalformedBody::UnresolvedMethod {
                offset: instr.offset,
            },
        ))?;
        let is_static = callee.is_static;
        let return_type = callee.return_type;
        let args = self.pop_args(callee.params.len(), instr)?;
        let receiver = if is_static {
            None
        } else {
            Some(Box::new(self.pop(instr)?))
        };
        let kind = if virtual_call {
            CallKind::Virtual
        } else if is_static {
            CallKind::Static
        } else {
            CallKind::Instance
        };
        let call = Expression::Call {
            callee: MemberBinding {
                receiver,
                member: handle,
            },
            args,
            kind,
            ty: return_type.and_then(|ty| TypeNode::create(module, ty)),
        };
        // Void calls are statements in their own right; everything else
        // produces a value.
        if return_type.is_some_and(|handle| self.ts.is_void(handle)) {
            Ok(Decoded::Statement(Statement::Expression(call)))
        } else {
            Ok(Decoded::Value(call))
        }
    }

    fn construct(&mut self, instr: &Instruction) -> Result<Decoded, LiftError> {
        let Operand::Method(handle) = instr.operand else {
            return Err(self.operand_mismatch(instr));
        };
        let module = self.ts.module();
        let ctor = module.method_decl(handle).ok_or(LiftError::Malformed(
            MalformedBody::UnresolvedMethod {
                offset: instr.offset,
            },
        ))?;
        let declaring = ctor.declaring;
        let args = self.pop_args(ctor.params.len(), instr)?;
        Ok(Decoded::Value(Expression::Construct {
            ctor: MemberBinding {
                receiver: None,
                member: handle,
            },
            args,
            ty: declaring.and_then(|ty| TypeNode::create(module, ty)),
        }))
    }

    fn branch(&mut self, instr: &Instruction, cond: BranchCond) -> Result<Decoded, LiftError> {
        let Operand::Target(target) = instr.operand else {
            return Err(self.operand_mismatch(instr));
        };
        // The pre-pass registered every target; a miss here means the map
        // and the code stream disagree.
        if !self.map.is_leader(target) {
            return Err(MalformedBody::UnregisteredBranchTarget {
                offset: instr.offset,
                target,
            }
            .into());
        }
        let condition = match cond {
            BranchCond::None => None,
            BranchCond::WhenTrue => Some(self.pop(instr)?),
            BranchCond::WhenFalse => {
                let operand = self.pop(instr)?;
                Some(Expression::Unary {
                    op: UnaryOp::LogicalNot,
                    operand: Box::new(operand),
                    ty: self.ts.uint8().cloned(),
                })
            }
            BranchCond::Compare(op) => {
                let right = self.pop(instr)?;
                let left = self.pop(instr)?;
                Some(Expression::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    ty: self.ts.uint8().cloned(),
                })
            }
        };
        Ok(Decoded::Statement(Statement::Branch {
            condition,
            target,
            short: instr.opcode.is_short_form(),
            unsigned: instr.opcode.is_unsigned(),
            leaves_region: instr.opcode.is_leave(),
        }))
    }
}
