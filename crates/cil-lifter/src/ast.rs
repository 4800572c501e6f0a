// Copyright (c) The CilLift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Statement and expression nodes produced by the lifter.
//!
//! Both sets are closed so downstream analyses can match exhaustively.
//! Nodes are built in a single parse pass per method and treated as
//! read-only afterwards. Expressions optionally carry a resolved type;
//! absence means the type did not resolve, which is recoverable.

use cil_model::{CodeOffset, MethodHandle, Opcode, TypeNode};
use serde::{Deserialize, Serialize};

/// Constant payload of a literal expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Null,
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Str(String),
}

/// Binary operators. Unsigned arithmetic variants fold onto their signed
/// counterparts; the lifter does not model CLI numeric promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    BitNot,
    LogicalNot,
    /// Numeric conversion; the target type is the expression's type.
    Convert,
}

/// How a call site dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    Static,
    Instance,
    Virtual,
}

/// Reference to a formal parameter, with the receiver kept distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterRef {
    This,
    Positional(u16),
}

/// An optional receiver paired with the invoked member.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberBinding {
    pub receiver: Option<Box<Expression>>,
    pub member: MethodHandle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal {
        value: ConstantValue,
        ty: Option<TypeNode>,
    },
    /// Local variable slot.
    Local(u16),
    Parameter(ParameterRef),
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
        ty: Option<TypeNode>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
        ty: Option<TypeNode>,
    },
    Call {
        callee: MemberBinding,
        args: Vec<Expression>,
        kind: CallKind,
        ty: Option<TypeNode>,
    },
    Construct {
        ctor: MemberBinding,
        args: Vec<Expression>,
        ty: Option<TypeNode>,
    },
}

impl Expression {
    /// The resolved type annotation, if any.
    pub fn ty(&self) -> Option<&TypeNode> {
        match self {
            Expression::Literal { ty, .. }
            | Expression::Binary { ty, .. }
            | Expression::Unary { ty, .. }
            | Expression::Call { ty, .. }
            | Expression::Construct { ty, .. } => ty.as_ref(),
            Expression::Local(_) | Expression::Parameter(_) => None,
        }
    }

    /// Post-hoc type decoration for nodes that start untyped.
    pub fn with_ty(self, ty: Option<TypeNode>) -> Expression {
        match self {
            Expression::Literal { value, .. } => Expression::Literal { value, ty },
            Expression::Binary {
                op, left, right, ..
            } => Expression::Binary {
                op,
                left,
                right,
                ty,
            },
            Expression::Unary { op, operand, .. } => Expression::Unary { op, operand, ty },
            Expression::Call {
                callee, args, kind, ..
            } => Expression::Call {
                callee,
                args,
                kind,
                ty,
            },
            Expression::Construct { ctor, args, .. } => Expression::Construct { ctor, args, ty },
            other @ (Expression::Local(_) | Expression::Parameter(_)) => other,
        }
    }
}

/// A maximal straight-line run of statements with one entry offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub leader: CodeOffset,
    pub statements: Vec<Statement>,
}

impl Block {
    pub fn new(leader: CodeOffset) -> Self {
        Self {
            leader,
            statements: vec![],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Nop,
    Return(Option<Expression>),
    Assignment {
        target: Expression,
        value: Expression,
    },
    /// An expression evaluated for its side effect, e.g. a void call or a
    /// flushed residual stack value.
    Expression(Expression),
    Branch {
        condition: Option<Expression>,
        /// Leader offset of the target block.
        target: CodeOffset,
        /// Short (`.s`) encoding.
        short: bool,
        /// Unsigned (`.un`) comparison form.
        unsigned: bool,
        /// Set for `leave`/`leave.s`: the transfer exits an exception region.
        leaves_region: bool,
    },
    /// `throw` with a value, `rethrow` without.
    Throw(Option<Expression>),
    EndFinally,
    EndFilter(Expression),
    /// Marker for a recognized opcode family this lifter does not
    /// translate. Kept visible instead of silently dropped.
    Unsupported { opcode: Opcode },
    Block(Block),
}

impl Statement {
    /// Whether this statement ends its basic block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Statement::Return(_)
                | Statement::Branch { .. }
                | Statement::Throw(_)
                | Statement::EndFinally
                | Statement::EndFilter(_)
        )
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Statement::Block(block) => Some(block),
            _ => None,
        }
    }
}

/// Iterate the blocks of a lifted body in leader order.
pub fn blocks(statements: &[Statement]) -> impl Iterator<Item = &Block> {
    statements.iter().filter_map(Statement::as_block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminators_end_blocks() {
        assert!(Statement::Return(None).is_terminator());
        assert!(Statement::Throw(None).is_terminator());
        assert!(Statement::EndFinally.is_terminator());
        assert!(Statement::Branch {
            condition: None,
            target: 0,
            short: false,
            unsigned: false,
            leaves_region: false,
        }
        .is_terminator());
        assert!(!Statement::Nop.is_terminator());
        assert!(!Statement::Unsupported {
            opcode: Opcode::Dup
        }
        .is_terminator());
    }

    #[test]
    fn with_ty_decorates_typed_nodes_only() {
        let literal = Expression::Literal {
            value: ConstantValue::Int32(3),
            ty: None,
        };
        assert!(literal.ty().is_none());
        let local = Expression::Local(0).with_ty(None);
        assert_eq!(local, Expression::Local(0));
    }
}
