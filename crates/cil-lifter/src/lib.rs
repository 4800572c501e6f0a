// Copyright (c) The CilLift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Lifts flat CIL instruction streams into block-structured statement
//! trees suitable for static analysis.
//!
//! The entry points are [`parser::parse_blocks`] for a one-shot lift and
//! [`members::Method`] for a handle wrapper that lifts lazily and caches
//! the result. Lifting simulates the evaluation stack instruction by
//! instruction, partitions the stream at branch targets, and rebuilds
//! operand nesting as expression trees; opcodes outside the supported
//! subset surface as explicit [`ast::Statement::Unsupported`] markers
//! rather than silently vanishing.

pub mod ast;
pub mod block_map;
pub mod contracts;
pub mod errors;
pub mod members;
pub mod options;
pub mod parser;

pub use ast::{
    BinaryOp, Block, CallKind, ConstantValue, Expression, MemberBinding, ParameterRef, Statement,
    UnaryOp, blocks,
};
pub use block_map::BlockMap;
pub use contracts::{ContractRegistry, MethodContracts};
pub use errors::{LiftError, MalformedBody};
pub use members::{Field, Local, Method, Parameter, Property};
pub use options::LiftOptions;
pub use parser::parse_blocks;
