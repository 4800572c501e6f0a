// Copyright (c) The CilLift Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-memory model of CIL metadata and instruction streams.
//!
//! This crate is the boundary the lifter works against: it owns the module
//! model (types, methods, fields, properties behind opaque handles), the
//! decoded instruction stream of a method body, the type overlay used to
//! annotate lifted expressions, and the per-session well-known-types cache.
//! It performs no lifting itself; that lives in `cil-lifter`.

pub mod instruction;
pub mod module;
pub mod types;
pub mod well_known;

pub use instruction::{CodeOffset, CodeStream, Instruction, Opcode, Operand};
pub use module::{
    FieldDecl, FieldHandle, MethodDecl, MethodHandle, Module, ModuleBuilder, ParamDecl,
    PropertyDecl, PropertyHandle, TypeDecl, TypeFlags, TypeHandle,
};
pub use types::{ByRefType, ClassType, TypeData, TypeNode};
pub use well_known::TypeSystem;
