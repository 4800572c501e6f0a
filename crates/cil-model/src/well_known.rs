// Copyright (c) The CilLift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-session type system context.
//!
//! `TypeSystem` scopes the well-known-types cache to one module and is
//! passed explicitly into every lift. Each well-known type is resolved at
//! most once per session; there is no process-wide state, so lifting two
//! modules concurrently with two sessions cannot race.

use crate::module::Module;
use crate::types::TypeNode;
use once_cell::unsync::OnceCell;

/// Lazily-resolved cache of the primitive and framework types the lifter
/// annotates expressions with.
#[derive(Debug, Default)]
struct WellKnownTypes {
    void: OnceCell<Option<TypeNode>>,
    boolean: OnceCell<Option<TypeNode>>,
    char: OnceCell<Option<TypeNode>>,
    int8: OnceCell<Option<TypeNode>>,
    uint8: OnceCell<Option<TypeNode>>,
    int16: OnceCell<Option<TypeNode>>,
    uint16: OnceCell<Option<TypeNode>>,
    int32: OnceCell<Option<TypeNode>>,
    uint32: OnceCell<Option<TypeNode>>,
    int64: OnceCell<Option<TypeNode>>,
    uint64: OnceCell<Option<TypeNode>>,
    single: OnceCell<Option<TypeNode>>,
    double: OnceCell<Option<TypeNode>>,
    object: OnceCell<Option<TypeNode>>,
    string: OnceCell<Option<TypeNode>>,
    array: OnceCell<Option<TypeNode>>,
    int_ptr: OnceCell<Option<TypeNode>>,
    uint_ptr: OnceCell<Option<TypeNode>>,
    reflection_type: OnceCell<Option<TypeNode>>,
}

/// The explicit context a lift runs against: one module plus its
/// well-known-types cache.
#[derive(Debug)]
pub struct TypeSystem<'m> {
    module: &'m Module,
    core: WellKnownTypes,
}

macro_rules! well_known {
    ($(#[$doc:meta])* $accessor:ident, $field:ident, $full_name:literal) => {
        $(#[$doc])*
        pub fn $accessor(&self) -> Option<&TypeNode> {
            self.resolve(&self.core.$field, $full_name)
        }
    };
}

impl<'m> TypeSystem<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self {
            module,
            core: WellKnownTypes::default(),
        }
    }

    pub fn module(&self) -> &'m Module {
        self.module
    }

    fn resolve<'a>(
        &'a self,
        cell: &'a OnceCell<Option<TypeNode>>,
        full_name: &str,
    ) -> Option<&'a TypeNode> {
        cell.get_or_init(|| {
            let resolved = self
                .module
                .type_named(full_name)
                .and_then(|handle| TypeNode::create(self.module, handle));
            if resolved.is_none() {
                log::debug!(
                    "well-known type {} does not resolve in module {}",
                    full_name,
                    self.module.name()
                );
            }
            resolved
        })
        .as_ref()
    }

    well_known!(void, void, "System.Void");
    well_known!(boolean, boolean, "System.Boolean");
    well_known!(char, char, "System.Char");
    well_known!(int8, int8, "System.SByte");
    well_known!(
        /// CIL types comparisons as unsigned int8.
        uint8,
        uint8,
        "System.Byte"
    );
    well_known!(int16, int16, "System.Int16");
    well_known!(uint16, uint16, "System.UInt16");
    well_known!(int32, int32, "System.Int32");
    well_known!(uint32, uint32, "System.UInt32");
    well_known!(int64, int64, "System.Int64");
    well_known!(uint64, uint64, "System.UInt64");
    well_known!(single, single, "System.Single");
    well_known!(double, double, "System.Double");
    well_known!(object, object, "System.Object");
    well_known!(string, string, "System.String");
    well_known!(array, array, "System.Array");
    well_known!(int_ptr, int_ptr, "System.IntPtr");
    well_known!(uint_ptr, uint_ptr, "System.UIntPtr");
    well_known!(reflection_type, reflection_type, "System.Type");

    /// Whether a handle denotes `System.Void`; decides if a call pushes a
    /// value or becomes an expression statement.
    pub fn is_void(&self, handle: crate::module::TypeHandle) -> bool {
        self.void()
            .is_some_and(|void| void.handle() == Some(handle))
    }
}
