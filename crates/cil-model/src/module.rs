// Copyright (c) The CilLift Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-memory module model.
//!
//! A `Module` is the metadata boundary the lifter works against: types,
//! methods, fields and properties keyed by opaque handles. Handles may be
//! declared without a definition (external references); resolving such a
//! handle yields `None` and callers must check.

use crate::instruction::CodeStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

macro_rules! handle_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);
    };
}

handle_type!(
    /// Opaque handle of a type definition or external type reference.
    TypeHandle
);
handle_type!(
    /// Opaque handle of a method definition or external method reference.
    MethodHandle
);
handle_type!(
    /// Opaque handle of a field.
    FieldHandle
);
handle_type!(
    /// Opaque handle of a property.
    PropertyHandle
);

/// Kind flags of a type definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeFlags {
    pub is_class: bool,
    pub is_interface: bool,
    pub is_value_type: bool,
    pub is_primitive: bool,
    pub is_array: bool,
}

/// A type definition.
#[derive(Debug, Clone, Default)]
pub struct TypeDecl {
    pub namespace: String,
    pub name: String,
    pub base: Option<TypeHandle>,
    pub interfaces: Vec<TypeHandle>,
    pub flags: TypeFlags,
    pub fields: Vec<FieldHandle>,
    pub methods: Vec<MethodHandle>,
    pub properties: Vec<PropertyHandle>,
    pub nested: Vec<TypeHandle>,
}

impl TypeDecl {
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// An ordered formal parameter. The implicit receiver of instance methods
/// is not listed here.
#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: String,
    pub ty: Option<TypeHandle>,
}

/// A method definition or external method reference. External references
/// carry the signature but no code.
#[derive(Debug, Clone, Default)]
pub struct MethodDecl {
    pub name: String,
    pub declaring: Option<TypeHandle>,
    pub is_static: bool,
    pub return_type: Option<TypeHandle>,
    pub params: Vec<ParamDecl>,
    pub locals: Vec<TypeHandle>,
    pub code: Option<CodeStream>,
}

impl MethodDecl {
    pub fn has_body(&self) -> bool {
        self.code.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub declaring: Option<TypeHandle>,
    pub ty: Option<TypeHandle>,
    pub is_static: bool,
}

#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub name: String,
    pub declaring: Option<TypeHandle>,
    pub ty: Option<TypeHandle>,
}

/// One module's metadata. Read-only once built; the lifter never mutates it.
#[derive(Debug, Clone, Default)]
pub struct Module {
    name: String,
    types: BTreeMap<TypeHandle, TypeDecl>,
    methods: BTreeMap<MethodHandle, MethodDecl>,
    fields: BTreeMap<FieldHandle, FieldDecl>,
    properties: BTreeMap<PropertyHandle, PropertyDecl>,
    by_full_name: BTreeMap<String, TypeHandle>,
}

impl Module {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve a type handle. `None` means an external reference with no
    /// definition in this module.
    pub fn type_decl(&self, handle: TypeHandle) -> Option<&TypeDecl> {
        self.types.get(&handle)
    }

    pub fn method_decl(&self, handle: MethodHandle) -> Option<&MethodDecl> {
        self.methods.get(&handle)
    }

    pub fn field_decl(&self, handle: FieldHandle) -> Option<&FieldDecl> {
        self.fields.get(&handle)
    }

    pub fn property_decl(&self, handle: PropertyHandle) -> Option<&PropertyDecl> {
        self.properties.get(&handle)
    }

    /// Look up a type by namespace-qualified name. This is how the
    /// well-known-types cache reaches System.* definitions.
    pub fn type_named(&self, full_name: &str) -> Option<TypeHandle> {
        self.by_full_name.get(full_name).copied()
    }

    pub fn methods(&self) -> impl Iterator<Item = (MethodHandle, &MethodDecl)> {
        self.methods.iter().map(|(&handle, decl)| (handle, decl))
    }

    pub fn types(&self) -> impl Iterator<Item = (TypeHandle, &TypeDecl)> {
        self.types.iter().map(|(&handle, decl)| (handle, decl))
    }
}

/// Builder for `Module`. Supports forward references through a
/// declare-then-define split: reserve a handle first, fill the definition
/// in once its dependencies have handles of their own.
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    next_type: u32,
    next_method: u32,
    next_field: u32,
    next_property: u32,
    module: Module,
}

impl ModuleBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            module: Module {
                name: name.to_string(),
                ..Module::default()
            },
            ..Self::default()
        }
    }

    /// Reserve a type handle and register its name without a definition.
    /// Left undefined, the handle behaves as an unresolvable external
    /// reference.
    pub fn declare_type(&mut self, full_name: &str) -> TypeHandle {
        let handle = TypeHandle(self.next_type);
        self.next_type += 1;
        self.module
            .by_full_name
            .insert(full_name.to_string(), handle);
        handle
    }

    /// Attach the definition for a previously declared type handle.
    pub fn define_type(&mut self, handle: TypeHandle, decl: TypeDecl) {
        self.module.types.insert(handle, decl);
    }

    /// Declare and define in one step.
    pub fn add_type(&mut self, decl: TypeDecl) -> TypeHandle {
        let handle = self.declare_type(&decl.full_name());
        self.define_type(handle, decl);
        handle
    }

    /// Define a primitive value type, e.g. `System.Int32`.
    pub fn add_primitive(&mut self, namespace: &str, name: &str) -> TypeHandle {
        self.add_type(TypeDecl {
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags: TypeFlags {
                is_value_type: true,
                is_primitive: true,
                ..TypeFlags::default()
            },
            ..TypeDecl::default()
        })
    }

    /// Define a reference-type class with an optional base.
    pub fn add_class(
        &mut self,
        namespace: &str,
        name: &str,
        base: Option<TypeHandle>,
    ) -> TypeHandle {
        self.add_type(TypeDecl {
            namespace: namespace.to_string(),
            name: name.to_string(),
            base,
            flags: TypeFlags {
                is_class: true,
                ..TypeFlags::default()
            },
            ..TypeDecl::default()
        })
    }

    pub fn add_method(&mut self, decl: MethodDecl) -> MethodHandle {
        let handle = MethodHandle(self.next_method);
        self.next_method += 1;
        self.module.methods.insert(handle, decl);
        handle
    }

    pub fn add_field(&mut self, decl: FieldDecl) -> FieldHandle {
        let handle = FieldHandle(self.next_field);
        self.next_field += 1;
        self.module.fields.insert(handle, decl);
        handle
    }

    pub fn add_property(&mut self, decl: PropertyDecl) -> PropertyHandle {
        let handle = PropertyHandle(self.next_property);
        self.next_property += 1;
        self.module.properties.insert(handle, decl);
        handle
    }

    /// Register additional methods on an already defined type.
    pub fn attach_methods(&mut self, ty: TypeHandle, methods: &[MethodHandle]) {
        if let Some(decl) = self.module.types.get_mut(&ty) {
            decl.methods.extend_from_slice(methods);
        }
    }

    pub fn finish(self) -> Module {
        self.module
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_but_undefined_types_do_not_resolve() {
        let mut builder = ModuleBuilder::new("test");
        let external = builder.declare_type("System.External");
        let module = builder.finish();
        assert_eq!(module.type_named("System.External"), Some(external));
        assert!(module.type_decl(external).is_none());
    }

    #[test]
    fn full_name_omits_empty_namespace() {
        let global = TypeDecl {
            name: "Anon".to_string(),
            ..TypeDecl::default()
        };
        assert_eq!(global.full_name(), "Anon");

        let namespaced = TypeDecl {
            namespace: "System".to_string(),
            name: "Int32".to_string(),
            ..TypeDecl::default()
        };
        assert_eq!(namespaced.full_name(), "System.Int32");
    }

    #[test]
    fn attach_methods_extends_member_list() {
        let mut builder = ModuleBuilder::new("test");
        let class = builder.add_class("App", "Widget", None);
        let method = builder.add_method(MethodDecl {
            name: "Render".to_string(),
            declaring: Some(class),
            is_static: false,
            ..MethodDecl::default()
        });
        builder.attach_methods(class, &[method]);
        let module = builder.finish();
        assert_eq!(module.type_decl(class).unwrap().methods, vec![method]);
    }
}
