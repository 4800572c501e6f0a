// Copyright (c) The CilLift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Type overlay used to annotate lifted expressions.
//!
//! `TypeNode` is a closed view over metadata type definitions: `Class` for
//! reference-type definitions (adds exact-match member lookup), `Plain` for
//! everything else that resolves (value types, primitives, interfaces), and
//! `ByRef` for synthetic byref wrappers. ByRef wrappers are never interned:
//! two wrappers over the same element are distinct values, so callers
//! compare element types rather than wrapper identity.

use crate::module::{MethodHandle, Module, TypeDecl, TypeFlags, TypeHandle};
use itertools::Itertools;

/// Shared payload of a resolved type definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeData {
    pub handle: TypeHandle,
    pub namespace: String,
    pub name: String,
    pub base: Option<TypeHandle>,
    pub interfaces: Vec<TypeHandle>,
    pub flags: TypeFlags,
}

impl TypeData {
    fn from_decl(handle: TypeHandle, decl: &TypeDecl) -> Self {
        Self {
            handle,
            namespace: decl.namespace.clone(),
            name: decl.name.clone(),
            base: decl.base,
            interfaces: decl.interfaces.clone(),
            flags: decl.flags,
        }
    }

    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// A reference-type definition; carries the member lookup the lifter uses
/// to bind call targets.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassType {
    pub data: TypeData,
}

impl ClassType {
    /// All declared methods with the given name, in declaration order.
    pub fn get_methods(&self, module: &Module, name: &str) -> Vec<MethodHandle> {
        let Some(decl) = module.type_decl(self.data.handle) else {
            return vec![];
        };
        decl.methods
            .iter()
            .copied()
            .filter(|&handle| {
                module
                    .method_decl(handle)
                    .is_some_and(|method| method.name == name)
            })
            .collect_vec()
    }

    /// Exact-match overload lookup: same name, same arity, and each formal
    /// parameter type's full name equal to the corresponding argument
    /// type's. No implicit conversions.
    pub fn get_method(
        &self,
        module: &Module,
        name: &str,
        arg_types: &[TypeNode],
    ) -> Option<MethodHandle> {
        self.get_methods(module, name)
            .into_iter()
            .find(|&handle| {
                let Some(method) = module.method_decl(handle) else {
                    return false;
                };
                if method.params.len() != arg_types.len() {
                    return false;
                }
                method.params.iter().zip(arg_types).all(|(param, arg)| {
                    param
                        .ty
                        .and_then(|ty| TypeNode::create(module, ty))
                        .is_some_and(|param_type| param_type.full_name() == arg.full_name())
                })
            })
    }
}

/// Synthetic byref wrapper over an element type.
#[derive(Debug, Clone, PartialEq)]
pub struct ByRefType {
    pub element: Box<TypeNode>,
}

/// A resolved view of one type, annotated onto lifted expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeNode {
    Class(ClassType),
    Plain(TypeData),
    ByRef(ByRefType),
}

impl TypeNode {
    /// Resolve a type handle. Returns a `Class` node for reference-type
    /// definitions, a `Plain` node otherwise, and `None` when the handle
    /// has no definition in the module. Resolution failure is recoverable;
    /// callers must check.
    pub fn create(module: &Module, handle: TypeHandle) -> Option<TypeNode> {
        let decl = module.type_decl(handle)?;
        let data = TypeData::from_decl(handle, decl);
        if decl.flags.is_class && !decl.flags.is_value_type {
            Some(TypeNode::Class(ClassType { data }))
        } else {
            Some(TypeNode::Plain(data))
        }
    }

    /// Wrap an element type into a fresh byref node. Deliberately not
    /// interned.
    pub fn by_ref(element: TypeNode) -> TypeNode {
        TypeNode::ByRef(ByRefType {
            element: Box::new(element),
        })
    }

    pub fn as_class(&self) -> Option<&ClassType> {
        match self {
            TypeNode::Class(class) => Some(class),
            _ => None,
        }
    }

    /// The definition payload, if this node is backed by one.
    pub fn data(&self) -> Option<&TypeData> {
        match self {
            TypeNode::Class(class) => Some(&class.data),
            TypeNode::Plain(data) => Some(data),
            TypeNode::ByRef(_) => None,
        }
    }

    /// The element type of a byref wrapper.
    pub fn element(&self) -> Option<&TypeNode> {
        match self {
            TypeNode::ByRef(by_ref) => Some(&by_ref.element),
            _ => None,
        }
    }

    pub fn handle(&self) -> Option<TypeHandle> {
        self.data().map(|data| data.handle)
    }

    /// Simple name; byref wrappers synthesize `Elem&`.
    pub fn name(&self) -> String {
        match self {
            TypeNode::ByRef(by_ref) => format!("{}&", by_ref.element.name()),
            _ => self.data().map(|data| data.name.clone()).unwrap_or_default(),
        }
    }

    /// Namespace-qualified name; byref wrappers synthesize `Full.Name&`.
    pub fn full_name(&self) -> String {
        match self {
            TypeNode::ByRef(by_ref) => format!("{}&", by_ref.element.full_name()),
            _ => self
                .data()
                .map(|data| data.full_name())
                .unwrap_or_default(),
        }
    }

    fn is_void(&self) -> bool {
        self.data()
            .is_some_and(|data| data.namespace == "System" && data.name == "Void")
    }

    fn is_object(&self) -> bool {
        self.data()
            .is_some_and(|data| data.namespace == "System" && data.name == "Object")
    }

    /// Nominal assignability. Reflexive for every resolvable type; beyond
    /// that, Void converts to nothing, everything converts to Object,
    /// Object converts to nothing above it, and otherwise the base chain
    /// and declared interfaces are searched. No generic variance.
    pub fn is_assignable_to(&self, target: &TypeNode, module: &Module) -> bool {
        if self.full_name() == target.full_name() {
            return true;
        }
        if self.is_void() || target.is_void() {
            return false;
        }
        if target.is_object() {
            return true;
        }
        if self.is_object() {
            return false;
        }
        let Some(data) = self.data() else {
            // Byref wrappers only ever match by element full name above.
            return false;
        };
        if let Some(base) = data.base.and_then(|handle| TypeNode::create(module, handle)) {
            if base.is_assignable_to(target, module) {
                return true;
            }
        }
        data.interfaces
            .iter()
            .filter_map(|&handle| TypeNode::create(module, handle))
            .any(|interface| interface.is_assignable_to(target, module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{MethodDecl, ModuleBuilder, ParamDecl, TypeDecl};

    fn fixture() -> (Module, TypeHandle, TypeHandle, TypeHandle, TypeHandle) {
        let mut builder = ModuleBuilder::new("fixture");
        let object = builder.add_class("System", "Object", None);
        let void = builder.add_primitive("System", "Void");
        let disposable = builder.add_type(TypeDecl {
            namespace: "System".to_string(),
            name: "IDisposable".to_string(),
            flags: TypeFlags {
                is_interface: true,
                ..TypeFlags::default()
            },
            ..TypeDecl::default()
        });
        let stream = builder.add_type(TypeDecl {
            namespace: "System.IO".to_string(),
            name: "Stream".to_string(),
            base: Some(object),
            interfaces: vec![disposable],
            flags: TypeFlags {
                is_class: true,
                ..TypeFlags::default()
            },
            ..TypeDecl::default()
        });
        (builder.finish(), object, void, disposable, stream)
    }

    #[test]
    fn assignability_is_reflexive_for_resolvable_types() {
        let (module, object, void, disposable, stream) = fixture();
        for handle in [object, void, disposable, stream] {
            let node = TypeNode::create(&module, handle).unwrap();
            assert!(node.is_assignable_to(&node, &module), "{}", node.full_name());
        }
    }

    #[test]
    fn void_is_assignable_to_nothing_else() {
        let (module, object, void, _, stream) = fixture();
        let void = TypeNode::create(&module, void).unwrap();
        let object = TypeNode::create(&module, object).unwrap();
        let stream = TypeNode::create(&module, stream).unwrap();
        assert!(!void.is_assignable_to(&object, &module));
        assert!(!void.is_assignable_to(&stream, &module));
        assert!(!stream.is_assignable_to(&void, &module));
    }

    #[test]
    fn base_chain_and_interfaces_are_searched() {
        let (module, object, _, disposable, stream) = fixture();
        let object = TypeNode::create(&module, object).unwrap();
        let disposable = TypeNode::create(&module, disposable).unwrap();
        let stream = TypeNode::create(&module, stream).unwrap();
        assert!(stream.is_assignable_to(&object, &module));
        assert!(stream.is_assignable_to(&disposable, &module));
        assert!(!object.is_assignable_to(&stream, &module));
        assert!(!disposable.is_assignable_to(&stream, &module));
    }

    #[test]
    fn unresolvable_handles_yield_none() {
        let mut builder = ModuleBuilder::new("fixture");
        let external = builder.declare_type("Lib.External");
        let module = builder.finish();
        assert!(TypeNode::create(&module, external).is_none());
    }

    #[test]
    fn class_nodes_only_for_reference_definitions() {
        let (module, object, void, disposable, _) = fixture();
        assert!(matches!(
            TypeNode::create(&module, object),
            Some(TypeNode::Class(_))
        ));
        assert!(matches!(
            TypeNode::create(&module, void),
            Some(TypeNode::Plain(_))
        ));
        assert!(matches!(
            TypeNode::create(&module, disposable),
            Some(TypeNode::Plain(_))
        ));
    }

    #[test]
    fn byref_wrappers_synthesize_names_and_are_not_interned() {
        let (module, _, _, _, stream) = fixture();
        let stream = TypeNode::create(&module, stream).unwrap();
        let first = TypeNode::by_ref(stream.clone());
        let second = TypeNode::by_ref(stream.clone());
        assert_eq!(first.name(), "Stream&");
        assert_eq!(first.full_name(), "System.IO.Stream&");
        // Distinct wrapper values; element types are what match.
        assert!(!std::ptr::eq(&first, &second));
        assert_eq!(
            first.element().unwrap().full_name(),
            second.element().unwrap().full_name()
        );
        assert!(first.is_assignable_to(&second, &module));
    }

    #[test]
    fn get_method_requires_exact_arity_and_types() {
        let mut builder = ModuleBuilder::new("fixture");
        let object = builder.add_class("System", "Object", None);
        let int32 = builder.add_primitive("System", "Int32");
        let string = builder.add_class("System", "String", Some(object));
        let widget = builder.add_class("App", "Widget", Some(object));
        let by_int = builder.add_method(MethodDecl {
            name: "Configure".to_string(),
            declaring: Some(widget),
            params: vec![ParamDecl {
                name: "count".to_string(),
                ty: Some(int32),
            }],
            ..MethodDecl::default()
        });
        let by_string = builder.add_method(MethodDecl {
            name: "Configure".to_string(),
            declaring: Some(widget),
            params: vec![ParamDecl {
                name: "label".to_string(),
                ty: Some(string),
            }],
            ..MethodDecl::default()
        });
        builder.attach_methods(widget, &[by_int, by_string]);
        let module = builder.finish();

        let widget = TypeNode::create(&module, widget).unwrap();
        let class = widget.as_class().unwrap();
        let int32 = TypeNode::create(&module, int32).unwrap();
        let string = TypeNode::create(&module, string).unwrap();

        assert_eq!(class.get_methods(&module, "Configure").len(), 2);
        assert_eq!(
            class.get_method(&module, "Configure", std::slice::from_ref(&int32)),
            Some(by_int)
        );
        assert_eq!(
            class.get_method(&module, "Configure", std::slice::from_ref(&string)),
            Some(by_string)
        );
        // Arity mismatch and near-miss types do not bind.
        assert_eq!(class.get_method(&module, "Configure", &[]), None);
        assert_eq!(
            class.get_method(&module, "Configure", &[int32.clone(), int32]),
            None
        );
    }
}
