// Copyright (c) The CilLift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Member wrappers over metadata handles.
//!
//! `Method` is the consumer-facing entry point: it resolves its signature
//! lazily and lifts its body exactly once, caching the outcome for the
//! lifetime of the wrapper. A failed lift is cached the same way, so one
//! bad method cannot poison sibling lifts and repeated queries stay cheap.

use crate::ast::Statement;
use crate::errors::LiftError;
use crate::options::LiftOptions;
use crate::parser::parse_blocks;
use cil_model::{FieldHandle, MethodDecl, MethodHandle, PropertyHandle, TypeNode, TypeSystem};
use once_cell::unsync::OnceCell;

/// A resolved formal parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: Option<TypeNode>,
}

/// A resolved local variable slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Local {
    pub ty: Option<TypeNode>,
}

/// Wrapper over a method handle with memoized signature and body.
#[derive(Debug)]
pub struct Method<'env> {
    ts: &'env TypeSystem<'env>,
    handle: MethodHandle,
    options: LiftOptions,
    parameters: OnceCell<Vec<Parameter>>,
    return_type: OnceCell<Option<TypeNode>>,
    locals: OnceCell<Vec<Local>>,
    body: OnceCell<Result<Vec<Statement>, LiftError>>,
}

impl<'env> Method<'env> {
    pub fn new(ts: &'env TypeSystem<'env>, handle: MethodHandle) -> Self {
        Self::with_options(ts, handle, LiftOptions::default())
    }

    pub fn with_options(
        ts: &'env TypeSystem<'env>,
        handle: MethodHandle,
        options: LiftOptions,
    ) -> Self {
        Self {
            ts,
            handle,
            options,
            parameters: OnceCell::new(),
            return_type: OnceCell::new(),
            locals: OnceCell::new(),
            body: OnceCell::new(),
        }
    }

    pub fn handle(&self) -> MethodHandle {
        self.handle
    }

    fn decl(&self) -> Option<&'env MethodDecl> {
        self.ts.module().method_decl(self.handle)
    }

    pub fn name(&self) -> Option<&'env str> {
        self.decl().map(|decl| decl.name.as_str())
    }

    pub fn is_static(&self) -> bool {
        self.decl().is_some_and(|decl| decl.is_static)
    }

    pub fn has_body(&self) -> bool {
        self.decl().is_some_and(MethodDecl::has_body)
    }

    pub fn declaring_type(&self) -> Option<TypeNode> {
        let declaring = self.decl()?.declaring?;
        TypeNode::create(self.ts.module(), declaring)
    }

    /// Formal parameters, resolved once. The receiver of instance methods
    /// is not listed.
    pub fn parameters(&self) -> &[Parameter] {
        self.parameters.get_or_init(|| {
            self.decl()
                .map(|decl| {
                    decl.params
                        .iter()
                        .map(|param| Parameter {
                            name: param.name.clone(),
                            ty: param
                                .ty
                                .and_then(|ty| TypeNode::create(self.ts.module(), ty)),
                        })
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    pub fn return_type(&self) -> Option<&TypeNode> {
        self.return_type
            .get_or_init(|| {
                self.decl()
                    .and_then(|decl| decl.return_type)
                    .and_then(|ty| TypeNode::create(self.ts.module(), ty))
            })
            .as_ref()
    }

    pub fn locals(&self) -> &[Local] {
        self.locals.get_or_init(|| {
            self.decl()
                .map(|decl| {
                    decl.locals
                        .iter()
                        .map(|&ty| Local {
                            ty: TypeNode::create(self.ts.module(), ty),
                        })
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    /// The lifted block list. Lifted at most once; both the success and
    /// the failure outcome are memoized, and repeated calls return the
    /// same instance.
    pub fn body(&self) -> Result<&[Statement], LiftError> {
        match self
            .body
            .get_or_init(|| parse_blocks(self.ts, self.handle, &self.options))
        {
            Ok(statements) => Ok(statements.as_slice()),
            Err(error) => Err(error.clone()),
        }
    }
}

/// Wrapper over a field handle.
#[derive(Debug)]
pub struct Field<'env> {
    ts: &'env TypeSystem<'env>,
    handle: FieldHandle,
    ty: OnceCell<Option<TypeNode>>,
}

impl<'env> Field<'env> {
    pub fn new(ts: &'env TypeSystem<'env>, handle: FieldHandle) -> Self {
        Self {
            ts,
            handle,
            ty: OnceCell::new(),
        }
    }

    pub fn handle(&self) -> FieldHandle {
        self.handle
    }

    pub fn name(&self) -> Option<&'env str> {
        self.ts
            .module()
            .field_decl(self.handle)
            .map(|decl| decl.name.as_str())
    }

    pub fn is_static(&self) -> bool {
        self.ts
            .module()
            .field_decl(self.handle)
            .is_some_and(|decl| decl.is_static)
    }

    pub fn field_type(&self) -> Option<&TypeNode> {
        self.ty
            .get_or_init(|| {
                self.ts
                    .module()
                    .field_decl(self.handle)
                    .and_then(|decl| decl.ty)
                    .and_then(|ty| TypeNode::create(self.ts.module(), ty))
            })
            .as_ref()
    }
}

/// Wrapper over a property handle.
#[derive(Debug)]
pub struct Property<'env> {
    ts: &'env TypeSystem<'env>,
    handle: PropertyHandle,
    ty: OnceCell<Option<TypeNode>>,
}

impl<'env> Property<'env> {
    pub fn new(ts: &'env TypeSystem<'env>, handle: PropertyHandle) -> Self {
        Self {
            ts,
            handle,
            ty: OnceCell::new(),
        }
    }

    pub fn handle(&self) -> PropertyHandle {
        self.handle
    }

    pub fn name(&self) -> Option<&'env str> {
        self.ts
            .module()
            .property_decl(self.handle)
            .map(|decl| decl.name.as_str())
    }

    pub fn property_type(&self) -> Option<&TypeNode> {
        self.ty
            .get_or_init(|| {
                self.ts
                    .module()
                    .property_decl(self.handle)
                    .and_then(|decl| decl.ty)
                    .and_then(|ty| TypeNode::create(self.ts.module(), ty))
            })
            .as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cil_model::{CodeStream, FieldDecl, ModuleBuilder, Opcode, Operand, ParamDecl};

    fn system_types(builder: &mut ModuleBuilder) -> cil_model::TypeHandle {
        builder.add_class("System", "Object", None);
        builder.add_primitive("System", "Void");
        let int32 = builder.add_primitive("System", "Int32");
        builder.add_primitive("System", "Byte");
        int32
    }

    #[test]
    fn body_is_memoized_per_wrapper() {
        let mut builder = ModuleBuilder::new("code");
        let int32 = system_types(&mut builder);
        let method = builder.add_method(MethodDecl {
            name: "M".to_string(),
            is_static: true,
            return_type: Some(int32),
            code: Some(CodeStream::assemble(vec![
                (Opcode::LdcI41, Operand::None),
                (Opcode::Ret, Operand::None),
            ])),
            ..MethodDecl::default()
        });
        let module = builder.finish();
        let ts = TypeSystem::new(&module);
        let method = Method::new(&ts, method);
        let first = method.body().unwrap();
        let second = method.body().unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn failed_lifts_are_memoized_and_isolated() {
        let mut builder = ModuleBuilder::new("code");
        let int32 = system_types(&mut builder);
        let bad = builder.add_method(MethodDecl {
            name: "Bad".to_string(),
            is_static: true,
            return_type: Some(int32),
            params: vec![ParamDecl {
                name: "p0".to_string(),
                ty: Some(int32),
            }],
            code: Some(CodeStream::assemble(vec![
                (Opcode::LdargaS, Operand::Param(0)),
                (Opcode::Ret, Operand::None),
            ])),
            ..MethodDecl::default()
        });
        let good = builder.add_method(MethodDecl {
            name: "Good".to_string(),
            is_static: true,
            return_type: Some(int32),
            code: Some(CodeStream::assemble(vec![
                (Opcode::LdcI42, Operand::None),
                (Opcode::Ret, Operand::None),
            ])),
            ..MethodDecl::default()
        });
        let module = builder.finish();
        let ts = TypeSystem::new(&module);

        let bad = Method::new(&ts, bad);
        let error = bad.body().unwrap_err();
        assert!(matches!(error, LiftError::NotImplemented { .. }));
        assert_eq!(bad.body().unwrap_err(), error);

        // The sibling method still lifts.
        let good = Method::new(&ts, good);
        assert!(good.body().is_ok());
    }

    #[test]
    fn signature_resolution_is_lazy_and_cached() {
        let mut builder = ModuleBuilder::new("code");
        let int32 = system_types(&mut builder);
        let method = builder.add_method(MethodDecl {
            name: "M".to_string(),
            is_static: true,
            return_type: Some(int32),
            params: vec![ParamDecl {
                name: "count".to_string(),
                ty: Some(int32),
            }],
            locals: vec![int32],
            ..MethodDecl::default()
        });
        let module = builder.finish();
        let ts = TypeSystem::new(&module);
        let method = Method::new(&ts, method);

        assert_eq!(method.name(), Some("M"));
        assert!(method.is_static());
        assert!(!method.has_body());
        let params = method.parameters();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "count");
        assert_eq!(params[0].ty.as_ref().unwrap().full_name(), "System.Int32");
        assert!(std::ptr::eq(params, method.parameters()));
        assert_eq!(
            method.return_type().unwrap().full_name(),
            "System.Int32"
        );
        assert_eq!(method.locals().len(), 1);
    }

    #[test]
    fn field_wrappers_resolve_types_on_demand() {
        let mut builder = ModuleBuilder::new("code");
        let int32 = system_types(&mut builder);
        let widget = builder.add_class("App", "Widget", None);
        let field = builder.add_field(FieldDecl {
            name: "count".to_string(),
            declaring: Some(widget),
            ty: Some(int32),
            is_static: false,
        });
        let module = builder.finish();
        let ts = TypeSystem::new(&module);
        let field = Field::new(&ts, field);
        assert_eq!(field.name(), Some("count"));
        assert!(!field.is_static());
        assert_eq!(field.field_type().unwrap().full_name(), "System.Int32");
    }
}
