// Copyright (c) The CilLift Contributors
// SPDX-License-Identifier: Apache-2.0

//! Contract attachment, decoupled from lifting.
//!
//! Bodies are lifted first; preconditions and postconditions extracted
//! from them (or supplied out of band) are attached afterwards in a
//! registry keyed by method handle. The lifted statements themselves are
//! never mutated.

use crate::ast::Expression;
use cil_model::MethodHandle;
use std::collections::BTreeMap;

/// The contracts recorded for one method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodContracts {
    pub requires: Vec<Expression>,
    pub ensures: Vec<Expression>,
}

impl MethodContracts {
    pub fn is_empty(&self) -> bool {
        self.requires.is_empty() && self.ensures.is_empty()
    }
}

/// Contracts for a set of methods, attached after lifting.
#[derive(Debug, Clone, Default)]
pub struct ContractRegistry {
    by_method: BTreeMap<MethodHandle, MethodContracts>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a precondition. Conditions accumulate in attachment order.
    pub fn attach_requires(&mut self, method: MethodHandle, condition: Expression) {
        self.by_method
            .entry(method)
            .or_default()
            .requires
            .push(condition);
    }

    /// Record a postcondition. Conditions accumulate in attachment order.
    pub fn attach_ensures(&mut self, method: MethodHandle, condition: Expression) {
        self.by_method
            .entry(method)
            .or_default()
            .ensures
            .push(condition);
    }

    pub fn contracts(&self, method: MethodHandle) -> Option<&MethodContracts> {
        self.by_method.get(&method)
    }

    pub fn methods(&self) -> impl Iterator<Item = MethodHandle> + '_ {
        self.by_method.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.by_method.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_method.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ConstantValue, Expression, ParameterRef};

    fn truthy() -> Expression {
        Expression::Literal {
            value: ConstantValue::Int32(1),
            ty: None,
        }
    }

    #[test]
    fn conditions_accumulate_in_order() {
        let mut registry = ContractRegistry::new();
        let method = MethodHandle(7);
        registry.attach_requires(method, truthy());
        registry.attach_requires(
            method,
            Expression::Parameter(ParameterRef::Positional(0)),
        );
        registry.attach_ensures(method, truthy());

        let contracts = registry.contracts(method).unwrap();
        assert_eq!(contracts.requires.len(), 2);
        assert_eq!(contracts.ensures.len(), 1);
        assert_eq!(
            contracts.requires[1],
            Expression::Parameter(ParameterRef::Positional(0))
        );
    }

    #[test]
    fn unattached_methods_have_no_entry() {
        let registry = ContractRegistry::new();
        assert!(registry.contracts(MethodHandle(0)).is_none());
        assert!(registry.is_empty());
    }
}
