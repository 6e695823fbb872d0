//! Collaborator interface for synthetic (derived) parameters
//!
//! Synthetic parameter formulas are written in an expression language the
//! compiler does not interpret. A [`FormulaCompiler`] turns the formula text
//! into a [`CompiledFormula`]: the parameters it reads and an [`Evaluator`]
//! computing the output from their values. The compiler is registered with
//! [`crate::MibCompiler::with_formula_compiler`].

use crate::model::{MissionDatabase, ParameterType};
use std::fmt;
use std::sync::Arc;

/// Value exchanged with an evaluator
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
}

/// Executable form of a formula
pub trait Evaluator: Send + Sync + fmt::Debug {
    /// Compute the output from the input values, in declaration order;
    /// `None` when the output cannot be computed from these inputs
    fn evaluate(&self, inputs: &[Value]) -> Option<Value>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaInput {
    pub parameter: String,
    /// Whether an update of this input triggers an evaluation
    pub trigger: bool,
}

#[derive(Debug, Clone)]
pub struct CompiledFormula {
    pub inputs: Vec<FormulaInput>,
    pub evaluator: Arc<dyn Evaluator>,
}

/// Type information offered to formula compilers
pub trait ParameterTypeLookup {
    fn parameter_type(&self, parameter: &str) -> Option<&ParameterType>;
}

impl ParameterTypeLookup for MissionDatabase {
    fn parameter_type(&self, parameter: &str) -> Option<&ParameterType> {
        self.parameter_by_name(parameter).map(|id| self.type_of(id))
    }
}

pub type FormulaError = Box<dyn std::error::Error + Send + Sync>;

pub trait FormulaCompiler: Send + Sync {
    fn compile(
        &self,
        parameter: &str,
        source: &str,
        types: &dyn ParameterTypeLookup,
    ) -> Result<CompiledFormula, FormulaError>;
}
