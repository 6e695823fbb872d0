//! Algorithms computing derived parameters and command verification results

use super::ParameterId;
use crate::synthetic::Evaluator;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlgorithmKind {
    /// Derived parameter defined by a formula
    Synthetic,
    /// Matches PUS(1,x) reports of the given stage code with the command
    AcknowledgementCheck { stage_code: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlgorithmInput {
    pub parameter: ParameterId,
    pub input_name: Option<String>,
    pub mandatory: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Algorithm {
    pub name: String,
    pub kind: AlgorithmKind,
    pub source: Option<String>,
    pub inputs: Vec<AlgorithmInput>,
    /// Parameters whose update triggers a run
    pub triggers: Vec<ParameterId>,
    pub outputs: Vec<ParameterId>,
    #[serde(skip)]
    pub evaluator: Option<Arc<dyn Evaluator>>,
}

impl Algorithm {
    pub fn new(name: impl Into<String>, kind: AlgorithmKind) -> Self {
        Self {
            name: name.into(),
            kind,
            source: None,
            inputs: Vec::new(),
            triggers: Vec::new(),
            outputs: Vec::new(),
            evaluator: None,
        }
    }
}
