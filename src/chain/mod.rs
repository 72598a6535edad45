pub mod evaluator;
pub mod proof_chain;
pub mod registry;

pub use evaluator::{
    prove_with_timeout, verify_with_timeout, CircuitEvaluator, EvaluatorOptions,
    HashBindingEvaluator,
};
pub use proof_chain::{ProofChain, ProofLink};
pub use registry::ChainRegistry;
