use thiserror::Error;

/// Errors raised by the lowering passes.
///
/// None of these can arise from a well-formed graph; each one indicates that
/// an upstream pass (scheduling, register allocation) broke an invariant the
/// lowering relies on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoweringError {
    #[error("value {0} has no assigned register")]
    MissingRegister(String),

    #[error("permutation mixes register classes {0} and {1}")]
    MixedRegisterClasses(String, String),

    #[error("node {0} is not scheduled in its block")]
    NotScheduled(String),

    #[error("projection index {index} out of range for node of arity {arity}")]
    ProjIndexOutOfRange { index: usize, arity: usize },

    #[error("constraint references operand {pos} but node has arity {arity}")]
    ConstraintOperandOutOfRange { pos: usize, arity: usize },

    #[error("SSA reconstruction failed: {0}")]
    SsaReconstruction(String),

    #[error("malformed graph: {0}")]
    MalformedGraph(String),
}
