//! Fatal lowering errors.

use derive_more::{Display, Error};

use crate::ir::Symbol;

/// Errors that abort lowering of a single loop.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum LowerError {
    /// The body graph has fewer parameters than the loop needs to bind.
    #[display(
        "loop '{origin}': body graph has {actual} parameter(s) but at least {required} are required"
    )]
    BodyParamArity {
        origin: Symbol,
        actual: usize,
        required: usize,
    },

    /// The body graph has fewer outputs than the loop needs to read.
    #[display(
        "loop '{origin}': body graph has {actual} output(s) but at least {required} are required"
    )]
    BodyOutputArity {
        origin: Symbol,
        actual: usize,
        required: usize,
    },
}
