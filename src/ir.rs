//! SSA-like IR summaries supplied by the language front-end.
//!
//! The reflection-aliasing scan needs only a narrow slice of the IR: which
//! storage locations in a function are local and non-escaping, how derived
//! views (element and field addresses) relate to their bases, and what type
//! each store writes. Front-ends export exactly that per function; everything
//! else about the IR stays on their side of the contract.

use crate::syntax::TypeId;
use serde::{Deserialize, Serialize};

/// An SSA value within one function. Values are function-scoped; the numbers
/// carry no meaning across functions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ValueId(pub u32);

/// A local allocation and whether the front-end's escape analysis saw it
/// escape the function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrLocal {
    pub value: ValueId,
    #[serde(default)]
    pub escapes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrInstr {
    /// `dest` refers to an element of the aggregate behind `base`. An element
    /// of a local aggregate is itself local.
    IndexAddr { dest: ValueId, base: ValueId },
    /// `dest` refers to a field of the struct behind `base`. A field of a
    /// local struct is itself local.
    FieldAddr { dest: ValueId, base: ValueId },
    /// Store a value of type `stored` through the address `dest`.
    Store { dest: ValueId, stored: TypeId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrFunction {
    /// Fully qualified function name; must match the call-graph node.
    pub name: String,
    #[serde(default)]
    pub locals: Vec<IrLocal>,
    #[serde(default)]
    pub instrs: Vec<IrInstr>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrProgram {
    pub functions: Vec<IrFunction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ir_serde_round_trip() {
        let f = IrFunction {
            name: "p.F".to_string(),
            locals: vec![IrLocal {
                value: ValueId(0),
                escapes: false,
            }],
            instrs: vec![
                IrInstr::IndexAddr {
                    dest: ValueId(1),
                    base: ValueId(0),
                },
                IrInstr::Store {
                    dest: ValueId(1),
                    stored: TypeId(4),
                },
            ],
        };
        let json = serde_json::to_string(&f).unwrap();
        let back: IrFunction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }
}
