//! Reader for CPLEX-style LP files.
//!
//! Parses linear and mixed-integer (optionally quadratic) optimization
//! problems from the textual LP format into an in-memory [`Model`] for
//! downstream solver components to consume. Plain, gzip-compressed, and
//! in-memory sources are all supported; the reader only needs a
//! line-oriented [`std::io::BufRead`].
//!
//! # Pipeline
//!
//! 1. **Lexer** — scans characters into raw tokens; comments and
//!    whitespace vanish here.
//! 2. **Classifier** — rewrites raw tokens into grammar-aware tokens
//!    (section headers, labels, signed constants, comparisons).
//! 3. **Section splitter** — partitions the token stream by section.
//! 4. **Section processors** — recursive descent per section, populating
//!    the model through a variable-interning builder.
//!
//! # Example
//!
//! ```
//! let src = b"min\n obj: 3 x + 2 y\n st\n c1: x + y <= 10\nend\n";
//! let model = lp_reader::read(&src[..]).unwrap();
//!
//! assert_eq!(model.num_vars(), 2);
//! assert_eq!(model.constraints[0].upper, 10.0);
//! ```
//!
//! Quadratic terms appear in `[ ... ]` blocks; in the objective the block
//! carries a textual `/ 2` trailer and the stored coefficients stay raw —
//! applying the factor of one half is the consumer's responsibility.

#![warn(clippy::all)]

pub mod classify;
pub mod error;
pub mod lexer;
pub mod model;
pub mod reader;

pub use classify::{CompOp, ProcessedToken, SectionKind};
pub use error::{LpError, LpResult};
pub use lexer::RawToken;
pub use model::{
    Constraint, Expression, LinTerm, Model, ObjectiveSense, QuadTerm, SosEntry, SosGroup,
    Variable, VariableType,
};
pub use reader::{read, read_path};
