//! Resolution layer: import specifiers → absolute paths, scope
//! normalization, and callee-file population.

pub mod calls;
pub mod imports;
pub mod scopes;

pub use imports::ImportResolver;
