//! Datatypes shared by the diagram engines, the abstraction mapping and the facade.
//! This module consists of all internally and externally used handles, such as
//! [Label], [Literal], [Term], [BddNode], [SddId], and [Element].
mod bdd;
mod label;
mod sdd;

pub use bdd::*;
pub use label::*;
pub use sdd::*;
