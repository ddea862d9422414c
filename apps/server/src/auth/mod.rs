//! Operator identity for tracker actions.
//!
//! Authentication happens upstream; the proxy forwards the operator id in a header.

mod extractor;

pub use extractor::OperatorAuth;
