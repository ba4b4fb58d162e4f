//! Example domains built on the `EventFlow` command pipeline
//!
//! The [`banking`] module opens accounts and transfers money between them,
//! with a balance projection fed from the pipeline's applied-event stream.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod banking;
