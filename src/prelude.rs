//! Reexports of the traits and types needed in almost every use of this
//! library.
//!
//! As with every prelude, the main usage is to glob import everything from
//! this module:
//!
//! ```
//! use thaw::prelude::*;
//! ```

pub use crate::{
    Handle,
    pipeline::{CancelFlag, ProgressSink},
};
