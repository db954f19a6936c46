//! Error taxonomy shared by every layer

mod kind;

pub use kind::{Classify, ErrorKind};
