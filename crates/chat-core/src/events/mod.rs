//! Client events - what subscribers receive once a dispatch has been decoded

mod client_event;

pub use client_event::{ClientEvent, ModelRef};
