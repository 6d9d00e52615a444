//! Object model the dispatcher operates over.
//!
//! Classes are self-describing (instances reach their dispatch table through
//! their class); foreign types expose only their runtime type to guards.

pub mod class;
pub mod foreign;
pub mod hooks;
pub mod method;
pub mod registry;
pub mod type_id;
