//! Outbound channels from the device core to its collaborators.

pub mod events;
