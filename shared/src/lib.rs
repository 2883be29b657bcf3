//! Identity and IOCTL constants shared between the device core and the
//! collaborators that talk to it.

pub mod constants;
