//! Small numeric helpers shared by layout and reporting code.

pub(crate) mod layout;
pub(crate) mod size;
