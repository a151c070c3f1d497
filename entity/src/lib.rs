//! sea-orm entities for the staff directory.

pub mod employee;
