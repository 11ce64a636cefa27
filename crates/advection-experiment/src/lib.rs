//! Advection experiment: a concrete evolution driving the element kernel.
//!
//! This crate supplies the collaborators the kernel treats as external -
//! a domain source, time steppers, and an action pipeline - and a driver
//! that walks the global phase sequence over a distributed scalar
//! advection field.

pub mod actions;
pub mod domain_source;
pub mod driver;
pub mod steppers;
