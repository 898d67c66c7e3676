//! Domain Layer
//!
//! Entities, value objects, errors, ports and the selection service.
//! Nothing here performs I/O.

pub mod entities;
pub mod error;
pub mod ports;
pub mod services;
pub mod value_objects;
