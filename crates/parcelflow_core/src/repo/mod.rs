//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define data access contracts for packages, remarks, audit entries,
//!   attachments and actor names.
//! - Isolate SQLite query details from workflow orchestration.
//!
//! # Invariants
//! - Package writes enforce `Package::validate()` before persistence.
//! - Remark, audit and attachment repositories expose append and list only.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.

pub mod actor_repo;
pub mod attachment_repo;
pub mod audit_repo;
pub mod package_repo;
pub mod remark_repo;
pub mod store;
