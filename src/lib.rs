//! # pixframe-store - Durable record storage for a photography studio workspace
//!
//! Customers and projects live in two delimited text files. Each record also
//! owns a folder on disk whose name is derived from its identity fields.
//!
//! ## Core Concepts
//!
//! - **Record**: a customer or project, identified by a positive integer
//! - **RecordTable**: in-memory records of one kind, always ordered by identity
//! - **Durable store**: loads a table tolerantly, saves it with an atomic replace
//! - **RecordStore**: cached store whose mutations are serialized by a lock
//! - **FolderManager**: creates and relocates the per-record folder skeleton
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pixframe_store::{Customer, Project, Workspace, WorkspaceConfig};
//!
//! let ws = Workspace::open(WorkspaceConfig::new("/srv/studio"))?;
//!
//! // Identity 0 means "assign one": the first customer becomes 1000.
//! let saved = ws.customers().add_or_update(Customer::new("Ana", "Silva"))?;
//! let customer = saved.record;
//!
//! // Creates Customers/C_1000/01_Projekte/P_1_Hochzeit with its skeleton.
//! ws.projects().add_or_update(Project::new(customer.customer_number, "Hochzeit"))?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod config;
pub mod customer;
pub mod error;
pub mod folders;
pub mod project;
pub mod record;
pub mod storage;
pub mod table;
pub mod workspace;

pub use config::WorkspaceConfig;
pub use customer::Customer;
pub use error::{DecodeError, StoreError, StoreResult};
pub use folders::{FolderManager, FolderOutcome, FolderSpec, Relocation};
pub use project::Project;
pub use record::{KindSpec, Record, RecordId};
pub use storage::{DurableStore, LoadReport, RecordStore, SaveReport, SkippedRow};
pub use table::RecordTable;
pub use workspace::Workspace;
