//! # hostkit
//!
//! Host backends that drive system tools from Rust.
//!
//! This crate provides functionality for:
//! - Listing, creating, starting, stopping and removing containers via `docker`
//! - Listing and creating networks via `docker`
//! - Querying installed and sync-repository packages via `pacman`
//! - Installing packages as one batched `pacman` transaction
//!
//! Every command runs through [`process::run`], which can be interrupted by
//! setting an `AtomicBool`.
//!
//! ## Example
//!
//! ```no_run
//! use hostkit::{Docker, Pacman};
//!
//! let docker = Docker::new();
//! for container in docker.list_containers(true, None).expect("docker failed") {
//!     println!("{} {}", container.name, container.image);
//! }
//!
//! let pacman = Pacman::new();
//! let mut tx = pacman.transaction().expect("database locked");
//! tx.add("htop", Some("extra"));
//! tx.prepare(None).expect("cannot resolve");
//! tx.commit().expect("install failed");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod docker;
pub mod error;
pub mod pacman;
pub mod process;
pub mod types;

pub use docker::Docker;
pub use error::{Error, ErrorCategory, Result};
pub use pacman::{LOCK_FILE, Pacman, Transaction};
pub use types::{ContainerInfo, ContainerOptions, NetworkInfo, PackageInfo};
