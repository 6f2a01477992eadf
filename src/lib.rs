// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # chef-resources
//!
//! Declarative management of Chef server objects: data bags, data bag items
//! and environments, plus a read-only search data source.
//!
//! ## Overview
//!
//! Each kind implements a create/read/update/delete/import contract against
//! the Chef server REST API. Diffing, locking and state persistence belong to
//! a host orchestration runtime, which drives this crate through a
//! line-delimited JSON protocol (`chef-resources serve`).
//!
//! - A read that finds nothing clears the resource id instead of failing
//! - JSON properties are normalized so semantically equal documents compare equal
//! - Requests are signed with the Chef v1.3 authentication protocol
//!
//! ## Modules
//!
//! - [`config`]: Connection settings from YAML, `.env` and `CHEF_*` variables
//! - [`chef`]: Signed Chef server API client
//! - [`resources`]: Schemas and reconcilers for each resource kind
//! - [`provider`]: Request dispatch and the stdin/stdout protocol loop
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! server:
//!   url: https://chef.example.com/organizations/acme
//!   client_name: deployer
//!   key_file: ~/.chef/deployer.pem
//! ```
//!
//! ```text
//! $ chef-resources get data-bag-item users.alice
//! $ chef-resources search 'role:web' --filter ip=ipaddress --unique
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod chef;
pub mod cli;
pub mod config;
pub mod error;
pub mod provider;
pub mod resources;

// ============================================================================
// Re-exports
// ============================================================================

pub use chef::{ChefApi, ChefClient, RequestSigner};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, ConnectionSettings, ProviderConfig};
pub use error::{ChefResourcesError, Result};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use resources::{Resource, ResourceData, ResourceKind, ResourceSchema};
