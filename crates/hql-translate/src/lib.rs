//! HiveQL translation passes
//!
//! Takes the relational IR produced by the object-relational binder, rewrites it
//! into a shape Hive can run (orderings where Hive honours them, skip/take as a
//! row-number filter, the top select matching the entity mapping, no dead
//! columns) and renders it as HiveQL text together with the resource files its
//! UDF calls need.
//!
//! ```no_run
//! use hql_ir::{StaticMapping, Statement};
//! use hql_translate::HiveLinguist;
//!
//! # fn run(statement: &Statement, mapping: &StaticMapping) -> hql_translate::Result<()> {
//! let linguist = HiveLinguist::new(mapping);
//! let compiled = linguist.compile(statement)?;
//! for directive in compiled.add_file_directives() {
//!     println!("{directive};");
//! }
//! println!("{}", compiled.hiveql);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dialect;
pub mod error;
pub mod format;
pub mod linguist;
pub mod logging;
pub mod order_by;
pub mod paging;
pub mod prune;
pub mod resources;
pub mod resync;
pub mod validate;

mod naming;
mod scope;

#[cfg(test)]
mod fixtures;

pub use config::{Config, ConfigError, LoggingConfig, TranslatorConfig};
pub use dialect::Dialect;
pub use error::{Result, TranslateError};
pub use linguist::{CompiledQuery, HiveLinguist};
