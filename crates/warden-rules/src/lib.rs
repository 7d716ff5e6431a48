//! Warden Rules — from rule-set documents to per-request decisions.
//!
//! # Modules
//!
//! - [`config`]: the rule-set document model
//! - [`compiler`]: resolves mechanism references into executable [`Rule`]s
//! - [`matcher`]: route and method matching
//! - [`rule`]: the compiled rule and its pipeline
//! - [`repository`]: the live, snapshot-swapped rule collection
//! - [`processor`]: the callback contract providers drive
//! - [`executor`]: matches a request and runs its rule
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use warden_core::{MemoryCache, Request};
//! use warden_mechanisms::{CatalogConfig, MechanismCatalog};
//! use warden_rules::{Executor, Repository, RuleSet, RuleSetProcessor};
//!
//! # async fn run() -> warden_core::Result<()> {
//! let catalog = Arc::new(MechanismCatalog::new(&CatalogConfig::default())?);
//! let repository = Arc::new(Repository::new(catalog, None));
//! repository
//!     .on_created(&RuleSet::decode("file_system:rules.yaml", b"rules: []")?)
//!     .await?;
//!
//! let executor = Executor::new(repository, Arc::new(MemoryCache::new()));
//! let url = "http://app.local/".parse().map_err(|_| warden_core::Error::internal("url"))?;
//! let decision = executor.decide(Request::new(http::Method::GET, url)).await;
//! # let _ = decision;
//! # Ok(())
//! # }
//! ```

pub mod compiler;
pub mod config;
pub mod executor;
pub mod matcher;
pub mod processor;
pub mod repository;
pub mod rule;

pub use compiler::{DEFAULT_RULE_ID, compile_default_rule, compile_rule, compile_rule_set};
pub use config::{DefaultRuleConfig, MechanismRef, RuleConfig, RuleSet};
pub use executor::{Decision, Executor};
pub use processor::RuleSetProcessor;
pub use repository::Repository;
pub use rule::Rule;
