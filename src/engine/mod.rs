//! Rule engine: clause evaluation, payload formatting and rule snapshots.

pub mod formatter;
pub mod route;
pub mod rule_engine;
pub mod rule_store;

pub use formatter::PayloadFormatter;
pub use route::{NoRoutes, RouteOracle, StaticRoutes};
pub use rule_engine::RuleEngine;
pub use rule_store::{RejectedRule, RuleConfig, RuleProvider, RuleSnapshot, RuleStore};
