//! Data Transfer Objects for REST request/response serialization.

pub mod common_dto;
pub mod killmail_dto;
pub mod queue_dto;
pub mod rule_dto;

pub use common_dto::*;
pub use killmail_dto::*;
pub use queue_dto::*;
pub use rule_dto::*;
