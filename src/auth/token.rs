//! Token records and the redacting secret wrapper.

pub mod record;
pub mod secret;
