//! The oracle seam.

use std::future::Future;

use crate::conversation::Turn;
use crate::error_handler::Result;

/// Anything that turns a conversation into a response text.
///
/// Implemented by [`crate::HttpOracle`] for real providers and by scripted
/// stubs in tests.
pub trait FixOracle: Send + Sync {
    fn complete(&self, turns: &[Turn]) -> impl Future<Output = Result<String>> + Send;
}
