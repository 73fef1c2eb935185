mod git;

pub use git::GitResolver;

use async_trait::async_trait;
use branchtime_core::Attribution;
use std::path::Path;

/// Answers "which repository and branch is this path in".
///
/// Implementations return `None` for anything that cannot be attributed
/// (not a repository, bare repository, query failure). Callers bound each
/// call with a timeout and treat expiry as `None`.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, path: &Path) -> Option<Attribution>;
}
