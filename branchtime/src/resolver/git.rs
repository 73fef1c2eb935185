use super::Resolver;
use async_trait::async_trait;
use branchtime_core::Attribution;
use git2::{ErrorCode, Repository};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Resolves attribution with libgit2, discovering the repository upwards
/// from the given path.
pub struct GitResolver {
    detached_branch: String,
}

impl GitResolver {
    pub fn new(detached_branch: impl Into<String>) -> Self {
        Self {
            detached_branch: detached_branch.into(),
        }
    }

    pub fn resolve_blocking(&self, path: &Path) -> Option<Attribution> {
        resolve_repo_and_branch(path, &self.detached_branch)
    }
}

impl Default for GitResolver {
    fn default() -> Self {
        Self::new("main")
    }
}

#[async_trait]
impl Resolver for GitResolver {
    async fn resolve(&self, path: &Path) -> Option<Attribution> {
        let path: PathBuf = path.to_path_buf();
        let detached_branch = self.detached_branch.clone();

        match tokio::task::spawn_blocking(move || resolve_repo_and_branch(&path, &detached_branch))
            .await
        {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!("Git resolution task failed: {}", e);
                None
            }
        }
    }
}

fn resolve_repo_and_branch(path: &Path, detached_branch: &str) -> Option<Attribution> {
    let repo = match Repository::discover(path) {
        Ok(r) => r,
        Err(e) => {
            debug!("No Git repository for {}: {}", path.display(), e);
            return None;
        }
    };

    let workdir = match repo.workdir() {
        Some(w) => w,
        None => {
            debug!("Repository is bare, no working directory");
            return None;
        }
    };

    let repository = workdir.file_name()?.to_string_lossy().to_string();

    let branch = match current_branch(&repo) {
        Some(branch) => branch,
        None => {
            debug!(
                "HEAD of {} is detached, crediting '{}'",
                repository, detached_branch
            );
            detached_branch.to_string()
        }
    };

    debug!("Resolved {} to {}/{}", path.display(), repository, branch);
    Some(Attribution::new(repository, branch))
}

/// Short branch name of HEAD, including an unborn branch in a fresh
/// repository. `None` when HEAD is detached or unreadable.
fn current_branch(repo: &Repository) -> Option<String> {
    match repo.head() {
        Ok(head) if head.is_branch() => head.shorthand().map(|s| s.to_string()),
        Ok(_) => None,
        Err(e) if e.code() == ErrorCode::UnbornBranch => repo
            .find_reference("HEAD")
            .ok()
            .and_then(|head| {
                head.symbolic_target()
                    .map(|target| target.trim_start_matches("refs/heads/").to_string())
            }),
        Err(e) => {
            warn!("Failed to read HEAD: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{RepositoryInitOptions, Signature};
    use tempfile::TempDir;

    fn init_repo(dir: &Path, initial_head: &str) -> Repository {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(initial_head);
        Repository::init_opts(dir, &opts).expect("Failed to init repository")
    }

    fn commit(repo: &Repository) -> git2::Oid {
        let sig = Signature::now("Test", "test@example.com").unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap()
    }

    fn dir_name(dir: &TempDir) -> String {
        dir.path().file_name().unwrap().to_string_lossy().to_string()
    }

    #[test]
    fn unborn_branch_is_resolved() {
        let temp_dir = TempDir::new().unwrap();
        init_repo(temp_dir.path(), "trunk");

        let resolved = GitResolver::default().resolve_blocking(temp_dir.path());
        assert_eq!(resolved, Some(Attribution::new(dir_name(&temp_dir), "trunk")));
    }

    #[test]
    fn branch_with_slashes_and_subdirectories() {
        let temp_dir = TempDir::new().unwrap();
        let repo = init_repo(temp_dir.path(), "main");
        let oid = commit(&repo);
        let head_commit = repo.find_commit(oid).unwrap();
        repo.branch("feature/login", &head_commit, false).unwrap();
        repo.set_head("refs/heads/feature/login").unwrap();

        let nested = temp_dir.path().join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();

        let resolved = GitResolver::default().resolve_blocking(&nested);
        assert_eq!(
            resolved,
            Some(Attribution::new(dir_name(&temp_dir), "feature/login"))
        );
    }

    #[test]
    fn detached_head_uses_placeholder() {
        let temp_dir = TempDir::new().unwrap();
        let repo = init_repo(temp_dir.path(), "main");
        let oid = commit(&repo);
        repo.set_head_detached(oid).unwrap();

        let resolved = GitResolver::new("(detached)").resolve_blocking(temp_dir.path());
        assert_eq!(
            resolved,
            Some(Attribution::new(dir_name(&temp_dir), "(detached)"))
        );
    }

    #[test]
    fn nonexistent_path_is_absent() {
        let fake_path = Path::new("/nonexistent/repo");
        assert!(GitResolver::default().resolve_blocking(fake_path).is_none());
    }

    #[tokio::test]
    async fn async_resolution_matches_blocking() {
        let temp_dir = TempDir::new().unwrap();
        init_repo(temp_dir.path(), "develop");

        let resolver = GitResolver::default();
        let resolved = resolver.resolve(temp_dir.path()).await;
        assert_eq!(resolved, resolver.resolve_blocking(temp_dir.path()));
        assert_eq!(resolved.unwrap().branch, "develop");
    }
}
