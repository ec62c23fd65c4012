use crate::context::{self, BuildContext};
use crate::error::{FrontendError, Result};
use crate::frontend::ContextResolver;
use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use walkdir::WalkDir;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Files captured from one context for one include pattern.
#[derive(Debug, Default)]
pub struct ContextSnapshot {
    /// '/'-separated path relative to the context root -> content
    files: BTreeMap<String, Vec<u8>>,
}

impl ContextSnapshot {
    pub fn read_file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Resolves named build contexts backed by local directories.
///
/// 요청마다 먼저 include 패턴으로 컨텍스트를 스냅샷(solve)하고, 그 스냅샷에서
/// 파일을 읽습니다(read). 스냅샷은 `@context/filename` 힌트의 해시로 캐싱되므로
/// 같은 요청이 반복되면 디스크를 다시 탐색하지 않습니다.
#[derive(Debug, Default)]
pub struct LocalContextResolver {
    contexts: HashMap<String, PathBuf>,
    snapshots: RwLock<HashMap<String, Arc<ContextSnapshot>>>,
}

impl LocalContextResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.insert(name, root);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, root: impl Into<PathBuf>) {
        self.contexts.insert(name.into(), root.into());
    }

    pub fn context_root(&self, name: &str) -> Option<&Path> {
        self.contexts.get(name).map(PathBuf::as_path)
    }

    /// Stable hint identifying a (context, filename) read.
    pub fn share_key_hint(context: &str, filename: &str) -> String {
        format!("@{}/{}", context, filename)
    }

    /// 캐시 키 생성 (힌트의 SHA256 hex)
    fn cache_key(hint: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(hint.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Capture every file of `context` matching `include`.
    pub async fn solve(
        &self,
        ctx: &dyn BuildContext,
        context: &str,
        include: &str,
    ) -> Result<Arc<ContextSnapshot>> {
        let hint = Self::share_key_hint(context, include);
        let key = Self::cache_key(&hint);

        if let Some(snapshot) = self.snapshots.read().await.get(&key) {
            debug!(%hint, "context snapshot served from cache");
            return Ok(Arc::clone(snapshot));
        }

        let root = self
            .contexts
            .get(context)
            .cloned()
            .ok_or_else(|| FrontendError::resolution(context, include, "unknown build context"))?;
        let pattern = normalize_pattern(context, include)?;

        let (ctx_name, include_name) = (context.to_string(), include.to_string());
        let snapshot = context::run_bounded(ctx, async move {
            tokio::task::spawn_blocking(move || snapshot_dir(&root, &pattern, &ctx_name, &include_name))
                .await
                .map_err(|e| FrontendError::resolution(context, include, format!("snapshot task failed: {}", e)))?
        })
        .await?;

        let snapshot = Arc::new(snapshot);
        debug!(%hint, files = snapshot.len(), origin = ?ctx.origin(), "context snapshot solved");

        self.snapshots
            .write()
            .await
            .entry(key)
            .or_insert_with(|| Arc::clone(&snapshot));

        Ok(snapshot)
    }
}

#[async_trait]
impl ContextResolver for LocalContextResolver {
    async fn read_file(&self, ctx: &dyn BuildContext, context: &str, filename: &str) -> Result<Vec<u8>> {
        let snapshot = self.solve(ctx, context, filename).await?;
        let path = normalize_pattern(context, filename)?;

        snapshot
            .read_file(&path)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| FrontendError::resolution(context, filename, "file not found"))
    }
}

/// Reduce `filename` to '/'-separated components, rejecting paths that leave the context.
fn normalize_pattern(context: &str, filename: &str) -> Result<String> {
    let mut parts = Vec::new();

    for component in Path::new(filename).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(FrontendError::resolution(
                    context,
                    filename,
                    "path must stay inside the build context",
                ));
            }
        }
    }

    if parts.is_empty() {
        return Err(FrontendError::resolution(context, filename, "empty file name"));
    }

    Ok(parts.join("/"))
}

/// Walk `root`, keeping only the files the include pattern selects.
fn snapshot_dir(root: &Path, pattern: &str, context: &str, filename: &str) -> Result<ContextSnapshot> {
    let matcher = Pattern::new(pattern)
        .map_err(|e| FrontendError::resolution(context, filename, format!("invalid pattern: {}", e)))?;

    // `**` may match any depth, otherwise a match can't be deeper than the pattern itself.
    let max_depth = if pattern.contains("**") {
        usize::MAX
    } else {
        pattern.split('/').count()
    };

    let mut snapshot = ContextSnapshot::default();

    for entry in WalkDir::new(root).min_depth(1).max_depth(max_depth) {
        let entry = entry.map_err(|e| FrontendError::resolution(context, filename, e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if relative == pattern || matcher.matches_with(&relative, MATCH_OPTIONS) {
            let content = std::fs::read(entry.path())
                .map_err(|e| FrontendError::resolution(context, filename, e.to_string()))?;
            snapshot.files.insert(relative, content);
        }
    }

    Ok(snapshot)
}
