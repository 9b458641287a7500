//! Code artifacts and where they came from.

use serde::{Deserialize, Serialize};

/// Repository coordinates on the hosting service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A file at a specific commit, eligible for a fix pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLocation {
    pub repo: RepoRef,
    pub path: String,
    /// Branch a fix pull request should target.
    pub base_branch: String,
    /// Commit the content was read at; fix branches start here.
    pub commit_sha: String,
    /// Blob sha of the file at `commit_sha`, when the hosting service reported one.
    pub blob_sha: Option<String>,
    /// Pull request the file was read from; unresolved findings are reported there.
    #[serde(default)]
    pub pull_request: Option<u64>,
}

/// An issue thread a code block was posted in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLocation {
    pub repo: RepoRef,
    pub issue_number: u64,
}

/// Where an artifact came from, which also decides how results are published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Origin {
    File(FileLocation),
    Issue(IssueLocation),
}

impl Origin {
    pub fn repo(&self) -> &RepoRef {
        match self {
            Origin::File(loc) => &loc.repo,
            Origin::Issue(loc) => &loc.repo,
        }
    }

    /// Human-readable label for logs.
    pub fn describe(&self) -> String {
        match self {
            Origin::File(loc) => format!("{}:{}", loc.repo, loc.path),
            Origin::Issue(loc) => format!("{}#{}", loc.repo, loc.issue_number),
        }
    }
}

/// A single unit of code flowing through the pipeline.
///
/// Artifacts are never mutated; a fix step produces a new artifact via
/// [`CodeArtifact::with_code`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeArtifact {
    pub code: String,
    pub language: String,
    pub origin: Origin,
}

impl CodeArtifact {
    pub fn new(code: impl Into<String>, language: impl Into<String>, origin: Origin) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            origin,
        }
    }

    /// Same language and origin, different code.
    pub fn with_code(&self, code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: self.language.clone(),
            origin: self.origin.clone(),
        }
    }

    /// File location, or `None` for issue-sourced code blocks.
    pub fn file_location(&self) -> Option<&FileLocation> {
        match &self.origin {
            Origin::File(loc) => Some(loc),
            Origin::Issue(_) => None,
        }
    }
}

/// Map a file path's extension to a language tag.
///
/// Unknown extensions map to the lower-cased extension itself.
pub fn language_for_path(path: &str) -> String {
    let ext = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "js" | "jsx" => "javascript".to_string(),
        "ts" | "tsx" => "typescript".to_string(),
        "py" => "python".to_string(),
        _ => ext,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue_origin() -> Origin {
        Origin::Issue(IssueLocation {
            repo: RepoRef::new("octo", "demo"),
            issue_number: 7,
        })
    }

    #[test]
    fn test_language_for_known_extensions() {
        assert_eq!(language_for_path("src/app.js"), "javascript");
        assert_eq!(language_for_path("src/App.JSX"), "javascript");
        assert_eq!(language_for_path("lib/index.ts"), "typescript");
        assert_eq!(language_for_path("lib/view.tsx"), "typescript");
        assert_eq!(language_for_path("tools/run.py"), "python");
    }

    #[test]
    fn test_language_for_unknown_extension_is_raw() {
        assert_eq!(language_for_path("main.rs"), "rs");
        assert_eq!(language_for_path("dir.d/Makefile"), "");
    }

    #[test]
    fn test_with_code_keeps_language_and_origin() {
        let original = CodeArtifact::new("var x = 1", "js", issue_origin());
        let fixed = original.with_code("let x = 1");
        assert_eq!(fixed.code, "let x = 1");
        assert_eq!(fixed.language, original.language);
        assert_eq!(fixed.origin, original.origin);
        assert_eq!(original.code, "var x = 1");
    }

    #[test]
    fn test_issue_artifact_has_no_file_location() {
        let artifact = CodeArtifact::new("print(1)", "python", issue_origin());
        assert!(artifact.file_location().is_none());
        assert_eq!(artifact.origin.describe(), "octo/demo#7");
    }
}
