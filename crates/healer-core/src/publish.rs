//! Publishing remediation results back to the hosting service.
//!
//! [`plan_publication`] is a pure decision over an outcome and its origin:
//! file artifacts whose code changed become pull requests, issue code blocks
//! become comments, clean files are skipped. [`PublishCoordinator`] executes
//! the plan. Non-converged outcomes are always reported: a partial fix still
//! opens a pull request, and a file with no fix at all gets its residual
//! findings posted on the pull request it came from. A pushed file with no
//! fix has nowhere to post and is reported as unpublished.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::{FileLocation, HealerError, Origin, RemediationOutcome, RepoRef, Result};
use crate::hosting::{FileUpdate, HostingService, NewPullRequest};
use crate::metrics::METRICS;
use crate::obs::{emit_publish_completed, emit_publish_failed, emit_publish_skipped};

/// Prefix of every fix branch.
pub const BRANCH_PREFIX: &str = "healer/fix";

const SLUG_MAX_LEN: usize = 40;

/// What to do with one outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PublishPlan {
    PullRequest {
        repo: RepoRef,
        branch: String,
        from_sha: String,
        base: String,
        update: FileUpdate,
        title: String,
        body: String,
    },
    Comment {
        repo: RepoRef,
        issue_number: u64,
        body: String,
    },
    Skip {
        reason: String,
    },
    /// Findings remain but there is no thread to report them in.
    Unpublishable {
        reason: String,
        residual_suggestions: Vec<String>,
    },
}

/// What was published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PublishReceipt {
    PullRequest {
        url: String,
        number: u64,
        branch: String,
    },
    Comment {
        repo: RepoRef,
        issue_number: u64,
    },
    Skipped {
        reason: String,
    },
    Unpublished {
        reason: String,
        residual_suggestions: Vec<String>,
    },
}

/// SHA-256 of `content`, lowercase hex.
pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Fix branch name, unique per run: path slug, content hash, random token.
pub fn branch_name(path: &str, final_code: &str) -> String {
    let digest = content_digest(final_code);
    let token = Uuid::new_v4().simple().to_string();
    format!(
        "{BRANCH_PREFIX}-{}-{}-{}",
        path_slug(path),
        &digest[..8],
        &token[..8]
    )
}

fn path_slug(path: &str) -> String {
    let mut slug = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    let slug = if slug.len() > SLUG_MAX_LEN {
        slug[slug.len() - SLUG_MAX_LEN..].trim_start_matches('-')
    } else {
        slug
    };
    if slug.is_empty() {
        "file".to_string()
    } else {
        slug.to_string()
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|s| format!("- {s}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn short_sha(sha: &str) -> &str {
    &sha[..sha.len().min(7)]
}

fn pull_request_body(outcome: &RemediationOutcome, loc: &FileLocation) -> String {
    let status = if outcome.converged {
        "all checks passed after the fix"
    } else {
        "not every issue could be resolved; this is a best-effort fix"
    };

    let mut body = format!(
        "## Automated fix for `{}`\n\nHealer analyzed `{}` at `{}`: {}.\n",
        loc.path,
        loc.path,
        short_sha(&loc.commit_sha),
        status
    );
    if !outcome.addressed_suggestions.is_empty() {
        body.push_str("\n### Issues addressed\n");
        body.push_str(&bullet_list(&outcome.addressed_suggestions));
        body.push('\n');
    }
    if !outcome.residual_suggestions.is_empty() {
        body.push_str("\n### Remaining issues\n");
        body.push_str(&bullet_list(&outcome.residual_suggestions));
        body.push('\n');
    }
    body.push_str(&format!(
        "\n_Fix/test cycles used: {}._\n",
        outcome.iterations_used
    ));
    body
}

/// Comment body for an issue-sourced code block.
pub fn comment_body(outcome: &RemediationOutcome, language: &str) -> String {
    let mut body = String::from("## Code Analysis Results\n\n");

    if outcome.converged && !outcome.improved() {
        body.push_str("No issues found in the code!\n");
        return body;
    }

    if outcome.improved() {
        let intro = if outcome.converged {
            "I found and fixed some issues in your code. Here's the improved version:"
        } else {
            "I found some issues and could only partly fix them. Here's the best version I have:"
        };
        body.push_str(intro);
        body.push_str(&format!(
            "\n\n```{language}\n{}\n```\n",
            outcome.final_code.trim_end()
        ));
    } else {
        body.push_str("I found some issues but could not produce a fix.\n");
    }

    // Without a fix, the initial findings are the residual ones.
    if outcome.improved() && !outcome.addressed_suggestions.is_empty() {
        let heading = if outcome.converged {
            "Issues Fixed"
        } else {
            "Issues Found"
        };
        body.push_str(&format!("\n### {heading}:\n"));
        body.push_str(&bullet_list(&outcome.addressed_suggestions));
        body.push('\n');
    }
    if !outcome.residual_suggestions.is_empty() {
        body.push_str("\n### Remaining Issues:\n");
        body.push_str(&bullet_list(&outcome.residual_suggestions));
        body.push('\n');
    }
    body
}

/// Pull request comment for a changed file that could not be fixed.
pub fn unresolved_file_comment(outcome: &RemediationOutcome, loc: &FileLocation) -> String {
    let mut body = format!(
        "## Code Analysis Results for `{}`\n\nI found some issues in `{}` at `{}` but could not produce a fix.\n",
        loc.path,
        loc.path,
        short_sha(&loc.commit_sha)
    );
    if !outcome.residual_suggestions.is_empty() {
        body.push_str("\n### Remaining Issues:\n");
        body.push_str(&bullet_list(&outcome.residual_suggestions));
        body.push('\n');
    }
    body
}

/// Decide how `outcome` is published for `origin`.
pub fn plan_publication(outcome: &RemediationOutcome, origin: &Origin, language: &str) -> PublishPlan {
    match origin {
        Origin::Issue(loc) => PublishPlan::Comment {
            repo: loc.repo.clone(),
            issue_number: loc.issue_number,
            body: comment_body(outcome, language),
        },
        Origin::File(loc) if !outcome.improved() => match (outcome.converged, loc.pull_request) {
            (true, _) => PublishPlan::Skip {
                reason: format!("{} passed analysis", loc.path),
            },
            (false, Some(number)) => PublishPlan::Comment {
                repo: loc.repo.clone(),
                issue_number: number,
                body: unresolved_file_comment(outcome, loc),
            },
            (false, None) => PublishPlan::Unpublishable {
                reason: format!(
                    "{} has findings but no fix was produced and there is no pull request to report them on",
                    loc.path
                ),
                residual_suggestions: outcome.residual_suggestions.clone(),
            },
        },
        Origin::File(loc) => {
            let branch = branch_name(&loc.path, &outcome.final_code);
            PublishPlan::PullRequest {
                repo: loc.repo.clone(),
                from_sha: loc.commit_sha.clone(),
                base: loc.base_branch.clone(),
                update: FileUpdate {
                    path: loc.path.clone(),
                    content: outcome.final_code.clone(),
                    branch: branch.clone(),
                    message: format!("Fix: automated code improvements in {}", loc.path),
                    sha: loc.blob_sha.clone(),
                },
                title: format!("Fix issues in {}", loc.path),
                body: pull_request_body(outcome, loc),
                branch,
            }
        }
    }
}

/// Executes publish plans against the hosting service.
#[derive(Clone)]
pub struct PublishCoordinator {
    hosting: Arc<dyn HostingService>,
}

impl PublishCoordinator {
    pub fn new(hosting: Arc<dyn HostingService>) -> Self {
        Self { hosting }
    }

    /// Publish `outcome` for an artifact that came from `origin`.
    ///
    /// Hosting rejections surface as `HealerError::Publish`; nothing is
    /// retried.
    pub async fn publish(
        &self,
        outcome: &RemediationOutcome,
        origin: &Origin,
        language: &str,
    ) -> Result<PublishReceipt> {
        let label = origin.describe();
        let plan = plan_publication(outcome, origin, language);

        let result = self.execute(plan).await;
        match &result {
            Ok(PublishReceipt::Skipped { reason }) => emit_publish_skipped(&label, reason),
            Ok(PublishReceipt::Unpublished { reason, .. }) => {
                METRICS.inc_publish_failures();
                emit_publish_failed(&label, reason);
            }
            Ok(PublishReceipt::PullRequest { url, .. }) => emit_publish_completed(&label, url),
            Ok(PublishReceipt::Comment { issue_number, .. }) => {
                emit_publish_completed(&label, &format!("issue #{issue_number}"))
            }
            Err(e) => {
                METRICS.inc_publish_failures();
                emit_publish_failed(&label, e);
            }
        }
        result
    }

    async fn execute(&self, plan: PublishPlan) -> Result<PublishReceipt> {
        match plan {
            PublishPlan::Skip { reason } => Ok(PublishReceipt::Skipped { reason }),
            PublishPlan::Unpublishable {
                reason,
                residual_suggestions,
            } => Ok(PublishReceipt::Unpublished {
                reason,
                residual_suggestions,
            }),
            PublishPlan::Comment {
                repo,
                issue_number,
                body,
            } => {
                self.hosting
                    .create_issue_comment(&repo, issue_number, &body)
                    .await
                    .map_err(HealerError::Publish)?;
                Ok(PublishReceipt::Comment { repo, issue_number })
            }
            PublishPlan::PullRequest {
                repo,
                branch,
                from_sha,
                base,
                update,
                title,
                body,
            } => {
                self.hosting
                    .create_branch(&repo, &branch, &from_sha)
                    .await
                    .map_err(HealerError::Publish)?;
                self.hosting
                    .upsert_file(&repo, update)
                    .await
                    .map_err(HealerError::Publish)?;
                let pr = self
                    .hosting
                    .create_pull_request(
                        &repo,
                        NewPullRequest {
                            title,
                            body,
                            head: branch.clone(),
                            base,
                        },
                    )
                    .await
                    .map_err(HealerError::Publish)?;
                Ok(PublishReceipt::PullRequest {
                    url: pr.url,
                    number: pr.number,
                    branch,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_slug() {
        assert_eq!(path_slug("src/utils/Loop.js"), "src-utils-loop-js");
        assert_eq!(path_slug("///"), "file");
        let long = format!("{}/tail.py", "a".repeat(80));
        let slug = path_slug(&long);
        assert!(slug.len() <= SLUG_MAX_LEN);
        assert!(slug.ends_with("tail-py"));
    }

    #[test]
    fn test_branch_names_are_unique_per_run() {
        let a = branch_name("src/a.js", "let a = 1;");
        let b = branch_name("src/a.js", "let a = 1;");
        assert!(a.starts_with("healer/fix-src-a-js-"));
        assert_ne!(a, b);
        let digest = content_digest("let a = 1;");
        assert!(a.contains(&digest[..8]));
    }

    #[test]
    fn test_content_digest_is_sha256_hex() {
        let digest = content_digest("");
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_comment_for_clean_code() {
        let body = comment_body(&RemediationOutcome::clean("print(1)"), "python");
        assert!(body.contains("No issues found in the code!"));
        assert!(!body.contains("```"));
    }

    #[test]
    fn test_comment_for_fixed_code_lists_issues_in_order() {
        let outcome = RemediationOutcome {
            final_code: "for (let i = 0; i < 3; i++) {}".to_string(),
            converged: true,
            iterations_used: 1,
            residual_suggestions: Vec::new(),
            addressed_suggestions: vec!["first".to_string(), "second".to_string()],
            cycles: Vec::new(),
        };
        let body = comment_body(&outcome, "js");
        assert!(body.contains("```js\nfor (let i = 0; i < 3; i++) {}\n```"));
        let first = body.find("- first").expect("first listed");
        let second = body.find("- second").expect("second listed");
        assert!(first < second);
        assert!(body.contains("### Issues Fixed:"));
        assert!(!body.contains("Remaining"));
    }

    #[test]
    fn test_comment_without_fix_lists_findings_once() {
        let outcome = RemediationOutcome {
            final_code: "for (i = 0; i < 3; i++) {}".to_string(),
            converged: false,
            iterations_used: 0,
            residual_suggestions: vec![
                "undeclared variable 'i'".to_string(),
                "tooling failure during fix: gateway unavailable".to_string(),
            ],
            addressed_suggestions: vec!["undeclared variable 'i'".to_string()],
            cycles: Vec::new(),
        };
        let body = comment_body(&outcome, "js");
        assert!(body.contains("could not produce a fix"));
        assert_eq!(body.matches("undeclared variable 'i'").count(), 1);
        assert!(!body.contains("Issues Found"));
        assert!(body.contains("### Remaining Issues:\n- undeclared variable 'i'\n- tooling failure"));
    }
}
