//! GitHub hosting adapter for Healer
//!
//! [`GitHubClient`] talks to the GitHub REST API, authenticated either with a
//! bearer token or as a GitHub App installation ([`AppTokenProvider`]), and
//! implements [`healer_core::HostingService`]: file contents, pull request
//! file lists, branch creation, file commits, pull requests and issue
//! comments.

pub mod app_auth;
pub mod client;
pub mod config;
pub mod error;

pub use app_auth::{AppTokenProvider, REFRESH_MARGIN_SECS};
pub use client::{api_error_message, decode_content, is_commit_sha, sanitize_error_body, GitHubClient};
pub use config::{AppCredentials, GitHubConfig, API_VERSION, DEFAULT_API_URL};
pub use error::{GitHubError, Result};
