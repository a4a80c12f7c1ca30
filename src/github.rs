//! GitHub access: authenticated client setup, the pull-request metadata
//! query, diff-image upload, and comment posting. Everything network-shaped
//! lives behind the `Forge` trait so the pipeline can run against a mock.

use std::process::Command;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use octocrab::Octocrab;
use serde::Deserialize;
use tracing::info;

use crate::record::{GraphQLResponse, PullRequest};

/// A repository addressed as owner/name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repo {
    pub owner: String,
    pub name: String,
}

impl Repo {
    pub fn parse(repo: &str) -> Result<Self> {
        let parts: Vec<&str> = repo.split('/').collect();
        match parts.as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => Ok(Repo {
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            _ => anyhow::bail!("Repository must be in format 'owner/repo', got: '{}'", repo),
        }
    }
}

impl std::fmt::Display for Repo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Parses a GitHub PR URL into its repository and number.
pub fn parse_pr_url(url_str: &str) -> Result<(Repo, u64)> {
    let url =
        url::Url::parse(url_str).with_context(|| format!("Failed to parse URL: '{url_str}'"))?;

    if url.host_str() != Some("github.com") {
        anyhow::bail!("URL must be a GitHub PR URL, got: '{}'", url_str);
    }

    let path_segments: Vec<&str> = url
        .path_segments()
        .context("Cannot parse URL path")?
        .collect();

    // Expected path structure: ["owner", "repo", "pull", "123"]
    if path_segments.len() != 4 || path_segments[2] != "pull" {
        anyhow::bail!(
            "URL must be in format https://github.com/owner/repo/pull/123, got: '{}'",
            url_str
        );
    }

    let repo = Repo {
        owner: path_segments[0].to_string(),
        name: path_segments[1].to_string(),
    };
    let number: u64 = path_segments[3]
        .parse()
        .with_context(|| format!("Invalid PR number in URL: '{url_str}'"))?;

    Ok((repo, number))
}

pub fn get_github_token() -> Result<String> {
    // Prefer environment variables over the gh CLI to avoid subprocess
    // overhead.
    if let Ok(token) = std::env::var("GITHUB_TOKEN") {
        return Ok(token);
    }

    if let Ok(token) = std::env::var("GH_TOKEN") {
        return Ok(token);
    }

    let output = Command::new("gh").args(["auth", "token"]).output()?;

    if !output.status.success() {
        anyhow::bail!("Failed to get GitHub token from gh CLI. Please run 'gh auth login' first");
    }

    let token = String::from_utf8(output.stdout)?.trim().to_string();

    if token.is_empty() {
        anyhow::bail!("Empty token returned from gh CLI");
    }

    Ok(token)
}

/// The forge operations the bot needs. Tests substitute a mock.
#[async_trait]
pub trait Forge {
    /// Fetch one pull request's normalized metadata record.
    async fn fetch_pull_request(&self, repo: &Repo, number: u64) -> Result<PullRequest>;

    /// Upload one diff image and return its download URL.
    async fn upload_diff_image(&self, repo: &Repo, path: &str, data: &[u8]) -> Result<String>;

    /// Post a comment on a pull request.
    async fn post_comment(&self, repo: &Repo, number: u64, body: &str) -> Result<()>;
}

pub struct GitHub {
    client: Octocrab,
}

impl GitHub {
    /// Creates an authenticated GitHub client using available credentials.
    pub fn new() -> Result<Self> {
        let token = get_github_token().context("Failed to obtain GitHub authentication token")?;
        let client = Octocrab::builder()
            .personal_token(token)
            .build()
            .context("Failed to create GitHub client")?;
        Ok(GitHub { client })
    }
}

// The record model in record.rs mirrors this query; if one changes, the
// other must change too.
fn pull_request_query(repo: &Repo, number: u64) -> serde_json::Value {
    serde_json::json!({
        "query": r#"
            query($owner: String!, $name: String!, $number: Int!) {
                repository(owner: $owner, name: $name) {
                    pullRequest(number: $number) {
                        title
                        author { login }
                        createdAt
                        updatedAt
                        closedAt
                        mergedAt
                        url
                        participants(first: 100) {
                            nodes { login }
                        }
                        additions
                        body
                        number
                        changedFiles
                        deletions
                        files(first: 100) {
                            nodes {
                                changeType
                                additions
                                path
                                deletions
                            }
                        }
                        commits(last: 100) {
                            edges {
                                node {
                                    commit {
                                        message
                                        changedFiles
                                        committedDate
                                    }
                                }
                            }
                            totalCount
                        }
                        comments(last: 100) {
                            nodes {
                                bodyText
                                author { login }
                                publishedAt
                            }
                        }
                        reviewRequests(first: 100) {
                            nodes {
                                requestedReviewer {
                                    ... on User { login }
                                }
                            }
                        }
                    }
                }
            }
        "#,
        "variables": {
            "owner": repo.owner,
            "name": repo.name,
            "number": number,
        }
    })
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: ContentsFile,
}

#[derive(Debug, Deserialize)]
struct ContentsFile {
    download_url: String,
}

#[async_trait]
impl Forge for GitHub {
    async fn fetch_pull_request(&self, repo: &Repo, number: u64) -> Result<PullRequest> {
        let query = pull_request_query(repo, number);
        let response: GraphQLResponse = self
            .client
            .graphql(&query)
            .await
            .with_context(|| format!("Failed to query {repo}#{number}"))?;
        Ok(PullRequest::from(response.data.repository.pull_request))
    }

    async fn upload_diff_image(&self, repo: &Repo, path: &str, data: &[u8]) -> Result<String> {
        // LabVIEW file names routinely contain spaces.
        let route = format!(
            "/repos/{}/{}/contents/{}",
            repo.owner,
            repo.name,
            path.replace(' ', "%20")
        );
        let body = serde_json::json!({
            "message": "add diff output",
            "content": BASE64.encode(data),
        });
        let response: ContentsResponse = self
            .client
            .put(route, Some(&body))
            .await
            .with_context(|| format!("Failed to upload '{path}' to {repo}"))?;
        info!(path, url = %response.content.download_url, "uploaded diff image");
        Ok(response.content.download_url)
    }

    async fn post_comment(&self, repo: &Repo, number: u64, body: &str) -> Result<()> {
        self.client
            .issues(&repo.owner, &repo.name)
            .create_comment(number, body)
            .await
            .with_context(|| format!("Failed to comment on {repo}#{number}"))?;
        info!(repo = %repo, number, "comment posted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_parse_accepts_owner_slash_name() {
        let repo = Repo::parse("acme/widgets").unwrap();
        assert_eq!(repo.owner, "acme");
        assert_eq!(repo.name, "widgets");
        assert_eq!(repo.to_string(), "acme/widgets");
    }

    #[test]
    fn repo_parse_rejects_malformed_input() {
        assert!(Repo::parse("acme").is_err());
        assert!(Repo::parse("acme/widgets/extra").is_err());
        assert!(Repo::parse("/widgets").is_err());
    }

    #[test]
    fn pr_url_round_trips_repo_and_number() {
        let (repo, number) = parse_pr_url("https://github.com/acme/widgets/pull/343").unwrap();
        assert_eq!(repo, Repo::parse("acme/widgets").unwrap());
        assert_eq!(number, 343);
    }

    #[test]
    fn pr_url_rejects_non_github_hosts() {
        assert!(parse_pr_url("https://gitlab.com/acme/widgets/pull/1").is_err());
        assert!(parse_pr_url("https://github.com/acme/widgets/issues/1").is_err());
    }
}
