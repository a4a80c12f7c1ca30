use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised when a pull-request record is structurally incomplete for
/// the operation being performed on it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("pull request has no commits")]
    NoCommits,
}

/// How a file was changed in a pull request, as reported by GitHub's
/// GraphQL `changeType` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    Changed,
    #[serde(other)]
    Unknown,
}

/// One changed file in a pull request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedFile {
    pub change_type: ChangeType,
    pub path: String,
    pub additions: u64,
    pub deletions: u64,
}

/// One commit in a pull request, in the order returned by the forge
/// (chronological, last element is the most recent).
#[derive(Debug, Clone)]
pub struct Commit {
    pub message: String,
    pub changed_files: u64,
    pub committed_date: DateTime<Utc>,
}

/// One issue comment on a pull request.
#[derive(Debug, Clone)]
pub struct IssueComment {
    pub body_text: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
}

/// Normalized, read-only view of one pull request's metadata. Constructed
/// once per run and handed to every analyzer.
#[derive(Debug, Clone)]
pub struct PullRequest {
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub url: String,
    pub body: String,
    pub additions: u64,
    pub deletions: u64,
    pub changed_files: u64,
    pub number: u64,
    pub participants: Vec<String>,
    pub files: Vec<ChangedFile>,
    pub commits: Vec<Commit>,
    pub comments: Vec<IssueComment>,
    pub review_requests: Vec<String>,
}

impl PullRequest {
    /// The most recent commit. Several analyzers depend on it; an empty
    /// commit list is a precondition violation for those, not a silent
    /// false.
    pub fn last_commit(&self) -> Result<&Commit, RecordError> {
        self.commits.last().ok_or(RecordError::NoCommits)
    }
}

// GraphQL response shapes. These mirror the query in github.rs; if the
// query changes, these must change too.

#[derive(Debug, Deserialize)]
pub struct GraphQLResponse {
    pub data: RepositoryData,
}

#[derive(Debug, Deserialize)]
pub struct RepositoryData {
    pub repository: PullRequestData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestData {
    pub pull_request: GraphQLPullRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLPullRequest {
    pub title: String,
    pub author: Option<GraphQLActor>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    pub url: String,
    pub body: String,
    pub additions: u64,
    pub deletions: u64,
    pub changed_files: u64,
    pub number: u64,
    pub participants: NodeConnection<GraphQLActor>,
    pub files: NodeConnection<ChangedFile>,
    pub commits: CommitConnection,
    pub comments: NodeConnection<GraphQLComment>,
    pub review_requests: NodeConnection<GraphQLReviewRequest>,
}

#[derive(Debug, Deserialize)]
pub struct NodeConnection<T> {
    pub nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLActor {
    pub login: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLComment {
    pub body_text: String,
    pub author: Option<GraphQLActor>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLReviewRequest {
    pub requested_reviewer: Option<GraphQLActor>,
}

#[derive(Debug, Deserialize)]
pub struct CommitConnection {
    pub edges: Vec<CommitEdge>,
    #[serde(rename = "totalCount")]
    pub total_count: u64,
}

#[derive(Debug, Deserialize)]
pub struct CommitEdge {
    pub node: CommitNode,
}

#[derive(Debug, Deserialize)]
pub struct CommitNode {
    pub commit: GraphQLCommit,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLCommit {
    pub message: String,
    pub changed_files: u64,
    pub committed_date: DateTime<Utc>,
}

impl From<GraphQLPullRequest> for PullRequest {
    fn from(pr: GraphQLPullRequest) -> Self {
        PullRequest {
            title: pr.title,
            author: pr.author.map(|a| a.login).unwrap_or_default(),
            created_at: pr.created_at,
            updated_at: pr.updated_at,
            closed_at: pr.closed_at,
            merged_at: pr.merged_at,
            url: pr.url,
            body: pr.body,
            additions: pr.additions,
            deletions: pr.deletions,
            changed_files: pr.changed_files,
            number: pr.number,
            participants: pr.participants.nodes.into_iter().map(|a| a.login).collect(),
            files: pr.files.nodes,
            commits: pr
                .commits
                .edges
                .into_iter()
                .map(|edge| Commit {
                    message: edge.node.commit.message,
                    changed_files: edge.node.commit.changed_files,
                    committed_date: edge.node.commit.committed_date,
                })
                .collect(),
            comments: pr
                .comments
                .nodes
                .into_iter()
                .map(|c| IssueComment {
                    body_text: c.body_text,
                    author: c.author.map(|a| a.login).unwrap_or_default(),
                    published_at: c.published_at,
                })
                .collect(),
            review_requests: pr
                .review_requests
                .nodes
                .into_iter()
                .filter_map(|r| r.requested_reviewer.map(|a| a.login))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_commit_returns_most_recent() {
        let mut pr = crate::test_support::minimal_pull_request();
        pr.commits = vec![
            Commit {
                message: "first".to_string(),
                changed_files: 1,
                committed_date: "2023-01-01T00:00:00Z".parse().unwrap(),
            },
            Commit {
                message: "second".to_string(),
                changed_files: 2,
                committed_date: "2023-01-02T00:00:00Z".parse().unwrap(),
            },
        ];
        assert_eq!(pr.last_commit().unwrap().message, "second");
    }

    #[test]
    fn last_commit_on_empty_history_is_an_error() {
        let pr = crate::test_support::minimal_pull_request();
        assert_eq!(pr.last_commit().unwrap_err(), RecordError::NoCommits);
    }

    #[test]
    fn graphql_response_flattens_into_record() {
        let raw = serde_json::json!({
            "data": {
                "repository": {
                    "pullRequest": {
                        "title": "Added FPS output",
                        "author": { "login": "joeybab3" },
                        "createdAt": "2016-12-29T06:46:02Z",
                        "updatedAt": "2022-08-20T18:45:59Z",
                        "closedAt": null,
                        "mergedAt": null,
                        "url": "https://github.com/example/repo/pull/1",
                        "participants": {
                            "nodes": [
                                { "login": "joeybab3" },
                                { "login": "scottlawsonbc" }
                            ]
                        },
                        "additions": 21,
                        "body": "Also shows if its connected successfully",
                        "number": 1,
                        "changedFiles": 1,
                        "deletions": 8,
                        "files": {
                            "nodes": [{
                                "changeType": "MODIFIED",
                                "additions": 21,
                                "path": "controller/controller.ino",
                                "deletions": 8
                            }]
                        },
                        "commits": {
                            "edges": [{
                                "node": {
                                    "commit": {
                                        "message": "fix fps counter",
                                        "changedFiles": 1,
                                        "committedDate": "2017-01-05T08:02:43Z"
                                    }
                                }
                            }],
                            "totalCount": 7
                        },
                        "comments": {
                            "nodes": [{
                                "bodyText": "lgtm",
                                "author": { "login": "scottlawsonbc" },
                                "publishedAt": "2016-12-30T00:30:40Z"
                            }]
                        },
                        "reviewRequests": {
                            "nodes": [{
                                "requestedReviewer": { "login": "scottlawsonbc" }
                            }]
                        }
                    }
                }
            }
        });

        let response: GraphQLResponse = serde_json::from_value(raw).unwrap();
        let pr = PullRequest::from(response.data.repository.pull_request);

        assert_eq!(pr.author, "joeybab3");
        assert_eq!(pr.participants.len(), 2);
        assert_eq!(pr.files[0].change_type, ChangeType::Modified);
        assert_eq!(pr.commits.len(), 1);
        assert_eq!(pr.comments[0].author, "scottlawsonbc");
        assert_eq!(pr.review_requests, vec!["scottlawsonbc".to_string()]);
        assert!(pr.merged_at.is_none());
    }

    #[test]
    fn unrecognized_change_type_maps_to_unknown() {
        let file: ChangedFile = serde_json::from_value(serde_json::json!({
            "changeType": "SOMETHING_NEW",
            "path": "a.vi",
            "additions": 0,
            "deletions": 0
        }))
        .unwrap();
        assert_eq!(file.change_type, ChangeType::Unknown);
    }
}
