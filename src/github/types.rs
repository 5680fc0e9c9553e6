use serde::{Deserialize, Serialize};

/// One entry of a repository directory listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
}

impl ContentEntry {
    pub fn is_file(&self) -> bool {
        self.entry_type == "file"
    }
}

/// A single file fetched through the contents API.
#[derive(Debug, Clone, Deserialize)]
pub struct FileContent {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueSummary {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    /// Present when the "issue" is actually a pull request.
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateIssueRequest<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub labels: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateIssueRequest<'a> {
    pub body: &'a str,
}

/// Owner and name parsed from a `https://github.com/<owner>/<repo>` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn api_path(&self) -> String {
        format!("repos/{}/{}", self.owner, self.name)
    }
}
