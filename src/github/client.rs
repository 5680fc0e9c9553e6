use crate::audit::{DocumentPair, DocumentSource, Ticket, TicketPublisher};
use crate::error::{AuditError, Result};
use crate::github::types::*;
use crate::utils::is_valid_repo_url;
use base64::Engine;
use log::{debug, info};
use reqwest::header::LINK;
use reqwest::{Client, RequestBuilder, Response};

const GITHUB_API_URL: &str = "https://api.github.com";
const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";
const ISSUES_PER_PAGE: u32 = 100;
const USER_AGENT: &str = concat!("financial-statement-auditor/", env!("CARGO_PKG_VERSION"));

const STATEMENT_EXTENSIONS: [&str; 2] = [".md", ".csv"];
const PROFIT_AND_LOSS_PATTERNS: [&str; 3] = ["pl", "income", "profit"];
const BALANCE_PATTERNS: [&str; 2] = ["balance", "bs"];

#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    token: String,
    base_url: String,
}

impl GitHubClient {
    pub fn new(token: String) -> Self {
        Self {
            client: Client::new(),
            token,
            base_url: GITHUB_API_URL.to_string(),
        }
    }

    /// Reads the access token from `GITHUB_TOKEN`.
    pub fn from_env() -> Result<Self> {
        Self::from_token(std::env::var(TOKEN_ENV_VAR).ok())
    }

    /// Builds a client from an optional token; a missing or blank token is a
    /// configuration error.
    pub fn from_token(token: Option<String>) -> Result<Self> {
        match token {
            Some(token) if !token.trim().is_empty() => Ok(Self::new(token)),
            _ => Err(AuditError::Configuration(format!(
                "{} is not set",
                TOKEN_ENV_VAR
            ))),
        }
    }

    /// Points the client at another API root, e.g. a GitHub Enterprise host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
    }

    fn url(&self, repo: &RepoRef, tail: &str) -> String {
        format!("{}/{}/{}", self.base_url, repo.api_path(), tail)
    }

    pub async fn list_root(&self, repo: &RepoRef, branch: &str) -> Result<Vec<ContentEntry>> {
        let url = self.url(repo, "contents");
        let response = self
            .request(self.client.get(&url))
            .query(&[("ref", branch)])
            .send()
            .await?;
        let response = ensure_success(response, AuditError::Retrieval, "Listing repository contents").await?;
        Ok(response.json().await?)
    }

    pub async fn fetch_file(&self, repo: &RepoRef, path: &str, branch: &str) -> Result<String> {
        let url = self.url(repo, &format!("contents/{}", path));
        let response = self
            .request(self.client.get(&url))
            .query(&[("ref", branch)])
            .send()
            .await?;
        let response = ensure_success(response, AuditError::Retrieval, "Fetching file").await?;
        let file: FileContent = response.json().await?;
        debug!("Fetched {} ({} encoded bytes)", file.path, file.content.len());
        decode_content(&file)
    }

    /// Walks every page of open issues, following the `Link` header, until
    /// one with exactly `title` is found.
    pub async fn find_open_issue(&self, repo: &RepoRef, title: &str) -> Result<Option<IssueSummary>> {
        let mut next = Some(format!(
            "{}?state=open&per_page={}",
            self.url(repo, "issues"),
            ISSUES_PER_PAGE
        ));
        let mut page = 0;

        while let Some(url) = next.take() {
            page += 1;
            let response = self.request(self.client.get(&url)).send().await?;
            let response = ensure_success(response, AuditError::Publish, "Listing issues").await?;
            next = response
                .headers()
                .get(LINK)
                .and_then(|value| value.to_str().ok())
                .and_then(next_page_url);

            let issues: Vec<IssueSummary> = response.json().await?;
            if let Some(found) = issues
                .into_iter()
                .find(|issue| issue.pull_request.is_none() && issue.title == title)
            {
                return Ok(Some(found));
            }
        }

        debug!("No open issue titled '{}' across {} pages", title, page);
        Ok(None)
    }

    pub async fn update_issue(&self, repo: &RepoRef, number: u64, body: &str) -> Result<String> {
        let url = self.url(repo, &format!("issues/{}", number));
        let response = self
            .request(self.client.patch(&url))
            .json(&UpdateIssueRequest { body })
            .send()
            .await?;
        let response = ensure_success(response, AuditError::Publish, "Updating issue").await?;
        let issue: IssueSummary = response.json().await?;
        Ok(issue.html_url)
    }

    pub async fn create_issue(&self, repo: &RepoRef, ticket: &Ticket) -> Result<String> {
        let url = self.url(repo, "issues");
        let response = self
            .request(self.client.post(&url))
            .json(&CreateIssueRequest {
                title: &ticket.title,
                body: &ticket.body,
                labels: &ticket.labels,
            })
            .send()
            .await?;
        let response = ensure_success(response, AuditError::Publish, "Creating issue").await?;
        let issue: IssueSummary = response.json().await?;
        Ok(issue.html_url)
    }
}

impl DocumentSource for GitHubClient {
    async fn retrieve(&self, repo_url: &str, branch: &str) -> Result<DocumentPair> {
        let repo = parse_repo_url(repo_url)?;
        let entries = self.list_root(&repo, branch).await?;
        let (pl_entry, balance_entry) = select_statement_files(&entries)?;
        info!(
            "Using {} as P&L and {} as Balance Sheet from {}/{}",
            pl_entry.name, balance_entry.name, repo.owner, repo.name
        );

        let (pl, balance) = futures::try_join!(
            self.fetch_file(&repo, &pl_entry.path, branch),
            self.fetch_file(&repo, &balance_entry.path, branch)
        )?;

        Ok(DocumentPair::new(pl, balance))
    }
}

impl TicketPublisher for GitHubClient {
    async fn publish(&self, repo_url: &str, ticket: &Ticket) -> Result<String> {
        let repo = parse_repo_url(repo_url)?;

        match self.find_open_issue(&repo, &ticket.title).await? {
            Some(existing) => {
                debug!("Updating open issue #{}", existing.number);
                self.update_issue(&repo, existing.number, &ticket.body).await
            }
            None => self.create_issue(&repo, ticket).await,
        }
    }
}

async fn ensure_success(
    response: Response,
    to_error: fn(String) -> AuditError,
    action: &str,
) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await?;
    Err(to_error(format!(
        "{} failed (status {}): {}",
        action, status, error_text
    )))
}

/// Extracts the `rel="next"` target from a pagination `Link` header.
pub fn next_page_url(link_header: &str) -> Option<String> {
    link_header.split(',').find_map(|link| {
        let (target, params) = link.split_once(';')?;
        params
            .split(';')
            .any(|param| param.trim() == r#"rel="next""#)
            .then(|| {
                target
                    .trim()
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string()
            })
    })
}

pub fn parse_repo_url(repo_url: &str) -> Result<RepoRef> {
    if !is_valid_repo_url(repo_url) {
        return Err(AuditError::Configuration(format!(
            "Invalid repository URL: {}",
            repo_url
        )));
    }

    let path = repo_url
        .trim_start_matches("https://github.com/")
        .trim_end_matches('/');
    let mut segments = path.split('/');
    let owner = segments.next().unwrap_or_default();
    let name = segments.next().unwrap_or_default();

    Ok(RepoRef {
        owner: owner.to_string(),
        name: name.trim_end_matches(".git").to_string(),
    })
}

/// Picks the first P&L-looking and the first Balance-looking statement file.
/// A file that matches a P&L pattern is never considered a Balance Sheet.
pub fn select_statement_files(
    entries: &[ContentEntry],
) -> Result<(&ContentEntry, &ContentEntry)> {
    let mut pl = None;
    let mut balance = None;

    for entry in entries.iter().filter(|entry| entry.is_file()) {
        let name = entry.name.to_lowercase();
        if !STATEMENT_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
            continue;
        }

        if PROFIT_AND_LOSS_PATTERNS.iter().any(|p| name.contains(p)) {
            pl.get_or_insert(entry);
        } else if BALANCE_PATTERNS.iter().any(|p| name.contains(p)) {
            balance.get_or_insert(entry);
        }
    }

    let pl = pl.ok_or_else(|| AuditError::Retrieval("No P&L file found".to_string()))?;
    let balance =
        balance.ok_or_else(|| AuditError::Retrieval("No Balance Sheet file found".to_string()))?;
    Ok((pl, balance))
}

pub fn decode_content(file: &FileContent) -> Result<String> {
    if file.encoding != "base64" {
        return Err(AuditError::Retrieval(format!(
            "Unsupported encoding '{}' for {}",
            file.encoding, file.path
        )));
    }

    // The API wraps base64 payloads at 60 columns.
    let compact: String = file.content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| AuditError::Retrieval(format!("Invalid base64 in {}: {}", file.path, e)))?;

    String::from_utf8(bytes)
        .map_err(|e| AuditError::Retrieval(format!("{} is not valid UTF-8: {}", file.path, e)))
}
