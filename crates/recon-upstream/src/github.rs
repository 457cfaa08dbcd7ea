//! GitHub REST implementation of [`GitHost`]

use crate::error::UpstreamError;
use crate::git::{GitHost, OpenPullRequest};
use crate::http::{build_client, check_status};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const SERVICE: &str = "github";
const DEFAULT_API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const ACCEPT: &str = "application/vnd.github+json";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// GitHub-backed git host scoped to a single repository
#[derive(Debug, Clone)]
pub struct GitHubHost {
    client: reqwest::Client,
    api_base: Url,
    token: String,
    owner: String,
    repo: String,
}

impl GitHubHost {
    /// Create a host for `owner/repo` authenticated with `token`
    ///
    /// # Errors
    /// Returns [`UpstreamError::Config`] when any identity field is blank
    pub fn new(
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Result<Self, UpstreamError> {
        let token = token.into();
        let owner = owner.into();
        let repo = repo.into();
        for (name, value) in [("GITHUB_TOKEN", &token), ("REPO_OWNER", &owner), ("REPO_NAME", &repo)] {
            if value.trim().is_empty() {
                return Err(UpstreamError::Config(format!("{name} is not set")));
            }
        }

        let api_base = Url::parse(DEFAULT_API_BASE)
            .map_err(|e| UpstreamError::Config(format!("invalid GitHub API base: {e}")))?;

        Ok(Self {
            client: build_client(SERVICE, Duration::from_secs(DEFAULT_TIMEOUT_SECS))?,
            api_base,
            token: token.trim().to_string(),
            owner: owner.trim().to_string(),
            repo: repo.trim().to_string(),
        })
    }

    /// Point at a different API root (GitHub Enterprise, test servers)
    ///
    /// # Errors
    /// Returns [`UpstreamError::Config`] if `base` is not an absolute URL
    pub fn with_api_base(mut self, base: &str) -> Result<Self, UpstreamError> {
        self.api_base = Url::parse(base)
            .map_err(|e| UpstreamError::Config(format!("invalid GitHub API base '{base}': {e}")))?;
        Ok(self)
    }

    /// Override the request timeout
    ///
    /// # Errors
    /// Returns [`UpstreamError::Transport`] if the client cannot be rebuilt
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, UpstreamError> {
        self.client = build_client(SERVICE, timeout)?;
        Ok(self)
    }

    /// `{api}/repos/{owner}/{repo}/{tail...}` with every segment percent-encoded
    fn repo_url<'a>(&self, tail: impl IntoIterator<Item = &'a str>) -> Result<Url, UpstreamError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| UpstreamError::Config(format!("GitHub API base cannot be a base: {}", self.api_base)))?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), self.repo.as_str()])
            .extend(tail);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Accept", ACCEPT)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn send(
        &self,
        method_name: &'static str,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, UpstreamError> {
        let resp = req
            .send()
            .await
            .map_err(|e| UpstreamError::transport(SERVICE, e))?;
        check_status(SERVICE, method_name, resp).await
    }

    async fn get_contents(&self, git_ref: &str, path: &str) -> Result<Option<ContentsDto>, UpstreamError> {
        let mut url = self.repo_url(std::iter::once("contents").chain(path.split('/')))?;
        url.query_pairs_mut().append_pair("ref", git_ref);

        let resp = match self.send("GET", self.request(reqwest::Method::GET, url)).await {
            Ok(resp) => resp,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let dto = resp
            .json::<ContentsDto>()
            .await
            .map_err(|e| UpstreamError::decode(SERVICE, format!("file response for {path}: {e}")))?;
        Ok(Some(dto))
    }
}

#[async_trait::async_trait]
impl GitHost for GitHubHost {
    async fn get_file_text(
        &self,
        git_ref: &str,
        path: &str,
    ) -> Result<Option<String>, UpstreamError> {
        require("ref", git_ref)?;
        require("path", path)?;

        match self.get_contents(git_ref, path).await? {
            Some(dto) => dto.decode_text(path),
            None => Ok(None),
        }
    }

    async fn list_open_pull_requests(
        &self,
        base_branch: &str,
    ) -> Result<Vec<OpenPullRequest>, UpstreamError> {
        require("baseBranch", base_branch)?;

        let mut url = self.repo_url(["pulls"])?;
        url.query_pairs_mut()
            .append_pair("state", "open")
            .append_pair("base", base_branch)
            .append_pair("per_page", "100");

        let body = self
            .send("GET", self.request(reqwest::Method::GET, url))
            .await?
            .text()
            .await
            .map_err(|e| UpstreamError::transport(SERVICE, e))?;
        decode_pulls(&body)
    }

    async fn get_branch_head_sha(&self, branch: &str) -> Result<String, UpstreamError> {
        require("branch", branch)?;

        let url = self.repo_url(["git", "ref", "heads"].into_iter().chain(branch.split('/')))?;
        let dto: RefDto = self
            .send("GET", self.request(reqwest::Method::GET, url))
            .await?
            .json()
            .await
            .map_err(|e| UpstreamError::decode(SERVICE, format!("ref response for {branch}: {e}")))?;
        Ok(dto.object.sha)
    }

    async fn create_branch(&self, name: &str, from_sha: &str) -> Result<(), UpstreamError> {
        require("branch", name)?;
        require("sha", from_sha)?;

        let url = self.repo_url(["git", "refs"])?;
        let body = CreateRefRequest {
            git_ref: format!("refs/heads/{name}"),
            sha: from_sha,
        };
        self.send("POST", self.request(reqwest::Method::POST, url).json(&body))
            .await?;
        tracing::info!("Created branch {} at {} on {}", name, from_sha, self.name());
        Ok(())
    }

    async fn upsert_text_file(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<(), UpstreamError> {
        require("branch", branch)?;
        require("path", path)?;

        // Replacing an existing file requires its blob SHA.
        let existing_sha = self
            .get_contents(branch, path)
            .await?
            .and_then(|dto| dto.sha);

        let url = self.repo_url(std::iter::once("contents").chain(path.split('/')))?;
        let body = PutContentsRequest {
            message,
            content: base64::engine::general_purpose::STANDARD.encode(content.as_bytes()),
            branch,
            sha: existing_sha,
        };
        self.send("PUT", self.request(reqwest::Method::PUT, url).json(&body))
            .await?;
        tracing::info!("Committed {} to {} ({})", path, branch, message);
        Ok(())
    }

    async fn create_pull_request(
        &self,
        base: &str,
        head: &str,
        title: &str,
        body: &str,
    ) -> Result<OpenPullRequest, UpstreamError> {
        require("base", base)?;
        require("head", head)?;

        let url = self.repo_url(["pulls"])?;
        let request = CreatePrRequest {
            title,
            body,
            head,
            base,
        };
        let text = self
            .send("POST", self.request(reqwest::Method::POST, url).json(&request))
            .await?
            .text()
            .await
            .map_err(|e| UpstreamError::transport(SERVICE, e))?;
        let dto: PullDto =
            serde_json::from_str(&text).map_err(|e| UpstreamError::decode(SERVICE, e))?;
        let pr = dto.into_open_pull_request();
        tracing::info!("Opened PR #{} {} -> {}", pr.number, head, base);
        Ok(pr)
    }

    fn name(&self) -> String {
        format!("github:{}/{}", self.owner, self.repo)
    }
}

fn require(field: &str, value: &str) -> Result<(), UpstreamError> {
    if value.trim().is_empty() {
        Err(UpstreamError::InvalidInput(format!("{field} is required")))
    } else {
        Ok(())
    }
}

/// Map a `GET /pulls` body to projections
pub(crate) fn decode_pulls(body: &str) -> Result<Vec<OpenPullRequest>, UpstreamError> {
    let pulls: Vec<PullDto> = serde_json::from_str(body).map_err(|e| {
        UpstreamError::decode(SERVICE, format!("pulls list did not return an array: {e}"))
    })?;
    Ok(pulls.into_iter().map(PullDto::into_open_pull_request).collect())
}

#[derive(Debug, Deserialize)]
struct ContentsDto {
    content: Option<String>,
    sha: Option<String>,
}

impl ContentsDto {
    fn decode_text(self, path: &str) -> Result<Option<String>, UpstreamError> {
        let Some(encoded) = self.content else {
            return Ok(None);
        };
        let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(cleaned)
            .map_err(|e| UpstreamError::decode(SERVICE, format!("content of {path}: {e}")))?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| UpstreamError::decode(SERVICE, format!("content of {path}: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct PullDto {
    number: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    head: BranchDto,
    #[serde(default)]
    base: BranchDto,
}

impl PullDto {
    fn into_open_pull_request(self) -> OpenPullRequest {
        OpenPullRequest {
            number: self.number,
            title: self.title.unwrap_or_default(),
            html_url: self.html_url.unwrap_or_default(),
            head_sha: self.head.sha.unwrap_or_default(),
            head_ref: self.head.ref_name.unwrap_or_default(),
            base_ref: self.base.ref_name.unwrap_or_default(),
            updated_at: self.updated_at.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct BranchDto {
    #[serde(default)]
    sha: Option<String>,
    #[serde(default, rename = "ref")]
    ref_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefDto {
    object: RefObjectDto,
}

#[derive(Debug, Deserialize)]
struct RefObjectDto {
    sha: String,
}

#[derive(Debug, Serialize)]
struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    git_ref: String,
    sha: &'a str,
}

#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreatePrRequest<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}
