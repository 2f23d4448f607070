//! # Fact Admin
//!
//! Command-line client for publishing facts through the REST surface.
//!
//! There is no access control on `POST /fact`; run this from inside the
//! deployment network.
use anyhow::{Error, bail};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
    pub id: String,
    pub content: String,
    pub published_at: String,
    pub agrees: u64,
    pub disagrees: u64,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    error: String,
    message: String,
}

pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn publish(&self, content: &str) -> Result<Fact, Error> {
        let res = self
            .http
            .post(self.url("/fact"))
            .json(&json!({ "content": content }))
            .send()
            .await?;

        read_fact(res, StatusCode::CREATED).await
    }

    pub async fn current(&self) -> Result<Fact, Error> {
        let res = self.http.get(self.url("/fact/current")).send().await?;

        read_fact(res, StatusCode::OK).await
    }
}

async fn read_fact(res: reqwest::Response, expected: StatusCode) -> Result<Fact, Error> {
    let status = res.status();
    let body = res.text().await?;

    if status != expected {
        match serde_json::from_str::<ErrorBody>(&body) {
            Ok(err) => bail!("{status} {}: {}", err.error, err.message),
            Err(_) => bail!("{status}: {body}"),
        }
    }

    Ok(serde_json::from_str(&body)?)
}

pub fn describe(fact: &Fact) -> String {
    let total = fact.agrees + fact.disagrees;

    format!(
        "{}\n  id: {}\n  published: {}\n  votes: {} agree / {} disagree ({} total)",
        fact.content, fact.id, fact.published_at, fact.agrees, fact.disagrees, total
    )
}
