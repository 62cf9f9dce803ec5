use std::cell::RefCell;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use super::{DocumentStore, PageEnumerator};
use crate::config::WikiSettings;
use crate::error::{StoreError, StoreResult};

const TIMEOUT_SECS: u64 = 30;
/// Largest `aplimit` a non-bot account may request.
const MAX_APLIMIT: usize = 500;

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct Query<Q> {
    query: Q,
    #[serde(rename = "continue")]
    cont: Option<AllPagesContinue>,
}

#[derive(Debug, Deserialize)]
struct AllPagesContinue {
    apcontinue: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RevisionsQuery {
    #[serde(default)]
    pages: Vec<RevisionPage>,
}

#[derive(Debug, Deserialize)]
struct RevisionPage {
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    revisions: Vec<Revision>,
}

#[derive(Debug, Deserialize)]
struct Revision {
    slots: Slots,
}

#[derive(Debug, Deserialize)]
struct Slots {
    main: MainSlot,
}

#[derive(Debug, Deserialize)]
struct MainSlot {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct AllPagesQuery {
    #[serde(default)]
    allpages: Vec<AllPagesEntry>,
}

#[derive(Debug, Deserialize)]
struct AllPagesEntry {
    title: String,
}

#[derive(Debug, Deserialize)]
struct TokensQuery {
    tokens: Tokens,
}

#[derive(Debug, Deserialize)]
struct Tokens {
    csrftoken: Option<String>,
    logintoken: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    login: LoginResult,
}

#[derive(Debug, Deserialize)]
struct LoginResult {
    result: String,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EditResponse {
    edit: EditResult,
}

#[derive(Debug, Deserialize)]
struct EditResult {
    result: String,
    #[serde(default)]
    nochange: bool,
}

/// MediaWiki Action API client.
pub struct WikiClient {
    api_url: String,
    http: Client,
    csrf: RefCell<Option<String>>,
}

impl WikiClient {
    /// Build the HTTP client and log in when credentials are configured.
    pub fn connect(settings: &WikiSettings) -> StoreResult<Self> {
        let http = Client::builder()
            .cookie_store(true)
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()?;

        let client = WikiClient {
            api_url: settings.api_url.clone(),
            http,
            csrf: RefCell::new(None),
        };

        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            client.login(user, pass)?;
        }
        Ok(client)
    }

    fn login(&self, user: &str, pass: &str) -> StoreResult<()> {
        let tokens: Query<TokensQuery> = self.get(&[
            ("action", "query"),
            ("meta", "tokens"),
            ("type", "login"),
        ])?;
        let token = tokens
            .query
            .tokens
            .logintoken
            .ok_or_else(|| StoreError::Decode("missing logintoken".into()))?;

        let resp: LoginResponse = self.post(&[
            ("action", "login"),
            ("lgname", user),
            ("lgpassword", pass),
            ("lgtoken", token.as_str()),
        ])?;
        if resp.login.result != "Success" {
            return Err(StoreError::Api {
                code: format!("login-{}", resp.login.result.to_lowercase()),
                info: resp.login.reason.unwrap_or_default(),
            });
        }
        info!("Logged in to {} as {}", self.api_url, user);
        Ok(())
    }

    fn csrf_token(&self) -> StoreResult<String> {
        if let Some(token) = self.csrf.borrow().as_ref() {
            return Ok(token.clone());
        }
        let tokens: Query<TokensQuery> =
            self.get(&[("action", "query"), ("meta", "tokens")])?;
        let token = tokens
            .query
            .tokens
            .csrftoken
            .ok_or_else(|| StoreError::Decode("missing csrftoken".into()))?;
        *self.csrf.borrow_mut() = Some(token.clone());
        Ok(token)
    }

    fn get<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> StoreResult<T> {
        let value: serde_json::Value = self
            .http
            .get(&self.api_url)
            .query(params)
            .query(&[("format", "json"), ("formatversion", "2")])
            .send()?
            .error_for_status()?
            .json()?;
        decode(value)
    }

    fn post<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> StoreResult<T> {
        let mut form: Vec<(&str, &str)> = params.to_vec();
        form.extend([("format", "json"), ("formatversion", "2")]);
        let value: serde_json::Value = self
            .http
            .post(&self.api_url)
            .form(&form)
            .send()?
            .error_for_status()?
            .json()?;
        decode(value)
    }
}

fn decode<T: DeserializeOwned>(value: serde_json::Value) -> StoreResult<T> {
    if let Some(err) = value.get("error") {
        let err: ApiError = serde_json::from_value(err.clone())
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        return Err(StoreError::Api {
            code: err.code,
            info: err.info,
        });
    }
    serde_json::from_value(value).map_err(|e| StoreError::Decode(e.to_string()))
}

impl DocumentStore for WikiClient {
    fn fetch(&self, title: &str) -> StoreResult<String> {
        let resp: Query<RevisionsQuery> = self.get(&[
            ("action", "query"),
            ("prop", "revisions"),
            ("rvprop", "content"),
            ("rvslots", "main"),
            ("titles", title),
        ])?;
        let Some(page) = resp.query.pages.into_iter().next() else {
            return Err(StoreError::Decode(format!("no page entry for '{}'", title)));
        };
        if page.missing {
            debug!("{} does not exist yet", title);
            return Ok(String::new());
        }
        Ok(page
            .revisions
            .into_iter()
            .next()
            .map(|r| r.slots.main.content)
            .unwrap_or_default())
    }

    fn save(&self, title: &str, text: &str, note: &str) -> StoreResult<()> {
        let token = self.csrf_token()?;
        let resp: EditResponse = self.post(&[
            ("action", "edit"),
            ("title", title),
            ("text", text),
            ("summary", note),
            ("bot", "1"),
            ("token", token.as_str()),
        ])?;
        if resp.edit.result != "Success" {
            return Err(StoreError::Api {
                code: "edit-failed".into(),
                info: format!("{}: {}", title, resp.edit.result),
            });
        }
        debug!(title, nochange = resp.edit.nochange, "saved");
        Ok(())
    }
}

/// Follow `allpages` continuation until `limit` titles are collected.
///
/// `fetch` gets the `apfrom` value and how many titles to ask for, and
/// returns one page of titles plus the `apcontinue` value, if any.
fn collect_titles<F>(from: &str, limit: usize, mut fetch: F) -> StoreResult<Vec<String>>
where
    F: FnMut(&str, usize) -> StoreResult<(Vec<String>, Option<String>)>,
{
    let mut titles = Vec::with_capacity(limit);
    let mut next_from = from.to_string();

    while titles.len() < limit {
        let want = (limit - titles.len()).min(MAX_APLIMIT);
        let (page, cont) = fetch(&next_from, want)?;
        titles.extend(page);

        match cont {
            Some(cont) => next_from = cont,
            None => break,
        }
    }

    titles.truncate(limit);
    Ok(titles)
}

impl PageEnumerator for WikiClient {
    fn list_from(&self, from: &str, limit: usize) -> StoreResult<Vec<String>> {
        collect_titles(from, limit, |apfrom, want| {
            let want = want.to_string();
            let resp: Query<AllPagesQuery> = self.get(&[
                ("action", "query"),
                ("list", "allpages"),
                ("apfrom", apfrom),
                ("aplimit", want.as_str()),
            ])?;
            let titles = resp.query.allpages.into_iter().map(|p| p.title).collect();
            Ok((titles, resp.cont.and_then(|c| c.apcontinue)))
        })
    }
}
