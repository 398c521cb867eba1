//! HTTP probe contract.
//!
//! Probe specs come from a small TOML document (`<name>.path = "/"`, ...).
//! Fetching lives in the CLI crate; everything here is pure: probe parsing,
//! page text extraction, assertion checks and the exit code rollup.

use crate::error::{PkgcheckError, Result};
use crate::question::scalar_to_string;
use crate::results::MainResult;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use url::Url;

/// Exit code when any probe saw a 5xx status
pub const EXIT_SERVER_ERROR: i32 = 5;
/// Exit code when any assertion failed
pub const EXIT_ASSERTION_FAILED: i32 = 1;
pub const EXIT_OK: i32 = 0;

/// Statuses worth retrying: the app is probably still starting
pub const RETRYABLE_STATUSES: [u16; 3] = [502, 503, 504];

const DEFAULT_PROBES: &str = "home.path = '/'";
const SSO_PORTAL_MARKER: &str = "/yunohost/sso";
const NGINX_DEFAULT_TITLE: &str = "Welcome to nginx";

/// Values substituted into probe specs and used to reach the app
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeEnv {
    pub domain: String,
    pub subdomain: String,
    pub user: String,
    pub password: String,
    pub lxc_ip: String,
    /// Base URL of the app, without trailing slash
    pub base_url: String,
}

impl ProbeEnv {
    /// Host part of the app base URL
    pub fn app_domain(&self) -> Result<String> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| PkgcheckError::InvalidProbe(format!("bad BASE_URL: {}", e)))?;
        url.host_str()
            .map(str::to_string)
            .ok_or_else(|| PkgcheckError::InvalidProbe("BASE_URL has no host".to_string()))
    }

    fn substitute(&self, value: &str, app_domain: &str) -> String {
        value
            .replace("__USER__", &self.user)
            .replace("__DOMAIN__", app_domain)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProbe {
    base_url: Option<String>,
    path: Option<String>,
    post: Option<serde_json::Map<String, serde_json::Value>>,
    logged_on_sso: Option<bool>,
    expect_title: Option<String>,
    expect_content: Option<String>,
    expect_effective_url: Option<String>,
    expect_return_code: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSpec {
    pub name: String,
    pub base_url: String,
    pub path: String,
    /// Form fields; when set the page is fetched with a POST
    pub post: Option<Vec<(String, String)>>,
    pub logged_on_sso: bool,
    pub expect_title: Option<String>,
    pub expect_content: Option<String>,
    pub expect_effective_url: Option<String>,
    /// `None` or 0 disables the check
    pub expect_return_code: Option<u16>,
}

impl ProbeSpec {
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }
}

/// Parse probe specs, applying defaults and placeholders.
///
/// Empty input probes the app home. A probe on `/` is followed by a
/// `<name>_noslash` twin hitting the bare base URL.
pub fn parse_probe_specs(input: &str, env: &ProbeEnv) -> Result<Vec<ProbeSpec>> {
    let input = if input.trim().is_empty() {
        DEFAULT_PROBES
    } else {
        input
    };
    let raw: toml::Table = toml::from_str(input)?;
    let app_domain = env.app_domain()?;
    let base_url = env.base_url.trim_end_matches('/').to_string();

    let mut specs = Vec::new();
    for (name, value) in raw {
        let probe: RawProbe = value.try_into()?;
        let sub = |v: Option<String>| v.map(|s| env.substitute(&s, &app_domain));

        let post = probe
            .post
            .map(|fields| form_fields(&name, &fields, env, &app_domain))
            .transpose()?;

        let spec = ProbeSpec {
            name: name.clone(),
            base_url: sub(probe.base_url).unwrap_or_else(|| base_url.clone()),
            path: sub(probe.path).unwrap_or_else(|| "/".to_string()),
            post,
            logged_on_sso: probe.logged_on_sso.unwrap_or(false),
            expect_title: sub(probe.expect_title),
            expect_content: sub(probe.expect_content),
            expect_effective_url: sub(probe.expect_effective_url),
            expect_return_code: Some(probe.expect_return_code.unwrap_or(200)),
        };

        let noslash = (spec.path == "/").then(|| ProbeSpec {
            name: format!("{}_noslash", name),
            path: String::new(),
            ..spec.clone()
        });
        specs.push(spec);
        specs.extend(noslash);
    }
    Ok(specs)
}

fn form_fields(
    name: &str,
    fields: &serde_json::Map<String, serde_json::Value>,
    env: &ProbeEnv,
    app_domain: &str,
) -> Result<Vec<(String, String)>> {
    fields
        .iter()
        .map(|(key, value)| {
            scalar_to_string(value)
                .map(|v| (key.clone(), env.substitute(&v, app_domain)))
                .ok_or_else(|| {
                    PkgcheckError::InvalidProbe(format!("{}.post.{} must be a scalar", name, key))
                })
        })
        .collect()
}

/// What the fetcher saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub code: u16,
    pub effective_url: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    /// Failure whenever `errors` is non-empty
    pub main_result: MainResult,
    pub url: String,
    pub effective_url: String,
    pub code: u16,
    pub title: String,
    pub content: String,
    pub errors: Vec<String>,
}

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("title selector is valid"));
static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("body selector is valid"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{3,}").expect("whitespace pattern is valid"));

/// Page title, trimmed, with en dashes flattened to '-'
pub fn extract_title(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .select(&TITLE)
        .next()
        .map(|el| el.text().collect::<String>().trim().replace('\u{2013}', "-"))
        .unwrap_or_default()
}

/// Visible body text with long whitespace runs collapsed
pub fn extract_content(html: &str) -> String {
    let document = Html::parse_document(html);
    let text = document
        .select(&BODY)
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default();
    WHITESPACE_RUN.replace_all(text.trim(), "\n\n").into_owned()
}

fn pattern_found(pattern: &str, haystack: &str) -> std::result::Result<bool, String> {
    Regex::new(pattern)
        .map(|re| re.is_match(haystack))
        .map_err(|e| format!("Invalid pattern '{}': {}", pattern, e))
}

/// Check a fetched page against the probe expectations.
pub fn evaluate(spec: &ProbeSpec, page: &FetchedPage) -> ProbeResult {
    let title = extract_title(&page.body);
    let content = extract_content(&page.body);
    let mut errors = Vec::new();

    match &spec.expect_effective_url {
        None if page.effective_url.contains(SSO_PORTAL_MARKER) => errors.push(format!(
            "The request was redirected to yunohost's portal ({})",
            page.effective_url
        )),
        Some(expected) if *expected != page.effective_url => errors.push(format!(
            "Ended up on URL '{}', but was expecting '{}'",
            page.effective_url, expected
        )),
        _ => {}
    }

    if let Some(expected) = spec.expect_return_code.filter(|c| *c != 0) {
        if page.code != expected {
            errors.push(format!(
                "Got return code {}, but was expecting {}",
                page.code, expected
            ));
        }
    }

    match &spec.expect_title {
        None if title.contains(NGINX_DEFAULT_TITLE) => {
            errors.push("The request ended up on the default nginx page?".to_string())
        }
        Some(pattern) => match pattern_found(pattern, &title) {
            Ok(true) => {}
            Ok(false) => errors.push(format!(
                "Got title '{}', but was expecting something containing '{}'",
                title, pattern
            )),
            Err(e) => errors.push(e),
        },
        None => {}
    }

    if let Some(pattern) = &spec.expect_content {
        match pattern_found(pattern, &content) {
            Ok(true) => {}
            Ok(false) => errors.push(format!(
                "Did not find pattern '{}' in the page content: '{}' (on URL {})",
                pattern,
                content.chars().take(50).collect::<String>(),
                page.effective_url
            )),
            Err(e) => errors.push(e),
        }
    }

    ProbeResult {
        main_result: if errors.is_empty() {
            MainResult::Success
        } else {
            MainResult::Failure
        },
        url: spec.url(),
        effective_url: page.effective_url.clone(),
        code: page.code,
        title,
        content,
        errors,
    }
}

/// 5 if any probe hit a 5xx, 1 if any assertion failed, 0 otherwise.
pub fn probe_exit_code<'a>(results: impl IntoIterator<Item = &'a ProbeResult>) -> i32 {
    let mut exit = EXIT_OK;
    for result in results {
        if (500..600).contains(&result.code) {
            return EXIT_SERVER_ERROR;
        }
        if !result.errors.is_empty() {
            exit = EXIT_ASSERTION_FAILED;
        }
    }
    exit
}
