//! HTTP probe runner
//!
//! Fetches every probe URL against the test container and checks the answer
//! with the pure assertions from `pkgcheck_common::probe`.

use anyhow::{Context, Result};
use pkgcheck_common::config::ProbeConfig;
use pkgcheck_common::probe::{
    evaluate, FetchedPage, ProbeEnv, ProbeResult, ProbeSpec, RETRYABLE_STATUSES,
};
use pkgcheck_common::MainResult;
use reqwest::Url;
use std::collections::BTreeSet;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Hosts that must be pinned to the container address
pub fn probe_hosts(specs: &[ProbeSpec]) -> BTreeSet<String> {
    specs
        .iter()
        .filter_map(|spec| Url::parse(&spec.url()).ok())
        .filter_map(|url| url.host_str().map(str::to_string))
        .collect()
}

/// Client following redirects, resolving probe hosts to `LXC_IP`.
pub fn build_client(
    specs: &[ProbeSpec],
    env: &ProbeEnv,
    config: &ProbeConfig,
) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("pkgcheck/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(10))
        // Pinned hosts must be reached directly, never through a proxy
        .no_proxy()
        .danger_accept_invalid_certs(config.accept_invalid_certs);

    if !env.lxc_ip.is_empty() {
        let ip: IpAddr = env
            .lxc_ip
            .parse()
            .with_context(|| format!("Invalid LXC_IP '{}'", env.lxc_ip))?;
        // The port is ignored by reqwest: the URL scheme decides it
        for host in probe_hosts(specs) {
            debug!("Resolving {} to {}", host, ip);
            builder = builder.resolve(&host, SocketAddr::new(ip, 0));
        }
    }

    Ok(builder.build()?)
}

async fn fetch(client: &reqwest::Client, spec: &ProbeSpec) -> reqwest::Result<FetchedPage> {
    let url = spec.url();
    let request = match &spec.post {
        Some(fields) => client.post(&url).form(fields),
        None => client.get(&url),
    };
    let response = request.send().await?;
    let code = response.status().as_u16();
    let effective_url = response.url().to_string();
    let body = response.text().await?;
    Ok(FetchedPage {
        code,
        effective_url,
        body,
    })
}

/// Fetch with retries while the app answers 502/503/504.
async fn fetch_with_retries(
    client: &reqwest::Client,
    spec: &ProbeSpec,
    config: &ProbeConfig,
) -> reqwest::Result<FetchedPage> {
    let mut page = fetch(client, spec).await?;
    let mut retry = 0;
    while retry < config.max_retries && RETRYABLE_STATUSES.contains(&page.code) {
        retry += 1;
        let delay = Duration::from_secs(u64::from(retry) * config.retry_backoff_secs);
        warn!(
            "{} answered {}, retrying in {}s ({}/{})",
            spec.url(),
            page.code,
            delay.as_secs(),
            retry,
            config.max_retries
        );
        tokio::time::sleep(delay).await;
        page = fetch(client, spec).await?;
    }
    Ok(page)
}

pub async fn run_probe(
    client: &reqwest::Client,
    spec: &ProbeSpec,
    config: &ProbeConfig,
) -> ProbeResult {
    if spec.logged_on_sso {
        warn!(
            "Probe '{}': SSO login is not supported, fetching anonymously",
            spec.name
        );
    }

    let url = spec.url();
    match fetch_with_retries(client, spec, config).await {
        Ok(page) => {
            let result = evaluate(spec, &page);
            if result.errors.is_empty() {
                info!(
                    "Probe '{}' OK ({} on {})",
                    spec.name, result.code, result.effective_url
                );
            } else {
                for e in &result.errors {
                    warn!("Probe '{}': {}", spec.name, e);
                }
            }
            result
        }
        Err(e) => {
            warn!("Probe '{}': request to {} failed: {}", spec.name, url, e);
            ProbeResult {
                main_result: MainResult::Failure,
                url: url.clone(),
                effective_url: String::new(),
                code: e.status().map(|s| s.as_u16()).unwrap_or(0),
                title: String::new(),
                content: String::new(),
                errors: vec![format!("Request to {} failed: {}", url, e)],
            }
        }
    }
}

/// Run every probe in order and return `(name, result)` pairs.
pub async fn run_probes(
    specs: &[ProbeSpec],
    env: &ProbeEnv,
    config: &ProbeConfig,
) -> Result<Vec<(String, ProbeResult)>> {
    let client = build_client(specs, env, config)?;
    let mut results = Vec::with_capacity(specs.len());
    for spec in specs {
        let result = run_probe(&client, spec, config).await;
        results.push((spec.name.clone(), result));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgcheck_common::probe::{parse_probe_specs, probe_exit_code};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn env() -> ProbeEnv {
        ProbeEnv {
            base_url: "https://sub.domain.tld/app".into(),
            lxc_ip: "10.1.4.2".into(),
            ..Default::default()
        }
    }

    fn no_backoff() -> ProbeConfig {
        ProbeConfig {
            max_retries: 3,
            retry_backoff_secs: 0,
            request_timeout_secs: 5,
            ..Default::default()
        }
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if raw.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&raw).into_owned()
    }

    /// Local app answering `statuses` in turn, then 200 forever.
    /// Returns its base URL and the requests it received.
    async fn serve(statuses: Vec<u16>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let request = read_request(&mut socket).await;
                let n = {
                    let mut log = log.lock().unwrap();
                    log.push(request);
                    log.len() - 1
                };
                let status = statuses.get(n).copied().unwrap_or(200);
                let body = "<html><head><title>App</title></head><body>hello</body></html>";
                let response = format!(
                    "HTTP/1.1 {} Status\r\nContent-Type: text/html\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{}", addr), seen)
    }

    fn local_specs(base_url: &str, input: &str) -> (Vec<ProbeSpec>, ProbeEnv) {
        let env = ProbeEnv {
            base_url: base_url.to_string(),
            user: "package_checker".into(),
            ..Default::default()
        };
        (parse_probe_specs(input, &env).unwrap(), env)
    }

    #[test]
    fn test_probe_hosts_are_deduplicated() {
        let specs = parse_probe_specs(
            "home.path = '/'\nadmin.path = '/admin'\nother.base_url = 'https://domain.tld'\n",
            &env(),
        )
        .unwrap();
        let hosts: Vec<_> = probe_hosts(&specs).into_iter().collect();
        assert_eq!(hosts, vec!["domain.tld", "sub.domain.tld"]);
    }

    #[test]
    fn test_invalid_lxc_ip_is_rejected() {
        let specs = parse_probe_specs("", &env()).unwrap();
        let bad = ProbeEnv {
            lxc_ip: "not-an-ip".into(),
            ..env()
        };
        assert!(build_client(&specs, &bad, &ProbeConfig::default()).is_err());
        assert!(build_client(&specs, &env(), &ProbeConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_retries_until_the_app_is_up() {
        let (base_url, seen) = serve(vec![503, 503]).await;
        let (specs, env) = local_specs(&base_url, "home.path = '/ready'");
        let config = no_backoff();
        let client = build_client(&specs, &env, &config).unwrap();

        let result = run_probe(&client, &specs[0], &config).await;
        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(result.code, 200);
        assert_eq!(result.title, "App");
        assert!(result.errors.is_empty());
        assert_eq!(probe_exit_code([&result]), 0);
    }

    #[tokio::test]
    async fn test_retries_stop_after_max_retries() {
        let (base_url, seen) = serve(vec![503; 5]).await;
        let (specs, env) = local_specs(&base_url, "home.path = '/ready'");
        let config = no_backoff();
        let client = build_client(&specs, &env, &config).unwrap();

        let result = run_probe(&client, &specs[0], &config).await;
        // One initial request plus max_retries retries
        assert_eq!(seen.lock().unwrap().len(), 4);
        assert_eq!(result.code, 503);
        assert_eq!(result.main_result, MainResult::Failure);
        assert_eq!(probe_exit_code([&result]), 5);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let (base_url, seen) = serve(vec![404, 503]).await;
        let (specs, env) = local_specs(&base_url, "home.path = '/missing'");
        let config = no_backoff();
        let client = build_client(&specs, &env, &config).unwrap();

        let result = run_probe(&client, &specs[0], &config).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(result.code, 404);
        assert_eq!(probe_exit_code([&result]), 1);
    }

    #[tokio::test]
    async fn test_connection_refused_is_a_failed_result() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let (specs, env) = local_specs(&format!("http://127.0.0.1:{}", port), "");
        let config = no_backoff();
        let client = build_client(&specs, &env, &config).unwrap();

        let result = run_probe(&client, &specs[0], &config).await;
        assert_eq!(result.code, 0);
        assert_eq!(result.main_result, MainResult::Failure);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Request to http://127.0.0.1:"));
        assert_eq!(probe_exit_code([&result]), 1);
    }

    #[tokio::test]
    async fn test_post_fields_are_sent_as_a_form() {
        let (base_url, seen) = serve(vec![]).await;
        let (specs, env) = local_specs(
            &base_url,
            "login.path = '/login'\nlogin.post = { user = '__USER__', note = 'a b&c' }\n",
        );
        let config = no_backoff();
        let client = build_client(&specs, &env, &config).unwrap();

        let result = run_probe(&client, &specs[0], &config).await;
        assert_eq!(result.code, 200);

        let seen = seen.lock().unwrap();
        assert!(seen[0].starts_with("POST /login HTTP/1.1"));
        assert!(seen[0]
            .to_ascii_lowercase()
            .contains("content-type: application/x-www-form-urlencoded"));
        assert!(seen[0].ends_with("user=package_checker&note=a+b%26c"));
    }
}
