//! Credential login against the portal's form endpoint.

use crate::portal::PortalUrls;
use crate::portal::errors::PortalError;
use crate::session::{Credentials, IdentityKey, SessionStore};
use html_scraper::{Html, Selector};
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

static FEEDBACK_ALERT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".feedback-alert").unwrap());

const INVALID_CODE: &str = "Invalid";
const INVALID_EXPANDED: &str =
    "Invalid username or password provided. CAPTCHA may also have failed to complete.";

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";

/// Why the portal turned a login away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRejection {
    pub code: String,
    pub expanded: String,
}

/// Result of one login POST. Cookies are kept even when the login was rejected.
#[derive(custom_debug_derive::Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub user_agent: String,
    #[debug(with = "crate::fmt::redacted")]
    pub cookies: String,
    pub rejection: Option<LoginRejection>,
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        self.rejection.is_none()
    }

    /// Convert a rejection into [`PortalError::InvalidCredentials`].
    pub fn into_result(self) -> Result<Self, PortalError> {
        match self.rejection {
            Some(LoginRejection { code, expanded }) => Err(PortalError::InvalidCredentials {
                code,
                message: expanded,
                cookies: self.cookies,
            }),
            None => Ok(self),
        }
    }
}

/// Decide whether a login response body is a rejection.
///
/// The portal always renders one feedback alert container; a second one means
/// it complained about the credentials (or the challenge token).
pub fn classify_login_response(body: &str) -> Option<LoginRejection> {
    let document = Html::parse_document(body);
    let alerts = document.select(&FEEDBACK_ALERT).count();
    debug!(alerts, "login response feedback alerts");
    (alerts > 1).then(|| LoginRejection {
        code: INVALID_CODE.to_owned(),
        expanded: INVALID_EXPANDED.to_owned(),
    })
}

/// Join every `Set-Cookie` header value, unparsed.
fn collect_set_cookies(headers: &HeaderMap) -> String {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ")
}

fn login_form<'a>(username: &'a str, password: &'a str) -> [(&'static str, &'a str); 12] {
    [
        ("dbpw", "t"),
        ("translator_username", ""),
        ("translator_password", ""),
        ("translator_ldappassword", ""),
        ("returnUrl", ""),
        ("serviceName", "PS Parent Portal"),
        ("serviceTicket", ""),
        ("pcasServerUrl", "/"),
        ("credentialType", "User Id and Password Credential"),
        ("account", username),
        ("pw", password),
        ("translatorpw", ""),
    ]
}

/// Posts credentials with an identity's challenge cookie and user-agent.
#[derive(Clone)]
pub struct Authenticator {
    http: reqwest::Client,
    urls: PortalUrls,
    store: SessionStore,
}

impl Authenticator {
    pub fn new(urls: PortalUrls, store: SessionStore, timeout: Duration) -> Result<Self, PortalError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            // the login response's own Set-Cookie headers are the session
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(PortalError::upstream)?;
        Ok(Self { http, urls, store })
    }

    /// Log in once. No retries; a rejection comes back as `Ok` with
    /// [`LoginOutcome::rejection`] set.
    pub async fn login(
        &self,
        challenge_cookie: &str,
        username: &str,
        password: &str,
        identity: &IdentityKey,
    ) -> Result<LoginOutcome, PortalError> {
        let user_agent = self.store.user_agent_for(identity);
        let headers = self.login_headers(&user_agent, challenge_cookie)?;

        let response = self
            .http
            .post(self.urls.login_post())
            .headers(headers)
            .form(&login_form(username, password))
            .send()
            .await
            .map_err(PortalError::upstream)?;

        let status = response.status();
        let cookies = collect_set_cookies(response.headers());
        let body = response.text().await.map_err(PortalError::upstream)?;
        debug!(identity = %identity, %status, body_len = body.len(), "login response received");

        self.store
            .record_credentials(identity, Credentials::new(username, password));

        let rejection = classify_login_response(&body);
        match &rejection {
            Some(rejection) => {
                warn!(identity = %identity, code = %rejection.code, "portal rejected login");
            }
            None => {
                info!(identity = %identity, "portal login accepted");
                self.store.record_session(
                    identity,
                    &user_agent,
                    format!("{challenge_cookie}; {cookies}"),
                );
            }
        }

        Ok(LoginOutcome {
            user_agent,
            cookies,
            rejection,
        })
    }

    fn login_headers(&self, user_agent: &str, cookie: &str) -> Result<HeaderMap, PortalError> {
        let value = |v: &str| HeaderValue::from_str(v).map_err(PortalError::upstream);

        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, value(user_agent)?);
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(
            header::UPGRADE_INSECURE_REQUESTS,
            HeaderValue::from_static("1"),
        );
        headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
        headers.insert("sec-ch-ua-platform", HeaderValue::from_static("\"Windows\""));
        headers.insert(header::REFERER, value(&self.urls.landing())?);
        headers.insert(header::COOKIE, value(cookie)?);
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(alerts: usize) -> String {
        let alerts = "<div class=\"feedback-alert\">Invalid Username or Password!</div>".repeat(alerts);
        format!("<html><body><form id=\"LoginForm\">{alerts}</form></body></html>")
    }

    /// Serve `body` with two `Set-Cookie` headers at the guardian login target.
    async fn serve_login(body: String) -> PortalUrls {
        use axum::body::Body;
        use axum::http::Response;

        let app = axum::Router::new().route(
            "/guardian/home.html",
            axum::routing::post(move || {
                let body = body.clone();
                async move {
                    Response::builder()
                        .header(header::SET_COOKIE, "JSESSIONID=abc; Path=/")
                        .header(header::SET_COOKIE, "psaid=xyz")
                        .body(Body::from(body))
                        .unwrap()
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        PortalUrls::with_origin(format!("http://{addr}"), true)
    }

    #[tokio::test]
    async fn test_login_rejection_keeps_cookies_and_credentials() {
        let urls = serve_login(page(2)).await;
        let store = SessionStore::new(4);
        let auth = Authenticator::new(urls, store.clone(), Duration::from_secs(5)).unwrap();
        let id = IdentityKey::new("10.0.0.9");

        let outcome = auth
            .login("reese84=token", "student", "wrong", &id)
            .await
            .unwrap();

        let rejection = outcome.rejection.clone().expect("two alerts reject");
        assert_eq!(rejection.code, "Invalid");
        assert_eq!(outcome.cookies, "JSESSIONID=abc; Path=/; psaid=xyz");

        let entry = store.peek(&id).unwrap();
        let credentials = entry.credentials.expect("credentials recorded on rejection");
        assert_eq!(credentials.username, "student");
        assert_eq!(credentials.password, "wrong");
        assert!(entry.session_cookie.is_none());
        assert_eq!(outcome.user_agent, entry.user_agent);
    }

    #[tokio::test]
    async fn test_login_success_records_session() {
        let urls = serve_login(page(1)).await;
        let store = SessionStore::new(4);
        let auth = Authenticator::new(urls, store.clone(), Duration::from_secs(5)).unwrap();
        let id = IdentityKey::new("10.0.0.10");

        let outcome = auth
            .login("reese84=token", "student", "right", &id)
            .await
            .unwrap();
        assert!(outcome.is_success());

        let entry = store.peek(&id).unwrap();
        assert!(entry.credentials.is_some());
        assert_eq!(
            entry.session_cookie.as_deref(),
            Some("reese84=token; JSESSIONID=abc; Path=/; psaid=xyz")
        );
    }

    #[test]
    fn test_two_alerts_is_rejection() {
        let rejection = classify_login_response(&page(2)).unwrap();
        assert_eq!(rejection.code, "Invalid");
        assert!(rejection.expanded.starts_with("Invalid username or password provided."));
    }

    #[test]
    fn test_zero_or_one_alert_is_success() {
        assert!(classify_login_response(&page(0)).is_none());
        assert!(classify_login_response(&page(1)).is_none());
    }

    #[test]
    fn test_rejection_keeps_cookies() {
        let outcome = LoginOutcome {
            user_agent: "ua".to_owned(),
            cookies: "JSESSIONID=abc; Path=/".to_owned(),
            rejection: classify_login_response(&page(3)),
        };
        assert!(!outcome.is_success());
        match outcome.into_result() {
            Err(PortalError::InvalidCredentials { code, cookies, .. }) => {
                assert_eq!(code, "Invalid");
                assert_eq!(cookies, "JSESSIONID=abc; Path=/");
            }
            other => panic!("expected InvalidCredentials, got {other:?}"),
        }
    }

    #[test]
    fn test_set_cookies_joined_verbatim() {
        let mut headers = HeaderMap::new();
        headers.append(header::SET_COOKIE, HeaderValue::from_static("JSESSIONID=abc; Path=/"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("psaid=xyz"));
        assert_eq!(collect_set_cookies(&headers), "JSESSIONID=abc; Path=/; psaid=xyz");
        assert_eq!(collect_set_cookies(&HeaderMap::new()), "");
    }

    #[test]
    fn test_login_form_payload() {
        let form = login_form("student", "hunter2");
        assert!(form.contains(&("account", "student")));
        assert!(form.contains(&("pw", "hunter2")));
        assert!(form.contains(&("serviceName", "PS Parent Portal")));
        assert!(form.contains(&("credentialType", "User Id and Password Credential")));
    }
}
