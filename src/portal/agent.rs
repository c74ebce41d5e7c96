//! Browser identities: the user-agent allow-list and the navigator fields
//! derived from a user-agent string.

use rand::seq::IndexedRandom;
use serde::Serialize;

/// Real browser user-agents. The launched Chromium pins one of these, so the
/// capabilities it negotiates stay consistent with what it claims to be.
pub const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/100.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/100.0.0 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (iPad; CPU OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1",
];

/// Pick a user-agent for a new identity.
pub fn assign_fingerprint() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Navigator fields a page would observe for a given user-agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fingerprint {
    pub user_agent: String,
    pub platform: String,
    pub vendor: String,
    pub vendor_sub: String,
    pub app_name: String,
    pub app_version: String,
    pub app_code_name: String,
    pub product: &'static str,
    pub product_sub: &'static str,
    pub do_not_track: &'static str,
}

/// One `key/value` token of a user-agent string.
#[derive(Debug, Default)]
struct Token<'a> {
    key: &'a str,
    value: &'a str,
}

impl<'a> Token<'a> {
    fn parse(raw: &'a str) -> Self {
        let mut parts = raw.split('/');
        Self {
            key: parts.next().unwrap_or_default(),
            value: parts.next().unwrap_or_default(),
        }
    }
}

/// Derive navigator fields from a user-agent string.
///
/// The string is split on single spaces; token 0 supplies the platform and
/// code name, token 1 the vendor, token 2 the app name and version. Missing
/// tokens yield empty fields; this never fails.
pub fn derive_fingerprint(user_agent: &str) -> Fingerprint {
    let tokens: Vec<Token<'_>> = user_agent.split(' ').map(Token::parse).collect();
    let token = |i: usize| tokens.get(i).map(|t| (t.key, t.value)).unwrap_or_default();

    let (first_key, _) = token(0);
    let (vendor, vendor_sub) = token(1);
    let (app_name, app_version) = token(2);

    Fingerprint {
        user_agent: user_agent.to_owned(),
        platform: if first_key.is_empty() {
            "Win32".to_owned()
        } else {
            first_key.to_owned()
        },
        vendor: vendor.to_owned(),
        vendor_sub: vendor_sub.to_owned(),
        app_name: app_name.to_owned(),
        app_version: app_version.to_owned(),
        app_code_name: first_key.to_owned(),
        product: "Gecko",
        product_sub: "20030107",
        do_not_track: "1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_fingerprint_from_allow_list() {
        for _ in 0..32 {
            assert!(USER_AGENTS.contains(&assign_fingerprint()));
        }
    }

    #[test]
    fn test_derive_fingerprint_windows_chrome() {
        let fp = derive_fingerprint(USER_AGENTS[0]);
        assert_eq!(fp.platform, "Mozilla");
        assert_eq!(fp.app_code_name, "Mozilla");
        // "(Windows" has no slash, so the vendor token is key-only
        assert_eq!(fp.vendor, "(Windows");
        assert_eq!(fp.vendor_sub, "");
        assert_eq!(fp.app_name, "NT");
        assert_eq!(fp.app_version, "");
        assert_eq!(fp.product, "Gecko");
    }

    #[test]
    fn test_derive_fingerprint_key_value_tokens() {
        let fp = derive_fingerprint("Mozilla/5.0 Vendor/2 App/3.1");
        assert_eq!(fp.platform, "Mozilla");
        assert_eq!(fp.vendor, "Vendor");
        assert_eq!(fp.vendor_sub, "2");
        assert_eq!(fp.app_name, "App");
        assert_eq!(fp.app_version, "3.1");
    }

    #[test]
    fn test_derive_fingerprint_deterministic() {
        for ua in USER_AGENTS {
            assert_eq!(derive_fingerprint(ua), derive_fingerprint(ua));
        }
    }

    #[test]
    fn test_derive_fingerprint_malformed_input() {
        let fp = derive_fingerprint("");
        assert_eq!(fp.platform, "Win32");
        assert_eq!(fp.app_code_name, "");
        assert_eq!(fp.vendor, "");
        assert_eq!(fp.vendor_sub, "");
        assert_eq!(fp.app_name, "");
        assert_eq!(fp.app_version, "");

        let fp = derive_fingerprint("garbage");
        assert_eq!(fp.platform, "garbage");
        assert_eq!(fp.vendor, "");
        assert_eq!(fp.app_version, "");
    }
}
