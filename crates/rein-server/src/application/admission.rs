//! Upgrade-time admission: who is connecting, and what may they do?
//!
//! Runs once per WebSocket handshake, before any message is exchanged.
//!
//! | Peer / URL                     | Outcome                                     |
//! |--------------------------------|---------------------------------------------|
//! | path other than `/ws`          | HTTP 404                                    |
//! | loopback                       | `Local`                                     |
//! | `?pin=` correct                | `TokenAuthenticated`, token sent to device  |
//! | `?pin=` wrong                  | HTTP 401                                    |
//! | `?pin=` after 5 misses / 60 s  | HTTP 429                                    |
//! | `?token=` not a UUID           | HTTP 401                                    |
//! | `?token=` known                | `TokenAuthenticated`                        |
//! | `?token=` unknown, or none     | `Unauthenticated` (may request pairing)     |

use std::net::IpAddr;
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{Admission, SessionError, SessionRegistry};

/// Length of a hyphenated UUID, the only token shape ever issued.
const TOKEN_LEN: usize = 36;

/// Result of the admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeDecision {
    /// Complete the handshake.
    Accept {
        admission: Admission,
        /// A token minted from a PIN, to be sent as `token-generated`.
        issued_token: Option<String>,
    },
    /// Refuse the handshake with this HTTP status.
    Reject { status: u16, reason: &'static str },
}

/// Whether `ip` is this machine, including IPv4-mapped IPv6 loopback.
pub fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback(),
        IpAddr::V6(v6) => {
            v6.is_loopback() || v6.to_ipv4_mapped().map_or(false, |v4| v4.is_loopback())
        }
    }
}

/// Decides whether and how to admit an upgrade request.
pub fn decide_upgrade(
    sessions: &mut SessionRegistry,
    ws_path: &str,
    path: &str,
    query: Option<&str>,
    peer: IpAddr,
    now: Instant,
) -> UpgradeDecision {
    if path != ws_path {
        debug!(%peer, path, "upgrade on unknown path");
        return UpgradeDecision::Reject {
            status: 404,
            reason: "Not Found",
        };
    }

    if is_loopback(peer) {
        return UpgradeDecision::Accept {
            admission: Admission::local(),
            issued_token: None,
        };
    }

    let (token, pin) = credentials(query);

    if let Some(pin) = pin {
        return match sessions.verify_pin(peer, &pin, now) {
            Ok(token) => {
                info!(%peer, "device authenticated with PIN");
                UpgradeDecision::Accept {
                    admission: Admission::with_token(token.clone()),
                    issued_token: Some(token),
                }
            }
            Err(SessionError::LockedOut { .. }) => UpgradeDecision::Reject {
                status: 429,
                reason: "Too Many Requests",
            },
            Err(_) => UpgradeDecision::Reject {
                status: 401,
                reason: "Unauthorized",
            },
        };
    }

    match token {
        Some(token) if token.len() != TOKEN_LEN || Uuid::parse_str(&token).is_err() => {
            warn!(%peer, "malformed token on upgrade");
            UpgradeDecision::Reject {
                status: 401,
                reason: "Unauthorized",
            }
        }
        Some(token) if sessions.touch(&token, now) => UpgradeDecision::Accept {
            admission: Admission::with_token(token),
            issued_token: None,
        },
        Some(_) => {
            debug!(%peer, "unknown token; admitting unauthenticated");
            UpgradeDecision::Accept {
                admission: Admission::unauthenticated(),
                issued_token: None,
            }
        }
        None => UpgradeDecision::Accept {
            admission: Admission::unauthenticated(),
            issued_token: None,
        },
    }
}

/// Extracts `token` and `pin` from a query string.
fn credentials(query: Option<&str>) -> (Option<String>, Option<String>) {
    let mut token = None;
    let mut pin = None;
    if let Some(query) = query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "token" if !value.is_empty() => token = Some(value.into_owned()),
                "pin" if !value.is_empty() => pin = Some(value.into_owned()),
                _ => {}
            }
        }
    }
    (token, pin)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AdmissionState, SessionPolicy};
    use std::net::{Ipv4Addr, Ipv6Addr};

    const REMOTE: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 40));

    fn registry() -> SessionRegistry {
        SessionRegistry::new(SessionPolicy::default(), "123456".into())
    }

    fn decide(reg: &mut SessionRegistry, path: &str, query: Option<&str>, peer: IpAddr) -> UpgradeDecision {
        decide_upgrade(reg, "/ws", path, query, peer, Instant::now())
    }

    fn state_of(decision: &UpgradeDecision) -> Option<AdmissionState> {
        match decision {
            UpgradeDecision::Accept { admission, .. } => Some(admission.state),
            UpgradeDecision::Reject { .. } => None,
        }
    }

    #[test]
    fn test_loopback_forms() {
        assert!(is_loopback(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert!(is_loopback(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert!(is_loopback(IpAddr::V6(Ipv4Addr::LOCALHOST.to_ipv6_mapped())));
        assert!(!is_loopback(REMOTE));
    }

    #[test]
    fn test_wrong_path_is_404() {
        let mut reg = registry();
        assert_eq!(
            decide(&mut reg, "/socket", None, REMOTE),
            UpgradeDecision::Reject { status: 404, reason: "Not Found" }
        );
    }

    #[test]
    fn test_loopback_is_local_even_with_bad_token() {
        let mut reg = registry();
        let d = decide(&mut reg, "/ws", Some("token=garbage"), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(state_of(&d), Some(AdmissionState::Local));
    }

    #[test]
    fn test_known_token_authenticates() {
        // Arrange
        let mut reg = registry();
        let token = reg.issue_token(None, Instant::now());

        // Act
        let d = decide(&mut reg, "/ws", Some(&format!("token={token}")), REMOTE);

        // Assert
        assert_eq!(state_of(&d), Some(AdmissionState::TokenAuthenticated));
    }

    #[test]
    fn test_malformed_token_is_401() {
        let mut reg = registry();
        let d = decide(&mut reg, "/ws", Some("token=abc"), REMOTE);
        assert!(matches!(d, UpgradeDecision::Reject { status: 401, .. }));
    }

    #[test]
    fn test_unknown_wellformed_token_is_unauthenticated() {
        let mut reg = registry();
        let query = format!("token={}", Uuid::new_v4());
        let d = decide(&mut reg, "/ws", Some(&query), REMOTE);
        assert_eq!(state_of(&d), Some(AdmissionState::Unauthenticated));
    }

    #[test]
    fn test_pin_issues_token() {
        let mut reg = registry();
        let d = decide(&mut reg, "/ws", Some("pin=123456"), REMOTE);
        match d {
            UpgradeDecision::Accept { admission, issued_token: Some(token) } => {
                assert_eq!(admission.token.as_deref(), Some(token.as_str()));
                assert!(reg.validate_token(&token, Instant::now()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_wrong_pin_is_401_then_429() {
        let mut reg = registry();
        for _ in 0..5 {
            let d = decide(&mut reg, "/ws", Some("pin=000000"), REMOTE);
            assert!(matches!(d, UpgradeDecision::Reject { status: 401, .. }));
        }
        let d = decide(&mut reg, "/ws", Some("pin=123456"), REMOTE);
        assert!(matches!(d, UpgradeDecision::Reject { status: 429, .. }));
    }

    #[test]
    fn test_credentials_are_url_decoded() {
        let (token, pin) = credentials(Some("x=1&token=a%2Db&pin=%2012"));
        assert_eq!(token.as_deref(), Some("a-b"));
        assert_eq!(pin.as_deref(), Some(" 12"));
    }
}
