//! Session tokens, the startup PIN and device pairing.
//!
//! [`SessionRegistry`] is the single owner of every piece of authentication
//! state the server keeps:
//!
//! ```text
//!   tokens     Vec<SessionToken>                issued bearer tokens
//!   pairings   HashMap<Uuid, PairingRequest>    requests awaiting the operator
//!   pin        String                           4–6 digits, fixed per process
//!   pin_guard  HashMap<IpAddr, Vec<Instant>>    recent wrong PINs per address
//! ```
//!
//! The registry lives behind one `Mutex` in the server context.  Every method
//! takes the current [`Instant`] explicitly so that expiry, lockout and touch
//! behaviour can be tested without sleeping.
//!
//! # Token comparison
//!
//! Tokens are compared in constant time and the lookup always walks the whole
//! list, so the time a lookup takes does not reveal how much of a guessed
//! token was right or where in the list a match sits.
//!
//! # Expiry
//!
//! Nothing runs in the background here.  Expired tokens and stale pairing
//! requests are purged at the start of each lookup, and the server also calls
//! [`SessionRegistry::sweep`] periodically.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use rand::Rng;
use rein_core::protocol::sanitize::truncate_chars;
use rein_core::{ConnectionId, PairingSummary};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Longest stored device name or user agent.
const MAX_LABEL_CHARS: usize = 128;

/// Errors returned by registry operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The pairing request does not exist, has expired or was already resolved.
    #[error("Pairing request not found or expired")]
    NotFound,

    /// A privileged operation was attempted from a remote connection.
    #[error("Only localhost can {0}")]
    LocalOnly(&'static str),

    /// The presented PIN does not match.
    #[error("invalid PIN")]
    InvalidPin,

    /// Too many wrong PINs from this address.
    #[error("too many PIN attempts; retry in {retry_after_secs}s")]
    LockedOut { retry_after_secs: u64 },
}

/// Lifetimes and limits applied by the registry.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    /// A token unused for this long is purged.
    pub idle_ttl: Duration,
    /// A token older than this is purged even if it is in use.
    pub max_age: Duration,
    /// An unresolved pairing request expires after this long.
    pub pairing_ttl: Duration,
    /// Wrong PINs allowed per address inside `pin_window`.
    pub pin_attempts: usize,
    pub pin_window: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(12 * 60 * 60),
            max_age: Duration::from_secs(12 * 60 * 60),
            pairing_ttl: Duration::from_secs(5 * 60),
            pin_attempts: 5,
            pin_window: Duration::from_secs(60),
        }
    }
}

/// One issued bearer token.
#[derive(Debug, Clone)]
pub struct SessionToken {
    token: String,
    created_at: Instant,
    last_used: Instant,
    origin: Option<IpAddr>,
}

impl SessionToken {
    pub fn origin(&self) -> Option<IpAddr> {
        self.origin
    }
}

/// Lifecycle of a pairing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingStatus {
    Pending,
    Approved,
    Rejected,
}

/// A device asking the operator for a token.
#[derive(Debug, Clone)]
pub struct PairingRequest {
    pub id: Uuid,
    /// Connection that asked; it receives the outcome.
    pub connection: ConnectionId,
    pub device_name: String,
    pub user_agent: String,
    pub status: PairingStatus,
    pub created_at: Instant,
}

impl PairingRequest {
    fn summary(&self, now: Instant) -> PairingSummary {
        PairingSummary {
            request_id: self.id.to_string(),
            device_name: self.device_name.clone(),
            user_agent: self.user_agent.clone(),
            age_secs: now.saturating_duration_since(self.created_at).as_secs(),
        }
    }
}

/// Owner of tokens, pairing requests and the PIN.
#[derive(Debug)]
pub struct SessionRegistry {
    policy: SessionPolicy,
    tokens: Vec<SessionToken>,
    pairings: HashMap<Uuid, PairingRequest>,
    pin: String,
    pin_guard: HashMap<IpAddr, Vec<Instant>>,
}

impl SessionRegistry {
    pub fn new(policy: SessionPolicy, pin: String) -> Self {
        Self {
            policy,
            tokens: Vec::new(),
            pairings: HashMap::new(),
            pin,
            pin_guard: HashMap::new(),
        }
    }

    /// The PIN remote devices may exchange for a token.
    pub fn pin(&self) -> &str {
        &self.pin
    }

    // ── Tokens ────────────────────────────────────────────────────────────────

    /// Mints a new token.
    pub fn issue_token(&mut self, origin: Option<IpAddr>, now: Instant) -> String {
        self.purge_tokens(now);
        let token = Uuid::new_v4().to_string();
        self.tokens.push(SessionToken {
            token: token.clone(),
            created_at: now,
            last_used: now,
            origin,
        });
        info!(active = self.tokens.len(), "session token issued");
        token
    }

    /// Returns the newest still-valid token, minting one if none exists.
    ///
    /// Repeated `generate-token` requests therefore hand out the same token
    /// until it expires.
    pub fn current_or_issue(&mut self, now: Instant) -> String {
        self.purge_tokens(now);
        match self.tokens.iter().max_by_key(|t| t.created_at) {
            Some(newest) => newest.token.clone(),
            None => self.issue_token(None, now),
        }
    }

    /// Returns `true` if `candidate` is a live token.
    pub fn validate_token(&mut self, candidate: &str, now: Instant) -> bool {
        self.purge_tokens(now);
        self.find_index(candidate).is_some()
    }

    /// Refreshes the last-used time of `candidate`.
    ///
    /// Returns `false` if the token is no longer valid.
    pub fn touch(&mut self, candidate: &str, now: Instant) -> bool {
        self.purge_tokens(now);
        match self.find_index(candidate) {
            Some(i) => {
                self.tokens[i].last_used = now;
                true
            }
            None => false,
        }
    }

    /// Removes `candidate`.  Returns `true` if it existed.
    pub fn revoke(&mut self, candidate: &str) -> bool {
        match self.find_index(candidate) {
            Some(i) => {
                self.tokens.swap_remove(i);
                true
            }
            None => false,
        }
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    fn find_index(&self, candidate: &str) -> Option<usize> {
        // Walk every entry; no early exit.
        let mut found = None;
        for (i, entry) in self.tokens.iter().enumerate() {
            if constant_time_eq(entry.token.as_bytes(), candidate.as_bytes()) {
                found = Some(i);
            }
        }
        found
    }

    fn purge_tokens(&mut self, now: Instant) {
        let policy = self.policy;
        let before = self.tokens.len();
        self.tokens.retain(|t| {
            now.saturating_duration_since(t.last_used) <= policy.idle_ttl
                && now.saturating_duration_since(t.created_at) <= policy.max_age
        });
        let purged = before - self.tokens.len();
        if purged > 0 {
            debug!(purged, "expired session tokens purged");
        }
    }

    // ── PIN ───────────────────────────────────────────────────────────────────

    /// Exchanges a PIN for a fresh token.
    ///
    /// # Errors
    ///
    /// - [`SessionError::LockedOut`] if `ip` already used up its attempts.
    /// - [`SessionError::InvalidPin`] if the PIN is wrong; the attempt is counted.
    pub fn verify_pin(
        &mut self,
        ip: IpAddr,
        candidate: &str,
        now: Instant,
    ) -> Result<String, SessionError> {
        let window = self.policy.pin_window;
        let failures = self.pin_guard.entry(ip).or_default();
        failures.retain(|t| now.saturating_duration_since(*t) < window);

        if failures.len() >= self.policy.pin_attempts {
            let oldest = failures.iter().min().copied().unwrap_or(now);
            let retry = window.saturating_sub(now.saturating_duration_since(oldest));
            warn!(%ip, "PIN attempt while locked out");
            return Err(SessionError::LockedOut {
                retry_after_secs: retry.as_secs().max(1),
            });
        }

        if !constant_time_eq(candidate.trim().as_bytes(), self.pin.as_bytes()) {
            failures.push(now);
            warn!(%ip, failures = failures.len(), "wrong PIN");
            return Err(SessionError::InvalidPin);
        }

        self.pin_guard.remove(&ip);
        Ok(self.issue_token(Some(ip), now))
    }

    // ── Pairing ───────────────────────────────────────────────────────────────

    /// Records a new pending request from `connection` and returns it.
    ///
    /// A connection has at most one pending request; an earlier one is
    /// replaced.
    pub fn open_pairing(
        &mut self,
        connection: ConnectionId,
        device_name: Option<String>,
        user_agent: Option<String>,
        now: Instant,
    ) -> PairingRequest {
        self.sweep_pairings(now);
        let before = self.pairings.len();
        self.pairings
            .retain(|_, r| r.connection != connection || r.status != PairingStatus::Pending);
        if self.pairings.len() < before {
            debug!(%connection, "earlier pairing request replaced");
        }
        let request = PairingRequest {
            id: Uuid::new_v4(),
            connection,
            device_name: label(device_name, "Unknown Device"),
            user_agent: label(user_agent, "Unknown"),
            status: PairingStatus::Pending,
            created_at: now,
        };
        self.pairings.insert(request.id, request.clone());
        info!(request_id = %request.id, %connection, "pairing requested");
        request
    }

    /// Approves a pending request and mints its token.
    ///
    /// Returns the requesting connection and the new token.
    pub fn approve_pairing(
        &mut self,
        id: &str,
        now: Instant,
    ) -> Result<(ConnectionId, String), SessionError> {
        let connection = self.resolve(id, PairingStatus::Approved, now)?;
        let token = self.issue_token(None, now);
        Ok((connection, token))
    }

    /// Rejects a pending request.  Returns the requesting connection.
    pub fn reject_pairing(&mut self, id: &str, now: Instant) -> Result<ConnectionId, SessionError> {
        self.resolve(id, PairingStatus::Rejected, now)
    }

    /// Pending requests, oldest first.
    pub fn pending_pairings(&mut self, now: Instant) -> Vec<PairingSummary> {
        self.sweep_pairings(now);
        let mut pending: Vec<&PairingRequest> = self
            .pairings
            .values()
            .filter(|r| r.status == PairingStatus::Pending)
            .collect();
        pending.sort_by_key(|r| r.created_at);
        pending.into_iter().map(|r| r.summary(now)).collect()
    }

    /// Whether `connection` has a request awaiting a decision.
    pub fn has_pending_pairing(&self, connection: ConnectionId) -> bool {
        self.pairings
            .values()
            .any(|r| r.connection == connection && r.status == PairingStatus::Pending)
    }

    /// Forgets every request opened by `connection`.
    pub fn drop_pairings_for(&mut self, connection: ConnectionId) {
        self.pairings.retain(|_, r| r.connection != connection);
    }

    /// Purges expired tokens, stale pairing requests and old PIN failures.
    pub fn sweep(&mut self, now: Instant) {
        self.purge_tokens(now);
        self.sweep_pairings(now);
        let window = self.policy.pin_window;
        self.pin_guard.retain(|_, failures| {
            failures.retain(|t| now.saturating_duration_since(*t) < window);
            !failures.is_empty()
        });
    }

    fn resolve(
        &mut self,
        id: &str,
        outcome: PairingStatus,
        now: Instant,
    ) -> Result<ConnectionId, SessionError> {
        self.sweep_pairings(now);
        let id = Uuid::parse_str(id).map_err(|_| SessionError::NotFound)?;
        let request = self
            .pairings
            .get_mut(&id)
            .filter(|r| r.status == PairingStatus::Pending)
            .ok_or(SessionError::NotFound)?;
        request.status = outcome;
        info!(request_id = %id, ?outcome, "pairing resolved");
        Ok(request.connection)
    }

    fn sweep_pairings(&mut self, now: Instant) {
        let ttl = self.policy.pairing_ttl;
        self.pairings
            .retain(|_, r| now.saturating_duration_since(r.created_at) <= ttl);
    }
}

/// Generates a PIN of 4 to 6 decimal digits, zero-padded.
pub fn generate_pin<R: Rng>(rng: &mut R) -> String {
    let len: u32 = rng.gen_range(4..=6);
    let value: u32 = rng.gen_range(0..10u32.pow(len));
    format!("{value:0width$}", width = len as usize)
}

/// Byte comparison whose duration depends only on the lengths.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let diff = a
        .iter()
        .zip(b)
        .fold(0u8, |acc, (x, y)| acc | std::hint::black_box(x ^ y));
    diff == 0
}

fn label(value: Option<String>, fallback: &str) -> String {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => truncate_chars(v, MAX_LABEL_CHARS),
        _ => fallback.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
