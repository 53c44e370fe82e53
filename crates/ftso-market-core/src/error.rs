//! Shared error taxonomy (spec §3 "Classified error").

use crate::feed::FeedId;
use std::time::Instant;

/// Source preference partition (GLOSSARY: Tier 1 / Tier 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SourceTier {
    /// First-class custom adapter.
    Tier1,
    /// CCXT-backed alternative for the same underlying exchange.
    Tier2,
}

impl SourceTier {
    /// Derives tier from a source identifier: CCXT-prefixed ids are Tier2,
    /// everything else is treated as a Tier1 custom adapter.
    pub fn from_source_id(source_id: &str) -> Self {
        if source_id.starts_with("ccxt-") || source_id.starts_with("ccxt:") {
            SourceTier::Tier2
        } else {
            SourceTier::Tier1
        }
    }
}

/// Error classification (spec §3, §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorClassification {
    Connection,
    Validation,
    Timeout,
    RateLimit,
    Authentication,
    Exchange,
    Parsing,
    StaleData,
}

impl ErrorClassification {
    /// Whether this classification is recoverable by default (spec §4.5,
    /// §7): authentication, validation, and parsing errors are not.
    pub fn default_recoverable(self) -> bool {
        !matches!(
            self,
            ErrorClassification::Authentication | ErrorClassification::Validation
        )
    }

    /// Classifies an error from its message using the heuristics in spec §3.
    /// `data_age_ms`, when present, lets a caller flag stale data the way
    /// the tiered error handler does (`dataAge > 2000ms ⇒ STALE_DATA`).
    pub fn classify(message: &str, data_age_ms: Option<u64>) -> Self {
        if let Some(age) = data_age_ms {
            if age > 2000 {
                return ErrorClassification::StaleData;
            }
        }

        let m = message.to_lowercase();
        if m.contains("auth") || m.contains("unauthorized") || m.contains("forbidden") {
            ErrorClassification::Authentication
        } else if m.contains("rate limit") || m.contains("too many requests") {
            ErrorClassification::RateLimit
        } else if m.contains("timeout") || m.contains("timed out") {
            ErrorClassification::Timeout
        } else if m.contains("connection")
            || m.contains("econnreset")
            || m.contains("enotfound")
            || m.contains("network")
        {
            ErrorClassification::Connection
        } else if m.contains("parse") || m.contains("invalid json") || m.contains("malformed") {
            ErrorClassification::Parsing
        } else if m.contains("invalid") || m.contains("validation") || m.contains("not found") {
            ErrorClassification::Validation
        } else {
            ErrorClassification::Exchange
        }
    }
}

/// Severity (spec §3): an output of classification plus recent-error
/// frequency, never a caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    fn base_for(classification: ErrorClassification) -> Self {
        match classification {
            ErrorClassification::Authentication => ErrorSeverity::High,
            ErrorClassification::Connection | ErrorClassification::Timeout => {
                ErrorSeverity::Medium
            }
            ErrorClassification::RateLimit => ErrorSeverity::Medium,
            ErrorClassification::StaleData => ErrorSeverity::Medium,
            ErrorClassification::Exchange => ErrorSeverity::Medium,
            ErrorClassification::Validation | ErrorClassification::Parsing => ErrorSeverity::Low,
        }
    }

    /// Escalates a base severity using the count of errors from the same
    /// source in the last 5 minutes (spec §4.5): 3 recent errors escalate
    /// one level, 5 escalate straight to critical.
    pub fn escalate(classification: ErrorClassification, recent_error_count: usize) -> Self {
        let base = Self::base_for(classification);
        if recent_error_count >= 5 {
            ErrorSeverity::Critical
        } else if recent_error_count >= 3 {
            base.one_level_up()
        } else {
            base
        }
    }

    fn one_level_up(self) -> Self {
        match self {
            ErrorSeverity::Low => ErrorSeverity::Medium,
            ErrorSeverity::Medium => ErrorSeverity::High,
            ErrorSeverity::High | ErrorSeverity::Critical => ErrorSeverity::Critical,
        }
    }
}

/// A classified error as it flows into the tiered error handler.
#[derive(Debug, Clone)]
pub struct ClassifiedError {
    pub source_id: String,
    pub tier: SourceTier,
    pub classification: ErrorClassification,
    pub severity: ErrorSeverity,
    pub recoverable: bool,
    pub timestamp: Instant,
    pub feed_id: Option<FeedId>,
    pub message: String,
}

impl ClassifiedError {
    /// Builds a classified error from a raw message and context, applying
    /// the classification, severity-escalation, and recoverability rules
    /// from spec §3/§4.5.
    pub fn classify(
        source_id: impl Into<String>,
        message: impl Into<String>,
        feed_id: Option<FeedId>,
        data_age_ms: Option<u64>,
        recent_error_count: usize,
    ) -> Self {
        let source_id = source_id.into();
        let message = message.into();
        let classification = ErrorClassification::classify(&message, data_age_ms);
        let severity = ErrorSeverity::escalate(classification, recent_error_count);
        Self {
            tier: SourceTier::from_source_id(&source_id),
            source_id,
            classification,
            severity,
            recoverable: classification.default_recoverable(),
            timestamp: Instant::now(),
            feed_id,
            message,
        }
    }
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:?}/{:?}] {} ({})",
            self.classification, self.severity, self.message, self.source_id
        )
    }
}

impl std::error::Error for ClassifiedError {}
