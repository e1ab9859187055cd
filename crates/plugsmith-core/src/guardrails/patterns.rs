//! Fixed pattern tables used by the guardrail engine.
//!
//! Terms and regexes are compiled once on first use.

use super::types::Severity;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Banned terms, matched as case-insensitive substrings
pub const PROHIBITED_TERMS: &[&str] = &[
    "malware", "backdoor", "exploit", "hack", "phishing", "spam", "virus", "trojan",
];

/// Requests to switch off or get around security
pub const BYPASS_PATTERNS: &[&str] = &[
    r"(?i)bypass.*(?:admin|security|authentication)",
    r"(?i)disable.*(?:security|validation|checks)",
    r"(?i)backdoor.*(?:access|login|admin)",
    r"(?i)exploit.*(?:vulnerability|weakness)",
];

/// PHP functions that should not appear in generated code
pub const DANGEROUS_FUNCTIONS: &[&str] = &[
    "eval",
    "exec",
    "system",
    "shell_exec",
    "passthru",
    "proc_open",
    "popen",
    "file_get_contents",
    "file_put_contents",
    "fopen",
    "fwrite",
    "unlink",
    "rmdir",
    "mkdir",
    "chmod",
    "chown",
    "curl_exec",
];

/// Superglobal access or string interpolation flowing into SQL
pub const SQL_INJECTION_PATTERNS: &[&str] = &[
    r#"(?i)\$_(?:GET|POST|REQUEST|COOKIE)\[.*?\].*?(?:SELECT|INSERT|UPDATE|DELETE|DROP|CREATE|ALTER)"#,
    r#"(?i)mysql_query\s*\(\s*["'].*?\$"#,
    r#"(?i)query\s*\(\s*["'].*?\$"#,
];

/// Phrases that mean the agent reported a failure instead of producing output
pub const ERROR_PHRASE_PATTERNS: &[&str] = &[
    r"(?i)error.*occurred",
    r"(?i)failed.*to",
    r"(?i)unable.*to",
    r"(?i)invalid.*input",
];

fn compile_all(patterns: &[&'static str]) -> Vec<(&'static str, Regex)> {
    patterns
        .iter()
        .map(|p| (*p, Regex::new(p).expect("guardrail pattern is a compile-time constant")))
        .collect()
}

pub(crate) static BYPASS_REGEXES: LazyLock<Vec<(&'static str, Regex)>> =
    LazyLock::new(|| compile_all(BYPASS_PATTERNS));

pub(crate) static SQL_INJECTION_REGEXES: LazyLock<Vec<(&'static str, Regex)>> =
    LazyLock::new(|| compile_all(SQL_INJECTION_PATTERNS));

pub(crate) static ERROR_PHRASE_REGEXES: LazyLock<Vec<(&'static str, Regex)>> =
    LazyLock::new(|| compile_all(ERROR_PHRASE_PATTERNS));

pub(crate) static DANGEROUS_FUNCTION_REGEXES: LazyLock<Vec<(&'static str, Regex)>> =
    LazyLock::new(|| {
        DANGEROUS_FUNCTIONS
            .iter()
            .map(|func| {
                let re = Regex::new(&format!(r"(?i)\b{}\s*\(", func))
                    .expect("dangerous function name is a compile-time constant");
                (*func, re)
            })
            .collect()
    });

static PHP_OPEN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\?php").expect("PHP_OPEN_TAG is a compile-time constant"));

static ABSPATH_GUARD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)defined\s*\(\s*['"](?:ABSPATH|WPINC)['"]\s*\)"#)
        .expect("ABSPATH_GUARD is a compile-time constant")
});

static USER_CONTROLLED_INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(?:include|require)(?:_once)?\b\s*\(?\s*(?:\$_(?:GET|POST|REQUEST|COOKIE)|['"]\.\./)"#,
    )
    .expect("USER_CONTROLLED_INCLUDE is a compile-time constant")
});

static REQUEST_HANDLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:wp_ajax_|admin_post_)\w*")
        .expect("REQUEST_HANDLER is a compile-time constant")
});

static NONCE_CHECK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:wp_verify_nonce|check_ajax_referer|check_admin_referer)\s*\(")
        .expect("NONCE_CHECK is a compile-time constant")
});

static SUPERGLOBAL_ECHO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:echo|print)\s+\$_(?:GET|POST|REQUEST|COOKIE)")
        .expect("SUPERGLOBAL_ECHO is a compile-time constant")
});

static MENU_REGISTRATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\badd_(?:sub)?menu_page\s*\(")
        .expect("MENU_REGISTRATION is a compile-time constant")
});

static CAPABILITY_CHECK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcurrent_user_can\s*\(")
        .expect("CAPABILITY_CHECK is a compile-time constant")
});

/// 1-based line number of a byte offset
pub(crate) fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

/// Named WordPress security rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformCheck {
    /// PHP file without an `ABSPATH` guard
    MissingAbspath,
    /// include/require of a user-controlled or parent-relative path
    DirectFileAccess,
    /// AJAX or admin-post handler without a nonce check
    MissingNonce,
    /// Superglobal echoed without escaping
    UnsafeOutput,
    /// Admin menu registered without a capability check
    MissingCapability,
}

impl PlatformCheck {
    /// Every rule, in scan order
    pub const ALL: [PlatformCheck; 5] = [
        PlatformCheck::MissingAbspath,
        PlatformCheck::DirectFileAccess,
        PlatformCheck::MissingNonce,
        PlatformCheck::UnsafeOutput,
        PlatformCheck::MissingCapability,
    ];

    /// Rule name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PlatformCheck::MissingAbspath => "missing_abspath",
            PlatformCheck::DirectFileAccess => "direct_file_access",
            PlatformCheck::MissingNonce => "missing_nonce",
            PlatformCheck::UnsafeOutput => "unsafe_output",
            PlatformCheck::MissingCapability => "missing_capability",
        }
    }

    /// Severity of a hit
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            PlatformCheck::MissingAbspath | PlatformCheck::MissingNonce => Severity::Critical,
            _ => Severity::High,
        }
    }

    /// Canned remediation
    #[must_use]
    pub fn suggested_fix(&self) -> &'static str {
        match self {
            PlatformCheck::MissingAbspath => {
                "Add 'if (!defined('ABSPATH')) exit;' at the top of PHP files"
            }
            PlatformCheck::DirectFileAccess => "Use proper WordPress security checks",
            PlatformCheck::MissingNonce => {
                "Add wp_verify_nonce() verification for form submissions"
            }
            PlatformCheck::UnsafeOutput => {
                "Use WordPress escaping functions like esc_html() or esc_attr()"
            }
            PlatformCheck::MissingCapability => "Add current_user_can() capability checks",
        }
    }

    /// Human readable description of what was found
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            PlatformCheck::MissingAbspath => "PHP file can be requested directly",
            PlatformCheck::DirectFileAccess => "File inclusion from a request-controlled path",
            PlatformCheck::MissingNonce => "Request handler does not verify a nonce",
            PlatformCheck::UnsafeOutput => "Request data echoed without escaping",
            PlatformCheck::MissingCapability => {
                "Admin page registered without a capability check"
            }
        }
    }

    /// Line of the offending construct, or `None` when the rule holds
    #[must_use]
    pub fn detect(&self, code: &str) -> Option<usize> {
        let hit = match self {
            PlatformCheck::MissingAbspath => {
                if ABSPATH_GUARD.is_match(code) {
                    None
                } else {
                    PHP_OPEN_TAG.find(code)
                }
            }
            PlatformCheck::DirectFileAccess => USER_CONTROLLED_INCLUDE.find(code),
            PlatformCheck::MissingNonce => {
                if NONCE_CHECK.is_match(code) {
                    None
                } else {
                    REQUEST_HANDLER.find(code)
                }
            }
            PlatformCheck::UnsafeOutput => SUPERGLOBAL_ECHO.find(code),
            PlatformCheck::MissingCapability => {
                if CAPABILITY_CHECK.is_match(code) {
                    None
                } else {
                    MENU_REGISTRATION.find(code)
                }
            }
        };
        hit.map(|m| line_of(code, m.start()))
    }
}
