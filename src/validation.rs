//! Input validation and sanitization
//!
//! Usernames, group names and IPs end up inside shell command lines run by
//! [`crate::exec::ShellRunner`], and group names also become file names. They
//! are checked here before anything is composed.

use crate::error::{OcError, OcResult};
use std::net::IpAddr;

/// Maximum length for usernames and group names
const MAX_IDENTIFIER_LEN: usize = 64;

/// Maximum length for passwords handed to ocpasswd
const MAX_PASSWORD_LEN: usize = 256;

/// Maximum length for error messages shown to users
const MAX_ERROR_MESSAGE_LEN: usize = 500;

fn validate_identifier(kind: &str, name: &str, extra: &[char]) -> OcResult<()> {
    if name.is_empty() {
        return Err(OcError::InvalidParameter(format!("{} cannot be empty", kind)));
    }

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(OcError::InvalidParameter(format!(
            "{} too long (max {} characters)",
            kind, MAX_IDENTIFIER_LEN
        )));
    }

    // Shell metacharacters and whitespace never pass
    for c in name.chars() {
        if !c.is_ascii_alphanumeric() && !extra.contains(&c) {
            return Err(OcError::InvalidParameter(format!(
                "Invalid {} '{}': contains invalid character '{}'",
                kind.to_lowercase(),
                name,
                c
            )));
        }
    }

    // Would be read as an option
    if name.starts_with('-') {
        return Err(OcError::InvalidParameter(format!("{} cannot start with dash", kind)));
    }

    Ok(())
}

/// Validate a VPN username
///
/// Alphanumeric plus `.`, `_`, `-`, `@` and `+`, so e-mail style names pass.
pub fn validate_username(name: &str) -> OcResult<()> {
    validate_identifier("Username", name, &['.', '_', '-', '@', '+'])
}

/// Validate a group name, which is also a file name in the group directory
pub fn validate_group_name(name: &str) -> OcResult<()> {
    validate_identifier("Group name", name, &['.', '_', '-'])?;

    if name == "." || name == ".." {
        return Err(OcError::InvalidParameter(format!("Invalid group name '{}'", name)));
    }

    Ok(())
}

/// Validate IP address
pub fn validate_ip_address(addr: &str) -> OcResult<IpAddr> {
    addr.parse::<IpAddr>()
        .map_err(|_| OcError::InvalidParameter(format!("Invalid IP address: {}", addr)))
}

/// Validate a password before it is written to ocpasswd's stdin
///
/// ocpasswd reads the password and its confirmation as two lines, so line
/// breaks and other control characters are refused.
pub fn validate_password(password: &str) -> OcResult<()> {
    if password.is_empty() {
        return Err(OcError::InvalidParameter("Password cannot be empty".to_string()));
    }

    if password.len() > MAX_PASSWORD_LEN {
        return Err(OcError::InvalidParameter(format!(
            "Password too long (max {} characters)",
            MAX_PASSWORD_LEN
        )));
    }

    if password.chars().any(|c| c.is_control()) {
        return Err(OcError::InvalidParameter(
            "Password contains invalid control characters".to_string(),
        ));
    }

    Ok(())
}

/// Sanitize error messages to prevent information disclosure
pub fn sanitize_error_message(stderr: &str) -> String {
    let mut sanitized = stderr.trim().to_string();

    if sanitized.len() > MAX_ERROR_MESSAGE_LEN {
        let mut cut = MAX_ERROR_MESSAGE_LEN;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str("... (truncated)");
    }

    sanitized
}
