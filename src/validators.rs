//! Input validation for text that is handed to nft
//!
//! nft parses whatever it receives, so these checks only reject input that
//! can never be a valid command or object reference: empty text, embedded
//! NUL bytes, oversized buffers, and names the kernel would refuse.

use crate::core::schema::Family;

/// Upper bound for a single command buffer.
pub const MAX_COMMAND_LEN: usize = 16 * 1024 * 1024;

/// Kernel limit for table, chain, set and object names (`NFT_NAME_MAXLEN - 1`).
pub const MAX_OBJECT_NAME_LEN: usize = 255;

/// Validates free-form command text before it is sent to nft.
///
/// # Errors
///
/// Returns `Err` if the text is blank, contains a NUL byte, or exceeds
/// [`MAX_COMMAND_LEN`].
///
/// # Examples
///
/// ```
/// use nftjson::validators::validate_command_text;
///
/// assert!(validate_command_text("list ruleset").is_ok());
/// assert!(validate_command_text("   ").is_err());
/// assert!(validate_command_text("list\0ruleset").is_err());
/// ```
pub fn validate_command_text(input: &str) -> Result<(), String> {
    if input.trim().is_empty() {
        return Err("Command is empty".to_string());
    }

    if input.len() > MAX_COMMAND_LEN {
        return Err(format!(
            "Command too long ({} bytes, max {MAX_COMMAND_LEN})",
            input.len()
        ));
    }

    // nft reads the buffer as a C string
    if input.contains('\0') {
        return Err("Command contains a NUL byte".to_string());
    }

    Ok(())
}

/// Validates a table, chain or object name.
///
/// # Errors
///
/// Returns `Err` if the name is empty, longer than [`MAX_OBJECT_NAME_LEN`]
/// bytes, or contains control characters.
pub fn validate_object_name(name: &str) -> Result<String, String> {
    if name.is_empty() {
        return Err("Name is empty".to_string());
    }

    if name.len() > MAX_OBJECT_NAME_LEN {
        return Err(format!(
            "Name too long (max {MAX_OBJECT_NAME_LEN} bytes)"
        ));
    }

    if name.chars().any(char::is_control) {
        return Err("Name contains control characters".to_string());
    }

    Ok(name.to_string())
}

/// Parses an address family name (`ip`, `ip6`, `inet`, `arp`, `bridge`, `netdev`).
///
/// # Errors
///
/// Returns `Err` listing the accepted families.
pub fn validate_family(name: &str) -> Result<Family, String> {
    name.trim().to_lowercase().parse::<Family>().map_err(|_| {
        use strum::IntoEnumIterator;
        let known: Vec<String> = Family::iter().map(|f| f.to_string()).collect();
        format!("Unknown family '{name}' (expected one of: {})", known.join(", "))
    })
}
