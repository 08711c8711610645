/// PII redaction utilities for logging
///
/// Masks traveler details (emails, names, record locators) so logs stay
/// useful for debugging without carrying who flew where.

/// Redact an email address, keeping domain visible.
/// Example: "user@example.com" -> "u***@example.com"
pub fn email(email: &str) -> String {
    if let Some(at_pos) = email.find('@') {
        if at_pos == 0 {
            return email.to_string();
        }
        let local = &email[..at_pos];
        let domain = &email[at_pos..];

        // Use chars to properly handle unicode
        let mut chars = local.chars();
        if let Some(first_char) = chars.next() {
            if chars.next().is_none() {
                // Single character local part
                format!("*{}", domain)
            } else {
                format!("{}***{}", first_char, domain)
            }
        } else {
            email.to_string()
        }
    } else {
        // Not a valid email, return as-is
        email.to_string()
    }
}

/// Redact a confirmation code, keeping the last 2 characters.
/// Example: "ABC123" -> "****23"
pub fn confirmation(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    if chars.len() <= 2 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 2..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 2), visible)
}

/// Redact a person's name to initials.
/// Example: "George Bush" -> "G. B."
pub fn name(full_name: &str) -> String {
    full_name
        .split_whitespace()
        .filter_map(|part| part.chars().next())
        .map(|c| format!("{}.", c))
        .collect::<Vec<_>>()
        .join(" ")
}
