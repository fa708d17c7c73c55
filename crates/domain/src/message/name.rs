use crate::errors::DomainError;

/// Maximum number of bytes a presentation-format DNS name may contain.
pub const MAX_NAME_BYTES: usize = 253;

/// Lowercases a name and makes sure it carries exactly one trailing dot.
pub fn canonical_name(name: &str) -> String {
    let mut canonical = name.trim_end_matches('.').to_ascii_lowercase();
    canonical.push('.');
    canonical
}

/// Rejects names longer than [`MAX_NAME_BYTES`] before any request is built.
pub fn check_name_length(name: &str) -> Result<(), DomainError> {
    let length = name.trim_end_matches('.').len();
    if length > MAX_NAME_BYTES {
        return Err(DomainError::NameTooLong(length));
    }
    Ok(())
}
