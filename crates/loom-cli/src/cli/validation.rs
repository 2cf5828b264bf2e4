use std::path::PathBuf;

/// Parse a path argument that must name an existing file.
///
/// # Errors
///
/// Returns an error message if the path is empty or is not a file.
pub fn parse_existing_file(s: &str) -> Result<PathBuf, String> {
    if s.trim().is_empty() {
        return Err("Path cannot be empty".to_string());
    }

    let path = PathBuf::from(s);
    if !path.is_file() {
        return Err(format!("File not found: '{}'", s));
    }
    Ok(path)
}
