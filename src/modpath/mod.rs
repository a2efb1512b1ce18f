use crate::error::{ModupError, Result};

/// Splits a module path into its prefix and trailing major-version suffix,
/// if any. `example.com/dep/v3` yields `("example.com/dep", Some(3))`;
/// unsuffixed paths yield `(path, None)`. A version-shaped last element that
/// is not a legal suffix (`/v0`, `/v1`, leading zeros) is rejected, since
/// majors 0 and 1 never carry a path suffix.
pub fn split_path_version(path: &str) -> Result<(&str, Option<u64>)> {
    let Some(idx) = path.rfind('/') else {
        return Ok((path, None));
    };

    let last = &path[idx + 1..];
    let Some(digits) = last.strip_prefix('v') else {
        return Ok((path, None));
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        // Not a version element at all, just a path element starting with 'v'.
        return Ok((path, None));
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return Err(ModupError::InvalidModulePath(path.to_string()));
    }
    let major: u64 = digits
        .parse()
        .map_err(|_| ModupError::InvalidModulePath(path.to_string()))?;
    if major < 2 {
        return Err(ModupError::InvalidModulePath(path.to_string()));
    }
    Ok((&path[..idx], Some(major)))
}

/// Computes the post-upgrade module path. With no target the next sequential
/// major is used (2 for unsuffixed paths). Target majors 0 and 1 yield the
/// bare prefix; anything else appends `/vN`.
pub fn upgrade_path(path: &str, target_major: Option<u64>) -> Result<String> {
    let (prefix, current) = split_path_version(path)?;
    let major = match target_major {
        Some(m) => m,
        None => current.map_or(2, |m| m + 1),
    };
    if major < 2 {
        return Ok(prefix.to_string());
    }
    let new_path = format!("{prefix}/v{major}");
    check_path(&new_path)?;
    Ok(new_path)
}

/// Validates an import path: slash-separated, non-empty elements drawn from
/// a restricted character set, no dot elements.
pub fn check_import_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(ModupError::InvalidModulePath(path.to_string()));
    }
    for element in path.split('/') {
        check_element(element, path)?;
    }
    Ok(())
}

/// Validates a module path: an import path whose first element looks like a
/// domain and whose major suffix, if present, is well formed.
pub fn check_path(path: &str) -> Result<()> {
    check_import_path(path)?;
    let first = path.split('/').next().unwrap_or_default();
    if !first.contains('.') {
        return Err(ModupError::InvalidModulePath(path.to_string()));
    }
    split_path_version(path)?;
    Ok(())
}

fn check_element(element: &str, path: &str) -> Result<()> {
    if element.is_empty() || element == "." || element == ".." {
        return Err(ModupError::InvalidModulePath(path.to_string()));
    }
    if element.starts_with('.') || element.ends_with('.') {
        return Err(ModupError::InvalidModulePath(path.to_string()));
    }
    let valid = element
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '+'));
    if !valid {
        return Err(ModupError::InvalidModulePath(path.to_string()));
    }
    Ok(())
}
