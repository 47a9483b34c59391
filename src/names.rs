//! Name handling shared by the bundled adapters.

use std::future::Future;

use crate::{Error, Result};

/// Upper bound on suffixes tried by [`available_name`].
const MAX_SUFFIX: usize = 10_000;

/// Sanitize a file name.
///
/// Surrounding whitespace is trimmed, inner spaces become `_`, and every
/// character other than alphanumerics, `-`, `_`, `.` and `/` is dropped.
///
/// ```
/// use fallback_storage::names::valid_name;
///
/// assert_eq!(valid_name(" my photo (1).jpg ").unwrap(), "my_photo_1.jpg");
/// ```
pub fn valid_name(name: &str) -> Result<String> {
    let cleaned: String = name
        .trim()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => Err(Error::Generic(format!(
            "could not derive a valid file name from {name:?}"
        ))),
        _ => Ok(cleaned),
    }
}

/// `name` with `_{n}` inserted before the extension of its last component.
///
/// ```
/// use fallback_storage::names::suffixed_name;
///
/// assert_eq!(suffixed_name("media/a.jpg", 2), "media/a_2.jpg");
/// assert_eq!(suffixed_name(".env", 1), ".env_1");
/// ```
pub fn suffixed_name(name: &str, n: usize) -> String {
    let (dir, file) = match name.rfind('/') {
        Some(idx) => name.split_at(idx + 1),
        None => ("", name),
    };

    // A leading dot marks a hidden file, not an extension.
    match file.rfind('.') {
        Some(idx) if idx > 0 => {
            let (stem, ext) = file.split_at(idx);
            format!("{dir}{stem}_{n}{ext}")
        }
        _ => format!("{dir}{file}_{n}"),
    }
}

/// Find a free name, starting with `name` itself and then trying
/// [`suffixed_name`] with increasing counters.
pub async fn available_name<F, Fut>(name: &str, mut taken: F) -> Result<String>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    if !taken(name.to_string()).await? {
        return Ok(name.to_string());
    }

    for n in 1..=MAX_SUFFIX {
        let candidate = suffixed_name(name, n);
        if !taken(candidate.clone()).await? {
            return Ok(candidate);
        }
    }

    Err(Error::Generic(format!(
        "no available name for {name:?} after {MAX_SUFFIX} attempts"
    )))
}
