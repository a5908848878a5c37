//! Filename sanitization for downloaded artifacts.
//!
//! Titles come from arbitrary upstream metadata, so the name a client sees
//! is rebuilt from a conservative character set before it is used in a
//! `Content-Disposition` header or an archive entry.

/// Longest stem kept before the extension is appended.
pub const MAX_STEM_CHARS: usize = 100;

/// Stem used when nothing survives sanitization.
const FALLBACK_STEM: &str = "audio";

/// Windows reserved filenames (case-insensitive)
const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

fn is_safe_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | '(' | ')' | '[' | ']' | '&' | '\'' | ',' | '!')
}

/// Derive an artifact filename from a title.
///
/// Characters outside the safe set are dropped, whitespace runs collapse
/// to one space, the stem is capped at [`MAX_STEM_CHARS`] characters and
/// `extension` is appended.
///
/// ```
/// use tubegrab::utils::filename::artifact_filename;
///
/// assert_eq!(artifact_filename("AC/DC: Back in   Black", "mp3"), "ACDC Back in Black.mp3");
/// assert_eq!(artifact_filename("???", "m4a"), "audio.m4a");
/// ```
pub fn artifact_filename(title: &str, extension: &str) -> String {
    let filtered: String = title
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| is_safe_char(*c))
        .collect();

    let collapsed = filtered.split_whitespace().collect::<Vec<_>>().join(" ");
    let capped: String = collapsed.chars().take(MAX_STEM_CHARS).collect();
    let stem = capped.trim_matches(|c: char| c == ' ' || c == '.');

    let stem = if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else if is_reserved(stem) {
        format!("_{stem}")
    } else {
        stem.to_string()
    };

    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        stem
    } else {
        format!("{stem}.{extension}")
    }
}

fn is_reserved(stem: &str) -> bool {
    let upper = stem.to_uppercase();
    WINDOWS_RESERVED_NAMES
        .iter()
        .any(|reserved| upper == *reserved || upper.starts_with(&format!("{reserved}.")))
}

/// Make `name` unique among `taken` by inserting ` (2)`, ` (3)`, ... before
/// the extension. The returned name is recorded in `taken`.
pub fn dedupe_filename(name: &str, taken: &mut std::collections::HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }

    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    };

    let mut n = 2;
    loop {
        let candidate = format!("{stem} ({n}){ext}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// `Content-Disposition` value for an attachment download.
///
/// Carries an ASCII `filename` for old clients and the exact name as an
/// RFC 5987 `filename*` parameter.
pub fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut encoded = String::with_capacity(filename.len() * 3);
    for b in filename.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            encoded.push(b as char);
        } else {
            encoded.push_str(&format!("%{:02X}", b));
        }
    }

    format!("attachment; filename=\"{ascii}\"; filename*=UTF-8''{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_strips_unsafe_and_collapses_whitespace() {
        assert_eq!(
            artifact_filename("  Song\t<Live>  at \"Home\"?  ", "mp3"),
            "Song Live at Home.mp3"
        );
    }

    #[test]
    fn test_keeps_unicode_letters() {
        assert_eq!(artifact_filename("観覧車 - Remix", "opus"), "観覧車 - Remix.opus");
    }

    #[test]
    fn test_caps_length() {
        let long = "a".repeat(300);
        let name = artifact_filename(&long, "mp3");
        assert_eq!(name.len(), MAX_STEM_CHARS + ".mp3".len());
    }

    #[test]
    fn test_empty_and_reserved() {
        assert_eq!(artifact_filename("", "mp3"), "audio.mp3");
        assert_eq!(artifact_filename("...", "mp3"), "audio.mp3");
        assert_eq!(artifact_filename("con", "mp3"), "_con.mp3");
        assert_eq!(artifact_filename("x", ".m4a"), "x.m4a");
    }

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            content_disposition("My Song.mp3"),
            "attachment; filename=\"My Song.mp3\"; filename*=UTF-8''My%20Song.mp3"
        );
        let header = content_disposition("観.mp3");
        assert!(header.starts_with("attachment; filename=\"_.mp3\""));
        assert!(header.ends_with("filename*=UTF-8''%E8%A6%B3.mp3"));
    }

    #[test]
    fn test_dedupe() {
        let mut taken = HashSet::new();
        assert_eq!(dedupe_filename("a.mp3", &mut taken), "a.mp3");
        assert_eq!(dedupe_filename("a.mp3", &mut taken), "a (2).mp3");
        assert_eq!(dedupe_filename("a.mp3", &mut taken), "a (3).mp3");
        assert_eq!(dedupe_filename("noext", &mut taken), "noext");
        assert_eq!(dedupe_filename("noext", &mut taken), "noext (2)");
    }
}
