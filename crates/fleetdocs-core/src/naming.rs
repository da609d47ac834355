//! Unique storage names for uploaded files.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use uuid::Uuid;

const MAX_BASE_LEN: usize = 20;
const RANDOM_LEN: usize = 8;
const FALLBACK_BASE: &str = "file";

/// Generates `{timestampMillis}_{random}_{base}{.ext}` names.
///
/// The timestamp never repeats within one generator, so names produced in the
/// same millisecond still differ. The random part covers multiple processes.
#[derive(Debug, Default)]
pub struct FilenameGenerator {
    last_millis: AtomicU64,
}

impl FilenameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&self, original_name: &str) -> String {
        let timestamp = self.next_timestamp();
        let random = Uuid::new_v4().simple().to_string();
        let (base, extension) = split_name(original_name);

        format!(
            "{}_{}_{}{}",
            timestamp,
            &random[..RANDOM_LEN],
            sanitize_base(base),
            sanitize_extension(extension)
        )
    }

    fn next_timestamp(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let mut previous = self.last_millis.load(Ordering::Acquire);
        loop {
            let next = now.max(previous + 1);
            match self.last_millis.compare_exchange_weak(
                previous,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next,
                Err(actual) => previous = actual,
            }
        }
    }
}

/// Splits the last path component into base name and extension.
/// A leading dot does not start an extension.
fn split_name(original_name: &str) -> (&str, Option<&str>) {
    let name = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

fn sanitize_base(base: &str) -> String {
    let sanitized: String = base
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_BASE_LEN)
        .collect();

    if sanitized.is_empty() {
        FALLBACK_BASE.to_string()
    } else {
        sanitized
    }
}

fn sanitize_extension(extension: Option<&str>) -> String {
    let ext: String = extension
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    if ext.is_empty() {
        String::new()
    } else {
        format!(".{}", ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn parts(name: &str) -> (u64, String, String) {
        let mut split = name.splitn(3, '_');
        let ts = split.next().unwrap().parse().unwrap();
        let random = split.next().unwrap().to_string();
        let rest = split.next().unwrap().to_string();
        (ts, random, rest)
    }

    #[test]
    fn follows_naming_format() {
        let generator = FilenameGenerator::new();
        let name = generator.generate("Carte Grise (2024).PDF");
        let (ts, random, rest) = parts(&name);

        assert!(ts > 1_600_000_000_000);
        assert_eq!(random.len(), 8);
        assert!(random.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(rest, "carte_grise__2024_.pdf");
    }

    #[test]
    fn truncates_long_base_names() {
        let generator = FilenameGenerator::new();
        let name = generator.generate("a_very_long_document_name_indeed.docx");
        let (_, _, rest) = parts(&name);
        assert_eq!(rest, "a_very_long_document.docx");
    }

    #[test]
    fn falls_back_for_empty_base() {
        let generator = FilenameGenerator::new();
        assert!(generator.generate("").ends_with("_file"));
        assert!(generator.generate(".env").ends_with("_.env"));
        assert!(generator.generate("scans/photo.JPEG").ends_with("_photo.jpeg"));
    }

    #[test]
    fn awkward_names_become_single_safe_segments() {
        let generator = FilenameGenerator::new();
        let cases = [
            ("a..b.pdf", "a..b.pdf"),
            ("photo..jpg", "photo..jpg"),
            ("a...pdf", "a...pdf"),
            (".hidden", ".hidden"),
            ("x.tar.gz", "x.tar.gz"),
            ("reçu été.pdf", "re_u__t_.pdf"),
            ("日本.png", "__.png"),
            ("../../etc/passwd", "passwd"),
        ];

        for (original, expected) in cases {
            let name = generator.generate(original);
            let (_, _, rest) = parts(&name);
            assert_eq!(rest, expected, "{}", original);
            assert!(name.is_ascii());
            assert!(!name.contains('/') && !name.contains('\\'));
            assert!(name != "." && name != "..");
        }
    }

    #[test]
    fn timestamps_strictly_increase() {
        let generator = FilenameGenerator::new();
        let mut last = 0;
        for _ in 0..1_000 {
            let (ts, _, _) = parts(&generator.generate("a.png"));
            assert!(ts > last);
            last = ts;
        }
    }

    #[test]
    fn identical_names_stay_unique_across_threads() {
        let generator = Arc::new(FilenameGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || {
                    (0..250)
                        .map(|_| generator.generate("photo.png"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for name in handle.join().unwrap() {
                assert!(seen.insert(name));
            }
        }
        assert_eq!(seen.len(), 2_000);
    }
}
