use anyhow::{anyhow, Context, Result};

/// Pull plain text out of a PDF. Runs on the blocking pool; malformed PDFs
/// can make the parser panic, which surfaces here as an error.
pub async fn pdf_text(bytes: Vec<u8>) -> Result<String> {
    let raw = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .context("pdf extraction task failed")?
        .map_err(|e| anyhow!("pdf text extraction failed: {e:?}"))?;
    Ok(clean_text(&raw))
}

/// Trim every line and drop blank ones.
pub fn clean_text(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cheap magic-number check before handing bytes to the parser.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_drops_blank_lines() {
        assert_eq!(clean_text("  a \n\n\t\n b\n"), "a\nb");
    }

    #[test]
    fn pdf_magic() {
        assert!(looks_like_pdf(b"%PDF-1.7\n..."));
        assert!(!looks_like_pdf(b"PK\x03\x04"));
    }
}
