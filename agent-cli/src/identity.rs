//! Agent identifier resolution: either given directly or loaded from a
//! file. The file form strips all embedded NUL bytes first and only then
//! trims surrounding whitespace — in that order, since a NUL embedded
//! before trailing whitespace should not "protect" that whitespace from
//! being trimmed.

use std::path::Path;

use anyhow::{Context, Result};

pub fn resolve<P: AsRef<Path>>(id: Option<String>, id_file: Option<P>) -> Result<String> {
    if let Some(id) = id {
        return Ok(id);
    }
    let path = id_file.context("one of --id or --id-file is required")?;
    let raw = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("reading agent identifier from {}", path.as_ref().display()))?;
    Ok(clean(&raw))
}

fn clean(raw: &str) -> String {
    raw.replace('\0', "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_nul_before_trimming_whitespace() {
        assert_eq!(clean("a1\0  \n"), "a1");
        assert_eq!(clean("  a1\0\0"), "a1");
        assert_eq!(clean("a\01  "), "a1");
    }

    #[test]
    fn explicit_id_wins_over_file() {
        let id = resolve(Some("direct".into()), Some("/nonexistent")).unwrap();
        assert_eq!(id, "direct");
    }
}
