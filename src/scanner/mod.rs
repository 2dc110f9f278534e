use anyhow::{Context, Result};
use glob::MatchOptions;
use std::path::PathBuf;

use crate::config::Config;

/// Expand the input pattern. `*` never matches a leading dot, so files that
/// already carry the completion marker are left out.
pub fn scan_inputs(cfg: &Config) -> Result<Vec<PathBuf>> {
    let opts = MatchOptions { case_sensitive: true, require_literal_separator: true, require_literal_leading_dot: true };
    let mut files = Vec::new();
    for entry in glob::glob_with(&cfg.pattern, opts).with_context(|| format!("invalid pattern: {}", cfg.pattern))? {
        match entry {
            Ok(p) if p.is_file() => files.push(p),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "unreadable path while scanning"),
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    fn cfg_for(pattern: &str) -> Config {
        let args = Args::try_parse_from(["memc-load", "--pattern", pattern]).unwrap();
        Config::from_args(&args).unwrap()
    }

    #[test]
    fn skips_marked_files_and_directories() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.tsv.gz"), b"").unwrap();
        fs::write(tmp.path().join("a.tsv.gz"), b"").unwrap();
        fs::write(tmp.path().join(".c.tsv.gz"), b"").unwrap();
        fs::write(tmp.path().join("d.tsv"), b"").unwrap();
        fs::create_dir(tmp.path().join("e.tsv.gz")).unwrap();

        let pattern = format!("{}/*.tsv.gz", tmp.path().display());
        let files = scan_inputs(&cfg_for(&pattern)).unwrap();
        let names: Vec<_> = files.iter().map(|p| p.file_name().unwrap().to_str().unwrap().to_string()).collect();
        assert_eq!(names, vec!["a.tsv.gz", "b.tsv.gz"]);
    }

    #[test]
    fn no_matches_is_empty_not_error() {
        let tmp = TempDir::new().unwrap();
        let pattern = format!("{}/*.tsv.gz", tmp.path().display());
        assert!(scan_inputs(&cfg_for(&pattern)).unwrap().is_empty());
    }

    #[test]
    fn invalid_pattern_is_error() {
        assert!(scan_inputs(&cfg_for("/tmp/[")).is_err());
    }
}
