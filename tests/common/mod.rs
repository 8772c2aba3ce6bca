//! Shared fixtures and helpers for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Journal table used by the normalization and checker tests.
pub const JOURNALS_JSON: &str = r#"{
    "J ATMOS SCI": "JOURNAL OF THE ATMOSPHERIC SCIENCES",
    "Q J ROY METEOR SOC": "QUARTERLY JOURNAL OF THE ROYAL METEOROLOGICAL SOCIETY"
}"#;

/// A BibTeX article with one author, a DOI and a year.
pub fn article(key: &str, author: &str, title: &str, year: &str) -> String {
    format!(
        "@article{{{key},\n    author = {{{author}}},\n    title = {{{title}}},\n    journal = {{J ATMOS SCI}},\n    year = {{{year}}},\n    doi = {{10.1000/{key}}},\n}}\n",
        key = key,
        author = author,
        title = title,
        year = year
    )
}

/// Creates `<root>/<name>/`, with a `ref.bib` if `bib` is given.
pub fn create_item(root: &Path, name: &str, bib: Option<&str>) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    if let Some(bib) = bib {
        fs::write(dir.join("ref.bib"), bib).unwrap();
    }
    dir
}

/// Creates an item whose `ref.bib` is [`article`] with generated fields.
pub fn create_article_item(root: &Path, name: &str) -> PathBuf {
    let year: String = name.chars().filter(char::is_ascii_digit).take(4).collect();
    let bib = article(name, "Smith, John", &format!("title of {}", name), &year);
    create_item(root, name, Some(&bib))
}

/// The litman binary, isolated from any user config and with plain logs.
pub fn litman(lit_dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_litman"));
    cmd.env("LITMAN_CONFIG", lit_dir.join(".no-such-config.toml"))
        .env_remove("RUST_LOG")
        .arg("--no-colour")
        .arg("--lit-dir")
        .arg(lit_dir);
    cmd
}
