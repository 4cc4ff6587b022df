use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::LawMetadata;

pub const SOURCE_KEY: &str = "source";

/// One statute passage ready for `add_documents`.
#[derive(Debug, Clone, PartialEq)]
pub struct LawPassage {
    pub text: String,
    pub metadata: LawMetadata,
}

/// Reads statute corpora where every non-blank line is one passage, e.g.
/// `《个人信息保护法》第十三条规定，符合下列情形之一的，个人信息处理者方可处理个人信息：...`
#[derive(Debug, Default)]
pub struct DataProcessor;

impl DataProcessor {
    pub fn new() -> Self { Self }

    /// Load a single file, or every `*.txt` file under a directory.
    pub fn process_path(&self, path: &Path) -> Result<Vec<LawPassage>> {
        if path.is_dir() { self.process_directory(path) } else { self.process_file(path) }
    }

    pub fn process_file(&self, file_path: &Path) -> Result<Vec<LawPassage>> {
        let content = self.read_file_content(file_path)?;
        let passages = self.split_passages(&content);
        tracing::debug!(path = %file_path.display(), passages = passages.len(), "parsed statute file");
        Ok(passages)
    }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<LawPassage>> {
        let files = self.list_txt_files(data_dir);
        if files.is_empty() {
            tracing::warn!("No .txt files found under {}.", data_dir.display());
            return Ok(vec![]);
        }
        let mut all = Vec::new();
        for file_path in &files {
            all.extend(self.process_source(file_path)?);
        }
        tracing::info!("Processed {} files into {} passages", files.len(), all.len());
        Ok(all)
    }

    /// Like `process_file`, with every passage tagged `source` = file stem.
    pub fn process_source(&self, file_path: &Path) -> Result<Vec<LawPassage>> {
        let source = file_path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        let passages = self.process_file(file_path)?;
        Ok(passages
            .into_iter()
            .map(|mut p| {
                p.metadata.extra.insert(SOURCE_KEY.to_string(), source.clone());
                p
            })
            .collect())
    }

    /// One passage per non-blank, trimmed line. Line numbers are 1-based and
    /// count blank lines.
    pub fn split_passages(&self, content: &str) -> Vec<LawPassage> {
        content
            .lines()
            .enumerate()
            .filter_map(|(idx, line)| {
                let line = line.trim();
                if line.is_empty() { return None; }
                Some(LawPassage { text: line.to_string(), metadata: extract_metadata(line, idx + 1) })
            })
            .collect()
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => {
                let bytes = fs::read(file_path).with_context(|| format!("reading {}", file_path.display()))?;
                Ok(String::from_utf8_lossy(&bytes).to_string())
            }
        }
    }

    /// `*.txt` files under `root`, sorted by path.
    pub fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path(); if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
        }
        txt_files.sort(); txt_files
    }
}

/// Extract the first bracketed law title and the first `第…条` citation.
pub fn extract_metadata(line: &str, line_number: usize) -> LawMetadata {
    let mut meta = LawMetadata::default().with_line_number(line_number);
    if let Some(law) = find_law_title(line) { meta.law = Some(law.to_string()); }
    if let Some(article) = find_article(line) { meta.article = Some(article.to_string()); }
    meta
}

fn find_law_title(line: &str) -> Option<&str> {
    let start = line.find('《')?;
    let end = line[start..].find('》')? + start + '》'.len_utf8();
    Some(&line[start..end])
}

fn find_article(line: &str) -> Option<&str> {
    for (start, _) in line.match_indices('第') {
        let rest = &line[start + '第'.len_utf8()..];
        let digits: usize = rest.chars().take_while(|c| is_numeral(*c)).map(char::len_utf8).sum();
        if digits == 0 { continue; }
        if rest[digits..].starts_with('条') {
            let end = start + '第'.len_utf8() + digits + '条'.len_utf8();
            return Some(&line[start..end]);
        }
    }
    None
}

/// Chinese or Arabic numeral as used in article citations.
pub fn is_numeral(c: char) -> bool {
    c.is_ascii_digit() || "零〇一二三四五六七八九十百千万两".contains(c)
}
