use std::path::{Component, Path};

use crate::models::FileRecord;

const EXTENSION_DESCRIPTIONS: &[(&str, &str)] = &[
    (".txt", "text document"),
    (".docx", "word document"),
    (".pdf", "pdf document"),
    (".py", "python script"),
    (".js", "javascript file"),
    (".html", "web page"),
    (".css", "stylesheet"),
    (".md", "markdown document"),
    (".json", "data file"),
    (".xml", "data file"),
    (".csv", "spreadsheet data"),
    (".xlsx", "excel spreadsheet"),
    (".pptx", "presentation"),
    (".zip", "archive file"),
    (".jpg", "image photo"),
    (".jpeg", "image photo"),
    (".png", "image graphic"),
    (".gif", "animated image"),
    (".svg", "vector graphic"),
    (".mp4", "video file"),
    (".avi", "video file"),
    (".mov", "video file"),
    (".mp3", "audio music"),
    (".wav", "audio file"),
    (".flac", "audio music"),
];

/// Number of trailing parent directory names used as category context.
const PARENT_CONTEXT_DEPTH: usize = 2;

/// Builds the text that gets embedded for a file: the stem, its words, the
/// two closest parent directory names and a phrase describing the extension.
pub fn searchable_text(record: &FileRecord) -> String {
    let mut parts: Vec<&str> = vec![record.stem.as_str()];
    parts.extend(split_filename(&record.stem));
    parts.extend(parent_context(&record.parent_dir));

    if let Some(description) = extension_description(&record.extension) {
        parts.push(description);
    }

    parts
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Splits on `-`, `_`, `.` and whitespace, then on lower-to-upper case changes.
pub fn split_filename(stem: &str) -> Vec<&str> {
    stem.split(|c: char| c == '-' || c == '_' || c == '.' || c.is_whitespace())
        .flat_map(split_case_boundaries)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect()
}

fn split_case_boundaries(token: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut previous_lower = false;

    for (i, c) in token.char_indices() {
        if c.is_uppercase() && previous_lower {
            tokens.push(&token[start..i]);
            start = i;
        }
        previous_lower = c.is_lowercase();
    }
    tokens.push(&token[start..]);
    tokens
}

fn parent_context(parent_dir: &str) -> Vec<&str> {
    let names: Vec<&str> = Path::new(parent_dir)
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => name.to_str(),
            _ => None,
        })
        .collect();

    let skip = names.len().saturating_sub(PARENT_CONTEXT_DEPTH);
    names.into_iter().skip(skip).collect()
}

pub fn extension_description(extension: &str) -> Option<&'static str> {
    let extension = extension.to_lowercase();
    EXTENSION_DESCRIPTIONS
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, description)| *description)
}
