use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::Path;

/// How a document list is encoded, decided by looking at the input up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// A JSON array of strings.
    Json,
    /// One document per non-empty line.
    Delimited,
}

impl DocumentFormat {
    pub fn detect(input: &str) -> Self {
        match input.trim_start().chars().next() {
            Some('[') => DocumentFormat::Json,
            _ => DocumentFormat::Delimited,
        }
    }

    pub fn parse(self, input: &str) -> Result<Vec<String>> {
        match self {
            DocumentFormat::Json => serde_json::from_str::<Vec<String>>(input)
                .context("Expected a JSON array of document strings"),
            DocumentFormat::Delimited => Ok(input
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()),
        }
    }
}

pub fn parse_documents(input: &str) -> Result<Vec<String>> {
    DocumentFormat::detect(input).parse(input)
}

/// Splits text into chunks of at most max_chars characters at sentence
/// boundaries. A sentence longer than the limit is broken between words, and a
/// word longer than the limit between characters.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current_chunk = String::new();
    let mut current_length = 0;

    for sentence in text.split(['.', '!', '?']) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        for piece in wrap_words(&format!("{sentence}."), max_chars) {
            let piece_len = piece.chars().count();
            if current_length + piece_len + 1 > max_chars && !current_chunk.is_empty() {
                chunks.push(std::mem::take(&mut current_chunk));
                current_length = 0;
            }

            if !current_chunk.is_empty() {
                current_chunk.push(' ');
                current_length += 1;
            }
            current_chunk.push_str(&piece);
            current_length += piece_len;
        }
    }

    if !current_chunk.is_empty() {
        chunks.push(current_chunk);
    }

    chunks
}

/// Greedily packs the words of `text` into pieces of at most `max_chars`.
fn wrap_words(text: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_length = 0;

    for word in text.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for part in chars.chunks(max_chars) {
            let part_len = part.len();
            if current_length + part_len + 1 > max_chars && !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_length = 0;
            }
            if !current.is_empty() {
                current.push(' ');
                current_length += 1;
            }
            current.extend(part);
            current_length += part_len;
        }
    }

    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Loads all text files from a directory recursively
pub fn load_text_files(dir_path: impl AsRef<Path>) -> Result<Vec<String>> {
    let mut texts = Vec::new();

    let mut entries = fs::read_dir(dir_path)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.path());

    for entry in entries {
        let path = entry.path();

        if path.is_file() {
            if path.extension().is_some_and(|ext| ext == "txt") {
                texts.push(fs::read_to_string(path)?);
            }
        } else if path.is_dir() {
            texts.extend(load_text_files(path)?);
        }
    }

    Ok(texts)
}

/// Loads documents from a directory of `.txt` files or from a single JSON /
/// line-delimited file. With `chunk_chars`, long texts are split at sentence
/// boundaries first.
pub fn load_documents(path: impl AsRef<Path>, chunk_chars: Option<usize>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let texts = if path.is_dir() {
        load_text_files(path)?
    } else if path.is_file() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read documents from {:?}", path))?;
        parse_documents(&raw)?
    } else {
        return Err(anyhow!("No documents found at {:?}", path));
    };

    Ok(match chunk_chars {
        Some(max_chars) => texts
            .iter()
            .flat_map(|text| split_into_chunks(text, max_chars))
            .collect(),
        None => texts
            .into_iter()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn test_split_into_chunks() {
        let text = "This is a test. It has multiple sentences! How will it be split? Let's see.";
        let chunks = split_into_chunks(text, 20);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 20));
        assert!(chunks.len() > 1);
    }

    #[test]
    fn test_long_sentence_is_broken_to_fit() {
        let text = "Short one. This sentence is much longer than the limit allows. Supercalifragilistic!";
        let chunks = split_into_chunks(text, 12);

        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 12));
        assert_eq!(chunks[0], "Short one.");
        assert_eq!(chunks[1], "This");
        assert!(chunks.contains(&"Supercalifra".to_string()));
        assert_eq!(chunks.last().map(String::as_str), Some("gilistic."));
    }

    #[test]
    fn test_load_text_files_missing_dir_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent");
        assert!(load_text_files(&missing).is_err());
        assert!(!missing.exists());
    }

    #[test]
    fn test_load_text_files() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.txt");
        let mut file = File::create(file_path)?;
        writeln!(file, "Test content")?;

        let texts = load_text_files(dir.path())?;
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].trim(), "Test content");

        Ok(())
    }

    #[test]
    fn test_format_detected_from_first_character() -> Result<()> {
        let json = "  [\"Cats are mammals.\", \"Rust is fast.\"]";
        assert_eq!(DocumentFormat::detect(json), DocumentFormat::Json);
        assert_eq!(parse_documents(json)?, vec!["Cats are mammals.", "Rust is fast."]);

        let lines = "Cats are mammals.\n\n  Rust is fast.  \n";
        assert_eq!(DocumentFormat::detect(lines), DocumentFormat::Delimited);
        assert_eq!(parse_documents(lines)?, vec!["Cats are mammals.", "Rust is fast."]);
        Ok(())
    }

    #[test]
    fn test_broken_json_is_not_reread_as_lines() {
        assert!(parse_documents("[\"unterminated").is_err());
    }

    #[test]
    fn test_load_documents_from_file_with_chunking() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("docs.json");
        fs::write(&path, r#"["One sentence. Two sentence. Three sentence."]"#)?;

        let docs = load_documents(&path, Some(16))?;
        assert_eq!(docs, vec!["One sentence.", "Two sentence.", "Three sentence."]);
        Ok(())
    }

    #[test]
    fn test_load_documents_missing_path() {
        let dir = tempdir().unwrap();
        assert!(load_documents(dir.path().join("nope.json"), None).is_err());
    }
}
