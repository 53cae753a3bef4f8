//! Recursive discovery of `.gguf` files, with split files grouped per model.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One model found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEntry {
    pub name: String,
    /// All files of the model in name order; the first one carries the
    /// metadata.
    pub parts: Vec<PathBuf>,
}

impl ModelEntry {
    pub fn path(&self) -> &Path {
        &self.parts[0]
    }

    pub fn is_split(&self) -> bool {
        self.parts.len() > 1
    }
}

/// Find every `.gguf` file under `dir`.
pub fn discover(dir: &Path) -> io::Result<Vec<ModelEntry>> {
    let mut files: Vec<PathBuf> = Vec::new();
    walk_dir(dir, &mut files)?;
    files.sort();

    let mut entries: Vec<ModelEntry> = Vec::new();
    let mut seen_bases: HashMap<PathBuf, usize> = HashMap::new();

    for path in files {
        let fname = path.file_name().unwrap_or_default().to_string_lossy().into_owned();

        // Split files: `name-00001-of-00003.gguf`
        if let Some(base) = detect_split_base(&fname) {
            let key = path.with_file_name(&base);
            if let Some(&idx) = seen_bases.get(&key) {
                entries[idx].parts.push(path);
                continue;
            }
            seen_bases.insert(key, entries.len());
            entries.push(ModelEntry {
                name: base,
                parts: vec![path],
            });
            continue;
        }

        entries.push(ModelEntry {
            name: fname.trim_end_matches(".gguf").to_string(),
            parts: vec![path],
        });
    }

    Ok(entries)
}

fn walk_dir(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk_dir(&path, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("gguf") {
            out.push(path);
        }
    }
    Ok(())
}

fn detect_split_base(filename: &str) -> Option<String> {
    // Pattern: `<base>-NNNNN-of-NNNNN.gguf`
    let name = filename.strip_suffix(".gguf")?;
    let mut parts = name.rsplitn(4, '-');
    let total = parts.next()?;
    let of = parts.next()?;
    let index = parts.next()?;
    let base = parts.next()?;
    let numeric = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    (numeric(total) && of == "of" && numeric(index) && !base.is_empty()).then(|| base.to_string())
}
