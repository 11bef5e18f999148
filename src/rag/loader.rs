use log::{ debug, info };
use std::fs;
use std::path::{ Path, PathBuf };

use super::IndexError;

/// One source file read from the data directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Path relative to the data directory, `/`-separated.
    pub id: String,
    /// File name, shown as the passage source in prompts.
    pub source: String,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    pub recursive: bool,
    /// Lowercase extensions without the dot. Empty accepts every file.
    pub required_exts: Vec<String>,
}

impl LoaderOptions {
    pub fn parse_exts(list: Option<&str>) -> Vec<String> {
        list.map(|s| {
            s.split(',')
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect()
        }).unwrap_or_default()
    }

    fn accepts(&self, path: &Path) -> bool {
        if self.required_exts.is_empty() {
            return true;
        }
        extension_of(path).map_or(false, |ext| self.required_exts.iter().any(|e| *e == ext))
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with('.'))
}

fn collect_paths(
    dir: &Path,
    options: &LoaderOptions,
    out: &mut Vec<PathBuf>
) -> Result<(), IndexError> {
    let entries = fs::read_dir(dir).map_err(|source| IndexError::Read {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| IndexError::Read { path: dir.to_path_buf(), source })?;
        let path = entry.path();
        if is_hidden(&path) {
            continue;
        }
        let file_type = entry
            .file_type()
            .map_err(|source| IndexError::Read { path: path.clone(), source })?;
        if file_type.is_dir() {
            if options.recursive {
                collect_paths(&path, options, out)?;
            }
        } else if file_type.is_symlink() && path.is_dir() {
            debug!("Skipping symlinked directory {}", path.display());
        } else if path.is_file() && options.accepts(&path) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(feature = "pdf")]
fn extract_pdf_text(path: &Path) -> Result<String, IndexError> {
    let bytes = fs::read(path).map_err(|source| IndexError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    pdf_extract::extract_text_from_mem(&bytes).map_err(|e| IndexError::Extract {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf_text(path: &Path) -> Result<String, IndexError> {
    Err(IndexError::Extract {
        path: path.to_path_buf(),
        message: "PDF support is disabled (build with the `pdf` feature)".to_string(),
    })
}

fn read_document(base: &Path, path: &Path) -> Result<Document, IndexError> {
    let text = if extension_of(path).as_deref() == Some("pdf") {
        extract_pdf_text(path)?
    } else {
        fs::read_to_string(path).map_err(|source| IndexError::Read {
            path: path.to_path_buf(),
            source,
        })?
    };

    let id = path
        .strip_prefix(base)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| id.clone());

    Ok(Document { id, source, text })
}

/// Reads every file under `dir` in path order.
///
/// Hidden entries are skipped. Subdirectories are only entered when
/// `options.recursive` is set, and symlinked directories are never followed.
/// Any unreadable file aborts the load.
pub fn load_documents(dir: &Path, options: &LoaderOptions) -> Result<Vec<Document>, IndexError> {
    if !dir.is_dir() {
        return Err(IndexError::DirectoryNotFound(dir.to_path_buf()));
    }

    let mut paths = Vec::new();
    collect_paths(dir, options, &mut paths)?;
    paths.sort();

    if paths.is_empty() {
        return Err(IndexError::NoDocuments(dir.to_path_buf()));
    }

    let mut documents = Vec::with_capacity(paths.len());
    for path in &paths {
        let doc = read_document(dir, path)?;
        debug!("Loaded {} ({} chars)", doc.id, doc.text.len());
        documents.push(doc);
    }
    info!("Loaded {} document(s) from {}", documents.len(), dir.display());
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn data_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("leave.md"), "# Leave\nEmployees get 20 days.").unwrap();
        fs::write(dir.path().join("conduct.txt"), "Be kind.").unwrap();
        fs::write(dir.path().join(".hidden"), "secret").unwrap();
        fs::create_dir(dir.path().join("hr")).unwrap();
        fs::write(dir.path().join("hr").join("benefits.txt"), "Health cover.").unwrap();
        dir
    }

    #[test]
    fn loads_top_level_files_in_order() {
        let dir = data_dir();
        let docs = load_documents(dir.path(), &LoaderOptions::default()).unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["conduct.txt", "leave.md"]);
        assert_eq!(docs[1].text, "# Leave\nEmployees get 20 days.");
    }

    #[test]
    fn recursive_load_descends_into_subdirectories() {
        let dir = data_dir();
        let options = LoaderOptions { recursive: true, ..LoaderOptions::default() };
        let docs = load_documents(dir.path(), &options).unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["conduct.txt", "hr/benefits.txt", "leave.md"]);
        assert_eq!(docs[1].source, "benefits.txt");
    }

    #[test]
    fn extension_filter_limits_files() {
        let dir = data_dir();
        let options = LoaderOptions {
            required_exts: LoaderOptions::parse_exts(Some(".MD, ")),
            ..LoaderOptions::default()
        };
        let docs = load_documents(dir.path(), &options).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "leave.md");
    }

    #[cfg(unix)]
    #[test]
    fn recursive_load_skips_symlinked_directories() {
        let dir = data_dir();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("hr").join("loop")).unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("conduct.txt"),
            dir.path().join("hr").join("conduct-link.txt")
        ).unwrap();

        let options = LoaderOptions { recursive: true, ..LoaderOptions::default() };
        let docs = load_documents(dir.path(), &options).unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["conduct.txt", "hr/benefits.txt", "hr/conduct-link.txt", "leave.md"]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let err = load_documents(Path::new("/definitely/not/here"), &LoaderOptions::default());
        assert!(matches!(err, Err(IndexError::DirectoryNotFound(_))));
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = load_documents(dir.path(), &LoaderOptions::default());
        assert!(matches!(err, Err(IndexError::NoDocuments(_))));
    }

    #[test]
    fn non_utf8_file_aborts_the_load() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00, 0x9f]).unwrap();
        let err = load_documents(dir.path(), &LoaderOptions::default());
        assert!(matches!(err, Err(IndexError::Read { .. })));
    }
}
