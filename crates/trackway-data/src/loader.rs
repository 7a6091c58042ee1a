//! Loading pipeline: reads option and catalog files and route scripts from
//! disk.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers, plus [`load_route_project`] which gathers a whole
//! directory of route scripts ready to compile.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use trackway_core::cancel::CancelFlag;
use trackway_core::catalog::Catalog;
use trackway_core::context::ParserOptions;
use trackway_core::element::Route;
use trackway_core::script::{CompileError, CompileInput, compile_many};

use crate::schema::CatalogData;

/// Base name of the catalog manifest inside a project directory.
pub const CATALOG_FILE: &str = "catalog";

/// Base name of the optional parser options file.
pub const OPTIONS_FILE: &str = "options";

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading route inputs.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: &'static str, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// Options that would make every track position meaningless.
    #[error("invalid options in {file}: {detail}")]
    InvalidOptions { file: PathBuf, detail: String },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(
    dir: &Path,
    base_name: &'static str,
) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name,
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let parse_error = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
    }
}

/// Load parser options from a RON, TOML or JSON file. Missing keys take
/// their defaults.
pub fn load_options(path: &Path) -> Result<ParserOptions, DataLoadError> {
    let options: ParserOptions = deserialize_file(path)?;
    let invalid = |detail: &str| DataLoadError::InvalidOptions {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    };
    if !(options.block_interval > 0.0) {
        return Err(invalid("block_interval must be positive"));
    }
    if options.unit_of_length.is_empty() {
        return Err(invalid("unit_of_length needs at least one factor"));
    }
    debug!(file = %path.display(), "loaded parser options");
    Ok(options)
}

/// Load a catalog manifest from a RON, TOML or JSON file.
pub fn load_catalog(path: &Path) -> Result<Catalog, DataLoadError> {
    let data: CatalogData = deserialize_file(path)?;
    debug!(
        file = %path.display(),
        structure_sets = data.structures.len(),
        files = data.files.len(),
        "loaded catalog manifest"
    );
    Ok(data.into_catalog())
}

// ===========================================================================
// Route scripts
// ===========================================================================

/// One route script read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSource {
    /// File name used in diagnostic locations.
    pub name: String,
    pub path: PathBuf,
    pub text: String,
    /// True for `.rw` files, which compile with the RW dialect.
    pub is_rw: bool,
}

fn script_dialect(path: &Path) -> Option<bool> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "csv" => Some(false),
        "rw" => Some(true),
        _ => None,
    }
}

/// Read a route script. The dialect follows the extension: `.csv` or `.rw`.
///
/// Invalid UTF-8 is replaced rather than rejected, since route files in the
/// wild use assorted legacy encodings.
pub fn load_route_source(path: &Path) -> Result<RouteSource, DataLoadError> {
    let is_rw = script_dialect(path).ok_or_else(|| DataLoadError::UnsupportedFormat {
        file: path.to_path_buf(),
    })?;
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(RouteSource {
        name,
        path: path.to_path_buf(),
        text,
        is_rw,
    })
}

// ===========================================================================
// Projects
// ===========================================================================

/// A directory of route scripts sharing one catalog and one set of options.
#[derive(Debug, Clone)]
pub struct RouteProject {
    pub options: ParserOptions,
    /// `options` with the RW dialect switched on, used for `.rw` scripts.
    pub rw_options: ParserOptions,
    pub catalog: Catalog,
    /// Scripts sorted by file name.
    pub routes: Vec<RouteSource>,
}

/// Load a project directory.
///
/// Requires a `catalog.{ron,toml,json}` manifest. An `options` file is
/// optional; without one every option takes its default. Every `.csv` and
/// `.rw` file directly inside `dir` is a route script.
pub fn load_route_project(dir: &Path) -> Result<RouteProject, DataLoadError> {
    let catalog = load_catalog(&require_data_file(dir, CATALOG_FILE)?)?;
    let options = match find_data_file(dir, OPTIONS_FILE)? {
        Some(path) => load_options(&path)?,
        None => ParserOptions::default(),
    };
    let rw_options = ParserOptions {
        is_rw: true,
        ..options.clone()
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && script_dialect(&path).is_some() {
            paths.push(path);
        }
    }
    paths.sort();

    let routes = paths
        .iter()
        .map(|p| load_route_source(p))
        .collect::<Result<Vec<_>, _>>()?;

    info!(dir = %dir.display(), routes = routes.len(), "loaded route project");
    Ok(RouteProject {
        options,
        rw_options,
        catalog,
        routes,
    })
}

impl RouteProject {
    fn options_for(&self, source: &RouteSource) -> &ParserOptions {
        if source.is_rw {
            &self.rw_options
        } else {
            &self.options
        }
    }

    /// Compile every script, concurrently with the `parallel` feature.
    /// Results follow the order of [`RouteProject::routes`].
    pub fn compile_all(&self, cancel: Option<&CancelFlag>) -> Vec<Result<Route, CompileError>> {
        let inputs: Vec<CompileInput<'_>> = self
            .routes
            .iter()
            .map(|r| CompileInput::new(&r.name, &r.text, self.options_for(r), &self.catalog))
            .collect();
        compile_many(&inputs, cancel)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
