//! Line-based TOML value patching
//!
//! Sets one `key = value` pair inside one `[table]` of a remote TOML file
//! without parsing the document, so comments and layout elsewhere survive.
//! Inline tables, multi-line strings and dotted keys are not understood.

use hostkeep_exec::{Connector, ExecError};
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Errors that can occur while patching a config file
#[derive(Error, Debug, Clone)]
pub enum PatchError {
    /// Connector reported itself disconnected
    #[error("connector is not connected")]
    NotConnected,

    /// Empty table or key
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Reading the file failed
    #[error("failed to read {path}: {source}")]
    Read {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: ExecError,
    },

    /// Writing the file failed
    #[error("failed to write {path}: {source}")]
    Write {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: ExecError,
    },

    /// File is not UTF-8
    #[error("{path} is not valid UTF-8")]
    Encoding {
        /// File path
        path: String,
    },
}

/// What `set_toml_value` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// File already had the value; nothing written
    Unchanged,
    /// File was rewritten
    Updated,
}

/// Set `key = value` in `[table]` of the TOML file at `path`
///
/// `value` is written verbatim and must already be a TOML literal
/// (`"overlayfs"`, `true`, `3`). A missing file is treated as empty.
///
/// # Errors
/// Returns `PatchError` on input, transport or encoding errors
#[instrument(skip(connector, value))]
pub async fn set_toml_value(
    connector: &dyn Connector,
    path: &str,
    table: &str,
    key: &str,
    value: &str,
) -> Result<PatchOutcome, PatchError> {
    if !connector.is_connected() {
        return Err(PatchError::NotConnected);
    }
    if table.trim().is_empty() || key.trim().is_empty() {
        return Err(PatchError::InvalidInput(
            "table and key must not be empty".to_string(),
        ));
    }

    let read_error = |source| PatchError::Read {
        path: path.to_string(),
        source,
    };
    let exists = connector.stat(path).await.map_err(read_error)?.exists;
    let original = if exists {
        let bytes = connector.read_file(path).await.map_err(read_error)?;
        String::from_utf8(bytes).map_err(|_| PatchError::Encoding {
            path: path.to_string(),
        })?
    } else {
        debug!(path, "config file missing, starting from empty");
        String::new()
    };

    let patched = patch_toml(&original, table, key, value);
    if exists && patched == original {
        debug!(path, table, key, "value already set");
        return Ok(PatchOutcome::Unchanged);
    }

    connector
        .write_file(path, patched.as_bytes())
        .await
        .map_err(|source| PatchError::Write {
            path: path.to_string(),
            source,
        })?;
    info!(path, table, key, "config value updated");
    Ok(PatchOutcome::Updated)
}

/// Pure text transformation behind [`set_toml_value`]
#[must_use]
pub fn patch_toml(contents: &str, table: &str, key: &str, value: &str) -> String {
    let mut lines: Vec<String> = contents.lines().map(str::to_string).collect();

    let Some(header) = lines
        .iter()
        .position(|line| header_name(line).is_some_and(|name| name == table))
    else {
        if lines.last().is_some_and(|l| !l.trim().is_empty()) {
            lines.push(String::new());
        }
        lines.push(format!("[{table}]"));
        lines.push(format!("{key} = {value}"));
        return join(lines);
    };

    let section_end = lines[header + 1..]
        .iter()
        .position(|line| {
            header_name(line).is_some() || line.trim_start().starts_with("[[")
        })
        .map_or(lines.len(), |offset| header + 1 + offset);

    let existing = (header + 1..section_end).find(|&i| line_key(&lines[i]) == Some(key));
    match existing {
        Some(i) => {
            let indent_len = lines[i].len() - lines[i].trim_start().len();
            let indent = lines[i][..indent_len].to_string();
            lines[i] = format!("{indent}{key} = {value}");
        }
        None => {
            let indent = lines[header + 1..section_end]
                .iter()
                .find(|l| line_key(l).is_some())
                .map(|l| l[..l.len() - l.trim_start().len()].to_string())
                .unwrap_or_default();
            lines.insert(header + 1, format!("{indent}{key} = {value}"));
        }
    }

    join(lines)
}

/// Table name of a `[table]` header line, ignoring a trailing comment
fn header_name(line: &str) -> Option<&str> {
    let line = strip_comment(line).trim();
    if line.starts_with("[[") {
        return None;
    }
    line.strip_prefix('[')?.strip_suffix(']').map(str::trim)
}

/// Bare key of a `key = value` line
fn line_key(line: &str) -> Option<&str> {
    let line = line.trim_start();
    if line.starts_with('#') || line.starts_with('[') {
        return None;
    }
    let (key, _) = line.split_once('=')?;
    Some(key.trim())
}

fn strip_comment(line: &str) -> &str {
    line.split_once('#').map_or(line, |(before, _)| before)
}

fn join(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
