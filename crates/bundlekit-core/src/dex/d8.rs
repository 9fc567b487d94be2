use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use wait_timeout::ChildExt;

use super::{DexMergeRequest, DexMerger, dex_file_index};
use crate::config::DexerConfig;
use crate::error::ToolError;

const TOOL: &str = "d8";
const DEX_OVERFLOW_MARKER: &str = "Cannot fit requested classes in a single dex file";
const LOG_TAIL_LINES: usize = 40;

/// Runs the `d8` command line tool as a blocking subprocess.
#[derive(Debug, Clone)]
pub struct D8DexMerger {
    executable: PathBuf,
    timeout: Duration,
}

impl D8DexMerger {
    pub fn new(executable: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            timeout,
        }
    }

    /// Use the configured executable, or look `d8` up on `PATH`.
    pub fn from_config(config: &DexerConfig) -> Result<Self, ToolError> {
        let executable = match &config.path {
            Some(path) if path.is_file() => path.clone(),
            Some(path) => {
                return Err(ToolError::NotFound {
                    tool: TOOL.to_string(),
                    reason: format!("{} is not a file", path.display()),
                });
            }
            None => which::which(TOOL).map_err(|e| ToolError::NotFound {
                tool: TOOL.to_string(),
                reason: e.to_string(),
            })?,
        };
        Ok(Self::new(executable, config.timeout()))
    }

    fn command(&self, request: &DexMergeRequest<'_>) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg(if request.is_debuggable { "--debug" } else { "--release" })
            .arg("--min-api")
            .arg(request.min_sdk.to_string())
            .arg("--output")
            .arg(request.output_dir);
        if let Some(main_dex_list) = request.main_dex_list {
            cmd.arg("--main-dex-list").arg(main_dex_list);
        }
        if let Some(proguard_map) = request.proguard_map {
            cmd.arg("--pg-map").arg(proguard_map);
        }
        cmd.args(request.dex_files);
        cmd
    }
}

fn spawn_error(source: std::io::Error) -> ToolError {
    ToolError::Spawn {
        tool: TOOL.to_string(),
        source,
    }
}

fn ensure_empty_directory(dir: &Path) -> Result<(), ToolError> {
    let empty = std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false);
    if empty {
        Ok(())
    } else {
        Err(ToolError::OutputDirectoryNotEmpty(dir.to_path_buf()))
    }
}

/// Dex files written to `dir`, in `classes.dex`, `classes2.dex`, ... order.
fn collect_outputs(dir: &Path) -> Result<Vec<PathBuf>, ToolError> {
    let unreadable = |reason: String| ToolError::UnreadableOutput {
        tool: TOOL.to_string(),
        dir: dir.to_path_buf(),
        reason,
    };
    let mut outputs = Vec::new();
    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| unreadable(e.to_string()))?;
        let index = dex_file_index(&entry.file_name().to_string_lossy());
        if let Some(index) = index {
            outputs.push((index, entry.into_path()));
        }
    }
    if outputs.is_empty() {
        return Err(unreadable("no dex files were produced".to_string()));
    }
    outputs.sort();
    Ok(outputs.into_iter().map(|(_, path)| path).collect())
}

/// Read the last `n` lines of a log without loading all of it.
fn read_last_lines(path: &Path, n: usize) -> std::io::Result<String> {
    const TAIL_SIZE: u64 = 16 * 1024;

    let mut file = File::open(path)?;
    let seek_pos = file.metadata()?.len().saturating_sub(TAIL_SIZE);
    file.seek(SeekFrom::Start(seek_pos))?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    let buffer = String::from_utf8_lossy(&buffer);

    let content = if seek_pos > 0 {
        buffer.find('\n').map_or(&*buffer, |idx| &buffer[idx + 1..])
    } else {
        &*buffer
    };
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].join("\n"))
}

impl DexMerger for D8DexMerger {
    fn merge(&self, request: &DexMergeRequest<'_>) -> Result<Vec<PathBuf>, ToolError> {
        ensure_empty_directory(request.output_dir)?;

        let log = tempfile::NamedTempFile::new().map_err(spawn_error)?;
        let stdout = log.reopen().map_err(spawn_error)?;
        let stderr = log.reopen().map_err(spawn_error)?;

        tracing::info!(
            tool = %self.executable.display(),
            inputs = request.dex_files.len(),
            min_sdk = request.min_sdk,
            "merging dex files"
        );
        let mut child = self
            .command(request)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(spawn_error)?;

        let status = match child.wait_timeout(self.timeout).map_err(spawn_error)? {
            Some(status) => status,
            None => {
                child.kill().ok();
                child.wait().ok();
                return Err(ToolError::TimedOut {
                    tool: TOOL.to_string(),
                    timeout: self.timeout,
                });
            }
        };

        if !status.success() {
            let output = read_last_lines(log.path(), LOG_TAIL_LINES).unwrap_or_default();
            tracing::warn!(code = ?status.code(), "{TOOL} failed");
            if output.contains(DEX_OVERFLOW_MARKER) && request.main_dex_list.is_none() {
                return Err(ToolError::DexOverflow { output });
            }
            return Err(ToolError::Failed {
                tool: TOOL.to_string(),
                code: status.code(),
                output,
            });
        }
        collect_outputs(request.output_dir)
    }
}
