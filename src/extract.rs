//! Conversion pipeline: container → scratch tree → records → message files.
//!
//! Records are read and parsed on a rayon pool, one batch at a time. Each
//! batch is collected in walk order and emitted by the calling thread, which
//! alone assigns sequence numbers and updates the [`ExtractionResult`]. Output
//! numbering is therefore the same for any worker count.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::archive::{extract_container, ScratchDir};
use crate::config::ExtractConfig;
use crate::error::{OlmError, Result};
use crate::export::message::{emit_message, MessageNaming};
use crate::locate::locate_records;
use crate::model::result::ExtractionResult;
use crate::parser::read_record;

/// Progress callback: `(records processed, records located)`.
pub type Progress<'a> = &'a dyn Fn(usize, usize);

/// Tunables of a conversion run.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Worker threads for record parsing (0 = rayon default).
    pub workers: usize,
    /// Records per parallel batch.
    pub batch_size: usize,
    /// Leave the extracted container on disk.
    pub keep_scratch: bool,
    /// Walk directories in file-name order.
    pub sort_entries: bool,
    /// Output file naming.
    pub naming: MessageNaming,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::from(&ExtractConfig::default())
    }
}

impl From<&ExtractConfig> for ExtractOptions {
    fn from(config: &ExtractConfig) -> Self {
        Self {
            workers: config.workers,
            batch_size: config.batch_size,
            keep_scratch: config.keep_scratch,
            sort_entries: config.sort_entries,
            naming: MessageNaming {
                prefix: config.file_prefix.clone(),
                extension: config.file_extension.clone(),
            },
        }
    }
}

/// Convert every message record of `container` into a file in `output_dir`.
///
/// The output directory is created only once the container has been
/// extracted successfully. A container without any recognized record root
/// yields an empty result, not an error.
///
/// # Errors
///
/// Fails only if the container is missing or not a valid archive, or if the
/// scratch or output directory cannot be created. Per-record problems are
/// collected in [`ExtractionResult::failures`].
pub fn run(
    container: &Path,
    output_dir: &Path,
    options: &ExtractOptions,
    progress: Option<Progress<'_>>,
) -> Result<ExtractionResult> {
    let scratch = ScratchDir::create(options.keep_scratch)?;
    extract_container(container, scratch.path())?;

    let records = locate_records(scratch.path(), options.sort_entries);
    let mut result = ExtractionResult {
        located: records.len(),
        ..Default::default()
    };

    if records.is_empty() {
        warn!(path = %container.display(), "No message records found");
        return Ok(result);
    }

    std::fs::create_dir_all(output_dir).map_err(|e| OlmError::io(output_dir, e))?;

    convert_records(
        &records,
        scratch.path(),
        output_dir,
        options,
        &mut result,
        progress,
    )?;

    info!(
        emitted = result.emitted,
        located = result.located,
        failed = result.failures.len(),
        "Conversion finished"
    );
    Ok(result)
}

/// Parse `records` and emit one message file per readable record.
///
/// Failure paths are stored relative to `root`. Sequence numbers continue
/// from `result.emitted`.
pub fn convert_records(
    records: &[PathBuf],
    root: &Path,
    output_dir: &Path,
    options: &ExtractOptions,
    result: &mut ExtractionResult,
    progress: Option<Progress<'_>>,
) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers)
        .build()
        .map_err(|e| OlmError::Config(format!("worker pool: {e}")))?;

    let total = records.len();
    let mut processed = 0usize;

    for batch in records.chunks(options.batch_size.max(1)) {
        let parsed: Vec<_> = pool.install(|| batch.par_iter().map(|p| read_record(p)).collect());

        for (path, outcome) in batch.iter().zip(parsed) {
            let relative = path.strip_prefix(root).unwrap_or(path);
            processed += 1;

            let record = match outcome {
                Ok(record) => record,
                Err(e) => {
                    warn!(path = %relative.display(), error = %e, "Skipping record");
                    result.record_failure(relative, e);
                    continue;
                }
            };

            let sequence = result.emitted;
            match emit_message(&record, sequence, output_dir, &options.naming) {
                Ok(emitted) => {
                    debug!(
                        sequence,
                        source = %relative.display(),
                        target = %emitted.path.display(),
                        heuristic = record.is_heuristic(),
                        "Converted record"
                    );
                    result.record_emitted(emitted.path, emitted.bytes, record.is_heuristic());
                }
                Err(e) => {
                    warn!(path = %relative.display(), error = %e, "Could not emit record");
                    result.record_failure(relative, e);
                }
            }

            if let Some(cb) = progress {
                cb(processed, total);
            }
        }
    }

    Ok(())
}

/// Extract `container` and return the located record paths, relative to the
/// container root, without converting anything.
pub fn list_records(container: &Path, options: &ExtractOptions) -> Result<Vec<PathBuf>> {
    let scratch = ScratchDir::create(options.keep_scratch)?;
    extract_container(container, scratch.path())?;

    Ok(locate_records(scratch.path(), options.sort_entries)
        .into_iter()
        .map(|p| p.strip_prefix(scratch.path()).map(Path::to_path_buf).unwrap_or(p))
        .collect())
}
