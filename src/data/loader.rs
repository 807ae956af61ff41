use crate::data::RawDataset;
use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Tsv,
    GzippedTsv,
}

impl FileFormat {
    /// Detect file format from path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str());
        let stem = path.file_stem().and_then(|s| s.to_str());

        match (ext, stem) {
            (Some("gz"), Some(stem)) if stem.ends_with(".tsv") => Ok(FileFormat::GzippedTsv),
            (Some("tsv"), _) => Ok(FileFormat::Tsv),
            _ => bail!("Unsupported file format: {:?}", path),
        }
    }

    /// Check if format is gzipped
    pub fn is_gzipped(&self) -> bool {
        matches!(self, FileFormat::GzippedTsv)
    }
}

/// Locate the series file for a dataset under the data root.
///
/// Prefers `<name>.tsv`, falling back to `<name>.tsv.gz`.
pub fn dataset_path(data_root: &Path, name: &str) -> Result<PathBuf> {
    let plain = data_root.join(format!("{}.tsv", name));
    if plain.is_file() {
        return Ok(plain);
    }
    let gz = data_root.join(format!("{}.tsv.gz", name));
    if gz.is_file() {
        return Ok(gz);
    }
    bail!("Dataset file not found for '{}' under {:?}", name, data_root)
}

/// Loader for tab-separated series files.
///
/// Each row is one sample: label first, then `num_dims * seq_len` values in
/// channel-major order. Multivariate sets declare their channel count with a
/// leading `#dim=K` comment line; univariate files may omit it.
pub struct SeriesLoader;

impl SeriesLoader {
    /// Create new loader
    pub fn new() -> Self {
        Self
    }

    /// Load a dataset by name from the data root.
    pub fn load(&self, data_root: &Path, name: &str) -> Result<RawDataset> {
        let path = dataset_path(data_root, name)?;
        info!("Loading dataset '{}' from {:?}", name, path);

        let format = FileFormat::from_path(&path)?;
        debug!("Detected file format: {:?}", format);

        let mut raw = String::new();
        let file = File::open(&path).with_context(|| format!("Failed to open {:?}", path))?;
        if format.is_gzipped() {
            GzDecoder::new(file)
                .read_to_string(&mut raw)
                .with_context(|| format!("Failed to decompress {:?}", path))?;
        } else {
            let mut file = file;
            file.read_to_string(&mut raw)
                .with_context(|| format!("Failed to read {:?}", path))?;
        }

        self.parse(name, &raw)
    }

    fn parse(&self, name: &str, raw: &str) -> Result<RawDataset> {
        let num_dims = parse_dim_header(raw).unwrap_or(1);

        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .comment(Some(b'#'))
            .from_reader(raw.as_bytes());

        let mut raw_labels: Vec<i64> = Vec::new();
        let mut rows: Vec<Vec<f32>> = Vec::new();

        for (line, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Malformed row {} in '{}'", line, name))?;
            let mut fields = record.iter();

            let label: i64 = fields
                .next()
                .context("Empty row")?
                .trim()
                .parse::<f64>()
                .with_context(|| format!("Bad label in row {} of '{}'", line, name))?
                as i64;

            let values: Vec<f32> = fields
                .map(|f| f.trim().parse::<f32>())
                .collect::<Result<_, _>>()
                .with_context(|| format!("Bad value in row {} of '{}'", line, name))?;

            raw_labels.push(label);
            rows.push(values);
        }

        if rows.is_empty() {
            bail!("Dataset '{}' contains no samples", name);
        }

        let row_len = rows[0].len();
        if rows.iter().any(|r| r.len() != row_len) {
            bail!("Dataset '{}' has rows of unequal length", name);
        }
        if row_len % num_dims != 0 {
            bail!(
                "Dataset '{}': row length {} not divisible by dim {}",
                name,
                row_len,
                num_dims
            );
        }
        let seq_len = row_len / num_dims;

        // Remap arbitrary labels to contiguous class indices.
        let classes: BTreeSet<i64> = raw_labels.iter().copied().collect();
        let class_index = |label: i64| classes.iter().position(|&c| c == label).unwrap() as i64;
        let labels: Vec<i64> = raw_labels.iter().map(|&l| class_index(l)).collect();

        // Reorder channel-major rows into [seq_len, num_dims] per sample.
        let num_samples = rows.len();
        let mut values = vec![0.0f32; num_samples * seq_len * num_dims];
        for (i, row) in rows.iter().enumerate() {
            for d in 0..num_dims {
                for t in 0..seq_len {
                    values[(i * seq_len + t) * num_dims + d] = row[d * seq_len + t];
                }
            }
        }

        info!(
            "Loaded '{}': {} samples, {} dims, seq_len {}, {} classes",
            name,
            num_samples,
            num_dims,
            seq_len,
            classes.len()
        );

        Ok(RawDataset {
            name: name.to_string(),
            values,
            labels,
            num_samples,
            seq_len,
            num_dims,
            num_classes: classes.len(),
        })
    }
}

impl Default for SeriesLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_dim_header(raw: &str) -> Option<usize> {
    raw.lines()
        .take_while(|l| l.starts_with('#'))
        .find_map(|l| l.trim_start_matches('#').trim().strip_prefix("dim=")?.parse().ok())
}
