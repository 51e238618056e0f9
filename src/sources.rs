//! Recording loaders: the column table consumed by the estimator.
//!
//! Accepts CSV (`eixox,eixoy,eixoz,gps_fix,gps_speed,gps_direction,gps_alt,gps_rtc`)
//! or a JSON array of the same records, either optionally gzip-compressed.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{AttitudeError, Result};
use crate::types::{Accel3, GpsReading, Sample};

/// One row of a recording, named after the logger's columns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordRow {
    pub eixox: f64,
    pub eixoy: f64,
    pub eixoz: f64,
    pub gps_fix: u8,
    /// km/h
    pub gps_speed: f64,
    /// degrees, 0-360
    pub gps_direction: f64,
    /// meters
    pub gps_alt: f64,
    /// seconds
    pub gps_rtc: f64,
}

impl RecordRow {
    pub fn into_sample(self, index: usize) -> Sample {
        Sample {
            index,
            accel: Accel3::new(self.eixox, self.eixoy, self.eixoz),
            gps: GpsReading {
                fix: self.gps_fix,
                speed_kmh: self.gps_speed,
                heading_deg: self.gps_direction,
                altitude_m: self.gps_alt,
                rtc: self.gps_rtc,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Csv,
    Json,
}

fn detect(path: &Path) -> Result<(Format, bool)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let (stem, gz) = match name.strip_suffix(".gz") {
        Some(stem) => (stem, true),
        None => (name.as_str(), false),
    };
    if stem.ends_with(".csv") {
        Ok((Format::Csv, gz))
    } else if stem.ends_with(".json") {
        Ok((Format::Json, gz))
    } else {
        Err(AttitudeError::MalformedInput(format!(
            "{}: expected .csv or .json (optionally .gz)",
            path.display()
        )))
    }
}

/// Load a recording; the row position becomes the sample index.
pub fn load_samples(path: &Path) -> Result<Vec<Sample>> {
    let (format, gz) = detect(path)?;
    let file = File::open(path)?;
    let reader: Box<dyn Read> = if gz {
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    match format {
        Format::Csv => read_csv(reader),
        Format::Json => read_json(reader),
    }
}

/// Parse CSV rows, skipping (and logging) rows that do not parse.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Sample>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut samples = Vec::new();
    let mut skipped = 0usize;

    for (line, record) in csv_reader.deserialize::<RecordRow>().enumerate() {
        match record {
            Ok(row) => {
                let index = samples.len();
                samples.push(row.into_sample(index));
            }
            Err(e) => {
                skipped += 1;
                warn!("Skipping CSV row {}: {}", line + 2, e);
            }
        }
    }

    if samples.is_empty() && skipped > 0 {
        return Err(AttitudeError::MalformedInput(format!(
            "none of {skipped} CSV rows could be parsed"
        )));
    }
    Ok(samples)
}

pub fn read_json<R: Read>(reader: R) -> Result<Vec<Sample>> {
    let rows: Vec<RecordRow> = serde_json::from_reader(reader)
        .map_err(|e| AttitudeError::MalformedInput(format!("JSON recording: {e}")))?;
    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| row.into_sample(index))
        .collect())
}
