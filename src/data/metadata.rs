use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use log::info;
use serde::Deserialize;

use super::model::RunMetadata;
use crate::error::{Error, Result};

/// Anything that can resolve a run identifier to exactly one metadata row.
pub trait MetadataSource {
    /// Fails with [`Error::RecordNotFound`] when the run is unknown.
    fn lookup(&self, run_id: &str) -> Result<RunMetadata>;

    /// Number of rows in the source.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// CSV row layout of the run table.
#[derive(Debug, Deserialize)]
struct MetadataRow {
    #[serde(rename = "RunID")]
    run_id: String,
    #[serde(rename = "Rider")]
    rider: String,
    #[serde(rename = "Maneuver")]
    maneuver: String,
    #[serde(rename = "Environment")]
    environment: String,
    #[serde(rename = "Speed")]
    speed: f64,
}

/// In-memory run table keyed by run identifier.
#[derive(Debug, Clone, Default)]
pub struct MetadataTable {
    rows: HashMap<String, RunMetadata>,
}

impl MetadataTable {
    /// Build from `(run_id, metadata)` pairs. A repeated run identifier is
    /// malformed input.
    pub fn from_rows<I>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, RunMetadata)>,
    {
        let mut table = HashMap::new();
        for (run_id, metadata) in rows {
            if table.insert(run_id.clone(), metadata).is_some() {
                return Err(Error::MalformedInput(format!(
                    "run {run_id} appears more than once in the run table"
                )));
            }
        }
        Ok(MetadataTable { rows: table })
    }

    /// Read a CSV run table with columns `RunID, Rider, Maneuver,
    /// Environment, Speed`. Extra columns are ignored.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut rows = Vec::new();
        for result in csv_reader.deserialize() {
            let row: MetadataRow = result?;
            rows.push((
                row.run_id,
                RunMetadata {
                    rider: row.rider,
                    maneuver: row.maneuver,
                    environment: row.environment,
                    speed_bin: row.speed,
                },
            ));
        }
        Self::from_rows(rows)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let table = Self::from_reader(file)?;
        info!("Loaded {} run table rows from {}", table.len(), path.display());
        Ok(table)
    }
}

impl MetadataSource for MetadataTable {
    fn lookup(&self, run_id: &str) -> Result<RunMetadata> {
        self.rows
            .get(run_id)
            .cloned()
            .ok_or_else(|| Error::RecordNotFound(run_id.to_string()))
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
RunID,Rider,Maneuver,Environment,Speed,Notes
00105,Jason,Balance,Horse Treadmill,4.0,
00106,Luke,Track Straight Line,Pavillion Floor,4.92,windy
";

    #[test]
    fn csv_lookup_keeps_leading_zeros() {
        let table = MetadataTable::from_reader(TABLE.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        let row = table.lookup("00106").unwrap();
        assert_eq!(row.rider, "Luke");
        assert_eq!(row.environment, "Pavillion Floor");
        assert_eq!(row.speed_bin, 4.92);
    }

    #[test]
    fn missing_run_is_record_not_found() {
        let table = MetadataTable::from_reader(TABLE.as_bytes()).unwrap();
        match table.lookup("105") {
            Err(Error::RecordNotFound(id)) => assert_eq!(id, "105"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_run_is_malformed() {
        let dup = "RunID,Rider,Maneuver,Environment,Speed\n1,Jason,Balance,Pavilion,2.0\n1,Luke,Balance,Pavilion,2.0\n";
        let err = MetadataTable::from_reader(dup.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));
    }
}
