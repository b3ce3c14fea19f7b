use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use super::domain::{
    CompetencyId, CompetencyRating, CycleId, EmployeeId, RaterRole, RatingScale, RatingScore,
};
use super::error::EvaluationError;

#[derive(Debug, thiserror::Error)]
pub enum RatingImportError {
    #[error("failed to read rating export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid rating CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: {source}")]
    Row {
        row: usize,
        #[source]
        source: EvaluationError,
    },
}

/// Reads rating rows exported by the survey front end.
///
/// Expected headers: `cycle_id,subject_id,rater_id,role,competency_id,score,comment`.
pub struct RatingCsvImporter;

impl RatingCsvImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        scale: RatingScale,
    ) -> Result<Vec<CompetencyRating>, RatingImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, scale)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        scale: RatingScale,
    ) -> Result<Vec<CompetencyRating>, RatingImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut ratings = Vec::new();

        for (index, record) in csv_reader.deserialize::<RatingRow>().enumerate() {
            let row = record?;
            // Header is line 1.
            let line = index + 2;
            let role: RaterRole = row
                .role
                .parse()
                .map_err(|source| RatingImportError::Row { row: line, source })?;
            let score = RatingScore::new(row.score, scale)
                .map_err(|source| RatingImportError::Row { row: line, source })?;

            ratings.push(CompetencyRating {
                cycle_id: CycleId(row.cycle_id),
                subject_id: EmployeeId(row.subject_id),
                rater_id: EmployeeId(row.rater_id),
                role,
                competency_id: CompetencyId(row.competency_id),
                score,
                comment: row.comment,
                version: 1,
            });
        }

        Ok(ratings)
    }
}

#[derive(Debug, Deserialize)]
struct RatingRow {
    cycle_id: String,
    subject_id: String,
    rater_id: String,
    role: String,
    competency_id: String,
    score: u8,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    comment: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
