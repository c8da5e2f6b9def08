use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::aggregate::Dataset;
use super::author::AuthorDirectory;
use super::country::CountryNames;
use super::record::parse_records;

const COUNTRY_CODES_FILE: &str = "country_codes.json";

#[derive(Clone, Debug)]
pub struct DataSource {
    pub records: PathBuf,
    pub country_codes: Option<PathBuf>,
    pub authors: Option<PathBuf>,
}

impl DataSource {
    pub fn new(records: PathBuf, country_codes: Option<PathBuf>) -> Self {
        Self {
            records,
            country_codes,
            authors: None,
        }
    }

    pub fn with_authors(mut self, authors: Option<PathBuf>) -> Self {
        self.authors = authors;
        self
    }

    fn country_codes_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.country_codes {
            return Some(path.clone());
        }

        let sibling = self
            .records
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(COUNTRY_CODES_FILE);
        sibling.is_file().then_some(sibling)
    }
}

fn load_names(source: &DataSource) -> Result<CountryNames> {
    let Some(path) = source.country_codes_path() else {
        return Ok(CountryNames::default());
    };

    match CountryNames::load(&path) {
        Ok(names) => Ok(names),
        Err(error) if source.country_codes.is_none() => {
            warn!(path = %path.display(), %error, "ignoring unreadable country names");
            Ok(CountryNames::default())
        }
        Err(error) => Err(error),
    }
}

pub fn load_dataset(source: &DataSource) -> Result<Dataset> {
    let raw = fs::read_to_string(&source.records)
        .with_context(|| format!("failed to read {}", source.records.display()))?;

    let parsed = parse_records(&raw)
        .with_context(|| format!("failed to parse {}", source.records.display()))?;

    let names = load_names(source)?;
    let authors = source
        .authors
        .as_deref()
        .map(AuthorDirectory::load)
        .transpose()?;
    let dataset = Dataset::from_records(&parsed.records, names).with_authors(authors);

    info!(
        path = %source.records.display(),
        rows = parsed.records.len(),
        skipped = parsed.skipped_rows,
        defaulted = parsed.defaulted_fields,
        nodes = dataset.node_count(),
        edges = dataset.edge_count(),
        countries = dataset.categories.len(),
        country_names = dataset.names.len(),
        authors = dataset.authors.as_ref().map_or(0, AuthorDirectory::author_count),
        "loaded collaboration dataset"
    );

    Ok(dataset)
}
