// src/corpus.rs
use crate::error::{ReconError, Result};
use crate::types::{CorrelationHit, TxtRecord};
use duckdb::{params, params_from_iter, Connection};
use log::{debug, warn};
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

const PARQUET_MAGIC: &[u8; 4] = b"PAR1";

/// Fingerprints shared by more than one name, and those linked to the target.
const FINGERPRINT_CTES: &str = "
    WITH shared_txt AS (
        SELECT txt_text
        FROM txt_records
        GROUP BY txt_text
        HAVING COUNT(DISTINCT query_name) > 1
    ),
    domain_related AS (
        SELECT DISTINCT s.txt_text
        FROM shared_txt s
        JOIN txt_records t ON s.txt_text = t.txt_text
        WHERE contains(t.query_name, ?::VARCHAR)
    )";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub files: usize,
    pub rows: usize,
    pub skipped: usize,
}

/// Answer of one correlation query.
#[derive(Debug, Default, Clone)]
pub struct CorpusMatches {
    pub hits: Vec<CorrelationHit>,
    pub stats: ScanStats,
    pub discriminating_fingerprints: usize,
    pub target_fingerprints: usize,
}

/// A TXT record store that can answer the shared-fingerprint query.
///
/// `target` is matched as a case-sensitive substring of the query name;
/// fingerprints containing any of `generic_patterns` are left out.
pub trait CorpusReader {
    fn shared_fingerprints(&self, target: &str, generic_patterns: &[String]) -> Result<CorpusMatches>;
}

/// TXT records exposed to an embedded DuckDB connection as `txt_records`.
pub struct TxtCorpus {
    conn: Connection,
    files: usize,
}

impl TxtCorpus {
    /// Opens a Parquet file, or every Parquet file of a folder.
    ///
    /// Files without Parquet framing are skipped with a warning.
    pub fn open_parquet(path: impl AsRef<Path>) -> Result<Self> {
        let files = parquet_files(path.as_ref())?;
        if files.is_empty() {
            return Err(ReconError::CorpusError(format!(
                "No Parquet files under {}",
                path.as_ref().display()
            )));
        }

        let list = files
            .iter()
            .map(|file| sql_literal(&file.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(", ");

        let conn = open_connection()?;
        conn.execute_batch(&format!(
            "CREATE VIEW txt_source AS
                 SELECT txt_text, query_name
                 FROM read_parquet([{}], union_by_name = true, binary_as_string = true);",
            list
        ))
        .map_err(corpus_error)?;
        create_records_view(&conn)?;

        Ok(Self {
            conn,
            files: files.len(),
        })
    }

    /// Loads records into an in-memory table.
    pub fn from_records(records: &[TxtRecord]) -> Result<Self> {
        let conn = open_connection()?;
        conn.execute_batch("CREATE TABLE txt_source (txt_text VARCHAR, query_name VARCHAR);")
            .map_err(corpus_error)?;
        {
            let mut insert = conn
                .prepare("INSERT INTO txt_source VALUES (?, ?)")
                .map_err(corpus_error)?;
            for record in records {
                insert
                    .execute(params![record.txt_text, record.query_name])
                    .map_err(corpus_error)?;
            }
        }
        create_records_view(&conn)?;

        Ok(Self { conn, files: 0 })
    }

    pub fn stats(&self) -> Result<ScanStats> {
        let (rows, skipped): (i64, i64) = self
            .conn
            .query_row(
                "SELECT COUNT(*), COUNT(*) FILTER (WHERE txt_text IS NULL OR query_name IS NULL)
                 FROM txt_source",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(corpus_error)?;

        Ok(ScanStats {
            files: self.files,
            rows: rows as usize,
            skipped: skipped as usize,
        })
    }
}

impl CorpusReader for TxtCorpus {
    fn shared_fingerprints(&self, target: &str, generic_patterns: &[String]) -> Result<CorpusMatches> {
        let stats = self.stats()?;

        let (discriminating, linked): (i64, i64) = self
            .conn
            .query_row(
                &format!(
                    "{} SELECT (SELECT COUNT(*) FROM shared_txt), (SELECT COUNT(*) FROM domain_related)",
                    FINGERPRINT_CTES
                ),
                params![target],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(corpus_error)?;

        let mut sql = format!(
            "{}
            SELECT DISTINCT t.txt_text, t.query_name
            FROM txt_records t
            WHERE t.txt_text IN (SELECT txt_text FROM domain_related)
              AND NOT contains(t.query_name, ?::VARCHAR)",
            FINGERPRINT_CTES
        );
        for _ in generic_patterns {
            sql.push_str("\n  AND NOT contains(t.txt_text, ?::VARCHAR)");
        }
        sql.push_str("\nORDER BY t.txt_text, t.query_name");

        let mut bound: Vec<&str> = vec![target, target];
        bound.extend(generic_patterns.iter().map(String::as_str));

        let mut statement = self.conn.prepare(&sql).map_err(corpus_error)?;
        let rows = statement
            .query_map(params_from_iter(bound), |row| {
                Ok(CorrelationHit {
                    fingerprint: row.get(0)?,
                    query_name: row.get(1)?,
                })
            })
            .map_err(corpus_error)?;

        let mut hits = Vec::new();
        for hit in rows {
            hits.push(hit.map_err(corpus_error)?);
        }

        Ok(CorpusMatches {
            hits,
            stats,
            discriminating_fingerprints: discriminating as usize,
            target_fingerprints: linked as usize,
        })
    }
}

fn open_connection() -> Result<Connection> {
    Connection::open_in_memory().map_err(corpus_error)
}

/// Rows with a null or missing column are kept out of every query.
fn create_records_view(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE VIEW txt_records AS
             SELECT txt_text, query_name
             FROM txt_source
             WHERE txt_text IS NOT NULL AND query_name IS NOT NULL;",
    )
    .map_err(corpus_error)
}

/// Lists the Parquet files at `path`: the file itself, or the visible files of a folder.
pub fn parquet_files(path: &Path) -> Result<Vec<PathBuf>> {
    let metadata = fs::metadata(path)
        .map_err(|e| ReconError::CorpusError(format!("Cannot read {}: {}", path.display(), e)))?;

    let candidates = if metadata.is_file() {
        vec![path.to_path_buf()]
    } else {
        let entries = fs::read_dir(path)
            .map_err(|e| ReconError::CorpusError(format!("Cannot list {}: {}", path.display(), e)))?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                !path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map_or(true, |name| name.starts_with('.'))
            })
            .collect();
        files.sort();
        files
    };

    Ok(candidates
        .into_iter()
        .filter(|file| {
            let framed = has_parquet_framing(file);
            if framed {
                debug!("Corpus file {}", file.display());
            } else {
                warn!("Skipping corpus file {}: not a Parquet file", file.display());
            }
            framed
        })
        .collect())
}

/// Parquet files start and end with the `PAR1` magic.
fn has_parquet_framing(path: &Path) -> bool {
    let check = || -> std::io::Result<bool> {
        let mut file = File::open(path)?;
        if file.metadata()?.len() < 8 {
            return Ok(false);
        }
        let mut head = [0u8; 4];
        file.read_exact(&mut head)?;
        let mut tail = [0u8; 4];
        file.seek(SeekFrom::End(-4))?;
        file.read_exact(&mut tail)?;
        Ok(&head == PARQUET_MAGIC && &tail == PARQUET_MAGIC)
    };
    check().unwrap_or(false)
}

fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn corpus_error(e: duckdb::Error) -> ReconError {
    ReconError::CorpusError(e.to_string())
}
