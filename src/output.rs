// src/output.rs
use crate::error::{ReconError, Result};
use crate::types::{AggregationReport, CorrelationReport, OutputConfig, OutputFormat};
use crate::utils::format_ip_list;
use log::info;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct OutputManager {
    config: OutputConfig,
}

#[derive(Serialize)]
struct CorrelationRow<'a> {
    txt_text: &'a str,
    query_name: &'a str,
}

impl OutputManager {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn write_report(&self, report: &AggregationReport) -> Result<()> {
        self.write_to_sink(|writer| self.write_subdomains(writer, report))
    }

    pub fn write_correlation(&self, report: &CorrelationReport) -> Result<()> {
        self.write_to_sink(|writer| self.write_correlation_rows(writer, report))
    }

    fn write_to_sink<F>(&self, write: F) -> Result<()>
    where
        F: FnOnce(&mut dyn Write) -> Result<()>,
    {
        match &self.config.file {
            Some(file_path) => {
                if let Some(parent) = Path::new(file_path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| ReconError::OutputError(format!("Failed to create directory: {}", e)))?;
                    }
                }

                let file = File::create(file_path)
                    .map_err(|e| ReconError::OutputError(format!("Failed to create file {}: {}", file_path, e)))?;
                let mut buffered = BufWriter::new(file);
                let writer: &mut dyn Write = &mut buffered;
                write(&mut *writer)?;
                writer.flush().map_err(io_error)?;

                info!("Results have been saved to the file: {}", file_path);
                Ok(())
            }
            None => {
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                let writer: &mut dyn Write = &mut handle;
                write(&mut *writer)?;
                writer.flush().map_err(io_error)
            }
        }
    }

    pub fn write_subdomains(&self, writer: &mut dyn Write, report: &AggregationReport) -> Result<()> {
        match self.config.format {
            OutputFormat::Text => {
                for record in &report.subdomains {
                    writeln!(writer, "{}; {}", record.subdomain, format_ip_list(&record.ips)).map_err(io_error)?;
                }
            }
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&report.subdomains)
                    .map_err(|e| ReconError::OutputError(format!("Failed to serialize JSON: {}", e)))?;
                writeln!(writer, "{}", json).map_err(io_error)?;
            }
            OutputFormat::Csv => {
                writeln!(writer, "subdomain,ips").map_err(io_error)?;
                for record in &report.subdomains {
                    writeln!(writer, "{},\"{}\"", record.subdomain, record.ips.join(" ")).map_err(io_error)?;
                }
            }
        }
        Ok(())
    }

    pub fn write_correlation_rows(&self, writer: &mut dyn Write, report: &CorrelationReport) -> Result<()> {
        match self.config.format {
            OutputFormat::Json => {
                let rows: Vec<CorrelationRow> = report
                    .hits
                    .iter()
                    .map(|hit| CorrelationRow {
                        txt_text: &hit.fingerprint,
                        query_name: &hit.query_name,
                    })
                    .collect();
                let json = serde_json::to_string_pretty(&rows)
                    .map_err(|e| ReconError::OutputError(format!("Failed to serialize JSON: {}", e)))?;
                writeln!(writer, "{}", json).map_err(io_error)?;
            }
            OutputFormat::Csv => {
                writeln!(writer, "txt_text,query_name").map_err(io_error)?;
                for hit in &report.hits {
                    writeln!(writer, "\"{}\",{}", hit.fingerprint.replace('"', "\"\""), hit.query_name)
                        .map_err(io_error)?;
                }
            }
            OutputFormat::Text => {
                for hit in &report.hits {
                    writeln!(writer, "({:?}, {:?})", hit.fingerprint, hit.query_name).map_err(io_error)?;
                }
                writeln!(writer, "{} domains found", report.hits.len()).map_err(io_error)?;
            }
        }
        Ok(())
    }
}

fn io_error(e: std::io::Error) -> ReconError {
    ReconError::OutputError(e.to_string())
}
