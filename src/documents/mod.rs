//! Generated artifacts: CSV import/export and invoice PDFs.

pub mod csv;
pub mod pdf;
