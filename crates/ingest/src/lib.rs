pub mod parquet_import;

pub use parquet_import::{ImportOutput, ParquetImporter};
