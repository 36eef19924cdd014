//! Service layer for catalog-aligner
//!
//! This module contains service classes that separate infrastructure concerns
//! (codecs, archives, sheets, rendering, progress) from the pipeline logic.

pub mod archive;
pub mod branding;
pub mod codec;
pub mod progress;
pub mod render;
pub mod sheet;

pub use archive::{
    ArchiveWriter, DirectoryArchive, ErrorReport, MemoryArchive, TarGzArchive, ERROR_REPORT_NAME,
    MANIFEST_NAME,
};
pub use branding::{BrandCatalog, LogoLibrary};
pub use codec::{ImageCodec, ImageProbe};
pub use progress::{BatchProgress, ConsoleProgressReporter, NoOpProgressReporter};
pub use render::{date_label_html, ChromiumRenderer, LabelRenderer};
pub use sheet::{import_file, import_jobs, SheetImport};
