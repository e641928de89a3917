//! Output tree management for extracted transcripts.
//!
//! # Storage Layout
//!
//! ```text
//! <output_dir>/
//! ├── extraction_progress.json     # Active progress (archived after a full pass)
//! ├── master_catalog.csv           # One row per item settled in the pass
//! ├── failed_items.json            # Failures of the pass
//! ├── extraction_summary.txt       # Narrative run summary
//! ├── all_items.csv                # Written by `chanscribe scan`
//! ├── all_items.json
//! ├── content_analysis.json
//! ├── organization_report.json     # Written by `chanscribe validate`
//! ├── MASTER_INDEX.md              # Written by `chanscribe index`
//! └── <Category>/
//!     ├── <Category>_INDEX.md
//!     └── <Subcategory>/
//!         └── <safe_title>_<id>.txt
//! ```

pub mod catalog;
pub mod content;
pub mod organize;
pub mod report;

pub use catalog::{Catalog, CATALOG_FILE_NAME};
pub use content::{ArtifactSink, FsSink, FLAT_DIR_NAME};
pub use organize::{OrganizationReport, OrganizeSummary, VALIDATION_FILE_NAME};
pub use report::{render_summary, ChannelAnalysis, DiscoveryPaths, ReportPaths, ReportWriter};
