//! Report Assembler: the machine-readable document plus its text and
//! markdown renderings.
mod assemble;
mod key_facts;
mod render;

pub use assemble::{
    assemble, assemble_with_capture, CaptureSummary, CategorySection, Report, ReportDocument,
};
pub use key_facts::{KeyFact, KeyFacts};
pub use render::{render_highlights, render_markdown, render_raw, render_text};
