//! Test doubles for the Formpane runtime: an in-memory workbook host, a
//! panel that records what it was asked to show, and a static form source.

mod forms;
mod panel;
mod workbook;

pub use forms::StaticForms;
pub use panel::RecordingPanel;
pub use workbook::MemoryWorkbook;
