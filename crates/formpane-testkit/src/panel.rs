use std::collections::BTreeMap;

use formpane_common::FieldValue;
use formpane_runtime::{FormId, Notice, NoticeLevel, PanelSurface};

/// Panel surface that records everything pushed to it.
#[derive(Debug, Default)]
pub struct RecordingPanel {
    shown: Vec<(FormId, String)>,
    fields: BTreeMap<String, FieldValue>,
    notices: Vec<Notice>,
}

impl RecordingPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_form(&self) -> Option<&FormId> {
        self.shown.last().map(|(id, _)| id)
    }

    pub fn current_html(&self) -> Option<&str> {
        self.shown.last().map(|(_, html)| html.as_str())
    }

    /// Forms shown so far, oldest first.
    pub fn history(&self) -> Vec<&str> {
        self.shown.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn swap_count(&self) -> usize {
        self.shown.len()
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn errors(&self) -> impl Iterator<Item = &Notice> {
        self.notices
            .iter()
            .filter(|notice| notice.level == NoticeLevel::Error)
    }
}

impl PanelSurface for RecordingPanel {
    fn show_form(&mut self, form: &FormId, html: &str) {
        self.shown.push((form.clone(), html.to_string()));
        self.fields.clear();
    }

    fn set_field(&mut self, field: &str, value: &FieldValue) {
        self.fields.insert(field.to_string(), value.clone());
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}
