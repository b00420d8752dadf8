//! Snapshot size budgeting
//!
//! When a snapshot serializes above its budget, sections are shrunk in a
//! fixed priority order, request data first. Each section first has its
//! strings cut to the minimum length; if that is not enough the section is
//! collapsed to a single omission note. Shrinking stops as soon as the
//! snapshot fits under the target share of the budget.

use super::mask::truncate_string;
use super::{FileMeta, RequestSnapshot};
use crate::config::compile_time::context::{MIN_STRING_LENGTH, SHRINK_TARGET_PERCENT};
use crate::logging::codes;
use crate::{log_debug, log_warning};
use serde::Serialize;
use std::collections::BTreeMap;

/// Snapshot sections that may be shrunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Body,
    Query,
    Files,
    Headers,
    Session,
    Server,
    Env,
}

impl Section {
    /// Order in which sections give up space
    pub const SHRINK_ORDER: [Section; 7] = [
        Section::Body,
        Section::Query,
        Section::Files,
        Section::Headers,
        Section::Session,
        Section::Server,
        Section::Env,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Section::Body => "body",
            Section::Query => "query",
            Section::Files => "files",
            Section::Headers => "headers",
            Section::Session => "session",
            Section::Server => "server",
            Section::Env => "env",
        }
    }
}

/// Shrink `snapshot` until it fits the budget; returns the final size
pub fn enforce_budget(snapshot: &mut RequestSnapshot, budget: usize) -> usize {
    let mut size = snapshot.serialized_size();
    if size <= budget {
        return size;
    }

    let target = budget.saturating_mul(SHRINK_TARGET_PERCENT) / 100;
    log_warning!(codes::context::BUDGET_EXCEEDED, "Request context over budget, shrinking",
        "size" => size, "budget" => budget, "target" => target);

    for section in Section::SHRINK_ORDER {
        if size <= target {
            break;
        }

        if snapshot.shrink_strings(section, MIN_STRING_LENGTH) {
            let before = size;
            size = snapshot.serialized_size();
            log_debug!("Context section strings shortened",
                "section" => section.name(), "before" => before, "after" => size);
            log_warning!(codes::context::SECTION_SHRUNK, "Context section shortened",
                "section" => section.name(), "size" => size);
        }
        if size <= target {
            break;
        }

        if let Some(note) = snapshot.collapse(section) {
            size = snapshot.serialized_size();
            log_warning!(codes::context::SECTION_COLLAPSED, "Context section omitted",
                "section" => section.name(), "note" => &note, "size" => size);
        }
    }

    size
}

impl RequestSnapshot {
    /// Byte length of the JSON form of this snapshot
    pub fn serialized_size(&self) -> usize {
        serialized_len(self)
    }

    /// Cut every string in a section to `max` characters; `true` if anything changed
    pub(super) fn shrink_strings(&mut self, section: Section, max: usize) -> bool {
        match section {
            Section::Files => {
                let mut changed = false;
                for meta in self.files.values_mut() {
                    changed |= shrink_in_place(&mut meta.name, max);
                    changed |= shrink_in_place(&mut meta.mime, max);
                }
                changed
            }
            other => self
                .string_section_mut(other)
                .map(|map| {
                    let mut changed = false;
                    for value in map.values_mut() {
                        changed |= shrink_in_place(value, max);
                    }
                    changed
                })
                .unwrap_or(false),
        }
    }

    /// Empty a section, leaving a note of what was dropped
    pub(super) fn collapse(&mut self, section: Section) -> Option<String> {
        let (count, bytes) = match section {
            Section::Files => {
                let files: BTreeMap<String, FileMeta> = std::mem::take(&mut self.files);
                (files.len(), serialized_len(&files))
            }
            other => {
                let map = std::mem::take(self.string_section_mut(other)?);
                (map.len(), serialized_len(&map))
            }
        };
        if count == 0 {
            return None;
        }

        let note = format!("[{} items omitted, {} bytes]", count, bytes);
        self.omitted_sections
            .insert(section.name().to_string(), note.clone());
        Some(note)
    }

    fn string_section_mut(&mut self, section: Section) -> Option<&mut BTreeMap<String, String>> {
        match section {
            Section::Body => Some(&mut self.body),
            Section::Query => Some(&mut self.query),
            Section::Headers => Some(&mut self.headers),
            Section::Session => Some(&mut self.session),
            Section::Server => Some(&mut self.server),
            Section::Env => Some(&mut self.env),
            Section::Files => None,
        }
    }
}

fn shrink_in_place(value: &mut String, max: usize) -> bool {
    if value.chars().count() <= max {
        return false;
    }
    *value = truncate_string(value, max);
    true
}

fn serialized_len<T: Serialize + ?Sized>(value: &T) -> usize {
    serde_json::to_vec(value)
        .map(|bytes| bytes.len())
        .unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::service::create_test_service;
    use crate::logging::with_scoped_logger;
    use std::sync::Arc;

    fn snapshot_with_body(entries: usize, width: usize) -> RequestSnapshot {
        RequestSnapshot {
            body: (0..entries)
                .map(|i| (format!("field_{:03}", i), "v".repeat(width)))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_under_budget_is_untouched() {
        let mut snapshot = snapshot_with_body(3, 10);
        let original = snapshot.clone();
        let size = enforce_budget(&mut snapshot, 10_000);
        assert_eq!(snapshot, original);
        assert_eq!(size, original.serialized_size());
    }

    #[test]
    fn test_shortening_strings_can_be_enough() {
        let mut snapshot = snapshot_with_body(20, 1000);
        let size = enforce_budget(&mut snapshot, 5000);

        assert!(size <= 5000 * SHRINK_TARGET_PERCENT / 100);
        assert_eq!(snapshot.body.len(), 20);
        assert!(snapshot.body.values().all(|v| v.ends_with("...")));
        assert!(snapshot.omitted_sections.is_empty());
    }

    #[test]
    fn test_collapse_when_shortening_is_not_enough() {
        let mut snapshot = snapshot_with_body(40, 1000);
        snapshot.headers.insert("host".to_string(), "example.test".to_string());
        let size = enforce_budget(&mut snapshot, 4000);

        assert!(size <= 4000);
        assert!(snapshot.body.is_empty());
        assert!(snapshot.omitted_sections["body"].starts_with("[40 items omitted"));
        // Lower-priority sections survive once the target is met
        assert_eq!(snapshot.headers["host"], "example.test");
    }

    #[test]
    fn test_shrinking_is_logged_per_section() {
        let (service, memory) = create_test_service();
        let mut snapshot = snapshot_with_body(40, 1000);
        with_scoped_logger(Arc::new(service), || enforce_budget(&mut snapshot, 4000));

        assert!(memory.has_warning_with_code(codes::context::BUDGET_EXCEEDED));
        assert!(memory.has_warning_with_code(codes::context::SECTION_SHRUNK));
        let collapsed = memory.get_events_with_code(codes::context::SECTION_COLLAPSED);
        assert_eq!(collapsed.len(), 1);
        assert_eq!(collapsed[0].context["section"], "body");

        memory.clear();
        let mut small = snapshot_with_body(3, 10);
        enforce_budget(&mut small, 10_000);
        assert_eq!(memory.event_count(), 0);
    }

    #[test]
    fn test_collapse_skips_empty_sections() {
        let mut snapshot = RequestSnapshot::default();
        assert!(snapshot.collapse(Section::Query).is_none());
        assert!(snapshot.omitted_sections.is_empty());
    }
}
