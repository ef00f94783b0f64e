use egui::Color32;
use tracing::info;

use crate::gallery::selection::unit_count;
use crate::gallery::{Collection, InteractionMode, Item, Selection};
use crate::inbox::ActionKind;

pub const DEFAULT_HIGHLIGHT: Color32 = Color32::WHITE;

pub fn highlight(action: Option<ActionKind>) -> Color32 {
    match action {
        None => DEFAULT_HIGHLIGHT,
        Some(ActionKind::Send) => Color32::from_rgb(0x0e, 0xa5, 0xe9),
        Some(ActionKind::Scan) => Color32::from_rgb(0xf7, 0x8d, 0x00),
        Some(ActionKind::Discard) => Color32::BLACK,
    }
}

/// Which action button is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionBar {
    active: Option<ActionKind>,
}

impl ActionBar {
    pub fn active(&self) -> Option<ActionKind> {
        self.active
    }

    /// Pressing the active action again turns selection off; any other
    /// action switches to selecting with that action's highlight.
    pub fn activate(&mut self, action: ActionKind, selection: &mut Selection) {
        if self.active == Some(action) {
            selection.clear();
            self.active = None;
            return;
        }
        selection.set_mode(InteractionMode::Selecting);
        self.active = Some(action);
    }

    /// Keeps the bar consistent after something else cleared the selection.
    pub fn sync(&mut self, selection: &Selection) {
        if selection.mode() == InteractionMode::Browsing {
            self.active = None;
        }
    }

    /// Whether "Next" leads anywhere: only discarding has a confirmation
    /// step, and only with something selected.
    pub fn can_continue(&self, selection: &Selection) -> bool {
        self.active == Some(ActionKind::Discard) && !selection.is_empty()
    }

    /// The discard navigation target, when "Next" is allowed.
    pub fn next(&self, selection: &Selection, collections: &[&Collection]) -> Option<DiscardRequest> {
        if !self.can_continue(selection) {
            return None;
        }
        let request = DiscardRequest {
            count: selection.unit_count(collections),
            ids: selection.ids().map(str::to_string).collect(),
        };
        info!(count = request.count, "discard requested");
        Some(request)
    }
}

/// Navigation target handed from the inbox to the discard confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscardRequest {
    pub count: usize,
    pub ids: Vec<String>,
}

impl DiscardRequest {
    /// `count=<n>&ids=<a,b,...>`, encoded the way browsers encode form
    /// parameters.
    pub fn to_query(&self) -> String {
        format!(
            "count={}&ids={}",
            self.count,
            encode_component(&self.ids.join(","))
        )
    }

    /// Parses a query produced by [`to_query`](Self::to_query). The count is
    /// recomputed from the ids against `collections`, not trusted.
    pub fn from_query(query: &str, collections: &[&Collection]) -> Self {
        let raw_ids = query
            .trim_start_matches('?')
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "ids")
            .map(|(_, value)| decode_component(value))
            .unwrap_or_default();
        let ids: Vec<String> = raw_ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            count: unit_count(ids.iter().map(String::as_str), collections),
            ids,
        }
    }

    /// Selected items as the confirmation view shows them: paired
    /// collections grouped by pair (pairs with any selected member, in
    /// order), then single items.
    pub fn groups<'a>(&self, collections: &[&'a Collection]) -> Vec<Vec<&'a Item>> {
        let mut groups = Vec::new();
        for collection in collections {
            if collection.pairing.is_paired() {
                for chunk in collection.items.chunks(2) {
                    let picked: Vec<&Item> = chunk
                        .iter()
                        .filter(|item| self.ids.contains(&item.id))
                        .collect();
                    if !picked.is_empty() {
                        groups.push(picked);
                    }
                }
            } else {
                groups.extend(
                    collection
                        .items
                        .iter()
                        .filter(|item| self.ids.contains(&item.id))
                        .map(|item| vec![item]),
                );
            }
        }
        groups
    }
}

fn encode_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'*' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn decode_component(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hex = value.get(i + 1..i + 3);
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 2;
                    }
                    None => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::{Pairing, items};

    fn collections() -> (Collection, Collection) {
        (
            Collection::new(Pairing::Paired, items("pkg", 6)),
            Collection::new(Pairing::Single, items("let", 7)),
        )
    }

    #[test]
    fn activating_the_same_action_twice_turns_selection_off() {
        let (pkgs, _) = collections();
        let mut bar = ActionBar::default();
        let mut selection = Selection::default();

        bar.activate(ActionKind::Scan, &mut selection);
        assert!(selection.is_selecting());
        selection.toggle(&pkgs, "pkg-1");

        bar.activate(ActionKind::Discard, &mut selection);
        assert_eq!(bar.active(), Some(ActionKind::Discard));
        assert_eq!(selection.len(), 2);

        bar.activate(ActionKind::Discard, &mut selection);
        assert_eq!(bar.active(), None);
        assert!(selection.is_empty());
        assert!(!selection.is_selecting());
    }

    #[test]
    fn next_requires_discard_and_a_selection() {
        let (pkgs, letters) = collections();
        let mut bar = ActionBar::default();
        let mut selection = Selection::default();

        bar.activate(ActionKind::Send, &mut selection);
        selection.toggle(&letters, "let-3");
        assert!(!bar.can_continue(&selection));
        assert_eq!(bar.next(&selection, &[&pkgs, &letters]), None);

        bar.activate(ActionKind::Discard, &mut selection);
        assert!(bar.can_continue(&selection));
        selection.toggle(&pkgs, "pkg-1");
        let request = bar.next(&selection, &[&pkgs, &letters]).unwrap();
        assert_eq!(request.count, 2);
        assert_eq!(request.ids, vec!["let-3", "pkg-1", "pkg-2"]);
    }

    #[test]
    fn sync_drops_action_after_background_clear() {
        let mut bar = ActionBar::default();
        let mut selection = Selection::default();
        bar.activate(ActionKind::Scan, &mut selection);
        selection.clear();
        bar.sync(&selection);
        assert_eq!(bar.active(), None);
    }

    #[test]
    fn query_encodes_commas_like_a_browser() {
        let request = DiscardRequest {
            count: 2,
            ids: vec!["pkg-1".into(), "pkg-2".into(), "let-3".into()],
        };
        assert_eq!(request.to_query(), "count=2&ids=pkg-1%2Cpkg-2%2Clet-3");
    }

    #[test]
    fn query_parsing_recounts_and_drops_blanks() {
        let (pkgs, letters) = collections();
        let parsed = DiscardRequest::from_query(
            "?count=99&ids=pkg-1%2C+pkg-2%2C%2Clet-3,unknown",
            &[&pkgs, &letters],
        );
        assert_eq!(parsed.ids, vec!["pkg-1", "pkg-2", "let-3", "unknown"]);
        assert_eq!(parsed.count, 2);

        let empty = DiscardRequest::from_query("count=0", &[&pkgs, &letters]);
        assert!(empty.ids.is_empty());
        assert_eq!(empty.count, 0);
    }

    #[test]
    fn groups_pair_packages_then_list_letters() {
        let (pkgs, letters) = collections();
        let request = DiscardRequest {
            count: 0,
            ids: vec!["let-2".into(), "pkg-3".into(), "pkg-4".into(), "pkg-6".into()],
        };
        let groups = request.groups(&[&pkgs, &letters]);
        let ids: Vec<Vec<&str>> = groups
            .iter()
            .map(|g| g.iter().map(|item| item.id.as_str()).collect())
            .collect();
        assert_eq!(ids, vec![vec!["pkg-3", "pkg-4"], vec!["pkg-6"], vec!["let-2"]]);
    }
}
