pub mod gesture;
pub mod preview;
pub mod selection;

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use gesture::{Gesture, LongPress};
pub use preview::PreviewNavigator;
pub use selection::{InteractionMode, Selection};

/// One photographed entry (a package or a letter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(rename = "src")]
    pub image_source: String,
    #[serde(rename = "alt", default)]
    pub description: String,
}

impl Item {
    pub fn new(
        id: impl Into<String>,
        image_source: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            image_source: image_source.into(),
            description: description.into(),
        }
    }
}

/// Whether consecutive items are grouped into 2-tuples by position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Pairing {
    #[default]
    Single,
    /// Positions `2k` and `2k + 1` form pair `k`.
    Paired,
}

impl Pairing {
    pub fn is_paired(self) -> bool {
        self == Pairing::Paired
    }
}

/// Position of the other member of the pair containing `index`, if it exists.
pub fn partner_index(pairing: Pairing, index: usize, len: usize) -> Option<usize> {
    if !pairing.is_paired() || index >= len {
        return None;
    }
    let partner = if index % 2 == 0 {
        index + 1
    } else {
        index - 1
    };
    (partner < len).then_some(partner)
}

/// 1-based number shown on a tile or in the viewer badge.
pub fn display_number(pairing: Pairing, index: usize) -> usize {
    match pairing {
        Pairing::Paired => index / 2 + 1,
        Pairing::Single => index + 1,
    }
}

/// Number of user-visible units in a sequence of `len` items.
pub fn unit_len(pairing: Pairing, len: usize) -> usize {
    match pairing {
        Pairing::Paired => len.div_ceil(2),
        Pairing::Single => len,
    }
}

/// An ordered item sequence together with its pairing rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collection {
    pub pairing: Pairing,
    pub items: Vec<Item>,
}

impl Collection {
    pub fn new(pairing: Pairing, items: Vec<Item>) -> Self {
        Self { pairing, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    pub fn partner_of(&self, index: usize) -> Option<&Item> {
        partner_index(self.pairing, index, self.len()).map(|i| &self.items[i])
    }

    /// Positions that are rendered as tiles: every position when single,
    /// only the first member of each pair when paired.
    pub fn tile_positions(&self) -> impl Iterator<Item = usize> + '_ {
        let step = if self.pairing.is_paired() { 2 } else { 1 };
        (0..self.len()).step_by(step)
    }
}

/// One gallery instance: a collection, its tiles' long-press recognizers and
/// its preview cursor.
///
/// Selection state is not owned here; every operation that can select
/// receives the screen's [`Selection`] explicitly.
pub struct Gallery {
    collection: Collection,
    presses: Vec<LongPress>,
    preview: PreviewNavigator,
    threshold: Duration,
}

impl Gallery {
    pub fn new(collection: Collection, threshold: Duration) -> Self {
        let presses = (0..collection.len())
            .map(|_| LongPress::new(threshold))
            .collect();
        let preview = PreviewNavigator::new(collection.pairing);
        Self {
            collection,
            presses,
            preview,
            threshold,
        }
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn preview(&self) -> &PreviewNavigator {
        &self.preview
    }

    pub fn preview_mut(&mut self) -> &mut PreviewNavigator {
        &mut self.preview
    }

    /// Item under the preview cursor, if the viewer is open.
    pub fn previewed(&self) -> Option<&Item> {
        self.preview
            .cursor()
            .and_then(|index| self.collection.items.get(index))
    }

    /// Replaces the sequence. Pending presses are cancelled and an out of
    /// range preview is closed.
    pub fn set_items(&mut self, items: Vec<Item>) {
        self.cancel_all();
        self.collection.items = items;
        self.presses = (0..self.collection.len())
            .map(|_| LongPress::new(self.threshold))
            .collect();
        if let Some(index) = self.preview.cursor() {
            if index >= self.collection.len() {
                self.preview.close();
            }
        }
    }

    pub fn pointer_down(&mut self, index: usize, now: Instant) {
        if let Some(press) = self.presses.get_mut(index) {
            press.pointer_down(now);
        }
    }

    pub fn pointer_up(&mut self, index: usize, now: Instant, selection: &mut Selection) {
        let Some(press) = self.presses.get_mut(index) else {
            return;
        };
        if let Some(gesture) = press.pointer_up(now) {
            self.apply(index, gesture, selection);
        }
    }

    pub fn pointer_leave(&mut self, index: usize) {
        if let Some(press) = self.presses.get_mut(index) {
            press.cancel();
        }
    }

    pub fn pointer_cancel(&mut self, index: usize) {
        self.pointer_leave(index);
    }

    /// Fires every long press whose timer has elapsed by `now`.
    pub fn poll(&mut self, now: Instant, selection: &mut Selection) {
        let fired: Vec<usize> = self
            .presses
            .iter_mut()
            .enumerate()
            .filter_map(|(index, press)| press.poll(now).map(|_| index))
            .collect();
        for index in fired {
            self.apply(index, Gesture::LongPress, selection);
        }
    }

    /// Time until the earliest pending long press fires.
    pub fn next_deadline(&self, now: Instant) -> Option<Duration> {
        self.presses.iter().filter_map(|p| p.remaining(now)).min()
    }

    /// Keyboard activation of a tile: the tap handler without a timer.
    pub fn activate(&mut self, index: usize, selection: &mut Selection) {
        self.apply(index, Gesture::Tap, selection);
    }

    /// A click inside the gallery that hit no tile.
    pub fn background_click(&mut self, selection: &mut Selection) {
        if selection.mode() == InteractionMode::Selecting {
            selection.clear();
        }
    }

    pub fn select_all(&mut self, selection: &mut Selection) {
        selection.select_all(&self.collection);
    }

    /// Abandons every pending press without firing it.
    pub fn cancel_all(&mut self) {
        for press in &mut self.presses {
            press.cancel();
        }
    }

    fn apply(&mut self, index: usize, gesture: Gesture, selection: &mut Selection) {
        let Some(item) = self.collection.items.get(index) else {
            return;
        };
        match gesture {
            Gesture::LongPress => {
                debug!(id = %item.id, "long press");
                selection.set_mode(InteractionMode::Selecting);
                selection.toggle(&self.collection, &item.id);
            }
            Gesture::Tap => match selection.mode() {
                InteractionMode::Selecting => selection.toggle(&self.collection, &item.id),
                InteractionMode::Browsing => self.preview.open(index),
            },
        }
    }
}

impl Drop for Gallery {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
pub(crate) fn items(prefix: &str, count: usize) -> Vec<Item> {
    (1..=count)
        .map(|n| Item::new(format!("{prefix}-{n}"), format!("{prefix}-{n}.jpg"), ""))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: Duration = Duration::from_millis(500);

    fn packages(count: usize) -> Gallery {
        Gallery::new(Collection::new(Pairing::Paired, items("pkg", count)), THRESHOLD)
    }

    #[test]
    fn partner_index_respects_sequence_bounds() {
        assert_eq!(partner_index(Pairing::Paired, 0, 4), Some(1));
        assert_eq!(partner_index(Pairing::Paired, 3, 4), Some(2));
        assert_eq!(partner_index(Pairing::Paired, 4, 5), None);
        assert_eq!(partner_index(Pairing::Single, 0, 4), None);
    }

    #[test]
    fn display_numbers_count_pairs_once() {
        assert_eq!(display_number(Pairing::Paired, 0), 1);
        assert_eq!(display_number(Pairing::Paired, 1), 1);
        assert_eq!(display_number(Pairing::Paired, 4), 3);
        assert_eq!(display_number(Pairing::Single, 4), 5);
        assert_eq!(unit_len(Pairing::Paired, 5), 3);
        assert_eq!(unit_len(Pairing::Single, 5), 5);
    }

    #[test]
    fn paired_collections_render_one_tile_per_pair() {
        let c = Collection::new(Pairing::Paired, items("pkg", 5));
        assert_eq!(c.tile_positions().collect::<Vec<_>>(), vec![0, 2, 4]);
    }

    #[test]
    fn sustained_press_selects_without_opening_preview() {
        let mut gallery = packages(4);
        let mut selection = Selection::default();
        let t0 = Instant::now();

        gallery.pointer_down(2, t0);
        gallery.poll(t0 + Duration::from_millis(600), &mut selection);
        gallery.pointer_up(2, t0 + Duration::from_millis(700), &mut selection);

        assert_eq!(selection.mode(), InteractionMode::Selecting);
        assert!(selection.contains("pkg-3"));
        assert!(selection.contains("pkg-4"));
        assert_eq!(selection.len(), 2);
        assert_eq!(gallery.preview().cursor(), None);
    }

    #[test]
    fn quick_tap_opens_preview_without_selecting() {
        let mut gallery = packages(4);
        let mut selection = Selection::default();
        let t0 = Instant::now();

        gallery.pointer_down(2, t0);
        gallery.pointer_up(2, t0 + Duration::from_millis(100), &mut selection);

        assert!(selection.is_empty());
        assert_eq!(gallery.preview().cursor(), Some(2));
    }

    #[test]
    fn release_after_threshold_without_poll_still_counts_as_long_press() {
        let mut gallery = packages(4);
        let mut selection = Selection::default();
        let t0 = Instant::now();

        gallery.pointer_down(0, t0);
        gallery.pointer_up(0, t0 + Duration::from_secs(1), &mut selection);

        assert_eq!(selection.len(), 2);
        assert_eq!(gallery.preview().cursor(), None);
    }

    #[test]
    fn abandoned_press_does_nothing() {
        let mut gallery = packages(4);
        let mut selection = Selection::default();
        let t0 = Instant::now();

        gallery.pointer_down(0, t0);
        gallery.pointer_leave(0);
        gallery.poll(t0 + Duration::from_secs(1), &mut selection);

        assert!(selection.is_empty());
        assert_eq!(selection.mode(), InteractionMode::Browsing);
        assert_eq!(gallery.preview().cursor(), None);
    }

    #[test]
    fn tap_in_selecting_mode_toggles() {
        let mut gallery = packages(4);
        let mut selection = Selection::default();
        selection.set_mode(InteractionMode::Selecting);
        let t0 = Instant::now();

        gallery.pointer_down(0, t0);
        gallery.pointer_up(0, t0 + Duration::from_millis(50), &mut selection);

        assert!(selection.contains("pkg-1"));
        assert!(selection.contains("pkg-2"));
        assert_eq!(gallery.preview().cursor(), None);
    }

    #[test]
    fn background_click_clears_only_while_selecting() {
        let mut gallery = packages(4);
        let mut selection = Selection::default();
        gallery.activate(0, &mut selection);
        assert_eq!(gallery.preview().cursor(), Some(0));

        selection.set_mode(InteractionMode::Selecting);
        gallery.activate(0, &mut selection);
        assert_eq!(selection.len(), 2);

        gallery.background_click(&mut selection);
        assert!(selection.is_empty());
        assert_eq!(selection.mode(), InteractionMode::Browsing);
    }

    #[test]
    fn two_galleries_share_one_selection() {
        let mut pkgs = packages(4);
        let mut letters = Gallery::new(
            Collection::new(Pairing::Single, items("let", 3)),
            THRESHOLD,
        );
        let mut selection = Selection::default();
        let t0 = Instant::now();

        pkgs.pointer_down(0, t0);
        pkgs.poll(t0 + THRESHOLD, &mut selection);
        pkgs.pointer_up(0, t0 + THRESHOLD, &mut selection);

        // Already selecting, so a tap on a letter selects it.
        letters.pointer_down(2, t0);
        letters.pointer_up(2, t0 + Duration::from_millis(10), &mut selection);

        assert!(selection.contains("let-3"));
        assert_eq!(
            selection.unit_count(&[pkgs.collection(), letters.collection()]),
            2
        );
    }

    #[test]
    fn set_items_cancels_pending_presses_and_closes_stale_preview() {
        let mut gallery = packages(6);
        let mut selection = Selection::default();
        let t0 = Instant::now();
        gallery.activate(4, &mut selection);
        gallery.pointer_down(0, t0);

        gallery.set_items(items("pkg", 2));
        gallery.poll(t0 + Duration::from_secs(1), &mut selection);

        assert!(selection.is_empty());
        assert_eq!(gallery.preview().cursor(), None);
        assert_eq!(gallery.next_deadline(t0), None);
    }

    #[test]
    fn next_deadline_reports_time_left_on_pending_press() {
        let mut gallery = packages(2);
        let t0 = Instant::now();
        gallery.pointer_down(0, t0);
        assert_eq!(
            gallery.next_deadline(t0 + Duration::from_millis(200)),
            Some(Duration::from_millis(300))
        );
    }
}
