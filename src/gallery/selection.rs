use std::collections::{BTreeSet, HashSet};

use super::{Collection, Pairing};

/// Whether taps select items or open the viewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InteractionMode {
    #[default]
    Browsing,
    Selecting,
}

/// The selection set plus the interaction mode.
///
/// Owned by whatever screen displays the galleries and lent to each of them,
/// so two collections can share one selection. Pair atomicity is enforced
/// per collection: `toggle` and `select_all` take the collection whose
/// pairing rule applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<String>,
    mode: InteractionMode,
}

impl Selection {
    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: InteractionMode) {
        self.mode = mode;
    }

    pub fn is_selecting(&self) -> bool {
        self.mode == InteractionMode::Selecting
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Selects or deselects `id` together with its pair partner.
    ///
    /// In a paired collection only the first member of a pair is a valid
    /// target; toggling the second member is a no-op. Unknown ids are
    /// ignored.
    pub fn toggle(&mut self, collection: &Collection, id: &str) {
        let Some(index) = collection.position(id) else {
            return;
        };
        if collection.pairing == Pairing::Paired && index % 2 == 1 {
            return;
        }
        let partner = collection.partner_of(index).map(|item| item.id.clone());

        if self.ids.remove(id) {
            if let Some(partner) = partner {
                self.ids.remove(&partner);
            }
        } else {
            self.ids.insert(id.to_string());
            if let Some(partner) = partner {
                self.ids.insert(partner);
            }
        }
    }

    /// Selects every item of `collection`, or deselects all of them when
    /// they are already all selected.
    pub fn select_all(&mut self, collection: &Collection) {
        let all_selected = collection
            .items
            .iter()
            .all(|item| self.ids.contains(&item.id));
        if all_selected {
            for item in &collection.items {
                self.ids.remove(&item.id);
            }
        } else {
            self.ids
                .extend(collection.items.iter().map(|item| item.id.clone()));
        }
    }

    /// Empties the selection and returns to browsing.
    pub fn clear(&mut self) {
        self.ids.clear();
        self.mode = InteractionMode::Browsing;
    }

    /// Number of user-visible units selected across `collections`.
    pub fn unit_count(&self, collections: &[&Collection]) -> usize {
        unit_count(self.ids(), collections)
    }
}

/// Counts user-visible units among `ids`.
///
/// A pair counts once however many of its members are listed; an id in an
/// unpaired collection counts once; ids found in none of the collections are
/// not counted. When an id appears in several collections the first wins.
pub fn unit_count<'a>(ids: impl IntoIterator<Item = &'a str>, collections: &[&Collection]) -> usize {
    let mut pairs = HashSet::new();
    let mut singles = 0;
    for id in ids {
        let found = collections
            .iter()
            .enumerate()
            .find_map(|(ci, c)| c.position(id).map(|index| (ci, c.pairing, index)));
        match found {
            Some((ci, Pairing::Paired, index)) => {
                pairs.insert((ci, index / 2));
            }
            Some((_, Pairing::Single, _)) => singles += 1,
            None => {}
        }
    }
    pairs.len() + singles
}
