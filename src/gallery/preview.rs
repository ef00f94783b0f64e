use super::{Pairing, display_number, partner_index};

/// Cursor of the modal viewer over one item sequence.
///
/// Navigation never opens a closed viewer; every method except `open` is a
/// no-op while closed. The sequence length is passed in because the
/// navigator only reads the sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewNavigator {
    pairing: Pairing,
    cursor: Option<usize>,
}

impl PreviewNavigator {
    pub fn new(pairing: Pairing) -> Self {
        Self {
            pairing,
            cursor: None,
        }
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn is_open(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn open(&mut self, index: usize) {
        self.cursor = Some(index);
    }

    pub fn close(&mut self) {
        self.cursor = None;
    }

    pub fn next(&mut self, len: usize) {
        let Some(index) = self.cursor else { return };
        if len == 0 {
            return;
        }
        let next = match self.pairing {
            Pairing::Single => (index + 1) % len,
            // Wrap to the same half of the first pair.
            Pairing::Paired if index + 2 >= len => index % 2,
            Pairing::Paired => index + 2,
        };
        self.cursor = Some(next);
    }

    pub fn previous(&mut self, len: usize) {
        let Some(index) = self.cursor else { return };
        if len == 0 {
            return;
        }
        let previous = match self.pairing {
            Pairing::Single => (index % len + len - 1) % len,
            Pairing::Paired if index < 2 => {
                let last = len - 1;
                if last % 2 == index % 2 || last == 0 {
                    last
                } else {
                    last - 1
                }
            }
            Pairing::Paired => index - 2,
        };
        self.cursor = Some(previous);
    }

    /// Jumps to the other member of the current pair, if there is one.
    pub fn toggle_pair(&mut self, len: usize) {
        let Some(index) = self.cursor else { return };
        if let Some(partner) = partner_index(self.pairing, index, len) {
            self.cursor = Some(partner);
        }
    }

    pub fn display_number(&self) -> Option<usize> {
        self.cursor.map(|index| display_number(self.pairing, index))
    }

    /// Whether the pair toggle control should be enabled.
    pub fn has_partner(&self, len: usize) -> bool {
        self.cursor
            .and_then(|index| partner_index(self.pairing, index, len))
            .is_some()
    }
}
