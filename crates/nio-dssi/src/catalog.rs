//! Lazily expanded list of host-visible programs
//!
//! Loading every bank up front can take long enough for a host to give up
//! on the plugin, so banks are mapped one at a time, only as far as the
//! host's program queries reach.

use crate::synth::Middleware;

/// Instrument slots per bank
pub const BANK_SIZE: usize = 160;

/// One host-visible program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramEntry {
    pub bank: usize,
    pub program: usize,
    pub name: String,
}

/// Append-only program list plus the next bank to expand
#[derive(Debug, Default)]
pub struct ProgramCatalog {
    entries: Vec<ProgramEntry>,
    next_bank: usize,
    scanned: bool,
    exhausted: bool,
}

impl ProgramCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Banks mapped so far
    pub fn mapped_banks(&self) -> usize {
        self.next_bank
    }

    /// Program at `index`, mapping further banks until it exists
    pub fn get<M: Middleware + ?Sized>(&mut self, index: usize, banks: &M) -> Option<&ProgramEntry> {
        if !self.scanned {
            banks.rescan_banks();
            self.scanned = true;
        }

        while index >= self.entries.len() && self.map_next_bank(banks) {}

        self.entries.get(index)
    }

    /// Append the named instruments of the next bank
    ///
    /// Returns false once no further bank exists.
    fn map_next_bank<M: Middleware + ?Sized>(&mut self, banks: &M) -> bool {
        if self.exhausted || self.next_bank >= banks.bank_count() {
            return false;
        }
        let Some(names) = banks.load_bank(self.next_bank) else {
            self.exhausted = true;
            return false;
        };

        let bank = self.next_bank;
        let before = self.entries.len();
        self.entries.extend(
            names
                .into_iter()
                .take(BANK_SIZE)
                .enumerate()
                .filter(|(_, name)| is_listed(name))
                .map(|(program, name)| ProgramEntry {
                    bank,
                    program,
                    name,
                }),
        );
        log::debug!(
            "Mapped bank {}: {} programs",
            bank,
            self.entries.len() - before
        );

        self.next_bank += 1;
        true
    }
}

/// Empty slots and names starting with a space are not shown to the host
fn is_listed(name: &str) -> bool {
    !name.is_empty() && !name.starts_with(' ') && !name.starts_with('\0')
}
