//! Non-volatile mirror of the learned parameters.
//!
//! Layout, little-endian words starting at the store's base offset:
//!
//! | offset | content             |
//! |--------|---------------------|
//! | 0      | marker, `0xBEEF`    |
//! | 2      | RComp0              |
//! | 4      | TempCo              |
//! | 6      | FullCapRep          |
//! | 8      | Cycles              |
//! | 10     | FullCapNom          |

use embedded_storage::Storage;

use crate::LearnedParams;

pub const MARKER: u16 = 0xBEEF;

const MARKER_OFFSET: u32 = 0;
const PARAMS_OFFSET: u32 = 2;

/// Written over the marker to invalidate the mirror. Matches erased EEPROM.
const ERASED: u16 = 0xFFFF;

/// Whether the mirror holds usable data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NvState {
    Uninitialized,
    Restored,
}

#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError<E> {
    Storage(E),
    /// The marker is missing, the mirror has never been seeded.
    Uninitialized,
}

impl<E> From<E> for StoreError<E> {
    fn from(error: E) -> Self {
        Self::Storage(error)
    }
}

pub struct LearnedParamStore<S> {
    storage: S,
    base: u32,
}

impl<S> LearnedParamStore<S>
where
    S: Storage,
{
    pub const fn new(storage: S) -> Self {
        Self::with_base(storage, 0)
    }

    /// Places the mirror at `base` instead of the start of the storage.
    pub const fn with_base(storage: S, base: u32) -> Self {
        Self { storage, base }
    }

    pub fn release(self) -> S {
        self.storage
    }

    fn read_word(&mut self, offset: u32) -> Result<u16, S::Error> {
        let mut bytes = [0; 2];
        self.storage.read(self.base + offset, &mut bytes)?;
        Ok(u16::from_le_bytes(bytes))
    }

    /// Writes `value` unless the word already holds it. Returns whether a write happened.
    fn update_word(&mut self, offset: u32, value: u16) -> Result<bool, S::Error> {
        if self.read_word(offset)? == value {
            return Ok(false);
        }

        self.storage
            .write(self.base + offset, &value.to_le_bytes())?;
        Ok(true)
    }

    pub fn state(&mut self) -> Result<NvState, StoreError<S::Error>> {
        let marker = self.read_word(MARKER_OFFSET)?;

        if marker == MARKER {
            Ok(NvState::Restored)
        } else {
            debug!("No learned parameters stored, marker: {:#x}", marker);
            Ok(NvState::Uninitialized)
        }
    }

    pub fn load(&mut self) -> Result<LearnedParams, StoreError<S::Error>> {
        if self.state()? != NvState::Restored {
            return Err(StoreError::Uninitialized);
        }

        let mut words = [0; 5];
        for (offset, word) in (PARAMS_OFFSET..).step_by(2).zip(words.iter_mut()) {
            *word = self.read_word(offset)?;
        }

        Ok(LearnedParams::from_words(words))
    }

    /// Writes the parameters. Words that already hold the right value are left alone.
    pub fn save(&mut self, params: &LearnedParams) -> Result<(), StoreError<S::Error>> {
        let mut written = 0;
        for (offset, word) in (PARAMS_OFFSET..).step_by(2).zip(params.to_words()) {
            if self.update_word(offset, word)? {
                written += 1;
            }
        }

        debug!("Learned parameters stored, {} words changed", written);
        Ok(())
    }

    /// Initializes the mirror. The marker is written last so an interrupted seed is retried on
    /// the next boot.
    pub fn seed(&mut self, params: &LearnedParams) -> Result<(), StoreError<S::Error>> {
        self.save(params)?;
        self.update_word(MARKER_OFFSET, MARKER)?;

        info!("Learned parameter storage initialized");
        Ok(())
    }

    /// Invalidates the mirror, forcing a reseed from the device on the next configuration.
    pub fn forget(&mut self) -> Result<(), StoreError<S::Error>> {
        self.update_word(MARKER_OFFSET, ERASED)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use embedded_storage::{ReadStorage, Storage};

    use super::*;

    /// Byte-addressed EEPROM in RAM that counts physical writes.
    struct RamEeprom {
        bytes: [u8; 64],
        writes: usize,
    }

    impl RamEeprom {
        fn erased() -> Self {
            Self {
                bytes: [0xFF; 64],
                writes: 0,
            }
        }

        fn word(&self, offset: usize) -> u16 {
            u16::from_le_bytes([self.bytes[offset], self.bytes[offset + 1]])
        }

        fn set_word(&mut self, offset: usize, value: u16) {
            self.bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
        }
    }

    #[derive(Debug, PartialEq)]
    struct OutOfBounds;

    impl ReadStorage for RamEeprom {
        type Error = OutOfBounds;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            let source = self
                .bytes
                .get(start..start + bytes.len())
                .ok_or(OutOfBounds)?;
            bytes.copy_from_slice(source);
            Ok(())
        }

        fn capacity(&self) -> usize {
            self.bytes.len()
        }
    }

    impl Storage for RamEeprom {
        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            let target = self
                .bytes
                .get_mut(start..start + bytes.len())
                .ok_or(OutOfBounds)?;
            target.copy_from_slice(bytes);
            self.writes += 1;
            Ok(())
        }
    }

    const STORED: LearnedParams = LearnedParams {
        rcomp0: 0x1234,
        temp_co: 0x5678,
        full_cap_rep: 0x0BB8,
        cycles: 0x0040,
        full_cap_nom: 0x0BB8,
    };

    #[test]
    fn erased_storage_is_uninitialized() {
        let mut store = LearnedParamStore::new(RamEeprom::erased());

        assert_eq!(store.state(), Ok(NvState::Uninitialized));
        assert_eq!(store.load(), Err(StoreError::Uninitialized));
    }

    #[test]
    fn marker_zero_is_uninitialized() {
        let mut eeprom = RamEeprom::erased();
        eeprom.set_word(0, 0x0000);
        let mut store = LearnedParamStore::new(eeprom);

        assert_eq!(store.state(), Ok(NvState::Uninitialized));
    }

    #[test]
    fn seed_writes_params_then_marker() {
        let mut store = LearnedParamStore::new(RamEeprom::erased());

        let initial = LearnedParams::initial(0x1234, 0x5678, 0x0BB8);
        store.seed(&initial).unwrap();

        let eeprom = store.release();
        assert_eq!(eeprom.word(0), MARKER);
        assert_eq!(eeprom.word(2), 0x1234);
        assert_eq!(eeprom.word(4), 0x5678);
        assert_eq!(eeprom.word(6), 0x0BB8);
        assert_eq!(eeprom.word(8), 0x0000);
        assert_eq!(eeprom.word(10), 0x0BB8);
    }

    #[test]
    fn load_returns_stored_words() {
        let mut eeprom = RamEeprom::erased();
        eeprom.set_word(0, MARKER);
        for (i, word) in STORED.to_words().into_iter().enumerate() {
            eeprom.set_word(2 + 2 * i, word);
        }
        let mut store = LearnedParamStore::new(eeprom);

        assert_eq!(store.state(), Ok(NvState::Restored));
        assert_eq!(store.load(), Ok(STORED));
    }

    #[test]
    fn save_only_writes_changed_words() {
        let mut store = LearnedParamStore::new(RamEeprom::erased());
        store.seed(&STORED).unwrap();

        let mut store = LearnedParamStore::new(store.release());
        let before = store.storage.writes;

        store.save(&STORED).unwrap();
        assert_eq!(store.storage.writes, before);

        store
            .save(&LearnedParams {
                cycles: 0x0080,
                ..STORED
            })
            .unwrap();
        assert_eq!(store.storage.writes, before + 1);
        assert_eq!(store.storage.word(8), 0x0080);
    }

    #[test]
    fn forget_invalidates_marker() {
        let mut store = LearnedParamStore::new(RamEeprom::erased());
        store.seed(&STORED).unwrap();

        store.forget().unwrap();

        assert_eq!(store.state(), Ok(NvState::Uninitialized));
        assert_eq!(store.load(), Err(StoreError::Uninitialized));
    }

    #[test]
    fn base_offset_moves_the_layout() {
        let mut store = LearnedParamStore::with_base(RamEeprom::erased(), 16);
        store.seed(&STORED).unwrap();

        let eeprom = store.release();
        assert_eq!(eeprom.word(0), 0xFFFF);
        assert_eq!(eeprom.word(16), MARKER);
        assert_eq!(eeprom.word(18), 0x1234);
    }

    #[test]
    fn storage_errors_are_reported() {
        let mut store = LearnedParamStore::with_base(RamEeprom::erased(), 63);

        assert_eq!(store.state(), Err(StoreError::Storage(OutOfBounds)));
    }
}
