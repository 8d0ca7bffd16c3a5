use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use memmap2::Mmap;
use tracing::{debug, debug_span};

use super::ConnError;

pub(super) const MAGIC: &[u8; 4] = b"LXCC";
pub(super) const VERSION: u8 = 1;
/// Fixed header size: magic(4) + version(1) + num_right(2) + num_left(2).
pub(super) const HEADER_SIZE: usize = 4 + 1 + 2 + 2;
/// Bytes per offset-table entry.
pub(super) const OFFSET_SIZE: usize = 4;

/// Backing bytes for an encoded matrix: either owned or memory-mapped.
enum Storage {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Storage {
    fn bytes(&self) -> &[u8] {
        match self {
            Storage::Owned(data) => data.as_slice(),
            Storage::Mapped(mmap) => &mmap[..],
        }
    }
}

/// Validated layout of an `LXCC` blob.
struct Layout {
    num_right: u16,
    num_left: u16,
    offsets: Vec<u32>,
    units_start: usize,
}

/// Read-only `LXCC` connection matrix: a header, an offset table with one
/// entry per right ID, and the encoded rows.
///
/// The store never decodes anything itself; it only hands out the encoded
/// bytes of one row.
pub struct MatrixStore {
    num_right: u16,
    num_left: u16,
    offsets: Vec<u32>,
    units_start: usize,
    storage: Storage,
}

impl MatrixStore {
    /// Parse an owned blob.
    pub fn from_vec(data: Vec<u8>) -> Result<Self, ConnError> {
        let layout = Self::validate_layout(&data)?;
        Ok(Self::with_storage(layout, Storage::Owned(data)))
    }

    /// Parse a blob by copying it into an owned buffer.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ConnError> {
        Self::from_vec(data.to_vec())
    }

    /// Read a whole blob from any byte source.
    pub fn from_reader<R: Read>(mut rdr: R) -> Result<Self, ConnError> {
        let mut data = Vec::new();
        rdr.read_to_end(&mut data)?;
        Self::from_vec(data)
    }

    /// Load a compiled matrix using memory-mapped I/O.
    pub fn open(path: &Path) -> Result<Self, ConnError> {
        let _span = debug_span!("matrix_open", path = %path.display()).entered();
        let file = File::open(path)?;
        // SAFETY: The file is opened read-only and the mapping is immutable.
        // The Mmap lives as long as this store; the file must not be
        // modified while it is mapped.
        let mmap = unsafe { Mmap::map(&file)? };
        let layout = Self::validate_layout(&mmap)?;
        debug!(
            num_right = layout.num_right,
            num_left = layout.num_left,
            bytes = mmap.len(),
            "mapped connection matrix"
        );
        Ok(Self::with_storage(layout, Storage::Mapped(mmap)))
    }

    /// Load a compiled matrix by reading it fully into memory.
    pub fn read(path: &Path) -> Result<Self, ConnError> {
        let _span = debug_span!("matrix_read", path = %path.display()).entered();
        Self::from_vec(fs::read(path)?)
    }

    /// Load with either strategy.
    pub fn load(path: &Path, mmap: bool) -> Result<Self, ConnError> {
        if mmap {
            Self::open(path)
        } else {
            Self::read(path)
        }
    }

    fn with_storage(layout: Layout, storage: Storage) -> Self {
        Self {
            num_right: layout.num_right,
            num_left: layout.num_left,
            offsets: layout.offsets,
            units_start: layout.units_start,
            storage,
        }
    }

    fn validate_layout(data: &[u8]) -> Result<Layout, ConnError> {
        if data.len() < HEADER_SIZE {
            return Err(ConnError::InvalidHeader);
        }
        if &data[..4] != MAGIC {
            return Err(ConnError::InvalidMagic);
        }
        let version = data[4];
        if version != VERSION {
            return Err(ConnError::UnsupportedVersion(version));
        }
        let num_right = u16::from_le_bytes([data[5], data[6]]);
        let num_left = u16::from_le_bytes([data[7], data[8]]);

        let units_start = HEADER_SIZE + (num_right as usize + 1) * OFFSET_SIZE;
        if data.len() < units_start {
            return Err(ConnError::Layout(format!(
                "offset table for {num_right} rows needs {units_start} bytes, got {}",
                data.len()
            )));
        }
        let offsets: Vec<u32> = data[HEADER_SIZE..units_start]
            .chunks_exact(OFFSET_SIZE)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        if offsets.first() != Some(&0) {
            return Err(ConnError::Layout("first offset must be 0".to_string()));
        }
        if let Some(row) = offsets.windows(2).position(|w| w[0] > w[1]) {
            return Err(ConnError::Layout(format!(
                "offset for right_id {} precedes the previous row",
                row + 1
            )));
        }
        let declared = offsets.last().copied().unwrap_or(0) as usize;
        let actual = data.len() - units_start;
        if declared != actual {
            return Err(ConnError::Layout(format!(
                "expected {declared} bytes of unit data, got {actual}"
            )));
        }

        Ok(Layout {
            num_right,
            num_left,
            offsets,
            units_start,
        })
    }

    /// Encoded bytes of the row for `right_id`, or `None` if out of range.
    #[inline]
    pub fn unit_at(&self, right_id: u16) -> Option<&[u8]> {
        let row = right_id as usize;
        let start = *self.offsets.get(row)? as usize;
        let end = *self.offsets.get(row + 1)? as usize;
        self.storage
            .bytes()
            .get(self.units_start + start..self.units_start + end)
    }

    pub fn num_right(&self) -> u16 {
        self.num_right
    }

    pub fn num_left(&self) -> u16 {
        self.num_left
    }

    /// Size of the encoded rows, excluding header and offset table.
    pub fn unit_area_len(&self) -> usize {
        self.storage.bytes().len() - self.units_start
    }

    /// The whole blob as loaded.
    pub fn as_bytes(&self) -> &[u8] {
        self.storage.bytes()
    }

    /// Whether the blob is memory-mapped rather than owned.
    pub fn is_mapped(&self) -> bool {
        matches!(self.storage, Storage::Mapped(_))
    }

    /// Write the blob to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConnError> {
        Ok(fs::write(path, self.as_bytes())?)
    }
}
