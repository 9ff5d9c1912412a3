use serde::Serialize;

use crate::diagnostics::CompileError;

/// One past the last addressable byte.
const ADDRESS_SPACE: u64 = 1 << 32;

/// A labelled region of the static data segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataBlock {
    pub label: String,
    pub address: u32,
    pub bytes: Vec<u8>,
}

/// Static data segment. Blocks are laid out back to back, each aligned.
#[derive(Debug, Clone, Serialize)]
pub struct DataSegment {
    align: u32,
    cursor: u64,
    blocks: Vec<DataBlock>,
}

impl DataSegment {
    pub fn new(base: u32, align: u32) -> Self {
        let align = align.max(1);
        Self {
            align,
            cursor: align_up(u64::from(base), align),
            blocks: Vec::new(),
        }
    }

    /// Reserve `size` zero-filled bytes and return their address.
    pub fn reserve(&mut self, label: impl Into<String>, size: u32) -> Result<u32, CompileError> {
        let label = label.into();
        let address = self.claim(&label, u64::from(size))?;
        self.blocks.push(DataBlock { label, address, bytes: vec![0; size as usize] });
        Ok(address)
    }

    /// Place initialised bytes and return their address.
    pub fn define(&mut self, label: impl Into<String>, bytes: Vec<u8>) -> Result<u32, CompileError> {
        let label = label.into();
        let address = self.claim(&label, bytes.len() as u64)?;
        self.blocks.push(DataBlock { label, address, bytes });
        Ok(address)
    }

    /// Advance the cursor past `len` bytes. Fails, leaving the segment
    /// untouched, when the block would run past the 32-bit address space.
    fn claim(&mut self, label: &str, len: u64) -> Result<u32, CompileError> {
        let end = self.cursor + len;
        match u32::try_from(self.cursor) {
            Ok(address) if end <= ADDRESS_SPACE => {
                self.cursor = align_up(end, self.align);
                Ok(address)
            }
            _ => Err(CompileError::codegen(format!(
                "static block `{label}` ({len} bytes) does not fit in the data segment"
            ))),
        }
    }

    pub fn blocks(&self) -> &[DataBlock] {
        &self.blocks
    }

    pub fn block(&self, label: &str) -> Option<&DataBlock> {
        self.blocks.iter().find(|b| b.label == label)
    }

    /// First free address past the last block.
    pub fn end(&self) -> u64 {
        self.cursor
    }
}

fn align_up(value: u64, align: u32) -> u64 {
    value.next_multiple_of(u64::from(align))
}
