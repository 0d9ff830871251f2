use core::fmt;

/// A four-character code identifying a `DXBC` chunk (e.g. `RDEF`, `SHEX`).
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Resource definition chunk.
    pub const RDEF: FourCC = FourCC(*b"RDEF");
    /// Alternate resource definition chunk ID emitted by some toolchains.
    pub const RD11: FourCC = FourCC(*b"RD11");
    /// Shader model 4 bytecode.
    pub const SHDR: FourCC = FourCC(*b"SHDR");
    /// Shader model 5 bytecode.
    pub const SHEX: FourCC = FourCC(*b"SHEX");

    /// Returns the code as a string if all four bytes are printable ASCII.
    pub fn as_str(&self) -> Option<&str> {
        if self.0.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            core::str::from_utf8(&self.0).ok()
        } else {
            None
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => write!(f, "FourCC({s:?})"),
            None => write!(f, "FourCC({:02x?})", self.0),
        }
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => f.write_str(s),
            None => write!(f, "{:02x?}", self.0),
        }
    }
}
