pub const FILE_SIGNATURE: [u8; 4] = *b"MSCF";

pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 3;

// Fixed record sizes, not counting reserve areas or trailing strings:
pub const HEADER_SIZE: u64 = 36;
pub const FOLDER_ENTRY_SIZE: u64 = 8;
pub const FILE_ENTRY_SIZE: u64 = 16;

// Header flags:
pub const FLAG_PREV_CABINET: u16 = 0x1;
pub const FLAG_NEXT_CABINET: u16 = 0x2;
pub const FLAG_RESERVE_PRESENT: u16 = 0x4;

// File attributes:
pub const ATTR_READ_ONLY: u16 = 0x01;
pub const ATTR_HIDDEN: u16 = 0x02;
pub const ATTR_SYSTEM: u16 = 0x04;
pub const ATTR_ARCH: u16 = 0x20;
pub const ATTR_EXEC: u16 = 0x40;
pub const ATTR_NAME_IS_UTF: u16 = 0x80;

/// Permission bits reported for every extracted file.
pub const FILE_MODE: u32 = 0o700;
