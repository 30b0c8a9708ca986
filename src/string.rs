use std::io::Read;

use byteorder::ReadBytesExt;

use crate::error::{read_error, Record, Result};

/// Reads bytes up to (and consuming) a NUL terminator.  There is no length
/// limit; the source running out first is a truncation error for `record`.
pub(crate) fn read_null_terminated_string<R: Read>(
    reader: &mut R,
    record: Record,
) -> Result<String> {
    let mut bytes = Vec::<u8>::new();
    loop {
        let byte = reader.read_u8().map_err(read_error(record))?;
        if byte == 0 {
            break;
        }
        bytes.push(byte);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
