use std::fs::File;
use std::io::{Read, Seek};

pub fn get_reader(file: File) -> Result<impl Read + Seek, String> {
    // Compatibility on other systems
    #[cfg(not(unix))]
    {
        use std::io::BufReader;
        // Keep reads aligned with the 64 byte record boundaries, 4096 is the standard block size (or a multiple of it) on most systems
        const BUFFER_SIZE: usize = crate::trace::RECORD_SIZE * 4096;
        Ok(BufReader::with_capacity(BUFFER_SIZE, file))
    }
    // Memory map the file for speed on unix systems
    #[cfg(unix)]
    {
        use std::io::Cursor;
        use memmap2::{Advice, Mmap};
        // The trace is scanned twice, once for the preload pass and once for the replay, so
        // the mapping pays for itself on the second sequential pass over multi-GB traces
        unsafe {
            let m = Mmap::map(&file).map_err(|e| format!("Couldn't memory map the file: {e}"))?;
            m.advise(Advice::Sequential).map_err(|e| format!("Failed to provide access advice to the OS, {e}"))?;
            Ok(Cursor::new(m))
        }
    }
}
