use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

const BLOCK_SIZE: usize = 8192;

/// SHA-256 of a file's contents as lowercase hex, or `None` when the file
/// cannot be read. Absence forces re-extraction rather than failing the
/// run; this digest is a change-detection optimization, not a security
/// control.
#[must_use]
pub fn digest_file(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    digest_reader(file)
}

/// SHA-256 of everything a reader yields, streamed in fixed-size blocks.
/// Used for decompressed archive members.
#[must_use]
pub fn digest_reader<R: Read>(mut reader: R) -> Option<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; BLOCK_SIZE];

    loop {
        let read = reader.read(&mut buffer).ok()?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Some(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::{digest_file, digest_reader};

    #[test]
    fn digest_file_returns_known_digest() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("payload.bin");
        std::fs::write(&path, b"slipstream").expect("payload file should be written");

        assert_eq!(
            digest_file(&path).as_deref(),
            Some("881c294e127c379a1e86b5f04ba2975348bd58552bd9ad659c2cc68f35a7bc8d")
        );
    }

    #[test]
    fn digest_file_is_absent_for_missing_file() {
        let temp = tempfile::tempdir().expect("tempdir should be created");

        assert!(digest_file(&temp.path().join("missing.bin")).is_none());
    }

    #[test]
    fn digest_reader_matches_digest_file_for_same_bytes() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("payload.bin");
        std::fs::write(&path, b"payload-v2").expect("payload file should be written");

        let from_file = digest_file(&path);
        let from_reader = digest_reader(&b"payload-v2"[..]);

        assert_eq!(from_file, from_reader);
        assert_eq!(
            from_reader.as_deref(),
            Some("0cbfa847619d688226855278706687a40d82dd74d8ab8ba7cef414309ebfb1d6")
        );
    }
}
