//! Common test fixtures for gcsfile testing

/// Deterministic binary content of `len` bytes
pub fn sample_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// `count` numbered text lines, useful for eyeballing partial reads
pub fn text_lines(count: usize) -> Vec<u8> {
    let mut data = Vec::new();
    for i in 0..count {
        data.extend_from_slice(format!("Line {}: test data\n", i).as_bytes());
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_bytes_are_deterministic() {
        assert_eq!(sample_bytes(300), sample_bytes(300));
        assert_eq!(sample_bytes(300)[251], 0);
    }

    #[test]
    fn test_text_lines() {
        let data = text_lines(2);
        assert_eq!(data, b"Line 0: test data\nLine 1: test data\n");
    }
}
