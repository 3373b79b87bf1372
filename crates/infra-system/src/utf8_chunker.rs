// Incremental UTF-8 decoding for raw stdout reads

/// Turns arbitrary byte reads into text chunks without splitting a code point
#[derive(Debug, Default)]
pub(crate) struct Utf8Chunker {
    pending: Vec<u8>,
}

impl Utf8Chunker {
    /// Feed one read; returns the decodable prefix, holding back an incomplete tail
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Option<String> {
        self.pending.extend_from_slice(bytes);
        let split = self.complete_len();
        if split == 0 {
            return None;
        }
        let tail = self.pending.split_off(split);
        let head = std::mem::replace(&mut self.pending, tail);
        Some(String::from_utf8_lossy(&head).into_owned())
    }

    /// Length of `pending` up to an incomplete trailing sequence; invalid
    /// bytes before it count as complete and are decoded lossily
    fn complete_len(&self) -> usize {
        let mut checked = 0;
        loop {
            match std::str::from_utf8(&self.pending[checked..]) {
                Ok(_) => return self.pending.len(),
                Err(e) => match e.error_len() {
                    Some(invalid) => checked += e.valid_up_to() + invalid,
                    None => return checked + e.valid_up_to(),
                },
            }
        }
    }

    /// Whatever is left once the stream ends
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_code_point_is_held_back() {
        let mut chunker = Utf8Chunker::default();
        let bytes = "héllo".as_bytes();

        // 'é' is two bytes: cut between them
        assert_eq!(chunker.push(&bytes[..2]).as_deref(), Some("h"));
        assert_eq!(chunker.push(&bytes[2..]).as_deref(), Some("éllo"));
        assert_eq!(chunker.finish(), None);
    }

    #[test]
    fn test_incomplete_only_yields_nothing() {
        let mut chunker = Utf8Chunker::default();
        assert_eq!(chunker.push(&[0xE2, 0x82]), None);
        assert_eq!(chunker.push(&[0xAC]).as_deref(), Some("€"));
    }

    #[test]
    fn test_invalid_byte_does_not_break_split_code_point() {
        let mut chunker = Utf8Chunker::default();
        assert_eq!(chunker.push(&[0xFF, b'a', 0xE2]).as_deref(), Some("\u{FFFD}a"));
        assert_eq!(chunker.push(&[0x82, 0xAC, b'!']).as_deref(), Some("€!"));
        assert_eq!(chunker.finish(), None);
    }

    #[test]
    fn test_truncated_tail_is_flushed_lossily() {
        let mut chunker = Utf8Chunker::default();
        assert_eq!(chunker.push(&[b'a', 0xE2]).as_deref(), Some("a"));
        assert_eq!(chunker.finish().as_deref(), Some("\u{FFFD}"));
    }
}
