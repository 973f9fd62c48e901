// Move-to-front transform.
//
// Emits each byte's rank in a recency list, then promotes it. Turns the
// locally repetitive output of the BWT into a small-value-heavy stream.

use crate::error::{Error, Result};
use crate::slice::SliceArray;

/// Move-to-front codec.
pub struct Mtft {
    ranks: [u8; 256],
}

impl Default for Mtft {
    fn default() -> Self {
        Self::new()
    }
}

impl Mtft {
    pub fn new() -> Self {
        let mut ranks = [0u8; 256];
        for (i, r) in ranks.iter_mut().enumerate() {
            *r = i as u8;
        }
        Self { ranks }
    }

    fn reset(&mut self) {
        for (i, r) in self.ranks.iter_mut().enumerate() {
            *r = i as u8;
        }
    }

    pub fn max_encoded_len(&self, src_len: usize) -> usize {
        src_len
    }

    pub fn forward(
        &mut self,
        input: &mut SliceArray,
        output: &mut SliceArray,
        count: usize,
    ) -> Result<bool> {
        if count == 0 {
            return Ok(true);
        }
        if !input.is_valid() || !output.is_valid() {
            return Err(Error::InvalidParam("invalid block cursors".to_string()));
        }
        if count > input.remaining() || count > output.remaining() {
            return Ok(false);
        }

        self.reset();
        let in_base = input.index;
        let out_base = output.index;

        for i in 0..count {
            let b = input.array[in_base + i];
            let rank = self.ranks.iter().position(|&x| x == b).expect("byte rank");
            output.array[out_base + i] = rank as u8;
            self.ranks.copy_within(0..rank, 1);
            self.ranks[0] = b;
        }

        input.index = in_base + count;
        output.index = out_base + count;
        Ok(true)
    }

    pub fn inverse(
        &mut self,
        input: &mut SliceArray,
        output: &mut SliceArray,
        count: usize,
    ) -> Result<bool> {
        if count == 0 {
            return Ok(true);
        }
        if !input.is_valid() || !output.is_valid() {
            return Err(Error::InvalidParam("invalid block cursors".to_string()));
        }
        if count > input.remaining() || count > output.remaining() {
            return Ok(false);
        }

        self.reset();
        let in_base = input.index;
        let out_base = output.index;

        for i in 0..count {
            let rank = usize::from(input.array[in_base + i]);
            let b = self.ranks[rank];
            output.array[out_base + i] = b;
            self.ranks.copy_within(0..rank, 1);
            self.ranks[0] = b;
        }

        input.index = in_base + count;
        output.index = out_base + count;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8]) {
        let mut codec = Mtft::new();
        let mut src = data.to_vec();
        let mut dst = vec![0u8; data.len()];
        let mut input = SliceArray::new(&mut src);
        let mut output = SliceArray::new(&mut dst);
        assert!(codec.forward(&mut input, &mut output, data.len()).unwrap());

        let mut back = vec![0u8; data.len()];
        let mut input = SliceArray::new(&mut dst);
        let mut output = SliceArray::new(&mut back);
        assert!(codec.inverse(&mut input, &mut output, data.len()).unwrap());
        assert_eq!(back, data);
    }

    #[test]
    fn known_ranks() {
        let mut codec = Mtft::new();
        let mut src = *b"aabbbc";
        let mut dst = [0u8; 6];
        let mut input = SliceArray::new(&mut src);
        let mut output = SliceArray::new(&mut dst);
        assert!(codec.forward(&mut input, &mut output, 6).unwrap());
        // 'a' = 97, then rank 0; 'b' = 98 shifted once, then rank 0 twice.
        assert_eq!(&dst[..2], &[97, 0]);
        assert_eq!(dst[3], 0);
        assert_eq!(dst[4], 0);
    }

    #[test]
    fn roundtrip_various() {
        roundtrip(b"");
        roundtrip(b"a");
        roundtrip(b"abracadabra");
        roundtrip(&[0u8; 1000]);
        roundtrip(&(0..=255u8).collect::<Vec<u8>>());

        let mut state = 9u64;
        let data: Vec<u8> = (0..50_000)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                (state >> 33) as u8
            })
            .collect();
        roundtrip(&data);
    }

    #[test]
    fn repetitive_data_maps_to_small_values() {
        let data: Vec<u8> = b"aaabbbaaabbb".to_vec();
        let mut codec = Mtft::new();
        let mut src = data.clone();
        let mut dst = vec![0u8; data.len()];
        let mut input = SliceArray::new(&mut src);
        let mut output = SliceArray::new(&mut dst);
        codec.forward(&mut input, &mut output, data.len()).unwrap();
        assert!(dst[2..].iter().all(|&b| b < 4));
    }
}
