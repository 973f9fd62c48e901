// Suffix-array construction by induced sorting (SA-IS).
//
// Linear time, linear extra space. Suffixes are compared plainly (a proper
// prefix sorts before any longer suffix), which is the order the BWT layer
// expects. The recursion works on reduced strings over dense integer
// alphabets.

/// Compute the suffix array of `src`.
pub fn suffix_array(src: &[u8]) -> Vec<i32> {
    let n = src.len();
    let mut sa = vec![0i32; n];
    if n == 0 {
        return sa;
    }
    if n == 1 {
        return sa;
    }
    let s: Vec<u32> = src.iter().map(|&c| u32::from(c)).collect();
    sais(&s, &mut sa, 256);
    sa
}

// Bucket boundaries for the current alphabet.
fn bucket_starts(freq: &[u32], out: &mut [u32]) {
    let mut sum = 0u32;
    for (o, &f) in out.iter_mut().zip(freq.iter()) {
        *o = sum;
        sum += f;
    }
}

fn bucket_ends(freq: &[u32], out: &mut [u32]) {
    let mut sum = 0u32;
    for (o, &f) in out.iter_mut().zip(freq.iter()) {
        sum += f;
        *o = sum;
    }
}

// One full induction round: assumes LMS suffixes are already placed at the
// tails of their buckets and every other slot is -1. Fills in all L-type
// then all S-type suffixes.
fn induce(s: &[u32], sa: &mut [i32], ls: &[bool], freq: &[u32], bkt: &mut [u32]) {
    let n = s.len();

    // L pass, left to right. The suffix preceding the virtual sentinel
    // seeds its bucket first.
    bucket_starts(freq, bkt);
    let c = s[n - 1] as usize;
    sa[bkt[c] as usize] = (n - 1) as i32;
    bkt[c] += 1;

    for i in 0..n {
        let j = sa[i];
        if j > 0 && !ls[(j - 1) as usize] {
            let c = s[(j - 1) as usize] as usize;
            sa[bkt[c] as usize] = j - 1;
            bkt[c] += 1;
        }
    }

    // S pass, right to left.
    bucket_ends(freq, bkt);
    for i in (0..n).rev() {
        let j = sa[i];
        if j > 0 && ls[(j - 1) as usize] {
            let c = s[(j - 1) as usize] as usize;
            bkt[c] -= 1;
            sa[bkt[c] as usize] = j - 1;
        }
    }
}

fn sais(s: &[u32], sa: &mut [i32], sigma: usize) {
    let n = s.len();
    if n == 1 {
        sa[0] = 0;
        return;
    }

    // Type classification: true = S-type. The last suffix is L-type since
    // the virtual sentinel compares smaller than everything.
    let mut ls = vec![false; n];
    for i in (0..n - 1).rev() {
        ls[i] = s[i] < s[i + 1] || (s[i] == s[i + 1] && ls[i + 1]);
    }

    let is_lms = |i: usize| i > 0 && ls[i] && !ls[i - 1];

    let mut freq = vec![0u32; sigma];
    for &c in s {
        freq[c as usize] += 1;
    }
    let mut bkt = vec![0u32; sigma];

    // Stage 1: sort LMS substrings by placing LMS positions (any order) at
    // their bucket tails and inducing.
    let lms: Vec<usize> = (1..n).filter(|&i| is_lms(i)).collect();
    sa.fill(-1);
    bucket_ends(&freq, &mut bkt);
    for &i in &lms {
        let c = s[i] as usize;
        bkt[c] -= 1;
        sa[bkt[c] as usize] = i as i32;
    }
    induce(s, sa, &ls, &freq, &mut bkt);

    if lms.is_empty() {
        return;
    }

    // Extract LMS positions in sorted-substring order.
    let sorted_lms: Vec<usize> = sa
        .iter()
        .map(|&j| j as usize)
        .filter(|&j| is_lms(j))
        .collect();

    // Name LMS substrings; identical neighbours share a name.
    let mut name_of = vec![0u32; n];
    let mut names = 0u32;
    name_of[sorted_lms[0]] = 0;
    for w in sorted_lms.windows(2) {
        let (a, b) = (w[0], w[1]);
        let mut d = 0usize;
        let equal = loop {
            if a + d >= n || b + d >= n {
                break false;
            }
            if s[a + d] != s[b + d] || ls[a + d] != ls[b + d] {
                break false;
            }
            if d > 0 && is_lms(a + d) && is_lms(b + d) {
                break true;
            }
            d += 1;
        };
        if !equal {
            names += 1;
        }
        name_of[b] = names;
    }
    names += 1;

    // Order LMS suffixes: either names are already unique, or recurse on
    // the reduced string.
    let ordered: Vec<usize> = if names as usize == lms.len() {
        sorted_lms
    } else {
        let reduced: Vec<u32> = lms.iter().map(|&i| name_of[i]).collect();
        let mut sa1 = vec![0i32; reduced.len()];
        sais(&reduced, &mut sa1, names as usize);
        sa1.iter().map(|&r| lms[r as usize]).collect()
    };

    // Stage 2: place LMS suffixes in sorted order (reverse, so earlier
    // suffixes take lower slots within a bucket) and induce the final SA.
    sa.fill(-1);
    bucket_ends(&freq, &mut bkt);
    for &i in ordered.iter().rev() {
        let c = s[i] as usize;
        bkt[c] -= 1;
        sa[bkt[c] as usize] = i as i32;
    }
    induce(s, sa, &ls, &freq, &mut bkt);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(src: &[u8]) -> Vec<i32> {
        let mut sa: Vec<i32> = (0..src.len() as i32).collect();
        sa.sort_by(|&a, &b| src[a as usize..].cmp(&src[b as usize..]));
        sa
    }

    fn check(src: &[u8]) {
        assert_eq!(suffix_array(src), naive(src), "input {src:?}");
    }

    #[test]
    fn small_fixed_inputs() {
        check(b"");
        check(b"a");
        check(b"ab");
        check(b"ba");
        check(b"aa");
        check(b"banana");
        check(b"abracadabra");
        check(b"mississippi");
        check(b"aaaaaaaaaa");
        check(b"abababab");
        check(&[0, 0, 0, 1, 0, 0]);
        check(&[255, 0, 255, 0, 255]);
    }

    #[test]
    fn pseudo_random_inputs() {
        let mut state = 0x9E3779B97F4A7C15u64;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        for len in [2usize, 3, 5, 17, 64, 257, 1000] {
            // Full byte alphabet.
            let data: Vec<u8> = (0..len).map(|_| (next() >> 24) as u8).collect();
            check(&data);
            // Tiny alphabet exercises deep recursion.
            let data: Vec<u8> = (0..len).map(|_| (next() % 3) as u8).collect();
            check(&data);
        }
    }

    #[test]
    fn all_positions_present() {
        let data: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let sa = suffix_array(&data);
        let mut seen = vec![false; data.len()];
        for &p in &sa {
            assert!(!seen[p as usize]);
            seen[p as usize] = true;
        }
        assert!(seen.iter().all(|&b| b));
    }
}
