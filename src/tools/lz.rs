//! Backward match searching for the LZ stage.
//!
//! Matches may be longer than their distance: the comparison wraps on the
//! distance so a short run can seed an arbitrarily long copy, exactly like
//! the decoder's one-byte-at-a-time copy loop.

/// Length of the match at `pos` against the string `distance` bytes back,
/// wrapping on the distance, at most `max_len` and never past the buffer.
fn matched_len(buffer: &[u8],pos: usize,distance: usize,max_len: usize) -> usize {
    let cap = max_len.min(buffer.len() - pos);
    let mut src = pos - distance;
    let mut count = 0;
    while count < cap && buffer[pos + count] == buffer[src] {
        count += 1;
        src += 1;
        if src == pos {
            src = pos - distance;
        }
    }
    count
}

/// Find the longest match at `pos` over distances `min_dist..=max_dist`,
/// returning `(length, distance)`.  The distance range is capped at `pos`.
/// Ties keep the smaller distance; the scan stops early once no longer
/// match is possible.
pub fn search(buffer: &[u8],pos: usize,min_dist: usize,max_dist: usize,max_len: usize) -> (usize,usize) {
    let cap = max_len.min(buffer.len() - pos);
    let max_dist = max_dist.min(pos);
    let mut best_len = 0;
    let mut best_dist = 0;
    for dist in min_dist..=max_dist {
        let count = matched_len(buffer,pos,dist,max_len);
        if count > best_len {
            best_len = count;
            best_dist = dist;
            if best_len == cap {
                break;
            }
        }
    }
    (best_len,best_dist)
}

/// Same search restricted to an ascending list of admissible distances.
pub fn search_restricted(buffer: &[u8],pos: usize,dists: &[usize],max_len: usize) -> (usize,usize) {
    let cap = max_len.min(buffer.len() - pos);
    let mut best_len = 0;
    let mut best_dist = 0;
    for &dist in dists {
        if dist > pos {
            break;
        }
        let count = matched_len(buffer,pos,dist,max_len);
        if count > best_len {
            best_len = count;
            best_dist = dist;
            if best_len == cap {
                break;
            }
        }
    }
    (best_len,best_dist)
}

/// Verify that a specific `(distance, length)` pair really matches at `pos`.
pub fn confirm(buffer: &[u8],pos: usize,distance: usize,length: usize) -> bool {
    if distance < 1 || distance > pos {
        return false;
    }
    matched_len(buffer,pos,distance,length) >= length
}

#[test]
fn finds_repeating_pattern() {
    let buffer = "abcabcabcabcabcabc".as_bytes();
    assert_eq!(search(buffer,3,1,2048,258),(15,3));
}

#[test]
fn overlapped_run() {
    let buffer = [0xAAu8;1024];
    let (length,distance) = search(&buffer,1,1,2048,258);
    assert_eq!((length,distance),(258,1));
    assert!(length > distance);
}

#[test]
fn prefers_smaller_distance_on_tie() {
    let buffer = "abxabyabz".as_bytes();
    // distances 3 and 6 both give a two byte match at position 6
    assert_eq!(search(buffer,6,1,2048,258),(2,3));
}

#[test]
fn restricted_distances() {
    let buffer = "xyxyxyxy".as_bytes();
    assert_eq!(search_restricted(buffer,2,&[2,4],258),(6,2));
    assert_eq!(search_restricted(buffer,2,&[5,6],258),(0,0));
}

#[test]
fn confirms_only_real_matches() {
    let buffer = "abcabcabcabcabcabc".as_bytes();
    assert!(confirm(buffer,3,3,15));
    assert!(!confirm(buffer,3,2,3));
    assert!(!confirm(buffer,3,4,1));
}
