//! Nintendo ASH0 Compression
//!
//! This produces and consumes the ASH0 container used by Wii titles
//! (System Menu, Animal Crossing: City Folk, My Pokémon Ranch).  The format
//! is LZSS tokenization coded through two static Huffman trees: one for
//! literal bytes plus match lengths, one for match distances.  The two code
//! streams are stored separately, each headed by its serialized tree.
//!
//! * This transforms buffers, not files (the expanded size is capped at 24 bits)
//! * The 12 byte header and both bit-streams are big endian
//!
//! Compression quality can be traded for time with `Options::passes`: each
//! pass re-parses the input against the code lengths of the previous pass,
//! then rebuilds both trees from the improved token stream.

use crate::tools::bitstream::{BitWriter,BitReader};
use crate::tools::huffman::{HuffTree,DecodeTree};
use crate::tools::lz;
use crate::{Error,Options};

const MAGIC: [u8;4] = *b"ASH0";
const HEADER_SIZE: usize = 12;
const SIZE_MASK: u32 = 0x00ff_ffff;

/// One step of the LZSS parse: a literal byte, or a backward reference.
/// References may have `length > distance`, which the copy loop turns into
/// a repeating fill.
#[derive(Clone,Copy)]
enum Token {
    Literal(u8),
    Reference { length: usize, distance: usize }
}

/// One entry of the parse graph filled by `retokenize`: the token chosen at
/// this position and the coded size in bits from here to the end.
#[derive(Clone,Copy)]
struct ParseNode {
    token: Token,
    weight: u64
}

fn check_options(opt: &Options) -> Result<(),Error> {
    // symbol values must fit 15 bits and leave room for the 256 literals
    if opt.sym_bits < 9 || opt.sym_bits > 15 || opt.dist_bits < 1 || opt.dist_bits > 15 {
        return Err(Error::BadParameters);
    }
    Ok(())
}

/// longest match length a `sym_bits` wide alphabet can encode
fn max_match_length(sym_bits: u32) -> usize {
    (1usize << sym_bits) - 1 - 0x100 + 3
}

/// Greedy seed parse: at every position take the longest match outright,
/// or fall back to a literal below the 3 byte threshold.
fn tokenize(buffer: &[u8],opt: &Options) -> Vec<Token> {
    let max_dist = 1usize << opt.dist_bits;
    let max_len = max_match_length(opt.sym_bits);
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < buffer.len() {
        let (length,distance) = lz::search(buffer,pos,1,max_dist,max_len);
        if length >= 3 {
            tokens.push(Token::Reference { length, distance });
            pos += length;
        } else {
            tokens.push(Token::Literal(buffer[pos]));
            pos += 1;
        }
    }
    tokens
}

/// Histogram both alphabets over a token stream and build the trees.
fn build_trees(tokens: &[Token],opt: &Options) -> (HuffTree,HuffTree) {
    let mut sym_hist = vec![0u32;1 << opt.sym_bits];
    let mut dist_hist = vec![0u32;1 << opt.dist_bits];
    for token in tokens {
        match *token {
            Token::Literal(byte) => sym_hist[byte as usize] += 1,
            Token::Reference { length, distance } => {
                sym_hist[length - 3 + 0x100] += 1;
                dist_hist[distance - 1] += 1;
            }
        }
    }
    (HuffTree::create(&sym_hist),HuffTree::create(&dist_hist))
}

/// Largest entry of `vals` not exceeding `value`, as `(value, index)`.
/// Zero stays zero; when nothing fits, 1 stands in for the literal case.
fn round_down(value: usize,vals: &[(usize,u16)]) -> (usize,Option<usize>) {
    if value == 0 {
        return (0,None);
    }
    match vals.partition_point(|&(v,_)| v <= value) {
        0 => (1,None),
        k => (vals[k-1].0,Some(k-1))
    }
}

/// Re-parse the input optimally against the code lengths of the current
/// trees.  The parse graph is filled back to front: each position weighs
/// every admissible token by its coded size plus the already-known weight
/// of the position it jumps to, a shortest path to the end of the buffer.
/// Lengths and distances are restricted to the symbols the current trees
/// actually contain.
fn retokenize(buffer: &[u8],sym_tree: &HuffTree,dist_tree: &HuffTree,opt: &Options) -> Vec<Token> {
    let sym_depths = sym_tree.leaf_depths();
    let dist_depths = dist_tree.leaf_depths();

    // admissible lengths and distances, ascending, with their code lengths
    let mut lens: Vec<(usize,u16)> = Vec::new();
    for (sym,depth) in sym_depths.iter().enumerate().skip(0x100) {
        if let Some(depth) = depth {
            lens.push((sym - 0x100 + 3,*depth));
        }
    }
    let mut dsts: Vec<(usize,u16)> = Vec::new();
    for (sym,depth) in dist_depths.iter().enumerate() {
        if let Some(depth) = depth {
            dsts.push((sym + 1,*depth));
        }
    }
    let dst_list: Vec<usize> = dsts.iter().map(|&(d,_)| d).collect();

    // bytes with no leaf in the current tree get a pessimistic cost, they
    // can only enter the stream after the trees are rebuilt
    let absent_cost = (opt.sym_bits + 1) as u64;
    let lit_cost = |byte: u8| -> u64 {
        match sym_depths[byte as usize] {
            Some(depth) => depth as u64,
            None => absent_cost
        }
    };

    let n = buffer.len();
    let mut graph = vec![ParseNode { token: Token::Literal(0), weight: 0 };n];
    for p in (0..n).rev() {
        let (length,distance) = match lens.last() {
            Some(&(longest,_)) => lz::search_restricted(buffer,p,&dst_list,longest),
            None => (0,0)
        };
        if length < 3 {
            let weight = lit_cost(buffer[p]) + if p + 1 < n { graph[p+1].weight } else { 0 };
            graph[p] = ParseNode { token: Token::Literal(buffer[p]), weight };
            continue;
        }
        // weigh the rounded match length and every shorter admissible
        // length, down to the single literal
        let (mut cand,mut idx) = round_down(length,&lens);
        let mut best_len = 1;
        let mut best_cost = u64::MAX;
        while cand > 0 {
            let len_cost = match idx {
                Some(i) => lens[i].1 as u64,
                None => lit_cost(buffer[p])
            };
            let succ_cost = if p + cand < n { graph[p + cand].weight } else { 0 };
            if len_cost + succ_cost < best_cost {
                best_cost = len_cost + succ_cost;
                best_len = cand;
            }
            (cand,idx) = round_down(cand - 1,&lens);
        }
        if best_len < 3 {
            graph[p] = ParseNode { token: Token::Literal(buffer[p]), weight: best_cost };
            continue;
        }
        // the searched distance is admissible but maybe not the cheapest;
        // take the first nearer distance with a shorter code that still
        // physically matches at the chosen length
        let found = dsts.partition_point(|&(d,_)| d < distance);
        let mut dist_cost = dsts[found].1 as u64;
        let mut best_dist = distance;
        for &(d,depth) in &dsts {
            if d > p {
                break;
            }
            if (depth as u64) < dist_cost && lz::confirm(buffer,p,d,best_len) {
                best_dist = d;
                dist_cost = depth as u64;
                break;
            }
        }
        graph[p] = ParseNode {
            token: Token::Reference { length: best_len, distance: best_dist },
            weight: best_cost + dist_cost
        };
    }

    // walk the chosen edges forward to rebuild the token stream
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < n {
        let node = &graph[pos];
        tokens.push(node.token);
        pos += match node.token {
            Token::Literal(_) => 1,
            Token::Reference { length, .. } => length
        };
    }
    tokens
}

/// Main compression function
pub fn compress(ibuf: &[u8],opt: &Options) -> Result<Vec<u8>,Error> {
    check_options(opt)?;
    if ibuf.is_empty() {
        return Err(Error::EmptyInput);
    }
    if ibuf.len() > SIZE_MASK as usize {
        return Err(Error::FileTooLarge);
    }
    let mut tokens = tokenize(ibuf,opt);
    log::debug!("greedy parse: {} tokens",tokens.len());
    let (mut sym_tree,mut dist_tree) = build_trees(&tokens,opt);
    for pass in 1..=opt.passes {
        tokens = retokenize(ibuf,&sym_tree,&dist_tree,opt);
        (sym_tree,dist_tree) = build_trees(&tokens,opt);
        log::debug!("pass {}: {} tokens",pass,tokens.len());
    }

    let mut sym_stream = BitWriter::create();
    let mut dist_stream = BitWriter::create();
    sym_tree.write_tree(&mut sym_stream,opt.sym_bits);
    dist_tree.write_tree(&mut dist_stream,opt.dist_bits);
    for token in &tokens {
        match *token {
            Token::Literal(byte) => sym_tree.write_symbol(byte as u16,&mut sym_stream),
            Token::Reference { length, distance } => {
                sym_tree.write_symbol((length - 3 + 0x100) as u16,&mut sym_stream);
                dist_tree.write_symbol((distance - 1) as u16,&mut dist_stream);
            }
        }
    }
    log::debug!("streams: {} sym bits, {} dist bits",sym_stream.len(),dist_stream.len());

    // the reader fetches a fresh word the instant one is spent, so when the
    // distance bits fill their last word exactly that fetch needs one more
    // word to land on
    if dist_stream.len() % 32 == 0 {
        dist_stream.write_bit(0);
    }
    let sym_bytes = sym_stream.finalize(true,true,true);
    let dist_bytes = dist_stream.finalize(true,true,true);

    let mut ans = Vec::with_capacity(HEADER_SIZE + sym_bytes.len() + dist_bytes.len());
    ans.extend_from_slice(&MAGIC);
    ans.extend_from_slice(&(ibuf.len() as u32).to_be_bytes());
    ans.extend_from_slice(&((HEADER_SIZE + sym_bytes.len()) as u32).to_be_bytes());
    ans.extend_from_slice(&sym_bytes);
    ans.extend_from_slice(&dist_bytes);
    Ok(ans)
}

/// Main decompression function
pub fn expand(ibuf: &[u8],opt: &Options) -> Result<Vec<u8>,Error> {
    check_options(opt)?;
    if ibuf.len() < HEADER_SIZE {
        return Err(Error::TruncatedInput);
    }
    if ibuf[0..4] != MAGIC {
        return Err(Error::FileFormatMismatch);
    }
    let uncomp_size = (u32::from_be_bytes([ibuf[4],ibuf[5],ibuf[6],ibuf[7]]) & SIZE_MASK) as usize;
    let dist_offset = u32::from_be_bytes([ibuf[8],ibuf[9],ibuf[10],ibuf[11]]) as usize;
    log::debug!("expanding {} bytes, distance stream at {:#x}",uncomp_size,dist_offset);
    if uncomp_size == 0 {
        return Ok(Vec::new());
    }

    // the symbol stream always starts right after the header, only the
    // distance stream's start is recorded in it
    let mut dist_reader = BitReader::create(ibuf,dist_offset)?;
    let mut sym_reader = BitReader::create(ibuf,HEADER_SIZE)?;
    let sym_tree = DecodeTree::read(&mut sym_reader,opt.sym_bits)?;
    let dist_tree = DecodeTree::read(&mut dist_reader,opt.dist_bits)?;

    let mut ans: Vec<u8> = Vec::with_capacity(uncomp_size);
    let mut remaining = uncomp_size;
    while remaining > 0 {
        let sym = sym_tree.next_symbol(&mut sym_reader)?;
        if sym < 0x100 {
            ans.push(sym as u8);
            remaining -= 1;
        } else {
            let dist_sym = dist_tree.next_symbol(&mut dist_reader)?;
            let length = (sym as usize - 0x100) + 3;
            let distance = dist_sym as usize + 1;
            if length > remaining || distance > ans.len() {
                return Err(Error::InvalidBackReference);
            }
            remaining -= length;
            // byte at a time so a match may run past its own start
            for _k in 0..length {
                ans.push(ans[ans.len() - distance]);
            }
        }
    }
    Ok(ans)
}

#[cfg(test)]
use crate::STD_OPTIONS;

#[cfg(test)]
fn seeded_bytes(seed: u32,count: usize) -> Vec<u8> {
    let mut state = seed;
    let mut ans = Vec::with_capacity(count);
    for _i in 0..count {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        ans.push((state >> 16) as u8);
    }
    ans
}

#[test]
fn known_vector() {
    let expected = hex::decode("4153483000000002000000108c23120080000080").unwrap();
    let compressed = compress("ab".as_bytes(),&STD_OPTIONS).expect("compression failed");
    assert_eq!(compressed,expected);
    let expanded = expand(&expected,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(expanded,"ab".as_bytes());
}

#[test]
fn invertibility() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".as_bytes();
    let compressed = compress(test_data,&STD_OPTIONS).expect("compression failed");
    let expanded = expand(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);

    let test_data = "1234567".as_bytes();
    let compressed = compress(test_data,&STD_OPTIONS).expect("compression failed");
    let expanded = expand(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);
}

#[test]
fn single_byte() {
    let compressed = compress("A".as_bytes(),&STD_OPTIONS).expect("compression failed");
    let expanded = expand(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(expanded,"A".as_bytes());
}

#[test]
fn zeros_compress_small() {
    let test_data = vec![0u8;4096];
    let compressed = compress(&test_data,&STD_OPTIONS).expect("compression failed");
    assert!(compressed.len() < 64,"got {} bytes",compressed.len());
    let expanded = expand(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(test_data,expanded);
}

#[test]
fn repeated_pattern_tokens() {
    let test_data = "abcabcabcabcabcabc".as_bytes();
    let tokens = tokenize(test_data,&STD_OPTIONS);
    assert_eq!(tokens.len(),4);
    assert!(matches!(tokens[0],Token::Literal(b'a')));
    assert!(matches!(tokens[1],Token::Literal(b'b')));
    assert!(matches!(tokens[2],Token::Literal(b'c')));
    assert!(matches!(tokens[3],Token::Reference { length: 15, distance: 3 }));
    let compressed = compress(test_data,&STD_OPTIONS).expect("compression failed");
    let expanded = expand(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(test_data.to_vec(),expanded);
}

#[test]
fn overlapped_reference() {
    let test_data = vec![0xAAu8;1024];
    let tokens = tokenize(&test_data,&STD_OPTIONS);
    assert!(matches!(tokens[0],Token::Literal(0xAA)));
    match tokens[1] {
        Token::Reference { length, distance } => assert!(length > distance),
        _ => panic!("expected a reference")
    }
    let compressed = compress(&test_data,&STD_OPTIONS).expect("compression failed");
    let expanded = expand(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(test_data,expanded);
}

#[test]
fn random_round_trip() {
    let test_data = seeded_bytes(0xC0FFEE,65536);
    let compressed = compress(&test_data,&STD_OPTIONS).expect("compression failed");
    let expanded = expand(&compressed,&STD_OPTIONS).expect("expansion failed");
    assert_eq!(test_data,expanded);
}

#[test]
fn retokenization_round_trip() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".repeat(200);
    let test_data = test_data.as_bytes();
    let mut sizes = Vec::new();
    for passes in 0..3 {
        let opt = Options { passes, ..STD_OPTIONS };
        let compressed = compress(test_data,&opt).expect("compression failed");
        let expanded = expand(&compressed,&opt).expect("expansion failed");
        assert_eq!(test_data.to_vec(),expanded);
        sizes.push(compressed.len());
    }
    // more passes must not grow the output beyond a small tolerance
    assert!(sizes[1] <= sizes[0] + 16,"sizes {:?}",sizes);
    assert!(sizes[2] <= sizes[1] + 16,"sizes {:?}",sizes);
}

#[test]
fn wide_distance_round_trip() {
    let test_data = seeded_bytes(0xC0FFEE,8192);
    for passes in 0..3 {
        let opt = Options { sym_bits: 9, dist_bits: 15, passes };
        let compressed = compress(&test_data,&opt).expect("compression failed");
        let expanded = expand(&compressed,&opt).expect("expansion failed");
        assert_eq!(test_data,expanded);
    }
}

#[test]
fn header_invariants() {
    let test_data = "The quick brown fox jumps over the lazy dog".as_bytes();
    let compressed = compress(test_data,&STD_OPTIONS).expect("compression failed");
    assert_eq!(&compressed[0..4],b"ASH0");
    assert_eq!(compressed[4],0);
    let size = u32::from_be_bytes([compressed[4],compressed[5],compressed[6],compressed[7]]);
    assert_eq!(size as usize,test_data.len());
    let offset = u32::from_be_bytes([compressed[8],compressed[9],compressed[10],compressed[11]]) as usize;
    assert!(offset >= HEADER_SIZE);
    assert_eq!(offset % 4,0);
    assert!(offset < compressed.len());
}

#[test]
fn truncation_detected() {
    let test_data = "I am Sam. Sam I am. I do not like this Sam I am.\n".repeat(8);
    let compressed = compress(test_data.as_bytes(),&STD_OPTIONS).expect("compression failed");
    for cut in 0..compressed.len() {
        assert!(
            matches!(expand(&compressed[0..cut],&STD_OPTIONS),Err(Error::TruncatedInput)),
            "cut at {} not detected",cut
        );
    }
}

#[test]
fn boundary_errors() {
    assert!(matches!(compress(&[],&STD_OPTIONS),Err(Error::EmptyInput)));
    let too_big = vec![0u8;0x1000000];
    assert!(matches!(compress(&too_big,&STD_OPTIONS),Err(Error::FileTooLarge)));
    let not_ash = hex::decode("4153483100000002000000108c23120080000080").unwrap();
    assert!(matches!(expand(&not_ash,&STD_OPTIONS),Err(Error::FileFormatMismatch)));
    let bad_opt = Options { sym_bits: 8, dist_bits: 11, passes: 0 };
    assert!(matches!(compress("x".as_bytes(),&bad_opt),Err(Error::BadParameters)));
}
