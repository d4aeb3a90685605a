//! Static Huffman coding trees in the layout ASH0 expects.
//!
//! The encoder side builds a tree from a frequency histogram and serializes
//! it in pre-order at the head of its bit-stream.  The decoder side rebuilds
//! the tree from that serialization into a pair of child arrays it can walk
//! bit by bit.  The two sides must agree exactly: the builder normalizes the
//! tree so the subtree with fewer leaves is always on the left.

use crate::Error;
use crate::tools::bitstream::{BitWriter,BitReader};

const TREE_RIGHT: u32 = 0x8000_0000;
const TREE_LEFT: u32 = 0x4000_0000;
const TREE_VAL_MASK: u32 = 0x3fff_ffff;

/// Arena node.  Leaves carry the symbol; every node carries the inclusive
/// range of symbols beneath it and the count of leaves it represents.
#[derive(Clone,Copy)]
struct HuffNode {
    sym: u16,
    sym_min: u16,
    sym_max: u16,
    n_represent: u16,
    freq: u32,
    left: Option<usize>,
    right: Option<usize>
}

/// Encoder-side coding tree over one alphabet, nodes held in an arena
/// addressed by index.
pub struct HuffTree {
    nodes: Vec<HuffNode>,
    root: usize,
    alphabet: usize
}

impl HuffTree {
    /// Build a finalized tree from a histogram, one slot per alphabet symbol.
    /// If fewer than two symbols are used, zero-frequency symbols are
    /// promoted in ascending order until two are present, so the tree always
    /// has at least one branch to serialize.
    pub fn create(hist: &[u32]) -> Self {
        let alphabet = hist.len();
        let mut nodes: Vec<HuffNode> = Vec::with_capacity(2 * alphabet);
        for (i,&freq) in hist.iter().enumerate() {
            nodes.push(HuffNode {
                sym: i as u16,
                sym_min: i as u16,
                sym_max: i as u16,
                n_represent: 1,
                freq,
                left: None,
                right: None
            });
        }
        // promote dummies if the histogram is too thin
        let mut n_present = nodes.iter().filter(|n| n.freq > 0).count();
        if n_present < 2 {
            for node in nodes.iter_mut() {
                if node.freq == 0 {
                    node.freq = 1;
                    n_present += 1;
                    if n_present >= 2 {
                        break;
                    }
                }
            }
        }
        // sort by frequency descending and cut off the unused tail
        nodes.sort_by(|a,b| b.freq.cmp(&a.freq));
        let n_used = nodes.iter().position(|n| n.freq == 0).unwrap_or(nodes.len());
        nodes.truncate(n_used);
        // repeatedly merge the two lowest roots; the left child is spilled
        // past the active range, the right child's slot simply leaves it,
        // and the branch takes the left child's old slot before the re-sort
        let mut n_roots = n_used;
        while n_roots > 1 {
            let spilled = nodes[n_roots-2];
            nodes.push(spilled);
            let left = nodes.len() - 1;
            let right = n_roots - 1;
            nodes[n_roots-2] = HuffNode {
                sym: 0,
                sym_min: nodes[left].sym_min.min(nodes[right].sym_min),
                sym_max: nodes[left].sym_max.max(nodes[right].sym_max),
                n_represent: nodes[left].n_represent + nodes[right].n_represent,
                freq: nodes[left].freq + nodes[right].freq,
                left: Some(left),
                right: Some(right)
            };
            n_roots -= 1;
            nodes[..n_roots].sort_by(|a,b| b.freq.cmp(&a.freq));
        }
        let mut tree = Self {
            nodes,
            root: 0,
            alphabet
        };
        tree.make_shallow_first();
        tree
    }
    /// Swap children wherever the left subtree has more leaves than the
    /// right.  The serialized layout requires the shallow subtree first.
    fn make_shallow_first(&mut self) {
        let mut stack = vec![self.root];
        while let Some(i) = stack.pop() {
            if let (Some(mut left),Some(mut right)) = (self.nodes[i].left,self.nodes[i].right) {
                if self.nodes[left].n_represent > self.nodes[right].n_represent {
                    (left,right) = (right,left);
                    self.nodes[i].left = Some(left);
                    self.nodes[i].right = Some(right);
                }
                stack.push(left);
                stack.push(right);
            }
        }
    }
    /// Does the subtree at `node` contain `sym`?  The symbol range on each
    /// node is a superset of its leaves, so it only prunes the descent.
    fn contains(&self,node: usize,sym: u16) -> bool {
        let mut stack = vec![node];
        while let Some(i) = stack.pop() {
            let n = &self.nodes[i];
            match (n.left,n.right) {
                (Some(left),Some(right)) => {
                    if sym >= n.sym_min && sym <= n.sym_max {
                        stack.push(left);
                        stack.push(right);
                    }
                },
                _ => {
                    if n.sym == sym {
                        return true;
                    }
                }
            }
        }
        false
    }
    /// Emit the code for `sym`, which must be a leaf of this tree.
    pub fn write_symbol(&self,sym: u16,stream: &mut BitWriter) {
        let mut i = self.root;
        while let (Some(left),Some(right)) = (self.nodes[i].left,self.nodes[i].right) {
            if self.contains(left,sym) {
                stream.write_bit(0);
                i = left;
            } else {
                stream.write_bit(1);
                i = right;
            }
        }
    }
    /// Code length of every symbol, indexed by symbol, `None` where the
    /// tree has no leaf.
    pub fn leaf_depths(&self) -> Vec<Option<u16>> {
        let mut depths = vec![None;self.alphabet];
        let mut stack = vec![(self.root,0u16)];
        while let Some((i,depth)) = stack.pop() {
            let n = &self.nodes[i];
            match (n.left,n.right) {
                (Some(left),Some(right)) => {
                    stack.push((left,depth+1));
                    stack.push((right,depth+1));
                },
                _ => depths[n.sym as usize] = Some(depth)
            }
        }
        depths
    }
    /// Serialize in pre-order: `1` opens a branch (left emitted first),
    /// `0` is a leaf followed by the symbol as a `width`-bit field.
    pub fn write_tree(&self,stream: &mut BitWriter,width: u32) {
        let mut stack = vec![self.root];
        while let Some(i) = stack.pop() {
            let n = &self.nodes[i];
            match (n.left,n.right) {
                (Some(left),Some(right)) => {
                    stream.write_bit(1);
                    stack.push(right);
                    stack.push(left);
                },
                _ => {
                    stream.write_bit(0);
                    stream.write_bits_be(n.sym as u32,width);
                }
            }
        }
    }
}

/// Decoder-side tree, rebuilt from the serialized form into child arrays.
/// An index below the alphabet size is a leaf and is itself the symbol,
/// anything else indexes the arrays again.
pub struct DecodeTree {
    left: Vec<u32>,
    right: Vec<u32>,
    root: u32,
    alphabet: u32
}

impl DecodeTree {
    /// Rebuild a tree from the head of `reader` without recursing: a scratch
    /// stack records which side of which pending branch each completed
    /// subtree attaches to.
    pub fn read(reader: &mut BitReader,width: u32) -> Result<Self,Error> {
        let alphabet = 1usize << width;
        let mut left = vec![0u32;2*alphabet - 1];
        let mut right = vec![0u32;2*alphabet - 1];
        let mut work: Vec<u32> = Vec::with_capacity(2*alphabet);
        let mut next_node = alphabet as u32;
        let mut sym_root: u32 = 0;
        loop {
            if reader.read_bit()? != 0 {
                if next_node as usize >= left.len() {
                    return Err(Error::FileFormatMismatch);
                }
                work.push(next_node | TREE_RIGHT);
                work.push(next_node | TREE_LEFT);
                next_node += 1;
            } else {
                sym_root = reader.read_bits(width)?;
                // unwind completed subtrees; a right-side entry closes its
                // branch, a left-side entry still waits on the right subtree
                while let Some(nodeval) = work.pop() {
                    let idx = (nodeval & TREE_VAL_MASK) as usize;
                    if nodeval & TREE_RIGHT != 0 {
                        right[idx] = sym_root;
                        sym_root = idx as u32;
                    } else {
                        left[idx] = sym_root;
                        break;
                    }
                }
            }
            if work.is_empty() {
                break;
            }
        }
        Ok(Self {
            left,
            right,
            root: sym_root,
            alphabet: alphabet as u32
        })
    }
    /// Walk from the root by one coded symbol, 0 = left, 1 = right.
    pub fn next_symbol(&self,reader: &mut BitReader) -> Result<u32,Error> {
        let mut node = self.root;
        while node >= self.alphabet {
            node = match reader.read_bit()? {
                0 => self.left[node as usize],
                _ => self.right[node as usize]
            };
        }
        Ok(node)
    }
}

#[cfg(test)]
fn check_invariants(tree: &HuffTree) {
    let mut leaves: Vec<u16> = Vec::new();
    let mut stack = vec![tree.root];
    while let Some(i) = stack.pop() {
        let n = &tree.nodes[i];
        match (n.left,n.right) {
            (Some(left),Some(right)) => {
                assert!(tree.nodes[left].n_represent <= tree.nodes[right].n_represent);
                assert_eq!(n.n_represent,tree.nodes[left].n_represent + tree.nodes[right].n_represent);
                assert_eq!(n.sym_min,tree.nodes[left].sym_min.min(tree.nodes[right].sym_min));
                assert_eq!(n.sym_max,tree.nodes[left].sym_max.max(tree.nodes[right].sym_max));
                stack.push(left);
                stack.push(right);
            },
            _ => {
                assert_eq!(n.sym_min,n.sym);
                assert_eq!(n.sym_max,n.sym);
                assert_eq!(n.n_represent,1);
                leaves.push(n.sym);
            }
        }
    }
    let count = leaves.len();
    leaves.sort();
    leaves.dedup();
    assert_eq!(count,leaves.len(),"duplicated leaf symbol");
}

#[test]
fn builder_invariants() {
    let mut hist = vec![0u32;16];
    hist[2] = 5;
    hist[3] = 2;
    hist[7] = 1;
    hist[11] = 1;
    let tree = HuffTree::create(&hist);
    check_invariants(&tree);
    let depths = tree.leaf_depths();
    assert_eq!(depths.iter().filter(|d| d.is_some()).count(),4);
    // the dominant symbol gets the shortest code
    assert_eq!(depths[2],Some(1));
    assert!(depths[7].unwrap() > 1);
}

#[test]
fn thin_histogram_promotes_dummies() {
    let mut hist = vec![0u32;8];
    hist[3] = 7;
    let tree = HuffTree::create(&hist);
    check_invariants(&tree);
    let depths = tree.leaf_depths();
    // symbol 0 is promoted to pair with the lone used symbol
    assert_eq!(depths[3],Some(1));
    assert_eq!(depths[0],Some(1));
    assert_eq!(depths.iter().filter(|d| d.is_some()).count(),2);
}

#[test]
fn serialization_round_trip() {
    let mut hist = vec![0u32;32];
    for (i,freq) in [(0usize,10u32),(5,6),(6,6),(9,2),(17,1),(30,1)] {
        hist[i] = freq;
    }
    let tree = HuffTree::create(&hist);
    check_invariants(&tree);
    let mut stream = BitWriter::create();
    tree.write_tree(&mut stream,5);
    let syms = [0u16,5,6,9,17,30];
    for sym in syms {
        tree.write_symbol(sym,&mut stream);
    }
    // extra padding word in case the bits spend the last word exactly
    let mut bytes = stream.finalize(true,true,true);
    bytes.extend_from_slice(&[0;4]);
    let mut reader = BitReader::create(&bytes,0).expect("reader failed");
    let decode_tree = DecodeTree::read(&mut reader,5).expect("tree read failed");
    for sym in syms {
        assert_eq!(decode_tree.next_symbol(&mut reader).expect("walk failed"),sym as u32);
    }
}

#[test]
fn depths_match_codes() {
    let mut hist = vec![0u32;16];
    for (i,freq) in [(1usize,9u32),(2,4),(3,2),(4,1)] {
        hist[i] = freq;
    }
    let tree = HuffTree::create(&hist);
    let depths = tree.leaf_depths();
    for sym in [1u16,2,3,4] {
        let mut stream = BitWriter::create();
        tree.write_symbol(sym,&mut stream);
        assert_eq!(stream.len(),depths[sym as usize].unwrap() as usize);
    }
}

#[test]
fn rejects_impossible_tree() {
    // all-ones input claims more branches than the alphabet allows
    let dat = [0xff;64];
    let mut reader = BitReader::create(&dat,0).expect("reader failed");
    assert!(matches!(DecodeTree::read(&mut reader,3),Err(Error::FileFormatMismatch)));
}
