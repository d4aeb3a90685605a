//! # ASH0 Library
//!
//! Compress or expand Nintendo's ASH0 archives, a Huffman+LZSS container
//! found on the Wii (System Menu, Animal Crossing: City Folk, My Pokémon Ranch).
//! * `ash` is the codec pair, it produces and consumes the ASH0 container
//! * `tools` holds the bitstream, coding tree, and match search components
//!
//! The compression/expansion functions transform buffers, not files
//! (ASH0 caps the expanded size at 24 bits, so files are easily buffered).
//!
//! ## Buffer Example
//!
//! ```rs
//! use ash0::*;
//! let test_data = "This is the chaunt of the priests.  The chaunt of the priests of Mung.".as_bytes();
//! let compressed = ash::compress(test_data,&STD_OPTIONS).expect("compression failed");
//! let expanded = ash::expand(&compressed,&STD_OPTIONS).expect("expansion failed");
//! assert_eq!(test_data,expanded.as_slice());
//! ```

mod tools;
pub mod ash;

/// Codec Errors
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("file format mismatch")]
    FileFormatMismatch,
    #[error("file too large")]
    FileTooLarge,
    #[error("empty input")]
    EmptyInput,
    #[error("truncated input")]
    TruncatedInput,
    #[error("invalid back reference")]
    InvalidBackReference,
    #[error("unsupported coding parameters")]
    BadParameters
}

/// Options controlling compression
#[derive(Clone)]
pub struct Options {
    /// width in bits of the symbol alphabet, literal bytes plus length codes
    pub sym_bits: u32,
    /// width in bits of the distance alphabet
    pub dist_bits: u32,
    /// retokenization passes to run after the greedy parse
    pub passes: u32
}

/// Defaults matching System Menu and Animal Crossing: City Folk archives.
/// My Pokémon Ranch archives need `dist_bits` raised to 15.
pub const STD_OPTIONS: Options = Options {
    sym_bits: 9,
    dist_bits: 11,
    passes: 0
};
