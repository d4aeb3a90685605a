//! Supporting components for the ASH0 codec stages.
//! These know nothing about the container layout, only about
//! bit packing, coding trees, and match searching.

pub mod bitstream;
pub mod huffman;
pub mod lz;
