//! Bit-level I/O used by both sides of the codec.
//!
//! ASH0 payloads are sequences of 32-bit words stored big endian, with bits
//! consumed from the most significant end of each word.  The writer can also
//! emit little endian byte or bit order, which other containers in this
//! family use, but the ASH0 streams are always `(word_aligned, be_bytes,
//! be_bits) = (true, true, true)`.

use bit_vec::BitVec;
use crate::Error;

/// Accumulates bits in logical order and renders them as a byte payload.
pub struct BitWriter {
    bits: BitVec
}

impl BitWriter {
    pub fn create() -> Self {
        Self {
            bits: BitVec::new()
        }
    }
    /// append the low bit of `bit`
    pub fn write_bit(&mut self,bit: u32) {
        self.bits.push(bit & 1 > 0);
    }
    /// append the low `num_bits` of `val` starting from the MSB
    pub fn write_bits_be(&mut self,val: u32,num_bits: u32) {
        for i in (0..num_bits).rev() {
            self.bits.push((val >> i) & 1 > 0);
        }
    }
    /// count of bits written so far
    pub fn len(&self) -> usize {
        self.bits.len()
    }
    /// Render the accumulated bits.  Each full 32-bit word is serialized in
    /// the requested byte order, with every byte optionally bit-reversed.
    /// Without word alignment the tail is cut to the fewest bytes that still
    /// cover the bit count.
    pub fn finalize(mut self,word_align: bool,be_bytes: bool,be_bits: bool) -> Vec<u8> {
        let num_bits = self.bits.len();
        while self.bits.len() % 32 != 0 {
            self.bits.push(false);
        }
        let mut bytes = self.bits.to_bytes();
        if !be_bytes {
            for word in bytes.chunks_mut(4) {
                word.reverse();
            }
        }
        if !be_bits {
            for byte in bytes.iter_mut() {
                *byte = byte.reverse_bits();
            }
        }
        if !word_align {
            bytes.truncate((num_bits + 7) / 8);
        }
        bytes
    }
}

/// Reads bits MSB-first from a big endian 32-bit word stream.
/// The current word is kept MSB-justified, `bit_capacity` counts the bits
/// already consumed from it.
pub struct BitReader<'a> {
    src: &'a [u8],
    srcpos: usize,
    word: u32,
    bit_capacity: u32
}

impl <'a> BitReader<'a> {
    /// Start reading at byte offset `startpos`, which must leave room for a
    /// whole word.  The first word is fetched immediately.
    pub fn create(src: &'a [u8],startpos: usize) -> Result<Self,Error> {
        let mut reader = Self {
            src,
            srcpos: startpos,
            word: 0,
            bit_capacity: 0
        };
        reader.feed_word()?;
        Ok(reader)
    }
    fn feed_word(&mut self) -> Result<(),Error> {
        if self.srcpos + 4 > self.src.len() {
            return Err(Error::TruncatedInput);
        }
        let p = self.srcpos;
        self.word = u32::from_be_bytes([self.src[p],self.src[p+1],self.src[p+2],self.src[p+3]]);
        self.bit_capacity = 0;
        self.srcpos += 4;
        Ok(())
    }
    pub fn read_bit(&mut self) -> Result<u32,Error> {
        let bit = self.word >> 31;
        if self.bit_capacity == 31 {
            self.feed_word()?;
        } else {
            self.bit_capacity += 1;
            self.word <<= 1;
        }
        Ok(bit)
    }
    /// read `num_bits` as an MSB-first field, 1 to 31 bits
    pub fn read_bits(&mut self,num_bits: u32) -> Result<u32,Error> {
        let next = self.bit_capacity + num_bits;
        if next <= 32 {
            let bits = self.word >> (32 - num_bits);
            if next != 32 {
                self.word <<= num_bits;
                self.bit_capacity += num_bits;
            } else {
                self.feed_word()?;
            }
            Ok(bits)
        } else {
            // straddles a word boundary, the shifted-out low bits of the
            // current word are zero so the OR is safe
            let mut bits = self.word >> (32 - num_bits);
            self.feed_word()?;
            bits |= self.word >> (64 - next);
            self.word <<= next - 32;
            self.bit_capacity = next - 32;
            Ok(bits)
        }
    }
}

#[test]
fn writer_bit_order() {
    let mut writer = BitWriter::create();
    writer.write_bits_be(0xC1,8);
    writer.write_bit(1);
    assert_eq!(writer.len(),9);
    assert_eq!(writer.finalize(true,true,true),vec![0xC1,0x80,0x00,0x00]);
}

#[test]
fn writer_le_bytes() {
    let mut writer = BitWriter::create();
    writer.write_bits_be(0xC1,8);
    writer.write_bit(1);
    assert_eq!(writer.finalize(true,false,true),vec![0x00,0x00,0x80,0xC1]);
}

#[test]
fn writer_le_bits() {
    let mut writer = BitWriter::create();
    writer.write_bits_be(0xC1,8);
    writer.write_bit(1);
    assert_eq!(writer.finalize(true,true,false),vec![0x83,0x01,0x00,0x00]);
}

#[test]
fn writer_unaligned_tail() {
    let mut writer = BitWriter::create();
    writer.write_bits_be(0xC1,8);
    writer.write_bit(1);
    assert_eq!(writer.finalize(false,true,true),vec![0xC1,0x80]);
}

#[test]
fn reader_fields() {
    let dat = [0xC1,0x80,0x00,0x00,0xFF,0x00,0x00,0x00];
    let mut reader = BitReader::create(&dat,0).expect("reader failed");
    assert_eq!(reader.read_bits(8).unwrap(),0xC1);
    assert_eq!(reader.read_bit().unwrap(),1);
    // this spends the first word exactly, the second is fetched at once
    assert_eq!(reader.read_bits(23).unwrap(),0);
    assert_eq!(reader.read_bits(8).unwrap(),0xFF);
}

#[test]
fn reader_eager_refill() {
    // spending a word to its last bit triggers the next fetch immediately,
    // so that last bit is unreachable in a one-word buffer
    let dat = [0xAA,0x00,0x00,0x01];
    let mut reader = BitReader::create(&dat,0).expect("reader failed");
    for _i in 0..31 {
        reader.read_bit().expect("read failed");
    }
    assert!(matches!(reader.read_bit(),Err(Error::TruncatedInput)));
}

#[test]
fn reader_straddles_words() {
    let mut writer = BitWriter::create();
    writer.write_bits_be(0xABCDE,20);
    writer.write_bits_be(0x12345,20);
    let bytes = writer.finalize(true,true,true);
    assert_eq!(bytes,vec![0xAB,0xCD,0xE1,0x23,0x45,0x00,0x00,0x00]);
    let mut reader = BitReader::create(&bytes,0).expect("reader failed");
    assert_eq!(reader.read_bits(20).unwrap(),0xABCDE);
    assert_eq!(reader.read_bits(20).unwrap(),0x12345);
}

#[test]
fn reader_bounds() {
    let dat = [0x00,0x00,0x00];
    assert!(matches!(BitReader::create(&dat,0),Err(Error::TruncatedInput)));
    let dat = [0x00,0x00,0x00,0x00];
    assert!(matches!(BitReader::create(&dat,4),Err(Error::TruncatedInput)));
}
