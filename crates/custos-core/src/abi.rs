//! Call payload codec
//!
//! Outgoing calls carry a 4-byte selector followed by 32-byte argument words,
//! with dynamic arrays referenced by byte offsets into the argument area. The
//! reader is strict: dirty high bits, truncated words and out-of-range offsets are
//! decode errors, never best-effort values.

use crate::hash::selector;
use crate::identifiers::Address;

/// Upper bound on decoded array lengths.
pub const MAX_ARRAY_LEN: usize = 256;

const WORD: usize = 32;

/// Payload decoding failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbiError {
    #[error("payload shorter than a selector")]
    MissingSelector,
    #[error("argument word {index} out of bounds")]
    Truncated { index: usize },
    #[error("argument word {index} has non-zero high bits")]
    DirtyHighBits { index: usize },
    #[error("dynamic offset {offset} out of bounds")]
    BadOffset { offset: usize },
    #[error("array length {len} exceeds limit")]
    ArrayTooLong { len: usize },
}

/// 4-byte function selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selector(pub [u8; 4]);

impl Selector {
    /// Selector for a canonical signature, e.g. `"approve(address,uint256)"`.
    pub fn of(signature: &str) -> Self {
        Self(selector(signature))
    }
}

/// Unsigned 256-bit argument, kept as its big-endian word
///
/// Ordering is numeric: big-endian bytes compare the same way the integers do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct U256(pub [u8; 32]);

impl U256 {
    pub const ZERO: U256 = U256([0; 32]);
    pub const MAX: U256 = U256([0xff; 32]);

    /// Whether the value is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// The value as `u128`, if it fits.
    pub fn to_u128(&self) -> Option<u128> {
        if self.0[..16].iter().any(|b| *b != 0) {
            return None;
        }
        let mut low = [0u8; 16];
        low.copy_from_slice(&self.0[16..]);
        Some(u128::from_be_bytes(low))
    }
}

impl From<u128> for U256 {
    fn from(value: u128) -> Self {
        let mut word = [0u8; 32];
        word[16..].copy_from_slice(&value.to_be_bytes());
        U256(word)
    }
}

/// Split a payload into selector and argument area.
pub fn split_selector(payload: &[u8]) -> Result<(Selector, ArgReader<'_>), AbiError> {
    if payload.len() < 4 {
        return Err(AbiError::MissingSelector);
    }
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&payload[..4]);
    Ok((Selector(sel), ArgReader { args: &payload[4..] }))
}

/// Strict reader over the argument area of a payload
#[derive(Debug, Clone, Copy)]
pub struct ArgReader<'a> {
    args: &'a [u8],
}

impl<'a> ArgReader<'a> {
    /// Number of complete words in the argument area.
    pub fn word_count(&self) -> usize {
        self.args.len() / WORD
    }

    /// Length of the argument area in bytes.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Whether the argument area is empty.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    fn word_at(&self, byte_offset: usize, index: usize) -> Result<&'a [u8], AbiError> {
        let end = byte_offset
            .checked_add(WORD)
            .ok_or(AbiError::Truncated { index })?;
        self.args
            .get(byte_offset..end)
            .ok_or(AbiError::Truncated { index })
    }

    /// Raw word `index` of the head.
    pub fn word(&self, index: usize) -> Result<[u8; 32], AbiError> {
        let slice = self.word_at(index * WORD, index)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(slice);
        Ok(out)
    }

    /// Address argument; the 12 leading bytes must be zero.
    pub fn address(&self, index: usize) -> Result<Address, AbiError> {
        let word = self.word(index)?;
        if word[..12].iter().any(|b| *b != 0) {
            return Err(AbiError::DirtyHighBits { index });
        }
        Ok(Address::from_word_tail(&word))
    }

    /// Full-width unsigned integer argument.
    pub fn uint256(&self, index: usize) -> Result<U256, AbiError> {
        self.word(index).map(U256)
    }

    /// Unsigned integer argument that must fit in 128 bits.
    pub fn uint(&self, index: usize) -> Result<u128, AbiError> {
        self.uint256(index)?
            .to_u128()
            .ok_or(AbiError::DirtyHighBits { index })
    }

    /// Boolean argument (0 or 1 only).
    pub fn boolean(&self, index: usize) -> Result<bool, AbiError> {
        match self.uint(index)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(AbiError::DirtyHighBits { index }),
        }
    }

    fn offset(&self, index: usize) -> Result<usize, AbiError> {
        let raw = self.uint(index)?;
        let offset = usize::try_from(raw).map_err(|_| AbiError::BadOffset { offset: usize::MAX })?;
        if offset % WORD != 0 || offset >= self.args.len() {
            return Err(AbiError::BadOffset { offset });
        }
        Ok(offset)
    }

    // Offset of the first element and the element count of the dynamic
    // argument referenced by head word `index`.
    fn dynamic(&self, index: usize) -> Result<(usize, usize), AbiError> {
        let offset = self.offset(index)?;
        let len_word = self.word_at(offset, index)?;
        if len_word[..24].iter().any(|b| *b != 0) {
            return Err(AbiError::ArrayTooLong { len: usize::MAX });
        }
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&len_word[24..]);
        let len = usize::try_from(u64::from_be_bytes(len_bytes))
            .map_err(|_| AbiError::ArrayTooLong { len: usize::MAX })?;
        Ok((offset + WORD, len))
    }

    fn array_words(&self, index: usize) -> Result<Vec<[u8; 32]>, AbiError> {
        let (start, len) = self.dynamic(index)?;
        if len > MAX_ARRAY_LEN {
            return Err(AbiError::ArrayTooLong { len });
        }
        (0..len)
            .map(|i| -> Result<[u8; 32], AbiError> {
                let mut word = [0u8; 32];
                word.copy_from_slice(self.word_at(start + WORD * i, index)?);
                Ok(word)
            })
            .collect()
    }

    /// Dynamic `address[]` argument whose offset is stored in head word `index`.
    pub fn address_array(&self, index: usize) -> Result<Vec<Address>, AbiError> {
        self.array_words(index)?
            .iter()
            .map(|word| -> Result<Address, AbiError> {
                if word[..12].iter().any(|b| *b != 0) {
                    return Err(AbiError::DirtyHighBits { index });
                }
                Ok(Address::from_word_tail(word))
            })
            .collect()
    }

    /// Dynamic `uint256[]` argument whose offset is stored in head word `index`.
    pub fn uint256_array(&self, index: usize) -> Result<Vec<U256>, AbiError> {
        Ok(self.array_words(index)?.into_iter().map(U256).collect())
    }

    /// Dynamic `bytes` argument whose offset is stored in head word `index`.
    pub fn bytes(&self, index: usize) -> Result<&'a [u8], AbiError> {
        let (start, len) = self.dynamic(index)?;
        let end = start.checked_add(len).ok_or(AbiError::Truncated { index })?;
        self.args.get(start..end).ok_or(AbiError::Truncated { index })
    }
}

enum Token {
    Static([u8; 32]),
    Words(Vec<[u8; 32]>),
    Bytes(Vec<u8>),
}

fn length_word(len: usize) -> [u8; 32] {
    U256::from(len as u128).0
}

/// Builder for call payloads in the same layout the reader accepts
pub struct PayloadBuilder {
    selector: Selector,
    tokens: Vec<Token>,
}

impl PayloadBuilder {
    /// Start a payload for `signature`.
    pub fn new(signature: &str) -> Self {
        Self::with_selector(Selector::of(signature))
    }

    /// Start a payload for a raw selector.
    pub fn with_selector(selector: Selector) -> Self {
        Self {
            selector,
            tokens: Vec::new(),
        }
    }

    /// Append an address argument.
    pub fn address(mut self, address: Address) -> Self {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(address.as_bytes());
        self.tokens.push(Token::Static(word));
        self
    }

    /// Append an unsigned integer argument.
    pub fn uint(mut self, value: u128) -> Self {
        let mut word = [0u8; 32];
        word[16..].copy_from_slice(&value.to_be_bytes());
        self.tokens.push(Token::Static(word));
        self
    }

    /// Append a full-width unsigned integer argument.
    pub fn uint256(self, value: U256) -> Self {
        self.word(value.0)
    }

    /// Append a raw 32-byte word.
    pub fn word(mut self, word: [u8; 32]) -> Self {
        self.tokens.push(Token::Static(word));
        self
    }

    /// Append a dynamic `address[]` argument.
    pub fn address_array(mut self, addresses: &[Address]) -> Self {
        let words = addresses
            .iter()
            .map(|address| {
                let mut word = [0u8; 32];
                word[12..].copy_from_slice(address.as_bytes());
                word
            })
            .collect();
        self.tokens.push(Token::Words(words));
        self
    }

    /// Append a dynamic `uint256[]` argument.
    pub fn uint256_array(mut self, values: &[U256]) -> Self {
        self.tokens
            .push(Token::Words(values.iter().map(|v| v.0).collect()));
        self
    }

    /// Append a dynamic `bytes` argument.
    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.tokens.push(Token::Bytes(data.to_vec()));
        self
    }

    /// Encode the payload.
    pub fn build(self) -> Vec<u8> {
        let head_len = self.tokens.len() * WORD;
        let mut head = Vec::with_capacity(head_len);
        let mut tail: Vec<u8> = Vec::new();
        for token in &self.tokens {
            match token {
                Token::Static(word) => head.extend_from_slice(word),
                Token::Words(words) => {
                    head.extend_from_slice(&length_word(head_len + tail.len()));
                    tail.extend_from_slice(&length_word(words.len()));
                    for word in words {
                        tail.extend_from_slice(word);
                    }
                }
                Token::Bytes(data) => {
                    head.extend_from_slice(&length_word(head_len + tail.len()));
                    tail.extend_from_slice(&length_word(data.len()));
                    tail.extend_from_slice(data);
                    let padding = (WORD - data.len() % WORD) % WORD;
                    tail.resize(tail.len() + padding, 0);
                }
            }
        }
        let mut out = Vec::with_capacity(4 + head.len() + tail.len());
        out.extend_from_slice(&self.selector.0);
        out.extend_from_slice(&head);
        out.extend_from_slice(&tail);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_static_arguments() {
        let a = Address::repeat_byte(0x11);
        let payload = PayloadBuilder::new("transfer(address,uint256)")
            .address(a)
            .uint(1_000)
            .build();
        let (sel, args) = split_selector(&payload).unwrap();
        assert_eq!(sel, Selector::of("transfer(address,uint256)"));
        assert_eq!(args.address(0).unwrap(), a);
        assert_eq!(args.uint(1).unwrap(), 1_000);
        assert_eq!(args.word_count(), 2);
        assert!(matches!(args.uint(2), Err(AbiError::Truncated { index: 2 })));
    }

    #[test]
    fn test_dynamic_array_between_static_words() {
        let path = vec![Address::repeat_byte(1), Address::repeat_byte(2)];
        let payload = PayloadBuilder::new("f(uint256,address[],address)")
            .uint(5)
            .address_array(&path)
            .address(Address::repeat_byte(9))
            .build();
        let (_, args) = split_selector(&payload).unwrap();
        assert_eq!(args.uint(0).unwrap(), 5);
        assert_eq!(args.address_array(1).unwrap(), path);
        assert_eq!(args.address(2).unwrap(), Address::repeat_byte(9));
    }

    #[test]
    fn test_full_width_integers() {
        let payload = PayloadBuilder::new("approve(address,uint256)")
            .address(Address::repeat_byte(0x11))
            .uint256(U256::MAX)
            .build();
        let (_, args) = split_selector(&payload).unwrap();
        assert_eq!(args.uint256(1).unwrap(), U256::MAX);
        assert_eq!(args.uint(1), Err(AbiError::DirtyHighBits { index: 1 }));
        assert!(U256::MAX > U256::from(u128::MAX));
        assert!(U256::from(2) < U256::from(10));
        assert_eq!(U256::from(7).to_u128(), Some(7));
        assert!(U256::ZERO.is_zero() && !U256::from(1).is_zero());
    }

    #[test]
    fn test_bytes_and_uint_arrays() {
        let data = [0xabu8; 37];
        let starts = [U256::from(0), U256::from(4), U256::from(37)];
        let payload = PayloadBuilder::new("f(bytes,uint256[],address)")
            .bytes(&data)
            .uint256_array(&starts)
            .address(Address::repeat_byte(3))
            .build();
        let (_, args) = split_selector(&payload).unwrap();
        assert_eq!(args.bytes(0).unwrap(), &data[..]);
        assert_eq!(args.uint256_array(1).unwrap(), starts.to_vec());
        assert_eq!(args.address(2).unwrap(), Address::repeat_byte(3));

        let empty = PayloadBuilder::new("g(bytes)").bytes(&[]).build();
        let (_, args) = split_selector(&empty).unwrap();
        assert!(args.bytes(0).unwrap().is_empty());
    }

    #[test]
    fn test_bytes_length_past_the_end_rejected() {
        let payload = PayloadBuilder::new("g(bytes)")
            .uint(32)
            .uint(1_000)
            .build();
        let (_, args) = split_selector(&payload).unwrap();
        assert_eq!(args.bytes(0), Err(AbiError::Truncated { index: 0 }));
    }

    #[test]
    fn test_dirty_address_rejected() {
        let mut word = [0u8; 32];
        word[0] = 1;
        let payload = PayloadBuilder::new("approve(address,uint256)")
            .word(word)
            .uint(1)
            .build();
        let (_, args) = split_selector(&payload).unwrap();
        assert_eq!(args.address(0), Err(AbiError::DirtyHighBits { index: 0 }));
    }

    #[test]
    fn test_offset_out_of_bounds_rejected() {
        let payload = PayloadBuilder::new("f(address[])").uint(4096).build();
        let (_, args) = split_selector(&payload).unwrap();
        assert!(matches!(args.address_array(0), Err(AbiError::BadOffset { .. })));
    }

    #[test]
    fn test_short_payload() {
        assert_eq!(split_selector(&[1, 2]).err(), Some(AbiError::MissingSelector));
    }

    proptest! {
        #[test]
        fn arbitrary_payloads_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            if let Ok((_, args)) = split_selector(&bytes) {
                for i in 0..8 {
                    let _ = args.address(i);
                    let _ = args.uint(i);
                    let _ = args.address_array(i);
                    let _ = args.uint256_array(i);
                    let _ = args.bytes(i);
                }
            }
        }
    }
}
