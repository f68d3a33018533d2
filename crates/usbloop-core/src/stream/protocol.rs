//! Wire format shared with the DAC and ADC firmware
//!
//! ## DAC direction
//!
//! ```text
//! host -> DAC : [rate u32 LE]                       once, after the ADC is armed
//! DAC  -> host: 'S'                                 "send me the next packet"
//! host -> DAC : [512 bytes of LE i16 PCM]           one packet per 'S'
//! ...
//! host -> DAC : [remainder, 1..=511 bytes]          terminal short packet
//! DAC  -> host: 'E'                                 playback drained
//! ```
//!
//! ## ADC direction
//!
//! ```text
//! host -> ADC : [rate u32 LE]
//! ADC  -> host: '1'                                 capture timer started
//! ADC  -> host: [BE i16 samples, any chunk size]    until stopped
//! host -> ADC : 'e'                                 stop timer, reset
//! ```
//!
//! Control bytes travel on the same endpoint as payload. A read is assumed
//! to carry control-plane data whenever control data is expected; a read
//! that mixes a stray control byte with payload is not detected.

/// Unit of bulk transfer to the DAC, in bytes
pub const PACKET_SIZE: usize = 512;

/// Total size of the ADC firmware's double buffer, in bytes
pub const ADC_BUFFER_SIZE: usize = 81920;

/// Half of the ADC double buffer; the largest useful capture read
pub const ADC_HALF_BUFFER_SIZE: usize = ADC_BUFFER_SIZE / 2;

/// Length of the sample-rate word sent at session start
pub const SAMPLE_RATE_WORD_LEN: usize = 4;

/// Appended to playback data whose length is an exact packet multiple
pub const PADDING: [u8; 2] = [0, 0];

/// Single-byte control values multiplexed onto the bulk channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlByte {
    /// DAC requests the next packet
    Request = b'S',
    /// Ready acknowledgement
    Ready = b'R',
    /// Alternate ready acknowledgement (ADC capture timer started)
    ReadyAlt = b'1',
    /// DAC finished playing everything it was sent
    Complete = b'E',
    /// Host tells the ADC to stop its timer and reset
    Stop = b'e',
}

impl ControlByte {
    /// Interpret a raw byte as a control value
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'S' => Some(Self::Request),
            b'R' => Some(Self::Ready),
            b'1' => Some(Self::ReadyAlt),
            b'E' => Some(Self::Complete),
            b'e' => Some(Self::Stop),
            _ => None,
        }
    }

    /// Raw byte value
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Whether this is one of the ready acknowledgements
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready | Self::ReadyAlt)
    }
}

/// Encode the sample rate as the 4-byte little-endian word the firmware expects
pub fn encode_sample_rate(rate: u32) -> [u8; SAMPLE_RATE_WORD_LEN] {
    rate.to_le_bytes()
}

/// Decode a sample-rate word; `None` unless exactly 4 bytes are given
pub fn decode_sample_rate(bytes: &[u8]) -> Option<u32> {
    let word: [u8; SAMPLE_RATE_WORD_LEN] = bytes.try_into().ok()?;
    Some(u32::from_le_bytes(word))
}

/// Make sure playback data never ends on a packet boundary
///
/// The DAC firmware recognises the end of a stream by a short packet. If the
/// data is an exact multiple of [`PACKET_SIZE`] (including empty) two zero
/// bytes are appended so the final packet is short but never empty.
pub fn pad_for_transfer(mut data: Vec<u8>) -> Vec<u8> {
    if data.len() % PACKET_SIZE == 0 {
        data.extend_from_slice(&PADDING);
    }
    data
}

/// Walks padded playback data one packet at a time
#[derive(Debug, Clone)]
pub struct PacketCursor {
    data: Vec<u8>,
    position: usize,
}

impl PacketCursor {
    /// Pad `data` and start at its beginning
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: pad_for_transfer(data),
            position: 0,
        }
    }

    /// Total bytes that will be sent, padding included
    pub fn total_len(&self) -> usize {
        self.data.len()
    }

    /// Bytes not yet handed out
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Whether the terminal packet has been handed out
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Next packet and whether it is the terminal one
    ///
    /// While more than one packet's worth remains, a full packet is returned;
    /// otherwise the whole remainder is returned and marked terminal.
    pub fn next_packet(&mut self) -> Option<(&[u8], bool)> {
        let remaining = self.remaining();
        if remaining == 0 {
            return None;
        }
        let start = self.position;
        if remaining > PACKET_SIZE {
            self.position += PACKET_SIZE;
            Some((&self.data[start..self.position], false))
        } else {
            self.position = self.data.len();
            Some((&self.data[start..], true))
        }
    }
}

/// Parse big-endian signed 16-bit samples
///
/// An odd trailing byte is stored in `carry` and prefixed to the next call,
/// so sample alignment survives reads that split a sample.
pub fn decode_be_samples(bytes: &[u8], carry: &mut Option<u8>) -> Vec<i16> {
    let mut samples = Vec::with_capacity(bytes.len().div_ceil(2));
    let mut rest = bytes;

    if let Some(high) = carry.take() {
        match rest.split_first() {
            Some((&low, tail)) => {
                samples.push(i16::from_be_bytes([high, low]));
                rest = tail;
            }
            None => {
                *carry = Some(high);
                return samples;
            }
        }
    }

    let mut pairs = rest.chunks_exact(2);
    samples.extend(pairs.by_ref().map(|p| i16::from_be_bytes([p[0], p[1]])));
    if let [odd] = pairs.remainder() {
        *carry = Some(*odd);
    }
    samples
}
