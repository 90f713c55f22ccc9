use crate::types::AxisReading;
use thiserror::Error;

/// AD type for manufacturer-specific data.
pub const AD_MANUFACTURER_DATA: u8 = 0xff;

/// Company id 0x0077 followed by tilt protocol id 0x00c9, both little-endian.
pub const TILT_RECORD_HEADER: [u8; 4] = [0x77, 0x00, 0xc9, 0x00];

/// Header (4) + accelerometer x/y/z as lo/hi pairs (6).
const AXES_END: usize = TILT_RECORD_HEADER.len() + 6;
/// Counter byte + flags byte.
const STATUS_END: usize = AXES_END + 2;
/// Raw temperature word.
const TEMPERATURE_END: usize = STATUS_END + 2;

const FLAG_BATTERY_LOW: u8 = 0x01;
const FLAG_MAGNET: u8 = 0x02;
const FLAG_BUTTON: u8 = 0x04;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("AD structure at offset {offset} overruns the advertisement")]
    Truncated { offset: usize },
    #[error("No tilt sensor record in advertisement")]
    NoTiltRecord,
    #[error("Tilt record too short: {len} bytes")]
    RecordTooShort { len: usize },
}

/// One length-type-value structure from an advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdStructure<'a> {
    pub ad_type: u8,
    pub data: &'a [u8],
}

/// Split raw advertisement bytes into AD structures.
///
/// A zero length byte ends the significant part of the advertisement.
pub fn parse_ad_structures(bytes: &[u8]) -> Result<Vec<AdStructure<'_>>, ProtocolError> {
    let mut structures = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let len = bytes[offset] as usize;
        if len == 0 {
            break;
        }
        let end = offset + 1 + len;
        if end > bytes.len() {
            return Err(ProtocolError::Truncated { offset });
        }
        structures.push(AdStructure {
            ad_type: bytes[offset + 1],
            data: &bytes[offset + 2..end],
        });
        offset = end;
    }

    Ok(structures)
}

/// Status bits reported alongside each reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFlags(pub u8);

impl SensorFlags {
    pub fn battery_low(self) -> bool {
        self.0 & FLAG_BATTERY_LOW != 0
    }

    pub fn magnet_present(self) -> bool {
        self.0 & FLAG_MAGNET != 0
    }

    pub fn button_pressed(self) -> bool {
        self.0 & FLAG_BUTTON != 0
    }
}

/// Decoded tilt sensor advertisement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiltAdvertisement {
    pub reading: AxisReading,
    /// Rolling counter, incremented by the sensor on every report.
    pub counter: Option<u8>,
    pub flags: Option<SensorFlags>,
    /// Raw 16-bit temperature word as measured by the sensor.
    pub raw_temperature: Option<u16>,
}

impl TiltAdvertisement {
    /// Find and decode the tilt record in a raw advertisement.
    pub fn decode(advertisement: &[u8]) -> Result<Self, ProtocolError> {
        let record = parse_ad_structures(advertisement)?
            .into_iter()
            .find(|s| s.ad_type == AD_MANUFACTURER_DATA && s.data.starts_with(&TILT_RECORD_HEADER))
            .ok_or(ProtocolError::NoTiltRecord)?;
        Self::decode_record(record.data)
    }

    /// Decode the manufacturer data of a tilt record, header included.
    pub fn decode_record(record: &[u8]) -> Result<Self, ProtocolError> {
        if !record.starts_with(&TILT_RECORD_HEADER) {
            return Err(ProtocolError::NoTiltRecord);
        }
        if record.len() < AXES_END {
            return Err(ProtocolError::RecordTooShort { len: record.len() });
        }

        // The accelerometer left-justifies its output, so each axis's high
        // byte alone is the 8-bit two's-complement reading.
        let axis = |hi: usize| record[hi] as i8;
        let reading = AxisReading {
            x: axis(5),
            y: axis(7),
            z: axis(9),
        };

        let (counter, flags) = if record.len() >= STATUS_END {
            (Some(record[AXES_END]), Some(SensorFlags(record[AXES_END + 1])))
        } else {
            (None, None)
        };

        let raw_temperature = (record.len() >= TEMPERATURE_END)
            .then(|| u16::from_be_bytes([record[STATUS_END], record[STATUS_END + 1]]));

        Ok(Self {
            reading,
            counter,
            flags,
            raw_temperature,
        })
    }

    /// Temperature in degrees Celsius, if the record carried one.
    pub fn temperature_celsius(&self) -> Option<f64> {
        self.raw_temperature
            .map(|raw| 175.72 * f64::from(raw) / 65536.0 - 46.85)
    }
}
