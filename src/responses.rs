use byteorder::{BigEndian, ByteOrder};

use crate::commands::Command;
use crate::utils::FromPayload;

/// Replies returned by the module. Which variant arrives depends on the command sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Plain acknowledgement carrying only a confirmation code.
    Ack(AckResult),

    /// Status register and basic configuration.
    ReadSysPara(ReadSysParaResult),

    Search(SearchResult),

    Match(MatchResult),
}

impl Reply {
    /// Decode the payload of an acknowledge packet sent in reply to `cmd`.
    ///
    /// `payload` starts at the confirmation code and excludes the checksum.
    /// Short payloads (some firmwares truncate failed replies) decode with
    /// zeroed data fields.
    pub fn decode(cmd: &Command, address: u32, payload: &[u8], checksum: u16) -> Self {
        let confirmation_code = payload.first().copied().unwrap_or(0xFF);
        let data = payload.get(1..).unwrap_or(&[]);

        match cmd {
            Command::ReadSysPara => Self::ReadSysPara(ReadSysParaResult {
                address,
                confirmation_code,
                system_parameters: SystemParameters::from_payload(data),
                checksum,
            }),
            Command::Search { .. } => Self::Search(SearchResult {
                address,
                confirmation_code,
                page: read_u16_or_zero(data, 0),
                match_score: read_u16_or_zero(data, 2),
                checksum,
            }),
            Command::Match => Self::Match(MatchResult {
                address,
                confirmation_code,
                match_score: read_u16_or_zero(data, 0),
                checksum,
            }),
            _ => Self::Ack(AckResult {
                address,
                confirmation_code,
                checksum,
            }),
        }
    }

    /// The confirmation code, whatever the reply kind.
    pub fn confirmation_code(&self) -> u8 {
        match self {
            Self::Ack(result) => result.confirmation_code,
            Self::ReadSysPara(result) => result.confirmation_code,
            Self::Search(result) => result.confirmation_code,
            Self::Match(result) => result.confirmation_code,
        }
    }
}

fn read_u16_or_zero(data: &[u8], offset: usize) -> u16 {
    data.get(offset..offset + 2)
        .map(BigEndian::read_u16)
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckResult {
    pub address: u32,
    pub confirmation_code: u8,
    pub checksum: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadSysParaResult {
    pub address: u32,
    pub confirmation_code: u8,
    pub system_parameters: SystemParameters,
    pub checksum: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub address: u32,
    pub confirmation_code: u8,
    /// Library page of the best match (0-based).
    pub page: u16,
    pub match_score: u16,
    pub checksum: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub address: u32,
    pub confirmation_code: u8,
    pub match_score: u16,
    pub checksum: u16,
}

/// The 16-byte parameter block of a `ReadSysPara` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemParameters {
    /// Raw status bits; see the accessor methods.
    pub status_register: u16,

    /// Always 0x0009 on genuine modules.
    pub system_identifier_code: u16,

    /// Finger library size. Clones frequently misreport this.
    pub finger_library_size: u16,

    /// Matching threshold, 1 to 5.
    pub security_level: u16,

    pub device_address: u32,

    /// Data packet size code: 32 bytes shifted left by the code (0 to 3).
    pub packet_size: u16,

    /// Baud rate in units of 9600; see [`baud_rate`](Self::baud_rate).
    pub baud_setting: u16,
}

impl SystemParameters {
    /// Size of the parameter block in a `ReadSysPara` reply.
    pub const LEN: usize = 16;

    /// A command is still executing.
    pub fn busy(&self) -> bool {
        self.status_register & (1u16 << 0) != 0
    }

    /// Last comparison passed. The reply to the comparison itself is
    /// authoritative.
    pub fn has_finger_match(&self) -> bool {
        self.status_register & (1u16 << 1) != 0
    }

    /// The handshake password was accepted.
    pub fn password_ok(&self) -> bool {
        self.status_register & (1u16 << 2) != 0
    }

    /// The image buffer holds a usable capture.
    pub fn has_valid_image(&self) -> bool {
        self.status_register & (1u16 << 3) != 0
    }

    pub fn baud_rate(&self) -> u32 {
        u32::from(self.baud_setting) * 9600
    }
}

impl FromPayload for SystemParameters {
    fn from_payload(payload: &[u8]) -> Self {
        if payload.len() < Self::LEN {
            return Self::default();
        }
        // The datasheet mixes bytes and 16-bit words when giving sizes; these are bytes.
        SystemParameters {
            status_register: BigEndian::read_u16(&payload[0..2]),
            system_identifier_code: BigEndian::read_u16(&payload[2..4]),
            finger_library_size: BigEndian::read_u16(&payload[4..6]),
            security_level: BigEndian::read_u16(&payload[6..8]),
            device_address: BigEndian::read_u32(&payload[8..12]),
            packet_size: BigEndian::read_u16(&payload[12..14]),
            baud_setting: BigEndian::read_u16(&payload[14..16]),
        }
    }
}
