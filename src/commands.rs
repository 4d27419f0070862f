use crate::utils::{CommandWriter, ToPayload};
//# Naming conventions follow the R502/R307 datasheets, which the AS608 and ZFM modules share.

/// Which of the module's two character buffers an operation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharBuffer {
    One,
    Two,
}

impl CharBuffer {
    pub fn id(self) -> u8 {
        match self {
            Self::One => 0x01,
            Self::Two => 0x02,
        }
    }
}

/// Commands one can send to the module. Names match the datasheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Captures an image of the fingerprint into the image buffer.
    GenImg,

    /// Processes the image buffer into a _character buffer_.
    Img2Tz {
        /// Which buffer to store the processed fingerprint data into.
        buffer: CharBuffer,
    },

    /// Compares character buffers 1 and 2.
    Match,

    /// Matches character buffer contents against a page range of the library.
    Search {
        buffer: CharBuffer,

        /// First page of the searched range.
        start_page: u16,

        /// Number of pages to search.
        page_count: u16,
    },

    /// Combines character buffers 1 and 2 into a template, written back to both.
    RegModel,

    /// Stores a character buffer into a library page.
    Store { buffer: CharBuffer, page: u16 },

    /// Loads the template at a library page into a character buffer.
    ///
    /// Doubles as the slot probe: an empty page and a page beyond the
    /// library answer with different confirmation codes.
    LoadChar { buffer: CharBuffer, page: u16 },

    /// Deletes `count` templates starting at `page`.
    DeletChar { page: u16, count: u16 },

    /// Deletes every template in the library.
    Empty,

    /// Writes one basic system parameter.
    SetSysPara {
        /// Parameter number: 4 = baud, 5 = security level, 6 = packet size.
        parameter: u8,
        value: u8,
    },

    /// Reads system status and basic configuration.
    ReadSysPara,

    /// Performs a handshake with the device to verify the password.
    /// The default password is 0x00000000.
    VfyPwd {
        /// The device password.
        password: u32,
    },

    /// Drives the aura LED ring on modules that have one.
    AuraLedConfig {
        /// 1 = breathing, 2 = flashing, 3 = on, 4 = off, 5 = fade in, 6 = fade out.
        control: u8,
        speed: u8,
        color: u8,
        /// Number of cycles for breathing/flashing, 0 = forever.
        cycles: u8,
    },
}

impl Command {
    /// Instruction code byte.
    pub fn instruction(&self) -> u8 {
        match self {
            Self::GenImg => 0x01,
            Self::Img2Tz { .. } => 0x02,
            Self::Match => 0x03,
            Self::Search { .. } => 0x04,
            Self::RegModel => 0x05,
            Self::Store { .. } => 0x06,
            Self::LoadChar { .. } => 0x07,
            Self::DeletChar { .. } => 0x0C,
            Self::Empty => 0x0D,
            Self::SetSysPara { .. } => 0x0E,
            Self::ReadSysPara => 0x0F,
            Self::VfyPwd { .. } => 0x13,
            Self::AuraLedConfig { .. } => 0x35,
        }
    }
}

impl ToPayload for Command {
    fn to_payload(&self, writer: &mut dyn CommandWriter) {
        writer.write_cmd_bytes(&[self.instruction()]);
        match self {
            Self::GenImg | Self::Match | Self::RegModel | Self::Empty | Self::ReadSysPara => {}

            // instr  | 0x02 [1]
            // bufid  | buffer [1]
            Self::Img2Tz { buffer } => {
                writer.write_cmd_bytes(&[buffer.id()]);
            }

            // instr  | 0x04 [1]
            // bufid  | buffer [1]
            // sstart | start_page [2]
            // pagnum | page_count [2]
            Self::Search {
                buffer,
                start_page,
                page_count,
            } => {
                writer.write_cmd_bytes(&[buffer.id()]);
                writer.write_cmd_bytes(&start_page.to_be_bytes()[..]);
                writer.write_cmd_bytes(&page_count.to_be_bytes()[..]);
            }

            // instr  | 0x06 / 0x07 [1]
            // bufid  | buffer [1]
            // pageid | page [2]
            Self::Store { buffer, page } | Self::LoadChar { buffer, page } => {
                writer.write_cmd_bytes(&[buffer.id()]);
                writer.write_cmd_bytes(&page.to_be_bytes()[..]);
            }

            // instr  | 0x0C [1]
            // pageid | page [2]
            // number | count [2]
            Self::DeletChar { page, count } => {
                writer.write_cmd_bytes(&page.to_be_bytes()[..]);
                writer.write_cmd_bytes(&count.to_be_bytes()[..]);
            }

            Self::SetSysPara { parameter, value } => {
                writer.write_cmd_bytes(&[*parameter, *value]);
            }

            // instr  | 0x13 [1]
            // passwd | password [4]
            Self::VfyPwd { password } => {
                writer.write_cmd_bytes(&password.to_be_bytes()[..]);
            }

            Self::AuraLedConfig {
                control,
                speed,
                color,
                cycles,
            } => {
                writer.write_cmd_bytes(&[*control, *speed, *color, *cycles]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Collect(Vec<u8>);

    impl CommandWriter for Collect {
        fn write_cmd_bytes(&mut self, bytes: &[u8]) {
            self.0.extend_from_slice(bytes);
        }
    }

    fn payload(cmd: Command) -> Vec<u8> {
        let mut writer = Collect(Vec::new());
        cmd.to_payload(&mut writer);
        writer.0
    }

    #[test]
    fn test_bare_instructions() {
        assert_eq!(payload(Command::GenImg), vec![0x01]);
        assert_eq!(payload(Command::RegModel), vec![0x05]);
        assert_eq!(payload(Command::Empty), vec![0x0D]);
        assert_eq!(payload(Command::ReadSysPara), vec![0x0F]);
    }

    #[test]
    fn test_search_payload() {
        let bytes = payload(Command::Search {
            buffer: CharBuffer::One,
            start_page: 0,
            page_count: 1000,
        });
        assert_eq!(bytes, vec![0x04, 0x01, 0x00, 0x00, 0x03, 0xE8]);
    }

    #[test]
    fn test_page_payloads() {
        assert_eq!(
            payload(Command::LoadChar {
                buffer: CharBuffer::Two,
                page: 0x0102
            }),
            vec![0x07, 0x02, 0x01, 0x02]
        );
        assert_eq!(
            payload(Command::DeletChar { page: 4, count: 1 }),
            vec![0x0C, 0x00, 0x04, 0x00, 0x01]
        );
    }

    #[test]
    fn test_password_payload() {
        assert_eq!(
            payload(Command::VfyPwd {
                password: 0x01020304
            }),
            vec![0x13, 0x01, 0x02, 0x03, 0x04]
        );
    }
}
