use arrayvec::ArrayVec;
use byteorder::{BigEndian, ByteOrder};
use embedded_hal::serial::{Read, Write};
use nb::block;
use tracing::trace;

use crate::commands::{CharBuffer, Command};
use crate::error::{Error, Result};
use crate::responses::{Reply, SystemParameters};
use crate::transport::{LedState, MatchScore, SearchHit, Transport};
use crate::utils::{checksum, CommandWriter, ToPayload};

/// Address every module answers to until it is reprogrammed.
pub const DEFAULT_ADDRESS: u32 = 0xFFFF_FFFF;

const START_CODE: u16 = 0xEF01;
const PID_COMMAND: u8 = 0x01;
const PID_ACK: u8 = 0x07;
// headr [2] | addr [4] | ident [1] | length [2]
const HEADER_LEN: usize = 9;
const LENGTH_OFFSET: usize = 7;

// Confirmation code the module uses for pages beyond its library.
const CODE_BEYOND_LIBRARY: u8 = 0x0B;

const SECURITY_LEVEL_PARAMETER: u8 = 5;

const LED_BREATHING: u8 = 0x01;
const LED_ON: u8 = 0x03;
const LED_OFF: u8 = 0x04;

/// A Synochip-protocol module (R502, R307, AS608, ZFM-20/60) connected to a U(S)ART.
#[derive(Debug)]
pub struct R502<TX, RX> {
    tx: TX,
    rx: RX,
    address: u32,
    password: u32,
    received: ArrayVec<[u8; 64]>,
    cmd_buffer: ArrayVec<[u8; 32]>,
}

impl<TX, RX> R502<TX, RX>
where
    TX: Write<u8>,
    RX: Read<u8>,
{
    pub fn new(tx: TX, rx: RX, address: u32) -> Self {
        Self {
            tx,
            rx,
            address,
            password: 0,
            received: ArrayVec::new(),
            cmd_buffer: ArrayVec::new(),
        }
    }

    /// Use `password` in the handshake instead of the factory default of zero.
    pub fn with_password(mut self, password: u32) -> Self {
        self.password = password;
        self
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    /// Give the serial halves back.
    pub fn release(self) -> (TX, RX) {
        (self.tx, self.rx)
    }

    /// Sends a command to the module and then blocks waiting for the reply.
    pub fn send_command(&mut self, cmd: Command) -> Result<Reply> {
        self.prepare_cmd(&cmd)?;
        trace!(instruction = cmd.instruction(), bytes = self.cmd_buffer.len(), "sending command");

        for byte in self.cmd_buffer.iter() {
            block!(self.tx.write(*byte)).map_err(|_| Error::serial("writing command"))?;
        }
        block!(self.tx.flush()).map_err(|_| Error::serial("flushing command"))?;

        self.read_reply(&cmd)
    }

    fn prepare_cmd(&mut self, cmd: &Command) -> Result<()> {
        // Required packet:
        // headr  | 0xEF 0x01 [2]
        // addr   | address [4]
        // ident  | 0x01 [1]
        // length | payload + 2 [2]
        // instr  | instruction [1]
        // params | (params) [n]
        // chksum | checksum [2]
        self.cmd_buffer.clear();
        let mut writer = FrameWriter {
            buffer: &mut self.cmd_buffer,
            overflow: false,
        };
        writer.write_cmd_bytes(&START_CODE.to_be_bytes()[..]);
        writer.write_cmd_bytes(&self.address.to_be_bytes()[..]);
        writer.write_cmd_bytes(&[PID_COMMAND, 0x00, 0x00]);
        cmd.to_payload(&mut writer);
        if writer.overflow {
            return Err(Error::FrameOverflow {
                len: self.cmd_buffer.len(),
            });
        }

        let length = (self.cmd_buffer.len() - HEADER_LEN + 2) as u16;
        BigEndian::write_u16(
            &mut self.cmd_buffer[LENGTH_OFFSET..HEADER_LEN],
            length,
        );
        let chk = checksum(&self.cmd_buffer[6..]);
        self.cmd_buffer
            .try_extend_from_slice(&chk.to_be_bytes()[..])
            .map_err(|_| Error::FrameOverflow {
                len: HEADER_LEN + length as usize,
            })
    }

    fn read_reply(&mut self, cmd: &Command) -> Result<Reply> {
        self.received.clear();
        self.receive(HEADER_LEN)?;

        let start = BigEndian::read_u16(&self.received[0..2]);
        if start != START_CODE {
            return Err(Error::BadHeader(start));
        }
        let address = BigEndian::read_u32(&self.received[2..6]);
        let pid = self.received[6];
        if pid != PID_ACK {
            return Err(Error::UnexpectedPacket(pid));
        }
        let length = BigEndian::read_u16(&self.received[LENGTH_OFFSET..HEADER_LEN]);
        if length < 2 {
            return Err(Error::ShortFrame { len: length });
        }
        let total = HEADER_LEN + length as usize;
        if total > self.received.capacity() {
            return Err(Error::FrameOverflow { len: total });
        }

        self.receive(length as usize)?;

        let body_end = total - 2;
        let expected = checksum(&self.received[6..body_end]);
        let actual = BigEndian::read_u16(&self.received[body_end..total]);
        if expected != actual {
            return Err(Error::Checksum { expected, actual });
        }
        trace!(pid, length, "received reply");

        Ok(Reply::decode(
            cmd,
            address,
            &self.received[HEADER_LEN..body_end],
            actual,
        ))
    }

    fn receive(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            let byte = block!(self.rx.read()).map_err(|_| Error::serial("reading reply"))?;
            self.received.try_push(byte).map_err(|_| Error::FrameOverflow {
                len: self.received.len() + 1,
            })?;
        }
        Ok(())
    }

    fn exchange(&mut self, cmd: Command) -> Result<u8> {
        Ok(self.send_command(cmd)?.confirmation_code())
    }
}

struct FrameWriter<'a> {
    buffer: &'a mut ArrayVec<[u8; 32]>,
    overflow: bool,
}

impl CommandWriter for FrameWriter<'_> {
    fn write_cmd_bytes(&mut self, bytes: &[u8]) {
        if self.buffer.try_extend_from_slice(bytes).is_err() {
            self.overflow = true;
        }
    }
}

/// Library page of a 1-based slot id. Id 0 has no page.
fn page_of(id: u16) -> Option<u16> {
    id.checked_sub(1)
}

impl<TX, RX> Transport for R502<TX, RX>
where
    TX: Write<u8>,
    RX: Read<u8>,
{
    fn verify_credential(&mut self) -> Result<u8> {
        let password = self.password;
        self.exchange(Command::VfyPwd { password })
    }

    fn capture_image(&mut self) -> Result<u8> {
        self.exchange(Command::GenImg)
    }

    fn extract_features(&mut self, buffer: CharBuffer) -> Result<u8> {
        self.exchange(Command::Img2Tz { buffer })
    }

    fn commit_template(&mut self) -> Result<u8> {
        self.exchange(Command::RegModel)
    }

    fn store_template(&mut self, id: u16) -> Result<u8> {
        match page_of(id) {
            Some(page) => self.exchange(Command::Store {
                buffer: CharBuffer::One,
                page,
            }),
            None => Ok(CODE_BEYOND_LIBRARY),
        }
    }

    fn delete_template(&mut self, id: u16) -> Result<u8> {
        match page_of(id) {
            Some(page) => self.exchange(Command::DeletChar { page, count: 1 }),
            None => Ok(CODE_BEYOND_LIBRARY),
        }
    }

    fn empty_library(&mut self) -> Result<u8> {
        self.exchange(Command::Empty)
    }

    fn query_template_at(&mut self, id: u16) -> Result<u8> {
        match page_of(id) {
            Some(page) => self.exchange(Command::LoadChar {
                buffer: CharBuffer::One,
                page,
            }),
            None => Ok(CODE_BEYOND_LIBRARY),
        }
    }

    fn search_best(&mut self, capacity: u16) -> Result<SearchHit> {
        let reply = self.send_command(Command::Search {
            buffer: CharBuffer::One,
            start_page: 0,
            page_count: capacity,
        })?;
        Ok(match reply {
            Reply::Search(result) => SearchHit {
                code: result.confirmation_code,
                slot: result.page.saturating_add(1),
                confidence: result.match_score,
            },
            other => SearchHit {
                code: other.confirmation_code(),
                slot: 0,
                confidence: 0,
            },
        })
    }

    fn search_against(&mut self, id: u16) -> Result<MatchScore> {
        let page = match page_of(id) {
            Some(page) => page,
            None => {
                return Ok(MatchScore {
                    code: CODE_BEYOND_LIBRARY,
                    confidence: 0,
                })
            }
        };

        let code = self.exchange(Command::LoadChar {
            buffer: CharBuffer::Two,
            page,
        })?;
        if code != 0x00 {
            return Ok(MatchScore {
                code,
                confidence: 0,
            });
        }

        let reply = self.send_command(Command::Match)?;
        Ok(match reply {
            Reply::Match(result) => MatchScore {
                code: result.confirmation_code,
                confidence: result.match_score,
            },
            other => MatchScore {
                code: other.confirmation_code(),
                confidence: 0,
            },
        })
    }

    fn set_indicator(&mut self, led: LedState) -> Result<u8> {
        let control = if !led.on {
            LED_OFF
        } else if led.speed == 0 {
            LED_ON
        } else {
            LED_BREATHING
        };
        self.exchange(Command::AuraLedConfig {
            control,
            speed: led.speed,
            color: led.color as u8,
            cycles: 0,
        })
    }

    fn set_security_tier(&mut self, level: u8) -> Result<u8> {
        self.exchange(Command::SetSysPara {
            parameter: SECURITY_LEVEL_PARAMETER,
            value: level,
        })
    }

    fn read_parameters(&mut self) -> Result<SystemParameters> {
        match self.send_command(Command::ReadSysPara)? {
            Reply::ReadSysPara(result) if result.confirmation_code == 0x00 => {
                Ok(result.system_parameters)
            }
            _ => Ok(SystemParameters::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::transport::LedColor;

    #[derive(Debug, Default)]
    struct TestTx {
        written: Vec<u8>,
        broken: bool,
    }

    impl Write<u8> for TestTx {
        type Error = ();

        fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
            if self.broken {
                return Err(nb::Error::Other(()));
            }
            self.written.push(word);
            Ok(())
        }

        fn flush(&mut self) -> nb::Result<(), Self::Error> {
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct TestRx {
        pending: VecDeque<u8>,
    }

    impl Read<u8> for TestRx {
        type Error = ();

        fn read(&mut self) -> nb::Result<u8, Self::Error> {
            self.pending.pop_front().ok_or(nb::Error::Other(()))
        }
    }

    /// Build an acknowledge frame around `payload`.
    fn ack(payload: &[u8]) -> Vec<u8> {
        let length = (payload.len() + 2) as u16;
        let mut frame = vec![0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, PID_ACK];
        frame.extend_from_slice(&length.to_be_bytes());
        frame.extend_from_slice(payload);
        let chk = checksum(&frame[6..]);
        frame.extend_from_slice(&chk.to_be_bytes());
        frame
    }

    fn driver(replies: &[Vec<u8>]) -> R502<TestTx, TestRx> {
        let rx = TestRx {
            pending: replies.iter().flatten().copied().collect(),
        };
        R502::new(TestTx::default(), rx, DEFAULT_ADDRESS)
    }

    fn written(driver: R502<TestTx, TestRx>) -> Vec<u8> {
        driver.release().0.written
    }

    #[test]
    fn test_handshake_frame() {
        let mut r502 = driver(&[vec![
            0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x00, 0x03, 0x00, 0x00, 0x0A,
        ]]);

        assert_eq!(r502.verify_credential(), Ok(0x00));
        assert_eq!(
            written(r502),
            vec![
                0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x07, 0x13, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x1B
            ]
        );
    }

    #[test]
    fn test_password_goes_into_handshake() {
        let mut r502 = driver(&[ack(&[0x13])]).with_password(0x0000_0001);
        assert_eq!(r502.verify_credential(), Ok(0x13));
        let bytes = written(r502);
        assert_eq!(&bytes[9..14], &[0x13, 0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_slot_ids_map_to_pages() {
        let mut r502 = driver(&[ack(&[0x0C])]);
        assert_eq!(r502.query_template_at(5), Ok(0x0C));
        let bytes = written(r502);
        // LoadChar, buffer 1, page 4
        assert_eq!(&bytes[9..13], &[0x07, 0x01, 0x00, 0x04]);
    }

    #[test]
    fn test_slot_zero_never_reaches_the_wire() {
        let mut r502 = driver(&[]);
        assert_eq!(r502.query_template_at(0), Ok(CODE_BEYOND_LIBRARY));
        assert_eq!(r502.delete_template(0), Ok(CODE_BEYOND_LIBRARY));
        assert!(written(r502).is_empty());
    }

    #[test]
    fn test_search_reply_reports_one_based_slot() {
        let mut r502 = driver(&[ack(&[0x00, 0x00, 0x04, 0x00, 0x64])]);
        let hit = r502.search_best(162).unwrap();
        assert_eq!(
            hit,
            SearchHit {
                code: 0x00,
                slot: 5,
                confidence: 100
            }
        );
        let bytes = written(r502);
        assert_eq!(&bytes[9..15], &[0x04, 0x01, 0x00, 0x00, 0x00, 0xA2]);
    }

    #[test]
    fn test_search_against_skips_match_when_slot_is_empty() {
        let mut r502 = driver(&[ack(&[0x0C])]);
        let score = r502.search_against(3).unwrap();
        assert_eq!(score.code, 0x0C);
        // Only the LoadChar frame went out.
        assert_eq!(written(r502).len(), 15);
    }

    #[test]
    fn test_search_against_matches_loaded_template() {
        let mut r502 = driver(&[ack(&[0x00]), ack(&[0x00, 0x00, 0x50])]);
        let score = r502.search_against(3).unwrap();
        assert_eq!(
            score,
            MatchScore {
                code: 0x00,
                confidence: 80
            }
        );
    }

    #[test]
    fn test_led_control_codes() {
        let mut r502 = driver(&[ack(&[0x00]), ack(&[0x00]), ack(&[0x00])]);
        r502.set_indicator(LedState::on(LedColor::Purple)).unwrap();
        r502.set_indicator(LedState::on(LedColor::Blue).with_speed(0x40))
            .unwrap();
        r502.set_indicator(LedState::off()).unwrap();

        let bytes = written(r502);
        let frames: Vec<&[u8]> = bytes.chunks(16).collect();
        assert_eq!(&frames[0][9..14], &[0x35, LED_ON, 0x00, 0x03, 0x00]);
        assert_eq!(&frames[1][9..14], &[0x35, LED_BREATHING, 0x40, 0x02, 0x00]);
        assert_eq!(frames[2][10], LED_OFF);
    }

    #[test]
    fn test_read_parameters() {
        let mut payload = vec![0x00];
        payload.extend_from_slice(&[
            0x00, 0x00, 0x00, 0x09, 0x00, 0xA2, 0x00, 0x03, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x02,
            0x00, 0x06,
        ]);
        let mut r502 = driver(&[ack(&payload)]);
        let params = r502.read_parameters().unwrap();
        assert_eq!(params.finger_library_size, 162);
        assert_eq!(params.baud_rate(), 57600);
    }

    #[test]
    fn test_failed_parameter_read_is_default() {
        let mut r502 = driver(&[ack(&[0x01])]);
        assert_eq!(r502.read_parameters(), Ok(SystemParameters::default()));
    }

    #[test]
    fn test_bad_start_code() {
        let mut reply = ack(&[0x00]);
        reply[0] = 0xAA;
        let mut r502 = driver(&[reply]);
        assert_eq!(r502.capture_image(), Err(Error::BadHeader(0xAA01)));
    }

    #[test]
    fn test_unexpected_packet_identifier() {
        let mut reply = ack(&[0x00]);
        reply[6] = 0x02;
        let mut r502 = driver(&[reply]);
        assert_eq!(r502.capture_image(), Err(Error::UnexpectedPacket(0x02)));
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut reply = ack(&[0x00]);
        let last = reply.len() - 1;
        reply[last] ^= 0xFF;
        let mut r502 = driver(&[reply]);
        assert!(matches!(
            r502.capture_image(),
            Err(Error::Checksum { .. })
        ));
    }

    #[test]
    fn test_oversized_reply_is_rejected() {
        let reply = vec![0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x01, 0x00];
        let mut r502 = driver(&[reply]);
        assert_eq!(
            r502.capture_image(),
            Err(Error::FrameOverflow {
                len: HEADER_LEN + 0x100
            })
        );
    }

    #[test]
    fn test_silent_module_is_a_serial_error() {
        let mut r502 = driver(&[]);
        let error = r502.capture_image().unwrap_err();
        assert_eq!(error, Error::serial("reading reply"));
        assert!(error.is_fatal());
    }

    #[test]
    fn test_broken_tx_is_a_serial_error() {
        let mut r502 = driver(&[ack(&[0x00])]);
        r502.tx.broken = true;
        assert_eq!(r502.capture_image(), Err(Error::serial("writing command")));
    }
}
