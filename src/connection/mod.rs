
use std::str;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::{Captures, Match, Regex};
use serde::{Serialize, Deserialize};

use crate::errors::{DsoError, Result};

lazy_static! {
    // The instrument may prefix the reply with the command header depending on CHDR
    static ref IDN_RE: Regex = Regex::new("^(?:\\*IDN\\s+)?([^,]+),([^,]+),([^,]+),([^,\\s]+)").unwrap();
}

pub mod vicp;

pub use self::vicp::VicpConnection;

// What an oscilloscope model needs from the link to the instrument.  A `false` from the write
// operations means the instrument never got the bytes; nothing was partially sent.
pub trait DsoConnection {

    fn write(&mut self, message:&str) -> Result<bool>;
    fn read(&mut self, max_bytes:usize) -> Result<String>;
    fn query(&mut self, message:&str, query_delay:Option<Duration>) -> Result<String>;

    fn write_raw(&mut self, data:&[u8], terminator:bool) -> Result<bool>;
    fn read_raw(&mut self, max_bytes:usize) -> Result<Vec<u8>>;

    fn wait_opc(&mut self) -> Result<bool>;
    fn device_clear(&mut self) -> Result<()>;

    fn reconnect(&mut self) -> Result<()>;
    fn disconnect(&mut self);

    // Seconds
    fn timeout(&self) -> f64;
    fn set_timeout(&mut self, seconds:f64) -> Result<()>;

    fn write_vbs(&mut self, message:&str) -> Result<bool> {
        self.write(&format!("vbs '{}'", message))
    }

    fn query_vbs(&mut self, message:&str, query_delay:Option<Duration>) -> Result<String> {
        self.query(&format!("vbs? 'Return = {}'", message), query_delay)
    }

    fn identify(&mut self) -> Result<Identity> {
        let response:String = self.query("*IDN?", None)?;
        Identity::parse(&response)
    }

}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub firmware_version: String,
}

fn match_str(opt_match:Option<Match>, err:&str) -> Result<String> {
    match opt_match {
        Some(m) => Ok(m.as_str().trim().to_owned()),
        None    => Err(DsoError::Io(err.to_owned()))
    }
}

impl Identity {

    pub fn parse(response:&str) -> Result<Self> {
        let caps:Captures = IDN_RE.captures(response.trim())
            .ok_or_else(|| DsoError::Io(format!("Unrecognized *IDN? response: {:?}", response)))?;

        Ok(Self {
            manufacturer:     match_str(caps.get(1), "No match for manufacturer")?,
            model:            match_str(caps.get(2), "No match for model")?,
            serial_number:    match_str(caps.get(3), "No match for serial number")?,
            firmware_version: match_str(caps.get(4), "No match for firmware version")?,
        })
    }

}

// Responses come back with line terminators and sometimes stray control characters at either end
pub fn trim_response(response:&str) -> &str {
    response.trim_matches(|c:char| c.is_whitespace() || c.is_control())
}

pub fn decode_text(data:&[u8]) -> Result<String> {
    str::from_utf8(data)
        .map(|s| trim_response(s).to_owned())
        .map_err(|_| DsoError::Io("Unable to parse response as UTF-8".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_from_plain_reply() {
        let id = Identity::parse("LECROY,WAVERUNNER9254M,LCRY3702N14729,9.2.0\n").unwrap();
        assert_eq!(id.manufacturer, "LECROY");
        assert_eq!(id.model, "WAVERUNNER9254M");
        assert_eq!(id.serial_number, "LCRY3702N14729");
        assert_eq!(id.firmware_version, "9.2.0");
    }

    #[test]
    fn identity_with_command_header() {
        let id = Identity::parse("*IDN LECROY,HDO6104A,LCRY0000X00000,9.4.0").unwrap();
        assert_eq!(id.manufacturer, "LECROY");
        assert_eq!(id.model, "HDO6104A");
    }

    #[test]
    fn identity_rejects_garbage() {
        assert!(matches!(Identity::parse("WARNING : CURRENT REMOTE CONTROL INTERFACE IS TCPIP"), Err(DsoError::Io(_))));
    }

    #[test]
    fn trims_terminators_and_controls() {
        assert_eq!(trim_response(" C1:VDIV 10E-3 V\r\n"), "C1:VDIV 10E-3 V");
        assert_eq!(trim_response("1\n\u{0}"), "1");
        assert_eq!(trim_response("\t\r\n"), "");
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        assert_eq!(decode_text(b"ok\n").unwrap(), "ok");
        assert!(matches!(decode_text(&[0xff, 0xfe]), Err(DsoError::Io(_))));
    }
}
