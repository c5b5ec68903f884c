
use std::mem;
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::config::{ConnectionConfig, check_timeout};
use crate::errors::{DsoError, Result};
use crate::vicp::{VicpClient, DEFAULT_PORT};

use super::{DsoConnection, decode_text};

pub struct VicpConnection {
    client: VicpClient,
    host: String,
    timeout_sec: f64,
    query_response_max_length: usize,
    insert_wait_opc: bool,
    // Bytes already received but not yet handed to a reader
    pending: Vec<u8>,
}

impl VicpConnection {

    pub fn new(host:&str) -> Result<Self> {
        Self::connect(host, DEFAULT_PORT)
    }

    pub fn connect(host:&str, port:u16) -> Result<Self> {
        let mut config = ConnectionConfig::new(host);
        config.port = port;
        Self::with_config(&config)
    }

    pub fn with_config(config:&ConnectionConfig) -> Result<Self> {
        config.validate()?;

        let mut client = VicpClient::new(&config.host, config.port);
        client.set_timeout(config.timeout()?);
        client.set_remote(config.remote);
        client.set_lockout(config.lockout);

        if !client.connect(config.connect_timeout()?) {
            return Err(DsoError::Connection(format!("connection failed, {}", config.host)));
        }

        // Start from a known state, the instrument may still hold output from an earlier session
        if !client.device_clear()? {
            return Err(DsoError::Connection(format!("device clear failed, {}", config.host)));
        }

        info!("connected to {}:{}", config.host, config.port);

        Ok(Self {
            client,
            host: config.host.clone(),
            timeout_sec: config.timeout_sec,
            query_response_max_length: config.query_response_max_length,
            insert_wait_opc: config.insert_wait_opc,
            pending: vec![],
        })
    }

    pub fn host(&self) -> &str { &self.host }
    pub fn is_connected(&self) -> bool { self.client.is_connected() }

    pub fn insert_wait_opc(&self) -> bool { self.insert_wait_opc }
    pub fn set_insert_wait_opc(&mut self, insert:bool) { self.insert_wait_opc = insert; }

    pub fn query_response_max_length(&self) -> usize { self.query_response_max_length }

    pub fn set_query_response_max_length(&mut self, max_bytes:usize) -> Result<()> {
        if max_bytes == 0 {
            return Err(DsoError::Parameters("query_response_max_length must be at least one byte".to_owned()));
        }
        self.query_response_max_length = max_bytes;
        Ok(())
    }

    pub fn serial_poll(&mut self) -> Result<Option<u8>> {
        self.pending.clear();
        Ok(self.client.serial_poll()?)
    }

    // Direct access to the framing layer, e.g. to toggle REMOTE/LOCKOUT
    pub fn transport(&mut self) -> &mut VicpClient { &mut self.client }

    fn send(&mut self, data:&[u8], eoi:bool) -> Result<bool> {
        if !self.client.is_connected() {
            return Err(DsoError::Connection(format!("not connected to {}", self.host)));
        }

        // A new command makes any unread remainder of the last response stale
        self.pending.clear();
        Ok(self.client.send_raw(data, eoi)?)
    }

    // One command and its complete response, without the *OPC? handshake
    fn exchange(&mut self, message:&str, query_delay:Option<Duration>) -> Result<String> {
        if !self.send(message.as_bytes(), true)? {
            return Err(DsoError::Io("Write to device failed".to_owned()));
        }

        if let Some(delay) = query_delay { thread::sleep(delay); }

        let reception = self.client.receive_message()?;
        if !reception.terminated {
            return Err(DsoError::Io(format!("No complete response to {:?} within {} s", message, self.timeout_sec)));
        }

        let mut data:Vec<u8> = reception.data;
        if data.len() > self.query_response_max_length {
            warn!("response to {:?} is {} bytes, keeping the rest for the next read", message, data.len());
            self.pending = data.split_off(self.query_response_max_length);
        }

        decode_text(&data)
    }

}

impl DsoConnection for VicpConnection {

    fn write(&mut self, message:&str) -> Result<bool> {
        let sent:bool = self.send(message.as_bytes(), true)?;
        if sent && self.insert_wait_opc { self.wait_opc()?; }
        Ok(sent)
    }

    fn read(&mut self, max_bytes:usize) -> Result<String> {
        let data:Vec<u8> = self.read_raw(max_bytes)?;
        decode_text(&data)
    }

    fn query(&mut self, message:&str, query_delay:Option<Duration>) -> Result<String> {
        let response:String = self.exchange(message, query_delay)?;
        if self.insert_wait_opc { self.wait_opc()?; }
        Ok(response)
    }

    fn write_raw(&mut self, data:&[u8], terminator:bool) -> Result<bool> {
        self.send(data, terminator)
    }

    fn read_raw(&mut self, max_bytes:usize) -> Result<Vec<u8>> {
        if max_bytes == 0 {
            return Err(DsoError::Parameters("max_bytes must be at least one byte".to_owned()));
        }

        if self.pending.is_empty() {
            let reception = self.client.receive_message()?;
            if !reception.terminated {
                if reception.data.is_empty() {
                    return Err(DsoError::Io(format!("No response within {} s", self.timeout_sec)));
                }
                warn!("response ended without EOI after {} bytes", reception.data.len());
            }
            self.pending = reception.data;
        }

        let n:usize = max_bytes.min(self.pending.len());
        let rest:Vec<u8> = self.pending.split_off(n);
        Ok(mem::replace(&mut self.pending, rest))
    }

    fn wait_opc(&mut self) -> Result<bool> {
        Ok(self.exchange("*OPC?", None)? == "1")
    }

    fn device_clear(&mut self) -> Result<()> {
        self.pending.clear();
        if self.client.device_clear()? { Ok(()) }
        else { Err(DsoError::Io("Device clear not sent".to_owned())) }
    }

    fn reconnect(&mut self) -> Result<()> {
        self.pending.clear();
        if self.client.connect(check_timeout("timeout", self.timeout_sec)?) { Ok(()) }
        else { Err(DsoError::Connection(format!("connection failed, {}", self.host))) }
    }

    fn disconnect(&mut self) {
        self.pending.clear();
        self.client.disconnect();
    }

    fn timeout(&self) -> f64 { self.timeout_sec }

    fn set_timeout(&mut self, seconds:f64) -> Result<()> {
        let timeout:Duration = check_timeout("Timeout", seconds)?;
        self.timeout_sec = seconds;
        self.client.set_timeout(timeout);
        Ok(())
    }

}
