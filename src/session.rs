//! Session registry: one entry per (sender, SSRC) stream being received.
//!
//! Sessions are keyed by SSRC. A packet whose SSRC is known but arrives
//! from a different sender address or port means the sender restarted;
//! the old session is closed and a fresh one created. New SSRCs beyond the
//! registry capacity are rejected, never evicting an existing stream.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::net::SocketAddr;

use crate::error::{Error, Result};
use crate::rtp::{RtpHeader, SequenceState};

/// One live demultiplexing context
#[derive(Debug, Clone)]
pub struct Session {
    pub ssrc: u32,
    /// Payload type of the most recent packet
    pub payload_type: u8,
    pub sender: SocketAddr,
    /// Printable sender host
    pub host: String,
    /// Printable sender port
    pub port: String,
    pub state: SequenceState,
}

impl Session {
    fn new(sender: SocketAddr, header: &RtpHeader) -> Self {
        Self {
            ssrc: header.ssrc,
            payload_type: header.payload_type,
            sender,
            host: sender.ip().to_string(),
            port: sender.port().to_string(),
            state: SequenceState::new(header.ssrc, header.sequence, header.timestamp),
        }
    }

    /// Same sender address and port
    pub fn is_from(&self, sender: &SocketAddr) -> bool {
        self.sender.ip() == sender.ip() && self.sender.port() == sender.port()
    }
}

/// How a packet was matched to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Packet belongs to a tracked session
    Existing,
    /// A session was created for it
    New,
    /// The SSRC moved to another sender; its session was recreated
    Restarted,
}

/// Bounded store of active sessions
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<u32, Session>,
    capacity: usize,
}

impl SessionRegistry {
    /// Create a registry holding at most `capacity` sessions (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            sessions: HashMap::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Find the session for exactly this sender and SSRC
    pub fn lookup(&mut self, sender: &SocketAddr, ssrc: u32) -> Option<&mut Session> {
        self.sessions.get_mut(&ssrc).filter(|s| s.is_from(sender))
    }

    /// Shared lookup by SSRC alone
    pub fn get(&self, ssrc: u32) -> Option<&Session> {
        self.sessions.get(&ssrc)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Create a session for the packet, replacing any session with the same
    /// SSRC. Counters start at zero and the position at the packet, so the
    /// packet itself is accepted in order.
    pub fn create_or_replace(&mut self, sender: SocketAddr, header: &RtpHeader) -> Result<&mut Session> {
        let full = self.sessions.len() >= self.capacity;
        match self.sessions.entry(header.ssrc) {
            Entry::Occupied(mut entry) => {
                entry.insert(Session::new(sender, header));
                Ok(entry.into_mut())
            }
            Entry::Vacant(_) if full => Err(Error::SessionCapacityExceeded {
                capacity: self.capacity,
            }),
            Entry::Vacant(entry) => Ok(entry.insert(Session::new(sender, header))),
        }
    }

    /// Match a packet to its session, creating or restarting as needed.
    pub fn admit(&mut self, sender: SocketAddr, header: &RtpHeader) -> Result<(&mut Session, Admission)> {
        let admission = match self.sessions.get(&header.ssrc) {
            Some(s) if s.is_from(&sender) => Admission::Existing,
            Some(_) => Admission::Restarted,
            None => Admission::New,
        };

        let session = match admission {
            Admission::Existing => self
                .sessions
                .get_mut(&header.ssrc)
                .ok_or(Error::UnwantedSource(header.ssrc))?,
            Admission::Restarted => {
                self.close(header.ssrc);
                self.create_or_replace(sender, header)?
            }
            Admission::New => self.create_or_replace(sender, header)?,
        };

        Ok((session, admission))
    }

    /// Release a session. Returns it if it existed.
    pub fn close(&mut self, ssrc: u32) -> Option<Session> {
        self.sessions.remove(&ssrc)
    }

    /// Close every session except `keep`
    pub fn retain_only(&mut self, keep: u32) {
        self.sessions.retain(|&ssrc, _| ssrc == keep);
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(ssrc: u32, seq: u16, ts: u32) -> RtpHeader {
        RtpHeader {
            version: 2,
            payload_type: 11,
            sequence: seq,
            timestamp: ts,
            ssrc,
            ..Default::default()
        }
    }

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_create_and_lookup() {
        let mut reg = SessionRegistry::new(1);
        let sender = addr("10.0.0.1:5004");

        let (session, adm) = reg.admit(sender, &header(1, 100, 4000)).unwrap();
        assert_eq!(adm, Admission::New);
        assert_eq!(session.state.timestamp, 4000);
        assert_eq!(session.state.seq, 100);
        assert_eq!(session.host, "10.0.0.1");
        assert_eq!(session.port, "5004");

        assert!(reg.lookup(&sender, 1).is_some());
        assert!(reg.lookup(&addr("10.0.0.1:5005"), 1).is_none());
        assert!(reg.lookup(&sender, 2).is_none());

        let (_, adm) = reg.admit(sender, &header(1, 101, 4020)).unwrap();
        assert_eq!(adm, Admission::Existing);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_capacity_rejects_new_ssrc() {
        let mut reg = SessionRegistry::new(1);
        reg.admit(addr("10.0.0.1:5004"), &header(1, 0, 0)).unwrap();

        let err = reg.admit(addr("10.0.0.2:5004"), &header(2, 0, 0)).unwrap_err();
        assert!(matches!(err, Error::SessionCapacityExceeded { capacity: 1 }));
        // Existing session untouched
        assert!(reg.get(1).is_some());
        assert!(reg.get(2).is_none());
    }

    #[test]
    fn test_sender_restart_resets_counters() {
        let mut reg = SessionRegistry::new(1);
        let (session, _) = reg.admit(addr("10.0.0.1:5004"), &header(1, 0, 0)).unwrap();
        session.state.dupes = 3;
        session.state.drops = 40;

        let (session, adm) = reg.admit(addr("10.0.0.1:6000"), &header(1, 900, 77)).unwrap();
        assert_eq!(adm, Admission::Restarted);
        assert_eq!(session.state.dupes, 0);
        assert_eq!(session.state.drops, 0);
        assert_eq!(session.state.timestamp, 77);
        assert_eq!(session.sender, addr("10.0.0.1:6000"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_multiple_sessions() {
        let mut reg = SessionRegistry::new(2);
        reg.admit(addr("10.0.0.1:5004"), &header(1, 0, 0)).unwrap();
        reg.admit(addr("10.0.0.2:5004"), &header(2, 0, 0)).unwrap();
        assert_eq!(reg.len(), 2);

        reg.retain_only(2);
        assert_eq!(reg.len(), 1);
        assert!(reg.close(2).is_some());
        assert!(reg.is_empty());
    }
}
