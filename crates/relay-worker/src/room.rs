//! Rooms and peers, and the registry the worker loop keeps them in.
//!
//! Media handling lives elsewhere; a room here is the ownership boundary for
//! its peers and the options they were created with.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde_json::json;

use crate::error::RequestError;
use crate::params::Parameters;

#[derive(Debug)]
pub struct Peer {
    name: String,
    options: Parameters,
    closed: bool,
}

impl Peer {
    fn new(name: String, options: Parameters) -> Self {
        Self {
            name,
            options,
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &Parameters {
        &self.options
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        tracing::debug!(peer = %self.name, "Peer closed");
    }

    fn dump(&self) -> serde_json::Value {
        json!({
            "peerName": self.name,
            "options": self.options.to_json(),
        })
    }
}

#[derive(Debug)]
pub struct Room {
    id: u32,
    options: Parameters,
    peers: BTreeMap<String, Peer>,
    created_at: String,
    closed: bool,
}

impl Room {
    pub fn new(id: u32, options: Parameters) -> Self {
        Self {
            id,
            options,
            peers: BTreeMap::new(),
            created_at: chrono::Utc::now().to_rfc3339(),
            closed: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn options(&self) -> &Parameters {
        &self.options
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn peer(&self, name: &str) -> Option<&Peer> {
        self.peers.get(name)
    }

    pub fn num_peers(&self) -> usize {
        self.peers.len()
    }

    pub fn create_peer(&mut self, name: &str, options: Parameters) -> Result<&Peer, RequestError> {
        match self.peers.entry(name.to_string()) {
            Entry::Occupied(_) => Err(RequestError::conflict(format!(
                "peer already exists [roomId:{}, peerName:{}]",
                self.id, name
            ))),
            Entry::Vacant(slot) => {
                tracing::debug!(room_id = self.id, peer = name, "Peer created");
                Ok(slot.insert(Peer::new(name.to_string(), options)))
            }
        }
    }

    pub fn close_peer(&mut self, name: &str) -> Result<(), RequestError> {
        let mut peer = self.peers.remove(name).ok_or_else(|| {
            RequestError::not_found(format!(
                "peer does not exist [roomId:{}, peerName:{}]",
                self.id, name
            ))
        })?;
        peer.close();
        Ok(())
    }

    /// Close every peer, then the room itself. Synchronous.
    pub fn close(&mut self) {
        if self.closed {
            tracing::error!(room_id = self.id, "Room already closed");
            return;
        }
        self.closed = true;

        for peer in self.peers.values_mut() {
            peer.close();
        }
        self.peers.clear();

        tracing::debug!(room_id = self.id, "Room closed");
    }

    pub fn dump(&self) -> serde_json::Value {
        json!({
            "roomId": self.id,
            "createdAt": self.created_at,
            "options": self.options.to_json(),
            "peers": self.peers.values().map(Peer::dump).collect::<Vec<_>>(),
        })
    }
}

/// Rooms by id. Iteration (and therefore shutdown) is in ascending id order.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: BTreeMap<u32, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.rooms.keys().copied().collect()
    }

    pub fn get(&self, id: u32) -> Result<&Room, RequestError> {
        self.rooms
            .get(&id)
            .ok_or_else(|| RequestError::not_found(format!("room does not exist [roomId:{}]", id)))
    }

    pub fn get_mut(&mut self, id: u32) -> Result<&mut Room, RequestError> {
        self.rooms
            .get_mut(&id)
            .ok_or_else(|| RequestError::not_found(format!("room does not exist [roomId:{}]", id)))
    }

    pub fn create(&mut self, id: u32, options: Parameters) -> Result<&Room, RequestError> {
        match self.rooms.entry(id) {
            Entry::Occupied(_) => Err(RequestError::conflict(format!(
                "room already exists [roomId:{}]",
                id
            ))),
            Entry::Vacant(slot) => {
                tracing::debug!(room_id = id, "Room created");
                Ok(slot.insert(Room::new(id, options)))
            }
        }
    }

    /// Close and remove one room.
    pub fn close(&mut self, id: u32) -> Result<(), RequestError> {
        let mut room = self
            .rooms
            .remove(&id)
            .ok_or_else(|| RequestError::not_found(format!("room does not exist [roomId:{}]", id)))?;
        room.close();
        Ok(())
    }

    /// Close and remove every room, returning their ids in close order.
    pub fn close_all(&mut self) -> Vec<u32> {
        let rooms = std::mem::take(&mut self.rooms);
        rooms
            .into_values()
            .map(|mut room| {
                room.close();
                room.id()
            })
            .collect()
    }
}
