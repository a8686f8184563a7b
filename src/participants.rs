//! This module holds some utilities for working with participants.
//!
//! Often you need to do things like, storing one item for each participant,
//! or getting the field values corresponding to each participant, etc.
//! This module tries to provide useful data structures for doing that.

use std::{collections::HashMap, ops::Index};

use elliptic_curve::Field;
use serde::Serialize;

use crate::{
    compat::CSCurve,
    protocol::{InitializationError, Participant},
};

/// Check the participants a protocol is started with, and sort them.
///
/// There must be at least two of them, with no duplicates, and `me` among them.
pub(crate) fn check_participants(
    participants: &[Participant],
    me: Participant,
) -> Result<ParticipantList, InitializationError> {
    if participants.len() < 2 {
        return Err(InitializationError::BadParameters(format!(
            "participant count cannot be < 2, found: {}",
            participants.len()
        )));
    };

    let participants = ParticipantList::new(participants).ok_or_else(|| {
        InitializationError::BadParameters("participant list cannot contain duplicates".to_string())
    })?;

    if !participants.contains(me) {
        return Err(InitializationError::BadParameters(
            "participant list must contain this participant".to_string(),
        ));
    }

    Ok(participants)
}

/// The bytes identifying a pairwise exchange, sender first.
pub(crate) fn pair_bytes(from: Participant, to: Participant) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&from.bytes());
    out[4..].copy_from_slice(&to.bytes());
    out
}

/// Represents a sorted list of participants.
///
/// The advantage of this data structure is that it can be hashed in the protocol transcript,
/// since everybody will agree on its order.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantList {
    participants: Vec<Participant>,
    /// This maps each participant to their index in the vector above.
    #[serde(skip_serializing)]
    indices: HashMap<Participant, usize>,
}

impl ParticipantList {
    /// Create a participant list from a slice of participants.
    ///
    /// This will return None if the participants have duplicates.
    pub fn new(participants: &[Participant]) -> Option<Self> {
        let mut out = participants.to_owned();
        out.sort();

        let indices: HashMap<_, _> = out.iter().enumerate().map(|(p, x)| (*x, p)).collect();

        if indices.len() < out.len() {
            return None;
        }

        Some(Self {
            participants: out,
            indices,
        })
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Check if this list has a given participant.
    pub fn contains(&self, participant: Participant) -> bool {
        self.indices.contains_key(&participant)
    }

    /// Iterate over all participants, in order.
    pub fn iter(&self) -> impl Iterator<Item = Participant> + '_ {
        self.participants.iter().copied()
    }

    /// Iterate over the other participants
    pub fn others(&self, me: Participant) -> impl Iterator<Item = Participant> + '_ {
        self.participants.iter().filter(move |x| **x != me).copied()
    }

    /// Return the index of a given participant.
    ///
    /// Basically, the order they appear in a sorted list
    pub fn index(&self, participant: Participant) -> usize {
        self.indices[&participant]
    }

    /// Get the lagrange coefficient for a participant, relative to this list.
    ///
    /// This is the coefficient by which a Shamir share held by that participant
    /// needs to be multiplied so that the shares of this list sum to the secret.
    pub fn lagrange<C: CSCurve>(&self, p: Participant) -> C::Scalar {
        let p_scalar = p.scalar::<C>();

        let mut top = C::Scalar::ONE;
        let mut bot = C::Scalar::ONE;
        for q in self.participants.iter() {
            if p == *q {
                continue;
            }
            let q_scalar = q.scalar::<C>();
            top *= q_scalar;
            bot *= q_scalar - p_scalar;
        }

        // Participant scalars are distinct and non-zero, so this is invertible.
        top * Option::<C::Scalar>::from(bot.invert()).unwrap_or(C::Scalar::ZERO)
    }
}

/// A map from participants to elements.
///
/// The idea is that you have one element for each participant.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantMap<'a, T> {
    #[serde(skip_serializing)]
    participants: &'a ParticipantList,
    data: Vec<Option<T>>,
    #[serde(skip_serializing)]
    count: usize,
}

impl<'a, T> ParticipantMap<'a, T> {
    /// Create a new map from a list of participants.
    ///
    /// This map only lives as long as that list of participants.
    pub fn new(participants: &'a ParticipantList) -> Self {
        let size = participants.participants.len();
        let mut data = Vec::with_capacity(size);
        for _ in 0..size {
            data.push(None);
        }

        Self {
            participants,
            data,
            count: 0,
        }
    }

    /// Check if this map is full, i.e. if every participant has put something in.
    pub fn full(&self) -> bool {
        self.count == self.data.len()
    }

    /// Place the data for a participant in this map.
    ///
    /// Data from unknown participants, or repeated data, is ignored.
    /// This returns whether or not the data was actually stored.
    pub fn put(&mut self, participant: Participant, data: T) -> bool {
        let Some(&i) = self.participants.indices.get(&participant) else {
            return false;
        };
        if self.data[i].is_some() {
            return false;
        }

        self.data[i] = Some(data);
        self.count += 1;
        true
    }
}

impl<'a, T> Index<Participant> for ParticipantMap<'a, T> {
    type Output = T;

    fn index(&self, index: Participant) -> &Self::Output {
        self.data[self.participants.index(index)].as_ref().unwrap()
    }
}

/// A way to count participants.
///
/// This is used when you want to process a message from each participant only once.
/// This datastructure will let you put a participant in, and then tell you if this
/// participant was newly inserted or not, allowing you to thus process the
/// first message received from them.
#[derive(Debug, Clone)]
pub struct ParticipantCounter<'a> {
    participants: &'a ParticipantList,
    seen: Vec<bool>,
    counter: usize,
}

impl<'a> ParticipantCounter<'a> {
    /// Create a new participant counter from the list of all participants.
    pub fn new(participants: &'a ParticipantList) -> Self {
        Self {
            participants,
            seen: vec![false; participants.len()],
            counter: participants.len(),
        }
    }

    /// Put a new participant in this counter.
    ///
    /// This will return true if the participant was added, or false otherwise.
    ///
    /// The participant may not have been added because:
    /// - The participant is not part of our participant list.
    /// - The participant has already been added.
    ///
    /// This can be checked to not process a message from a participant twice.
    pub fn put(&mut self, participant: Participant) -> bool {
        let Some(&i) = self.participants.indices.get(&participant) else {
            return false;
        };
        if self.seen[i] {
            return false;
        }

        self.seen[i] = true;
        self.counter -= 1;
        true
    }

    /// Consume this counter, returning true if all participants have been put in.
    pub fn full(&self) -> bool {
        self.counter == 0
    }

    /// Clear the contents of this counter.
    pub fn clear(&mut self) {
        for x in &mut self.seen {
            *x = false;
        }
        self.counter = self.participants.len();
    }
}
