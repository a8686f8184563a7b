//! Internal utilities to turn async functions into protocols.
//!
//! Writing a protocol as an explicit state machine is tedious, and mixes
//! buffering and waiting for messages with the cryptography. Instead, each
//! protocol is written as an `async fn`, which receives messages at specific
//! *waitpoints*, and the executor here drives that future whenever the
//! protocol is poked.
//!
//! Each message is tagged with the waitpoint it was sent on, so that a message
//! arriving early is buffered until the protocol is ready for it.
use std::{
    collections::{HashMap, VecDeque},
    future::Future,
    pin::Pin,
    ptr,
    sync::{Arc, Mutex, MutexGuard},
    task::{Context as TaskContext, Poll, RawWaker, RawWakerVTable, Waker},
};

use event_listener::Event;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::{
    participants::ParticipantCounter,
    serde::{decode, encode_with_tag},
};

use super::{Action, MessageData, Participant, Protocol, ProtocolError};

/// A waitpoint, identifying where in the protocol a message is needed.
pub type Waitpoint = u8;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Nothing panics while holding these locks, but don't propagate poisoning anyway.
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// A message buffer is a concurrent data structure to buffer messages.
///
/// Messages are organized by the waitpoint they belong to, and events are used
/// to wake up whoever is waiting on a given waitpoint.
#[derive(Clone, Default)]
struct MessageBuffer {
    messages: Arc<Mutex<HashMap<Waitpoint, VecDeque<(Participant, MessageData)>>>>,
    events: Arc<Mutex<HashMap<Waitpoint, Event>>>,
}

impl MessageBuffer {
    fn push(&self, waitpoint: Waitpoint, from: Participant, message: MessageData) {
        lock(&self.messages)
            .entry(waitpoint)
            .or_default()
            .push_back((from, message));
        lock(&self.events).entry(waitpoint).or_default().notify(1);
    }

    async fn pop(&self, waitpoint: Waitpoint) -> (Participant, MessageData) {
        loop {
            let listener = {
                let mut messages = lock(&self.messages);
                if let Some(out) = messages.entry(waitpoint).or_default().pop_front() {
                    return out;
                }
                lock(&self.events).entry(waitpoint).or_default().listen()
            };
            listener.await;
        }
    }
}

/// Used to represent the different kinds of messages a participant can send.
#[derive(Debug, Clone)]
enum Message {
    Many(MessageData),
    Private(Participant, MessageData),
}

/// The communication state shared between a protocol future and its executor.
#[derive(Clone, Default)]
pub struct Context {
    incoming: MessageBuffer,
    outgoing: Arc<Mutex<VecDeque<Message>>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the channel used to talk to all the other participants.
    pub fn shared_channel(&self) -> SharedChannel {
        SharedChannel {
            ctx: self.clone(),
            next: 0,
        }
    }

    fn push_message(&self, from: Participant, message: MessageData) {
        // Messages always carry at least the waitpoint.
        let Some(&waitpoint) = message.first() else {
            return;
        };
        self.incoming.push(waitpoint, from, message);
    }

    fn outgoing(&self) -> Option<Message> {
        lock(&self.outgoing).pop_front()
    }

    fn send_raw(&self, message: Message) {
        lock(&self.outgoing).push_back(message);
    }
}

/// A channel, allowing a protocol to send and receive messages.
pub struct SharedChannel {
    ctx: Context,
    next: Waitpoint,
}

impl SharedChannel {
    /// Get the next available waitpoint on this channel.
    ///
    /// Participants must allocate waitpoints in the same order.
    pub fn next_waitpoint(&mut self) -> Waitpoint {
        let out = self.next;
        self.next += 1;
        out
    }

    /// (Indicate that you want to) send a message to everybody else.
    pub fn send_many<T: Serialize + ?Sized>(&self, waitpoint: Waitpoint, data: &T) {
        let message = encode_with_tag(&[waitpoint], data);
        self.ctx.send_raw(Message::Many(message));
    }

    /// (Indicate that you want to) send a message privately to someone.
    pub fn send_private<T: Serialize + ?Sized>(
        &self,
        waitpoint: Waitpoint,
        to: Participant,
        data: &T,
    ) {
        let message = encode_with_tag(&[waitpoint], data);
        self.ctx.send_raw(Message::Private(to, message));
    }

    /// Receive the next message sent on a waitpoint by a participant not yet counted.
    ///
    /// Messages from participants outside the counter, or already counted,
    /// are dropped without being decoded. A message which can't be decoded
    /// aborts the protocol, blaming its sender.
    pub async fn recv<T: DeserializeOwned>(
        &self,
        waitpoint: Waitpoint,
        seen: &mut ParticipantCounter<'_>,
    ) -> Result<(Participant, T), ProtocolError> {
        loop {
            let (from, data) = self.ctx.incoming.pop(waitpoint).await;
            if !seen.put(from) {
                debug!(?from, waitpoint, "dropping unexpected message");
                continue;
            }
            // The first byte is the waitpoint.
            return match decode(&data[1..]) {
                Ok(out) => Ok((from, out)),
                Err(e) => {
                    error!(?from, waitpoint, "failed to decode message");
                    Err(ProtocolError::MalformedMessage {
                        from,
                        reason: e.to_string(),
                    })
                }
            };
        }
    }
}

fn dummy_raw_waker() -> RawWaker {
    fn no_op(_: *const ()) {}
    fn clone(_: *const ()) -> RawWaker {
        dummy_raw_waker()
    }

    let vtable = &RawWakerVTable::new(clone, no_op, no_op, no_op);
    RawWaker::new(ptr::null(), vtable)
}

/// A waker which does nothing.
///
/// The executor re-polls the future whenever it's poked, so nobody needs waking.
fn dummy_waker() -> Waker {
    // SAFETY: the vtable functions never dereference the data pointer.
    unsafe { Waker::from_raw(dummy_raw_waker()) }
}

type BoxedFuture<T> = Pin<Box<dyn Future<Output = Result<T, ProtocolError>> + Send>>;

/// This struct will convert a future into a protocol.
struct ProtocolExecutor<T> {
    ctx: Context,
    fut: Option<BoxedFuture<T>>,
    result: Option<Result<T, ProtocolError>>,
}

impl<T> Protocol for ProtocolExecutor<T> {
    type Output = T;

    fn poke(&mut self) -> Result<Action<Self::Output>, ProtocolError> {
        let mut polled = false;
        loop {
            if let Some(outgoing) = self.ctx.outgoing() {
                return Ok(match outgoing {
                    Message::Many(m) => Action::SendMany(m),
                    Message::Private(to, m) => Action::SendPrivate(to, m),
                });
            }
            if let Some(result) = self.result.take() {
                return Ok(Action::Return(result?));
            }
            // Polling again can't make progress without new messages.
            if polled {
                return Ok(Action::Wait);
            }
            let Some(fut) = self.fut.as_mut() else {
                return Ok(Action::Wait);
            };
            polled = true;
            let waker = dummy_waker();
            let mut cx = TaskContext::from_waker(&waker);
            if let Poll::Ready(result) = fut.as_mut().poll(&mut cx) {
                self.result = Some(result);
                self.fut = None;
            }
        }
    }

    fn message(&mut self, from: Participant, data: MessageData) {
        self.ctx.push_message(from, data);
    }
}

/// Run a protocol, converting a future into an instance of the Protocol trait.
pub fn make_protocol<T>(
    ctx: Context,
    fut: impl Future<Output = Result<T, ProtocolError>> + Send + 'static,
) -> impl Protocol<Output = T> {
    ProtocolExecutor {
        ctx,
        fut: Some(Box::pin(fut)),
        result: None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::participants::ParticipantList;

    async fn echo(mut chan: SharedChannel, me: Participant) -> Result<u32, ProtocolError> {
        let participants = ParticipantList::new(&[Participant::from(0u32), Participant::from(1u32)])
            .ok_or_else(|| ProtocolError::AssertionFailed("bad participants".to_string()))?;
        let wait0 = chan.next_waitpoint();
        let wait1 = chan.next_waitpoint();
        chan.send_many(wait0, &u32::from(me));
        chan.send_many(wait1, &(u32::from(me) * 10));
        // Receive out of order, to exercise buffering.
        let mut seen = ParticipantCounter::new(&participants);
        seen.put(me);
        let (_, b): (_, u32) = chan.recv(wait1, &mut seen).await?;
        let mut seen = ParticipantCounter::new(&participants);
        seen.put(me);
        let (_, a): (_, u32) = chan.recv(wait0, &mut seen).await?;
        Ok(a + b)
    }

    #[test]
    fn test_messages_are_routed_by_waitpoint() {
        let ps = [Participant::from(0u32), Participant::from(1u32)];
        let protocols: Vec<(Participant, Box<dyn Protocol<Output = u32>>)> = ps
            .iter()
            .map(|&p| {
                let ctx = Context::new();
                let fut = echo(ctx.shared_channel(), p);
                let prot: Box<dyn Protocol<Output = u32>> = Box::new(make_protocol(ctx, fut));
                (p, prot)
            })
            .collect();
        let mut out = super::super::run_protocol(protocols).unwrap();
        out.sort_by_key(|(p, _)| *p);
        assert_eq!(out[0].1, 11);
        assert_eq!(out[1].1, 0);
    }

    /// Receive a single `u64` from participant 3, on behalf of participant 0.
    fn receiver() -> impl Protocol<Output = u64> {
        let ctx = Context::new();
        let chan = ctx.shared_channel();
        let fut = async move {
            let participants =
                ParticipantList::new(&[Participant::from(0u32), Participant::from(3u32)]).unwrap();
            let mut seen = ParticipantCounter::new(&participants);
            seen.put(Participant::from(0u32));
            let (_, x): (_, u64) = chan.recv(0, &mut seen).await?;
            Ok(x)
        };
        make_protocol(ctx, fut)
    }

    #[test]
    fn test_garbage_blames_sender() {
        let mut prot = receiver();
        assert!(matches!(prot.poke(), Ok(Action::Wait)));
        prot.message(Participant::from(3u32), vec![0, 0xc1]);
        match prot.poke() {
            Err(e) => assert_eq!(e.culprit(), Some(Participant::from(3u32))),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn test_strangers_and_repeats_are_ignored() {
        let mut prot = receiver();
        assert!(matches!(prot.poke(), Ok(Action::Wait)));

        // Somebody outside the session, and ourselves, can't abort it.
        prot.message(Participant::from(99u32), vec![0, 0xc1]);
        prot.message(Participant::from(0u32), vec![0, 0xc1]);
        assert!(matches!(prot.poke(), Ok(Action::Wait)));

        let mut good = vec![0];
        good.extend(crate::serde::encode(&7u64));
        prot.message(Participant::from(3u32), good);
        // A repeated message from the same sender is never looked at.
        prot.message(Participant::from(3u32), vec![0, 0xc1]);
        match prot.poke() {
            Ok(Action::Return(x)) => assert_eq!(x, 7),
            _ => panic!("expected the first message to be returned"),
        }
    }
}
