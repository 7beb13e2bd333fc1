use std::sync::mpsc;
use weft_types::TreeChangeKind;
use weft_wire::{ClientMessage, Mutation, encode_client_message};

use crate::tree::{HandlerError, TreeChangeEvent, TreeChangeHandler};

/// Outbound side of the diagnostic transport. Connection handling, queueing
/// while disconnected and acknowledgement all live behind this trait.
pub trait DiagnosticSink: Send + Sync {
    fn send(&self, message: String) -> Result<(), HandlerError>;
}

impl DiagnosticSink for mpsc::Sender<String> {
    fn send(&self, message: String) -> Result<(), HandlerError> {
        Ok(mpsc::Sender::send(self, message)?)
    }
}

/// Subscriber that turns tree changes into wire messages for an inspector.
pub struct MutationRelay<S> {
    sink: S,
}

impl<S: DiagnosticSink> MutationRelay<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }
}

impl<S: DiagnosticSink> TreeChangeHandler for MutationRelay<S> {
    fn on_tree_change(&self, event: &TreeChangeEvent) -> Result<(), HandlerError> {
        let text = encode_client_message(&mutation_message(event))?;
        self.sink.send(text)
    }
}

pub fn mutation_message(event: &TreeChangeEvent) -> ClientMessage {
    let target = event
        .parent
        .as_ref()
        .map(|parent| parent.tag_name().to_owned());
    let node = event.child.tag_name();
    let mutation = match event.kind {
        TreeChangeKind::Add => Mutation::child_added(target, node),
        TreeChangeKind::Remove => Mutation::child_removed(target, node),
    };
    ClientMessage::mutation(mutation)
}
