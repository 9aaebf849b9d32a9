use crate::conversation::{Message, MessageId, ModelChoice, Role, Turn};

/// Transcript plus the flags that drive a single submission at a time.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    model: ModelChoice,
    in_flight: bool,
    streaming: Option<MessageId>,
    error: Option<String>,
    next_id: u64,
    /// Bumped by `switch_model`; a turn begun under an older value may no
    /// longer write into the transcript.
    generation: u64,
}

/// What `begin` hands back for the outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    pub message: String,
    pub model: ModelChoice,
    /// History as it stood before the new user message was appended.
    pub history: Vec<Turn>,
    pub generation: u64,
}

impl Conversation {
    pub fn new(model: ModelChoice) -> Self {
        Self {
            model,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn model(&self) -> ModelChoice {
        self.model
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn streaming_target(&self) -> Option<MessageId> {
        self.streaming
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    fn push(&mut self, role: Role, content: String) -> MessageId {
        self.next_id += 1;
        let id = MessageId(self.next_id);
        self.messages.push(Message { id, role, content });
        id
    }

    /// Start a turn. Returns `None` for blank input or while another turn is
    /// in flight; nothing is changed in that case.
    pub fn begin(&mut self, question: &str) -> Option<PendingTurn> {
        if self.in_flight || question.trim().is_empty() {
            return None;
        }

        let history = self.messages.iter().map(Message::to_turn).collect();
        self.in_flight = true;
        self.error = None;
        self.streaming = None;
        self.push(Role::User, question.to_string());

        Some(PendingTurn {
            message: question.to_string(),
            model: self.model,
            history,
            generation: self.generation,
        })
    }

    /// Create the (single) assistant message that fragments stream into.
    ///
    /// Returns `None` when the history was cleared since the turn began.
    pub fn open_stream(&mut self, generation: u64) -> Option<MessageId> {
        if generation != self.generation {
            return None;
        }
        let id = self.push(Role::Assistant, String::new());
        self.streaming = Some(id);
        Some(id)
    }

    /// Append to the active target. Returns false if there is none, e.g.
    /// because the history was cleared mid-stream.
    pub fn append(&mut self, fragment: &str) -> bool {
        let Some(id) = self.streaming else {
            return false;
        };
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(msg) => {
                msg.content.push_str(fragment);
                true
            }
            None => false,
        }
    }

    /// Record a failed turn. A turn from before the last `switch_model` is
    /// dropped instead.
    pub fn fail(&mut self, generation: u64, reason: &str) -> Option<MessageId> {
        if generation != self.generation {
            return None;
        }
        self.error = Some(reason.to_string());
        Some(self.push(Role::Assistant, format!("Error: {reason}")))
    }

    pub fn finish(&mut self) {
        self.in_flight = false;
        self.streaming = None;
    }

    pub fn switch_model(&mut self, model: ModelChoice) {
        self.model = model;
        self.generation += 1;
        self.messages.clear();
        self.streaming = None;
        self.error = None;
    }
}
