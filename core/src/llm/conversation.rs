//! Bounded tool round trip between an adapter and its vendor

use crate::error::{ProviderError, Result};
use crate::llm::message::LlmMessage;
use crate::registry::ProviderKind;

/// Where the exchange currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundTripState {
    /// A vendor reply is expected next
    AwaitingModel,
    /// Tool results were appended and must be sent back
    AwaitingToolResult,
    /// Final text was produced or the exchange failed
    Done,
}

/// What the adapter should do after feeding a reply
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Send [`ToolRoundTrip::messages`] to the vendor again
    FollowUp,
    /// The final assistant text
    Finished(String),
}

/// Conversation state for one generation, replayed on every follow-up call
#[derive(Debug, Clone)]
pub struct ToolRoundTrip {
    provider: ProviderKind,
    messages: Vec<LlmMessage>,
    state: RoundTripState,
    round_trips: usize,
    max_round_trips: usize,
    payload: String,
}

impl ToolRoundTrip {
    /// Start an exchange from the initial messages; `payload` answers every
    /// tool invocation
    pub fn new(
        provider: ProviderKind,
        messages: Vec<LlmMessage>,
        max_round_trips: usize,
        payload: String,
    ) -> Self {
        Self {
            provider,
            messages,
            state: RoundTripState::AwaitingModel,
            round_trips: 0,
            max_round_trips,
            payload,
        }
    }

    pub fn messages(&self) -> &[LlmMessage] {
        &self.messages
    }

    pub fn state(&self) -> RoundTripState {
        self.state
    }

    pub fn round_trips(&self) -> usize {
        self.round_trips
    }

    /// Whether the vendor may still invoke tools on the next request
    ///
    /// Tools stay declared on every request since replayed history may hold
    /// tool blocks; once this is false adapters forbid further calls instead.
    pub fn tools_allowed(&self) -> bool {
        self.round_trips < self.max_round_trips
    }

    /// Mark the follow-up request as sent
    pub fn resume(&mut self) {
        if self.state == RoundTripState::AwaitingToolResult {
            self.state = RoundTripState::AwaitingModel;
        }
    }

    /// Feed a vendor reply into the exchange
    pub fn advance(&mut self, reply: LlmMessage) -> Result<Step> {
        let invocations = reply.tool_invocations();

        if !invocations.is_empty() {
            if self.round_trips >= self.max_round_trips {
                self.state = RoundTripState::Done;
                return Err(ProviderError::ToolRoundTripsExceeded {
                    provider: self.provider,
                    limit: self.max_round_trips,
                }
                .into());
            }

            tracing::debug!(
                provider = %self.provider,
                tools = invocations.len(),
                round_trip = self.round_trips + 1,
                "answering tool invocations"
            );

            let results = invocations
                .iter()
                .map(|call| (call.id.clone(), self.payload.clone()))
                .collect();
            self.messages.push(reply);
            self.messages.push(LlmMessage::tool_results(results));
            self.round_trips += 1;
            self.state = RoundTripState::AwaitingToolResult;
            return Ok(Step::FollowUp);
        }

        self.state = RoundTripState::Done;
        match reply.get_text() {
            Some(text) if !text.trim().is_empty() => Ok(Step::Finished(text)),
            _ => Err(ProviderError::EmptyResponse {
                provider: self.provider,
            }
            .into()),
        }
    }
}

/// Text of a streamed reply that may still turn into a tool invocation
///
/// Fragments are held until the vendor signals how the reply ends. A reply
/// that ends in tool calls is answered by the follow-up text alone, so
/// anything said before the call is dropped.
#[derive(Debug, Default)]
pub struct PendingText {
    fragments: Vec<String>,
    committed: bool,
}

impl PendingText {
    /// Hold `fragment`, or hand it straight back once the reply is known to be text
    pub fn push(&mut self, fragment: String) -> Option<String> {
        if self.committed {
            return Some(fragment);
        }
        self.fragments.push(fragment);
        None
    }

    /// The reply ends as text; release everything held so far
    pub fn commit(&mut self) -> Vec<String> {
        self.committed = true;
        std::mem::take(&mut self.fragments)
    }

    /// The reply turned into a tool invocation
    pub fn discard(&mut self) {
        self.fragments.clear();
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }
}
