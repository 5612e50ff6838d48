//! Dual-axis adapter state and the guarded transition controller.
//!
//! The adapter tracks two independent lifecycles: the local audio feed and
//! the remote protocol turn. Every mutation goes through
//! [`StateController::transition`], which validates the full
//! `{from_audio, from_protocol} -> {to_audio, to_protocol}` tuple before
//! installing the target pair.

/// Lifecycle of the local audio feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioState {
    /// No format announced.
    Idle,
    /// Format held, waiting for the first audio chunk.
    Ready,
    /// Audio is streaming to the service.
    Sending,
    /// The turn asked the feed to stop; draining.
    Stopping,
}

/// Lifecycle of the remote turn.
///
/// The declaration order matters: [`StateController::protocol_in_turn`]
/// treats the `WaitingFor*` run as an ordinal range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProtocolState {
    Idle,
    WaitingForTurnStart,
    WaitingForPhrase,
    WaitingForIntent,
    WaitingForIntent2,
    WaitingForTurnEnd,
    Error,
    Terminating,
    /// Terminal. Nothing leaves Zombie.
    Zombie,
}

/// The guarded state pair.
#[derive(Debug, Clone, Copy)]
pub struct StateController {
    audio: AudioState,
    protocol: ProtocolState,
}

impl Default for StateController {
    fn default() -> Self {
        Self {
            audio: AudioState::Idle,
            protocol: ProtocolState::Idle,
        }
    }
}

impl StateController {
    pub fn audio(&self) -> AudioState {
        self.audio
    }

    pub fn protocol(&self) -> ProtocolState {
        self.protocol
    }

    pub fn is_audio(&self, audio: AudioState) -> bool {
        self.audio == audio
    }

    pub fn is_protocol(&self, protocol: ProtocolState) -> bool {
        self.protocol == protocol
    }

    pub fn is_pair(&self, audio: AudioState, protocol: ProtocolState) -> bool {
        self.audio == audio && self.protocol == protocol
    }

    /// Error, Terminating, and Zombie block all inbound work except the
    /// transitions explicitly exempted in [`Self::transition`].
    pub fn is_bad(&self) -> bool {
        matches!(
            self.protocol,
            ProtocolState::Error | ProtocolState::Terminating | ProtocolState::Zombie
        )
    }

    /// True while the protocol axis is inside a turn, from `lo` through
    /// `hi` inclusive in declaration order.
    pub fn protocol_in_range(&self, lo: ProtocolState, hi: ProtocolState) -> bool {
        self.protocol >= lo && self.protocol <= hi
    }

    /// The guarded four-tuple transition.
    ///
    /// Succeeds only when the current pair matches `(from_audio,
    /// from_protocol)` and the source protocol state is not terminal-ish
    /// (Error/Zombie/Terminating), with three exceptions: a protocol
    /// self-loop, Error -> Terminating, and Terminating -> Zombie. On
    /// success the target pair is installed atomically (the caller holds
    /// the adapter lock); on failure nothing changes.
    pub fn transition(
        &mut self,
        from_audio: AudioState,
        from_protocol: ProtocolState,
        to_audio: AudioState,
        to_protocol: ProtocolState,
    ) -> bool {
        let matches_from = self.audio == from_audio && self.protocol == from_protocol;

        let source_allows = !matches!(
            from_protocol,
            ProtocolState::Error | ProtocolState::Zombie | ProtocolState::Terminating
        ) || from_protocol == to_protocol
            || (from_protocol == ProtocolState::Error && to_protocol == ProtocolState::Terminating)
            || (from_protocol == ProtocolState::Terminating && to_protocol == ProtocolState::Zombie);

        if matches_from && source_allows {
            tracing::debug!(
                "state: {:?}/{:?} => {:?}/{:?}",
                from_audio,
                from_protocol,
                to_audio,
                to_protocol
            );
            self.audio = to_audio;
            self.protocol = to_protocol;
            return true;
        }

        false
    }

    /// Audio-axis transition from a specific state; protocol untouched.
    pub fn transition_audio(&mut self, from: AudioState, to: AudioState) -> bool {
        self.transition(from, self.protocol, to, self.protocol)
    }

    /// Audio-axis transition from whatever the current state is.
    pub fn set_audio(&mut self, to: AudioState) -> bool {
        self.transition(self.audio, self.protocol, to, self.protocol)
    }

    /// Protocol-axis transition from a specific state; audio untouched.
    pub fn transition_protocol(&mut self, from: ProtocolState, to: ProtocolState) -> bool {
        self.transition(self.audio, from, self.audio, to)
    }

    /// Protocol-axis transition from whatever the current state is.
    pub fn set_protocol(&mut self, to: ProtocolState) -> bool {
        self.transition(self.audio, self.protocol, self.audio, to)
    }
}
