use std::fmt;

/// Every sensitive operation category the host may ask this module to authorize.
///
/// Fixed at build time. The discriminants are dense and start at zero so the
/// rule tables in [`crate::policy::Policy`] can index straight into a
/// `[Rule; HOOK_MAX]` array instead of going through a map.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(usize)]
pub enum AccessHookKind {
    GetSinkInfo = 0,
    GetSourceInfo,
    GetSinkInputInfo,
    GetSourceOutputInfo,
    GetClientInfo,
    GetModuleInfo,
    GetCardInfo,
    GetSampleInfo,
    GetServerInfo,
    Stat,
    PlaySample,
    ConnectPlayback,
    ConnectRecord,
    MoveSinkInput,
    SetSinkInputVolume,
    SetSinkInputMute,
    KillSinkInput,
    MoveSourceOutput,
    SetSourceOutputVolume,
    SetSourceOutputMute,
    KillSourceOutput,
    KillClient,
    FilterSubscribeEvent,
}

/// Number of [`AccessHookKind`] variants. Keep in sync with the enum by hand;
/// a unit test below asserts [`AccessHookKind::ALL`] has this length.
pub const HOOK_MAX: usize = 22;

impl AccessHookKind {
    pub const ALL: [AccessHookKind; HOOK_MAX] = [
        AccessHookKind::GetSinkInfo,
        AccessHookKind::GetSourceInfo,
        AccessHookKind::GetSinkInputInfo,
        AccessHookKind::GetSourceOutputInfo,
        AccessHookKind::GetClientInfo,
        AccessHookKind::GetModuleInfo,
        AccessHookKind::GetCardInfo,
        AccessHookKind::GetSampleInfo,
        AccessHookKind::GetServerInfo,
        AccessHookKind::Stat,
        AccessHookKind::PlaySample,
        AccessHookKind::ConnectPlayback,
        AccessHookKind::ConnectRecord,
        AccessHookKind::MoveSinkInput,
        AccessHookKind::SetSinkInputVolume,
        AccessHookKind::SetSinkInputMute,
        AccessHookKind::KillSinkInput,
        AccessHookKind::MoveSourceOutput,
        AccessHookKind::SetSourceOutputVolume,
        AccessHookKind::SetSourceOutputMute,
        AccessHookKind::KillSourceOutput,
        AccessHookKind::KillClient,
        AccessHookKind::FilterSubscribeEvent,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// True for hooks whose subject is a sink-input owned by some client.
    #[inline]
    pub fn is_sink_input_op(self) -> bool {
        matches!(
            self,
            AccessHookKind::GetSinkInputInfo
                | AccessHookKind::MoveSinkInput
                | AccessHookKind::SetSinkInputVolume
                | AccessHookKind::SetSinkInputMute
                | AccessHookKind::KillSinkInput
        )
    }

    /// True for hooks whose subject is a source-output owned by some client.
    #[inline]
    pub fn is_source_output_op(self) -> bool {
        matches!(
            self,
            AccessHookKind::GetSourceOutputInfo
                | AccessHookKind::MoveSourceOutput
                | AccessHookKind::SetSourceOutputVolume
                | AccessHookKind::SetSourceOutputMute
                | AccessHookKind::KillSourceOutput
        )
    }
}

impl fmt::Display for AccessHookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Capability to deliver a late boolean verdict for a request that returned
/// [`crate::Verdict::Cancel`]. Kept free of any particular async runtime so
/// this crate doesn't need to depend on `tokio`; the rules crate constructs
/// one from whatever channel it likes.
pub struct AsyncCompleter(Box<dyn FnOnce(bool) + Send>);

impl AsyncCompleter {
    pub fn new(f: impl FnOnce(bool) + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    #[inline]
    pub fn finish(self, granted: bool) {
        (self.0)(granted)
    }
}

impl fmt::Debug for AsyncCompleter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AsyncCompleter(..)")
    }
}

/// The value passed into every hook.
#[derive(Debug)]
pub struct AccessRequest {
    pub hook: AccessHookKind,
    pub client_index: u32,
    pub object_index: u32,
    /// Only meaningful for `filter_subscribe_event`: the raw subscription
    /// mask, low bits facility and high bits event type.
    pub event: u32,
    pub async_finish: AsyncCompleter,
}

impl AccessRequest {
    pub fn new(hook: AccessHookKind, client_index: u32, object_index: u32) -> Self {
        Self {
            hook,
            client_index,
            object_index,
            event: 0,
            async_finish: AsyncCompleter::new(|_| {}),
        }
    }
}
