//! Provider types.
//!
//! A provider type tags what kind of operation an async resource stands
//! for. The tracker never looks inside the resource; the tag, its name,
//! and the resource's self-reported size are all it needs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Offset added to a provider tag to form its heap-snapshot wrapper class id.
///
/// Shifting keeps async wrapper class ids from colliding with other
/// embedder class ids.
pub const WRAPPER_CLASS_ID_OFFSET: u16 = 0xA1C;

macro_rules! provider_types {
    ($($(#[$meta:meta])* $variant:ident => $name:literal),+ $(,)?) => {
        /// Kind of async operation a resource represents.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(u16)]
        pub enum ProviderType {
            $($(#[$meta])* #[serde(rename = $name)] $variant,)+
        }

        impl ProviderType {
            const ALL: &'static [ProviderType] = &[$(Self::$variant,)+];

            /// Static name of this provider, as shown to instrumentation.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }

            /// Look up a provider by its name.
            #[must_use]
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

provider_types! {
    /// Placeholder tag; never attached to a live resource.
    None => "NONE",
    /// Generic connection (used by the TLS layer).
    Connection => "CONNECTION",
    /// Filesystem event watcher.
    FsEventWrap => "FSEVENTWRAP",
    /// Filesystem request.
    FsReqWrap => "FSREQWRAP",
    /// DNS address lookup.
    GetAddrInfoReqWrap => "GETADDRINFOREQWRAP",
    /// DNS name lookup.
    GetNameInfoReqWrap => "GETNAMEINFOREQWRAP",
    /// HTTP parser.
    HttpParser => "HTTPPARSER",
    /// Stream implemented in the scripting layer.
    JsStream => "JSSTREAM",
    /// PBKDF2 key derivation request.
    Pbkdf2Request => "PBKDF2REQUEST",
    /// Pipe connect request.
    PipeConnectWrap => "PIPECONNECTWRAP",
    /// Pipe handle.
    PipeWrap => "PIPEWRAP",
    /// Child process handle.
    ProcessWrap => "PROCESSWRAP",
    /// DNS query.
    QueryWrap => "QUERYWRAP",
    /// Random bytes request.
    RandomBytesRequest => "RANDOMBYTESREQUEST",
    /// Datagram send request.
    SendWrap => "SENDWRAP",
    /// Stream shutdown request.
    ShutdownWrap => "SHUTDOWNWRAP",
    /// Signal handle.
    SignalWrap => "SIGNALWRAP",
    /// Stat polling watcher.
    StatWatcher => "STATWATCHER",
    /// TCP handle.
    TcpWrap => "TCPWRAP",
    /// TCP connect request.
    TcpConnectWrap => "TCPCONNECTWRAP",
    /// Timer handle.
    TimerWrap => "TIMERWRAP",
    /// TLS stream.
    TlsWrap => "TLSWRAP",
    /// Terminal handle.
    TtyWrap => "TTYWRAP",
    /// UDP handle.
    UdpWrap => "UDPWRAP",
    /// Stream write request.
    WriteWrap => "WRITEWRAP",
    /// Compression context.
    Zctx => "ZCTX",
}

impl ProviderType {
    /// Number of provider tags, `None` included.
    pub const COUNT: usize = Self::ALL.len();

    /// All providers in tag order.
    #[must_use]
    pub fn all() -> &'static [ProviderType] {
        Self::ALL
    }

    /// Numeric tag exposed in the providers map.
    #[must_use]
    pub const fn tag(self) -> u16 {
        self as u16
    }

    /// Provider for a numeric tag.
    #[must_use]
    pub fn from_tag(tag: u16) -> Option<Self> {
        Self::ALL.get(usize::from(tag)).copied()
    }

    /// Heap-snapshot wrapper class id for this provider.
    #[must_use]
    pub const fn class_id(self) -> u16 {
        WRAPPER_CLASS_ID_OFFSET + self.tag()
    }

    /// Provider for a wrapper class id.
    ///
    /// Returns `None` for ids below the offset, for `None`'s own class id,
    /// and for ids past the end of the table.
    #[must_use]
    pub fn from_class_id(class_id: u16) -> Option<Self> {
        if class_id <= WRAPPER_CLASS_ID_OFFSET {
            return None;
        }
        Self::from_tag(class_id - WRAPPER_CLASS_ID_OFFSET)
    }

    /// Whether this tag may be attached to a live resource.
    #[must_use]
    pub const fn is_trackable(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
