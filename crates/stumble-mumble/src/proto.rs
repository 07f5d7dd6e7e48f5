//! Protobuf messages of the Mumble control channel.
//!
//! Only the messages and fields the bot uses are declared; unknown fields
//! are skipped by the decoder. Field tags follow `Mumble.proto`.

/// Client version announced in the handshake.
pub const CLIENT_VERSION: (u16, u8, u8) = (1, 5, 0);

/// Legacy 32-bit version encoding: `major << 16 | minor << 8 | patch`.
pub fn version_v1(major: u16, minor: u8, patch: u8) -> u32 {
    ((major as u32) << 16) | ((minor as u32) << 8) | patch as u32
}

/// 64-bit version encoding: `major << 48 | minor << 32 | patch << 16`.
pub fn version_v2(major: u16, minor: u8, patch: u8) -> u64 {
    ((major as u64) << 48) | ((minor as u64) << 32) | ((patch as u64) << 16)
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Version {
    #[prost(uint32, optional, tag = "1")]
    pub version_v1: Option<u32>,
    #[prost(string, optional, tag = "2")]
    pub release: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub os: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub os_version: Option<String>,
    #[prost(uint64, optional, tag = "5")]
    pub version_v2: Option<u64>,
}

impl Version {
    /// The version packet this client sends on connect.
    pub fn client(release: &str) -> Self {
        let (major, minor, patch) = CLIENT_VERSION;
        Self {
            version_v1: Some(version_v1(major, minor, patch)),
            release: Some(release.to_string()),
            os: Some(std::env::consts::OS.to_string()),
            os_version: Some(std::env::consts::ARCH.to_string()),
            version_v2: Some(version_v2(major, minor, patch)),
        }
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Authenticate {
    #[prost(string, optional, tag = "1")]
    pub username: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub password: Option<String>,
    #[prost(string, repeated, tag = "3")]
    pub tokens: Vec<String>,
    #[prost(int32, repeated, packed = "false", tag = "4")]
    pub celt_versions: Vec<i32>,
    #[prost(bool, optional, tag = "5")]
    pub opus: Option<bool>,
    /// 0 = regular client, 1 = bot.
    #[prost(int32, optional, tag = "6")]
    pub client_type: Option<i32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Ping {
    #[prost(uint64, optional, tag = "1")]
    pub timestamp: Option<u64>,
    #[prost(uint32, optional, tag = "7")]
    pub tcp_packets: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Reject {
    #[prost(int32, optional, tag = "1")]
    pub r#type: Option<i32>,
    #[prost(string, optional, tag = "2")]
    pub reason: Option<String>,
}

impl Reject {
    /// Name of the rejection type.
    pub fn type_name(&self) -> &'static str {
        match self.r#type.unwrap_or_default() {
            1 => "WrongVersion",
            2 => "InvalidUsername",
            3 => "WrongUserPW",
            4 => "WrongServerPW",
            5 => "UsernameInUse",
            6 => "ServerFull",
            7 => "NoCertificate",
            8 => "AuthenticatorFail",
            _ => "None",
        }
    }

    /// Human-readable description combining type and reason.
    pub fn describe(&self) -> String {
        match self.reason.as_deref() {
            Some(reason) if !reason.is_empty() => format!("{}: {}", self.type_name(), reason),
            _ => self.type_name().to_string(),
        }
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ServerSync {
    #[prost(uint32, optional, tag = "1")]
    pub session: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub max_bandwidth: Option<u32>,
    #[prost(string, optional, tag = "3")]
    pub welcome_text: Option<String>,
    #[prost(uint64, optional, tag = "4")]
    pub permissions: Option<u64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ChannelRemove {
    #[prost(uint32, required, tag = "1")]
    pub channel_id: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ChannelState {
    #[prost(uint32, optional, tag = "1")]
    pub channel_id: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub parent: Option<u32>,
    #[prost(string, optional, tag = "3")]
    pub name: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UserRemove {
    #[prost(uint32, required, tag = "1")]
    pub session: u32,
    #[prost(uint32, optional, tag = "2")]
    pub actor: Option<u32>,
    #[prost(string, optional, tag = "3")]
    pub reason: Option<String>,
    #[prost(bool, optional, tag = "4")]
    pub ban: Option<bool>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UserState {
    #[prost(uint32, optional, tag = "1")]
    pub session: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub actor: Option<u32>,
    #[prost(string, optional, tag = "3")]
    pub name: Option<String>,
    #[prost(uint32, optional, tag = "4")]
    pub user_id: Option<u32>,
    #[prost(uint32, optional, tag = "5")]
    pub channel_id: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TextMessage {
    #[prost(uint32, optional, tag = "1")]
    pub actor: Option<u32>,
    #[prost(uint32, repeated, packed = "false", tag = "2")]
    pub session: Vec<u32>,
    #[prost(uint32, repeated, packed = "false", tag = "3")]
    pub channel_id: Vec<u32>,
    #[prost(uint32, repeated, packed = "false", tag = "4")]
    pub tree_id: Vec<u32>,
    #[prost(string, required, tag = "5")]
    pub message: String,
}

impl TextMessage {
    /// A private message to one user session.
    pub fn to_user(session: u32, text: &str) -> Self {
        Self {
            session: vec![session],
            message: text.to_string(),
            ..Default::default()
        }
    }

    /// A message to everyone in one channel.
    pub fn to_channel(channel_id: u32, text: &str) -> Self {
        Self {
            channel_id: vec![channel_id],
            message: text.to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_encodings() {
        assert_eq!(version_v1(1, 4, 0), 0x0001_0400);
        assert_eq!(version_v2(1, 5, 0), 0x0001_0005_0000_0000);
    }

    #[test]
    fn test_reject_describe() {
        let reject = Reject {
            r#type: Some(5),
            reason: Some("Username already in use".into()),
        };
        assert_eq!(reject.describe(), "UsernameInUse: Username already in use");
        assert_eq!(Reject::default().describe(), "None");
    }
}
