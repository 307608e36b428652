use thiserror::Error;

pub type Result<T, E = RegistryError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("device id must not be empty")]
    EmptyId,
    #[error("device {device}: duplicate channel name {channel}")]
    DuplicateChannel { device: String, channel: String },
    #[error("device {device}: unsupported driver kind {kind}")]
    UnsupportedDriver { device: String, kind: String },
}
